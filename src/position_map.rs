use sourcemap::SourceMapBuilder;

pub use sourcemap::SourceMap;

// -----------------------------------------------------------------------------
// Editable per-line view of a source map
// -----------------------------------------------------------------------------
//
// All columns, generated and original, are in UTF-16 code units, the unit
// swc's writer and `build_source_map` use.

/// Where a generated column came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Original {
    pub source: u32,
    /// 0-based
    pub line: u32,
    /// 0-based
    pub column: u32,
    pub name: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    pub generated_column: u32,
    pub original: Option<Original>,
    // Repair bookkeeping; never written out.
    pub(crate) handled: bool,
}

impl Mapping {
    pub fn new(generated_column: u32, original: Option<Original>) -> Self {
        Self {
            generated_column,
            original,
            handled: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratedPosition {
    /// 0-based output line
    pub line: u32,
    pub column: u32,
}

/// Line-indexed mappings that can be shifted in place while the output text
/// is edited. `lines[n]` holds the entries of output line `n`, sorted by
/// generated column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PositionMap {
    pub sources: Vec<String>,
    pub names: Vec<String>,
    pub lines: Vec<Vec<Mapping>>,
}

impl PositionMap {
    pub fn new(sources: Vec<String>) -> Self {
        Self {
            sources,
            names: vec![],
            lines: vec![],
        }
    }

    /// Unpack the tokens of `map`.
    pub fn from_source_map(map: &SourceMap) -> Self {
        let mut out = PositionMap::new(map.sources().map(str::to_string).collect());
        out.names = map.names().map(str::to_string).collect();
        for token in map.tokens() {
            let original = token.has_source().then(|| Original {
                source: token.get_src_id(),
                line: token.get_src_line(),
                column: token.get_src_col(),
                name: token.has_name().then(|| token.get_name_id()),
            });
            out.push(token.get_dst_line(), Mapping::new(token.get_dst_col(), original));
        }
        out
    }

    /// Pack the mappings back into a source map. `sources_content[i]` is the
    /// text of `sources[i]`.
    pub fn to_source_map(&self, sources_content: &[&str]) -> SourceMap {
        let mut builder = SourceMapBuilder::new(None);
        for (ix, source) in self.sources.iter().enumerate() {
            let id = builder.add_source(source);
            builder.set_source_contents(id, sources_content.get(ix).copied());
        }
        for name in &self.names {
            builder.add_name(name);
        }
        for (line, entries) in self.lines.iter().enumerate() {
            for m in entries {
                match m.original {
                    Some(o) => builder.add_raw(
                        line as u32,
                        m.generated_column,
                        o.line,
                        o.column,
                        Some(o.source),
                        o.name,
                        false,
                    ),
                    None => builder.add_raw(line as u32, m.generated_column, 0, 0, None, None, false),
                };
            }
        }
        builder.into_sourcemap()
    }

    pub fn name_index(&self, name: &str) -> Option<u32> {
        self.names.iter().position(|n| n == name).map(|ix| ix as u32)
    }

    pub fn push(&mut self, line: u32, mapping: Mapping) {
        let line = line as usize;
        if self.lines.len() <= line {
            self.lines.resize_with(line + 1, Vec::new);
        }
        let entries = &mut self.lines[line];
        let at = entries.partition_point(|m| m.generated_column <= mapping.generated_column);
        entries.insert(at, mapping);
    }

    /// All generated positions mapped to the given original position, in
    /// output order.
    pub fn generated_positions_for(&self, source: u32, line: u32, column: u32) -> Vec<GeneratedPosition> {
        let mut out = vec![];
        for (gen_line, entries) in self.lines.iter().enumerate() {
            for m in entries {
                if let Some(o) = m.original {
                    if o.source == source && o.line == line && o.column == column {
                        out.push(GeneratedPosition {
                            line: gen_line as u32,
                            column: m.generated_column,
                        });
                    }
                }
            }
        }
        out.dedup();
        out
    }
}

/// `//# sourceMappingURL=data:…` comment carrying `map` inline.
pub fn inline_comment(map: &SourceMap) -> sourcemap::Result<String> {
    Ok(format!("//# sourceMappingURL={}", map.to_data_url()?))
}
