use crate::line_index::LineIndex;
use crate::position_map::{Mapping, Original, PositionMap};
use crate::scope::RewriteRecord;

// -----------------------------------------------------------------------------
// Position-map repair
// -----------------------------------------------------------------------------

/// Graft `uid.` in front of every recorded identifier in `code` and keep `map`
/// pointing at the caller's source.
///
/// `map` must come straight from the generator: original positions in the
/// wrapped file, generated positions before `stripped_paren` was applied.
/// Records that cannot be located are dropped. Columns on both sides are
/// UTF-16 code units.
pub fn repair(
    code: String,
    mut map: PositionMap,
    records: &[RewriteRecord],
    uid: &str,
    stripped_paren: bool,
) -> (String, PositionMap) {
    if stripped_paren {
        if let Some(first) = map.lines.first_mut() {
            for m in first.iter_mut() {
                m.generated_column = m.generated_column.saturating_sub(1);
            }
        }
    }

    // undo the leading "(" of the wrapped source
    for m in map.lines.iter_mut().flatten() {
        if let Some(o) = &mut m.original {
            if o.line == 0 && o.column > 0 {
                o.column -= 1;
            }
        }
    }

    let prefix = format!("{uid}.");
    let repaired = records
        .iter()
        .fold(Grafted { code, map }, |state, record| state.graft(record, &prefix));
    (repaired.code, repaired.map)
}

struct Grafted {
    code: String,
    map: PositionMap,
}

impl Grafted {
    fn graft(mut self, record: &RewriteRecord, prefix: &str) -> Self {
        let line = record.position.line.saturating_sub(1);
        let column = record.position.column;

        let Some(name_ix) = self.map.name_index(&record.name) else {
            tracing::debug!(name = %record.name, "rewritten identifier has no name entry");
            return self;
        };
        let Some((at, ix)) = self.find_unhandled(line, column, name_ix) else {
            tracing::debug!(name = %record.name, line, column, "no generated position for rewritten identifier");
            return self;
        };

        let name_len = record.name.encode_utf16().count() as u32;
        let (insert_column, replacement, access_column) = if record.shorthand {
            (at.column + name_len, format!(": {prefix}{}", record.name), at.column + name_len + 2)
        } else {
            (at.column, prefix.to_string(), at.column)
        };

        // offsets from earlier grafts are stale; index the current text
        let Some(offset) = LineIndex::new(&self.code).offset_for(at.line, insert_column) else {
            tracing::debug!(name = %record.name, line = at.line, column = insert_column, "generated position outside the output");
            return self;
        };

        let shift = replacement.encode_utf16().count() as u32;
        let entries = &mut self.map.lines[at.line as usize];
        let insert_at = entries
            .iter()
            .position(|m| m.generated_column >= at.column)
            .unwrap_or(entries.len());
        for m in entries.iter_mut() {
            if m.generated_column >= at.column {
                m.generated_column += shift;
            }
        }

        entries[ix].handled = true;
        let original = entries[ix].original;
        entries.insert(
            insert_at,
            Mapping::new(access_column, original.map(|o| Original { name: None, ..o })),
        );
        if record.shorthand {
            entries.insert(insert_at, Mapping::new(at.column, original));
        }

        self.code.insert_str(offset, &replacement);
        tracing::trace!(name = %record.name, line = at.line, column = at.column, shorthand = record.shorthand, "grafted scope access");
        self
    }

    /// First generated position for `(line, column)` whose entry carries
    /// `name` and has not been grafted yet.
    fn find_unhandled(&self, line: u32, column: u32, name: u32) -> Option<(GeneratedAt, usize)> {
        self.map
            .generated_positions_for(0, line, column)
            .into_iter()
            .find_map(|pos| {
                let entries = self.map.lines.get(pos.line as usize)?;
                let ix = entries.iter().position(|m| {
                    m.generated_column == pos.column
                        && !m.handled
                        && m.original.is_some_and(|o| o.line == line && o.column == column && o.name == Some(name))
                })?;
                Some((GeneratedAt { line: pos.line, column: pos.column }, ix))
            })
    }
}

#[derive(Debug, Clone, Copy)]
struct GeneratedAt {
    line: u32,
    column: u32,
}
