use std::collections::HashMap;
use swc_core::{
    common::{source_map::SourceMapGenConfig, sync::Lrc, BytePos, FileName, SourceFile, SourceMap, DUMMY_SP},
    ecma::{
        ast::{Expr, ExprStmt, Ident, IdentName, ParenExpr, Script, Stmt},
        codegen::{text_writer::JsWriter, Config, Emitter},
        visit::{Visit, VisitWith},
    },
};

use crate::error::TransformError;
use crate::position_map::PositionMap;

pub(crate) struct Generated {
    pub code: String,
    /// Original positions are in the wrapped file's coordinates.
    pub map: PositionMap,
    /// The printer's enclosing `(` … `)` was removed from `code`.
    pub stripped_paren: bool,
}

/// Print `expr` as `(<expr>);`, then strip the statement punctuation back off.
pub(crate) fn generate(
    expr: Box<Expr>,
    cm: &Lrc<SourceMap>,
    file: &SourceFile,
    filename: &str,
) -> Result<Generated, TransformError> {
    let mut names = NameCollector::default();
    expr.visit_with(&mut names);

    let script = Script {
        span: DUMMY_SP,
        body: vec![Stmt::Expr(ExprStmt {
            span: DUMMY_SP,
            expr: Box::new(Expr::Paren(ParenExpr { span: DUMMY_SP, expr })),
        })],
        shebang: None,
    };

    let mut buf = vec![];
    let mut raw = vec![];
    {
        let wr = JsWriter::new(cm.clone(), "\n", &mut buf, Some(&mut raw));
        let mut emitter = Emitter {
            cfg: Config::default(),
            cm: cm.clone(),
            comments: None,
            wr: Box::new(wr),
        };
        emitter.emit_script(&script)?;
    }

    // only positions inside the parsed expression can be mapped back
    raw.retain(|(pos, _)| file.start_pos <= *pos && *pos < file.end_pos);
    let source_map = cm.build_source_map(
        &raw,
        None,
        MapConfig {
            filename,
            names: &names.at,
        },
    );
    let map = PositionMap::from_source_map(&source_map);

    let printed = String::from_utf8_lossy(&buf);
    let trimmed = printed.trim_end_matches(|c: char| c == ';' || c.is_whitespace());
    let (code, stripped_paren) = match trimmed.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some(inner) => (inner.to_string(), true),
        None => (trimmed.to_string(), false),
    };

    Ok(Generated {
        code,
        map,
        stripped_paren,
    })
}

struct MapConfig<'a> {
    filename: &'a str,
    names: &'a HashMap<BytePos, String>,
}

impl SourceMapGenConfig for MapConfig<'_> {
    fn file_name_to_source(&self, _f: &FileName) -> String {
        self.filename.to_string()
    }

    fn name_for_bytepos(&self, pos: BytePos) -> Option<&str> {
        self.names.get(&pos).map(String::as_str)
    }

    // the caller's text, not the wrapped one, goes into the final map
    fn inline_sources_content(&self, _f: &FileName) -> bool {
        false
    }
}

/// Identifier names by the byte position they start at.
#[derive(Default)]
struct NameCollector {
    at: HashMap<BytePos, String>,
}

impl Visit for NameCollector {
    fn visit_ident(&mut self, i: &Ident) {
        if !i.span.is_dummy() {
            self.at.entry(i.span.lo).or_insert_with(|| i.sym.to_string());
        }
    }

    fn visit_ident_name(&mut self, i: &IdentName) {
        if !i.span.is_dummy() {
            self.at.entry(i.span.lo).or_insert_with(|| i.sym.to_string());
        }
    }
}
