use swc_core::{
    common::{sync::Lrc, FileName, Mark, SourceFile, SourceMap, Spanned},
    ecma::{
        ast::{EsVersion, Expr, ExprStmt, ParenExpr, Stmt},
        parser::{error::Error as ParseError, parse_file_as_script, EsSyntax, Syntax},
        transforms::base::resolver,
        visit::VisitMutWith,
    },
};

use crate::error::TransformError;

pub(crate) struct Parsed {
    pub cm: Lrc<SourceMap>,
    pub file: Lrc<SourceFile>,
    pub expr: Box<Expr>,
    /// Context mark the resolver gives identifiers with no binding.
    pub unresolved_mark: Mark,
}

/// Parse `source` as a single parenthesized expression and resolve its
/// bindings. Must run inside `GLOBALS.set`.
pub(crate) fn parse_expression(source: &str, filename: &str) -> Result<Parsed, TransformError> {
    let cm: Lrc<SourceMap> = Default::default();
    // the newline keeps a trailing line comment away from the closing paren
    let wrapped = format!("({source}\n)");
    let file = cm.new_source_file(FileName::Custom(filename.to_string()).into(), wrapped);

    let mut recovered = vec![];
    let mut script = parse_file_as_script(
        &file,
        Syntax::Es(EsSyntax::default()),
        EsVersion::latest(),
        None,
        &mut recovered,
    )
    .map_err(|err| syntax_error(err, &file, source))?;
    if let Some(err) = recovered.into_iter().next() {
        return Err(syntax_error(err, &file, source));
    }

    let unresolved_mark = Mark::new();
    let top_level_mark = Mark::new();
    script.visit_mut_with(&mut resolver(unresolved_mark, top_level_mark, false));

    let offset_of = |stmt: &Stmt| stmt.span().lo.0.saturating_sub(file.start_pos.0) as usize;
    let mut body = std::mem::take(&mut script.body);
    if let Some(extra) = body.get(1) {
        return Err(TransformError::syntax_in_wrapped(
            "Expected a single expression",
            offset_of(extra),
            source,
        ));
    }
    let expr = match body.pop() {
        Some(Stmt::Expr(ExprStmt { expr, .. })) => expr,
        Some(other) => {
            return Err(TransformError::syntax_in_wrapped(
                "Expected an expression",
                offset_of(&other),
                source,
            ))
        }
        None => return Err(TransformError::syntax_in_wrapped("Expected an expression", 0, source)),
    };
    let expr = match *expr {
        Expr::Paren(ParenExpr { expr, .. }) => expr,
        other => Box::new(other),
    };

    Ok(Parsed {
        cm,
        file,
        expr,
        unresolved_mark,
    })
}

fn syntax_error(err: ParseError, file: &SourceFile, source: &str) -> TransformError {
    let offset = err.span().lo.0.saturating_sub(file.start_pos.0) as usize;
    TransformError::syntax_in_wrapped(err.kind().msg(), offset, source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use swc_core::common::{Globals, GLOBALS};

    #[test]
    fn unwraps_the_synthetic_parens() {
        GLOBALS.set(&Globals::new(), || {
            let parsed = parse_expression("a + b", "expr.js").unwrap();
            assert!(matches!(*parsed.expr, Expr::Bin(_)));
        });
    }

    #[test]
    fn keeps_user_parens_of_a_sequence() {
        GLOBALS.set(&Globals::new(), || {
            let parsed = parse_expression("(a), (b)", "expr.js").unwrap();
            assert!(matches!(*parsed.expr, Expr::Seq(_)));
        });
    }

    #[test]
    fn trailing_line_comment_is_allowed() {
        GLOBALS.set(&Globals::new(), || {
            assert!(parse_expression("a // note", "expr.js").is_ok());
        });
    }

    #[test]
    fn reports_errors_in_caller_coordinates() {
        GLOBALS.set(&Globals::new(), || {
            let err = parse_expression("a + *", "expr.js").err().unwrap();
            match err {
                TransformError::Syntax { pos, loc, .. } => {
                    assert_eq!(pos, 4);
                    assert_eq!((loc.line, loc.column), (1, 4));
                }
                other => panic!("unexpected error {other:?}"),
            }
        });
    }

    #[test]
    fn rejects_more_than_one_statement() {
        GLOBALS.set(&Globals::new(), || {
            assert!(matches!(
                parse_expression("a); (b", "expr.js"),
                Err(TransformError::Syntax { .. })
            ));
        });
    }

    #[test]
    fn bind_and_do_expressions_are_not_javascript() {
        GLOBALS.set(&Globals::new(), || {
            for source in ["a::b", "do { 1 }"] {
                assert!(
                    matches!(parse_expression(source, "expr.js"), Err(TransformError::Syntax { .. })),
                    "{source}"
                );
            }
        });
    }
}
