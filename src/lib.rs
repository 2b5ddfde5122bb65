//! Turn a free-standing JavaScript expression into a closed function that reads
//! every free variable (and `this`) from one injected scope parameter.
//!
//! ```text
//! a + this.b   =>   function(_) {
//!                       return _.a + _.b;
//!                   }
//! ```
//!
//! The accompanying source map points each `_.name` access back at the bare
//! identifier in the caller's text.

use swc_core::common::{Globals, GLOBALS};

mod error;
mod generate;
mod line_index;
mod options;
mod parse;
pub mod position_map;
pub mod repair;
pub mod scope;

pub use error::{Location, TransformError};
pub use options::Options;
pub use position_map::{inline_comment, PositionMap, SourceMap};
pub use scope::{Position, RewriteMode, RewriteRecord};

use scope::ScopeRewriter;

// -----------------------------------------------------------------------------
// Entrypoints
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Transformed {
    pub code: String,
    /// `None` when `Options::source_map` is off.
    pub map: Option<SourceMap>,
    /// Free names the expression reads, in first-use order.
    pub vars: Vec<String>,
    /// `this` was replaced with `Options::this_var_name` (keep-scope mode).
    pub generated_this_var: bool,
    /// The source text that was transformed.
    pub original: String,
}

/// An expression cut off at the first unmatched `}` of a longer text.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformedPrefix {
    pub transformed: Transformed,
    /// Text after the `}`.
    pub rest: String,
}

/// Transform `source` into a scope-isolated function expression.
///
/// Fails only when `source` is not a single valid expression; the error's
/// position refers to `source` itself.
pub fn transform(source: &str, options: &Options) -> Result<Transformed, TransformError> {
    // fresh marks per call
    GLOBALS.set(&Globals::new(), || run(source, options))
}

/// Transform the expression at the start of `text` that is closed by an
/// unmatched `}`, as in `{{ a + b }} more template`.
///
/// Returns `Ok(None)` when the whole of `text` already is an expression, and
/// the syntax error when parsing stops anywhere but at a `}`.
pub fn transform_prefix(text: &str, options: &Options) -> Result<Option<TransformedPrefix>, TransformError> {
    let parsed = GLOBALS.set(&Globals::new(), || parse::parse_expression(text, &options.filename));
    let err = match parsed {
        Ok(_) => return Ok(None),
        Err(err) => err,
    };
    let end = match &err {
        TransformError::Syntax { pos, .. } if text.get(*pos..).is_some_and(|s| s.starts_with('}')) => *pos,
        _ => return Err(err),
    };

    tracing::debug!(end, "expression ends at an unmatched brace");
    let transformed = transform(&text[..end], options)?;
    Ok(Some(TransformedPrefix {
        transformed,
        rest: text[end + 1..].to_string(),
    }))
}

#[tracing::instrument(level = "debug", skip_all, fields(filename = %options.filename))]
fn run(source: &str, options: &Options) -> Result<Transformed, TransformError> {
    let parsed = parse::parse_expression(source, &options.filename)?;

    // Without a map the identifiers can be rewritten in the tree directly.
    let mode = if options.source_map {
        RewriteMode::Graft
    } else {
        RewriteMode::Replace
    };
    let rewritten = ScopeRewriter::new(parsed.cm.clone(), parsed.unresolved_mark, options, mode)
        .rewrite(parsed.expr);

    let generated = generate::generate(rewritten.expr, &parsed.cm, &parsed.file, &options.filename)?;

    let (code, map) = match mode {
        RewriteMode::Graft => {
            let (code, map) = repair::repair(
                generated.code,
                generated.map,
                &rewritten.records,
                &rewritten.uid,
                generated.stripped_paren,
            );
            (code, Some(map.to_source_map(&[source])))
        }
        RewriteMode::Replace => (generated.code, None),
    };

    let vars: Vec<String> = rewritten.vars.into_iter().collect();
    tracing::debug!(?vars, "transformed expression");

    Ok(Transformed {
        code,
        map,
        vars,
        generated_this_var: rewritten.generated_this_var,
        original: source.to_string(),
    })
}
