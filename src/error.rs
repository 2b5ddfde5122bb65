use thiserror::Error;

use crate::line_index::LineIndex;

/// Position in the caller's source: 1-based line, 0-based column in UTF-16
/// code units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("{message} ({}:{})", .loc.line, .loc.column)]
    Syntax {
        message: String,
        /// Byte offset into the caller's source.
        pos: usize,
        loc: Location,
    },
    #[error("failed to print generated code: {0}")]
    Codegen(#[from] std::io::Error),
}

impl TransformError {
    /// Build a syntax error from an offset into the wrapped text
    /// (`"(" + source + "\n)"`), translated back onto `source`.
    pub(crate) fn syntax_in_wrapped(message: impl Into<String>, wrapped_offset: usize, source: &str) -> Self {
        let pos = wrapped_offset.saturating_sub(1).min(source.len());
        let (line, column) = LineIndex::new(source).location_for(pos);
        TransformError::Syntax {
            message: message.into(),
            pos,
            loc: Location { line: line + 1, column },
        }
    }

    pub fn location(&self) -> Option<Location> {
        match self {
            TransformError::Syntax { loc, .. } => Some(*loc),
            TransformError::Codegen(_) => None,
        }
    }
}
