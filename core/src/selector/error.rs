//! Error types for selector parsing

use thiserror::Error;

/// Errors raised while compiling selector source text.
///
/// Every variant carries the byte offset in the source where parsing stopped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SelectorSyntaxError {
    #[error("empty selector")]
    Empty,

    #[error("unexpected character '{found}' at {position}")]
    UnexpectedChar { position: usize, found: char },

    #[error("expected {expected} at {position}, found {found}")]
    UnexpectedToken {
        position: usize,
        expected: &'static str,
        found: String,
    },

    #[error("unterminated string starting at {position}")]
    UnterminatedString { position: usize },

    #[error("invalid escape '\\{found}' at {position}")]
    InvalidEscape { position: usize, found: char },

    #[error("integer out of range at {position}")]
    IntegerOverflow { position: usize },

    #[error("unknown attribute '{name}' at {position}")]
    UnknownAttribute { position: usize, name: String },

    #[error("operator '{op}' cannot be used with attribute '{attr}' at {position}")]
    UnsupportedOperator {
        position: usize,
        attr: &'static str,
        op: &'static str,
    },

    #[error("attribute '{attr}' expects {expected} at {position}")]
    TypeMismatch {
        position: usize,
        attr: &'static str,
        expected: &'static str,
    },

    #[error("invalid regex at {position}: {reason}")]
    InvalidRegex { position: usize, reason: String },

    #[error("connector offset at {position} exceeds {max}")]
    OffsetOutOfRange { position: usize, max: i64 },

    #[error("empty step at {position}")]
    EmptyStep { position: usize },

    #[error("second target marker '@' at {position}")]
    DuplicateTarget { position: usize },
}

impl SelectorSyntaxError {
    /// Byte offset of the failure in the source text
    pub fn position(&self) -> usize {
        match self {
            Self::Empty => 0,
            Self::UnexpectedChar { position, .. }
            | Self::UnexpectedToken { position, .. }
            | Self::UnterminatedString { position }
            | Self::InvalidEscape { position, .. }
            | Self::IntegerOverflow { position }
            | Self::OffsetOutOfRange { position, .. }
            | Self::UnknownAttribute { position, .. }
            | Self::UnsupportedOperator { position, .. }
            | Self::TypeMismatch { position, .. }
            | Self::InvalidRegex { position, .. }
            | Self::EmptyStep { position }
            | Self::DuplicateTarget { position } => *position,
        }
    }
}
