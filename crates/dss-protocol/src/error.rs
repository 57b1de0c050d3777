//! Error types for wire parsing.

/// Errors produced while tokenizing a protocol line.
///
/// A known tag with malformed fields is always an error; recovery decisions
/// belong to the session layer, not the tokenizer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("empty protocol line")]
    Empty,

    #[error("unknown message tag: '{0}'")]
    UnknownTag(String),

    #[error("{tag}: missing field '{field}'")]
    MissingField { tag: &'static str, field: &'static str },

    #[error("{tag}: invalid value '{value}' for field '{field}'")]
    InvalidField {
        tag: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("machine record has {found} fields, expected {expected}")]
    RecordFieldCount { expected: usize, found: usize },

    #[error("unknown machine state: '{0}'")]
    UnknownMachineState(String),
}
