/// Decoding error. Every variant aborts the current decode call.
///
/// `type_name` is always the full Rust name of the type being decoded
/// (as reported by `std::any::type_name`).
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("{type_name}: expected {expected} field(s), window has {actual}")]
    FieldCountMismatch {
        type_name: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{type_name}: unexpected null in '{field}'")]
    UnexpectedNull {
        type_name: &'static str,
        field: String,
    },

    #[error("{type_name}: cannot cast {source_type} (field {index} '{field}')")]
    CastFailure {
        type_name: &'static str,
        source_type: String,
        field: String,
        index: usize,
    },

    #[error("{type_name}: no member matches field '{field}' (index {index})")]
    UnknownField {
        type_name: &'static str,
        field: String,
        index: usize,
    },

    #[error(
        "{type_name}: cannot infer the width of tuple slot {slot}, terminate it with a sentinel column"
    )]
    AmbiguousTupleWidth { type_name: &'static str, slot: usize },

    #[error("{type_name}: window [{index}, {index}+{count}) exceeds a row of {row_len} field(s)")]
    FieldOutOfRange {
        type_name: &'static str,
        index: usize,
        count: usize,
        row_len: usize,
    },

    #[error("{type_name}: cyclic type graph ({path})")]
    CyclicType { type_name: &'static str, path: String },

    #[error("{type_name}: {message}")]
    Configuration {
        type_name: &'static str,
        message: String,
    },

    #[error("row source error: {0}")]
    Source(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl MapError {
    pub fn configuration(type_name: &'static str, message: impl Into<String>) -> Self {
        MapError::Configuration {
            type_name,
            message: message.into(),
        }
    }

    pub fn row_source(message: impl Into<String>) -> Self {
        MapError::Source(message.into())
    }

    /// Name of the type the failure is attributed to, if any.
    pub fn type_name(&self) -> Option<&'static str> {
        match self {
            MapError::FieldCountMismatch { type_name, .. }
            | MapError::UnexpectedNull { type_name, .. }
            | MapError::CastFailure { type_name, .. }
            | MapError::UnknownField { type_name, .. }
            | MapError::AmbiguousTupleWidth { type_name, .. }
            | MapError::FieldOutOfRange { type_name, .. }
            | MapError::CyclicType { type_name, .. }
            | MapError::Configuration { type_name, .. } => Some(*type_name),
            MapError::Source(_) | MapError::Config(_) | MapError::Io(_) => None,
        }
    }
}
