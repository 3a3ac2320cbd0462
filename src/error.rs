use thiserror::Error;

/// Errors raised while turning a document into figures.
///
/// Only [`LoadError::MalformedDocument`] aborts a whole load. Everything else is
/// attached to a single record and reported through the loader's diagnostics.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("malformed document: {0}")]
    MalformedDocument(String),

    #[error("malformed record: {0}")]
    MalformedRecord(String),

    #[error("unknown figure type '{0}'")]
    UnknownType(String),

    #[error("{0}")]
    DanglingReference(String),

    #[error("attribute error: {0}")]
    Attribute(#[from] AttributeError),

    #[error("figure with id '{0}' already exists")]
    DuplicateId(String),

    #[error("figure '{id}' of type '{type_name}' does not accept source/target endpoints")]
    NotConnectable { id: String, type_name: String },

    #[error("figure '{id}' of type '{type_name}' cannot hold group members")]
    NotComposite { id: String, type_name: String },

    #[error("figure '{0}' cannot be assigned to itself")]
    SelfGroup(String),

    #[error("figure '{0}' handed out by the record hook is already registered")]
    AlreadyRegistered(String),

    #[error("figure '{0}' is borrowed elsewhere")]
    Busy(String),
}

impl LoadError {
    pub(crate) fn dangling(message: impl Into<String>) -> Self {
        Self::DanglingReference(message.into())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AttributeError {
    #[error("'{key}' expects {expected}, got {found}")]
    WrongType {
        key: String,
        expected: &'static str,
        found: String,
    },

    #[error("'{key}' has invalid value {value}: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

impl AttributeError {
    pub(crate) fn wrong_type(key: &str, expected: &'static str, found: &serde_json::Value) -> Self {
        Self::WrongType {
            key: key.to_string(),
            expected,
            found: json_kind(found).to_string(),
        }
    }

    pub(crate) fn invalid(key: &str, value: impl ToString, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

pub(crate) fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
