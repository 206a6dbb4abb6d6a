use thiserror::Error;

/// Erreurs de conversion entre texte XML et [`crate::values::Value`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValueError {
    #[error("Parse error: cannot read '{text}' as {type_name}")]
    ParseError { text: String, type_name: String },

    #[error("Range error: {0}")]
    RangeError(String),

    #[error("Type error: expected {expected}, got {found}")]
    TypeError { expected: String, found: String },

    #[error("Unknown enum value '{value}' for {type_name}")]
    UnknownEnumValue { value: String, type_name: String },

    #[error("Type {0} has no text representation")]
    NotScalar(String),
}

impl ValueError {
    pub(crate) fn parse(text: &str, type_name: impl Into<String>) -> Self {
        Self::ParseError {
            text: text.to_string(),
            type_name: type_name.into(),
        }
    }
}
