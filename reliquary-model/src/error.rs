use std::fmt;

use thiserror::Error;

/// Errors produced by model constructors and parsing helpers.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("unknown {kind} value: {value}")]
    UnknownValue { kind: &'static str, value: String },

    #[error("invalid resource: {0}")]
    InvalidResource(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;

/// A single field-level validation message.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn blank(field: impl Into<String>) -> Self {
        Self::new(field, "can't be blank")
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.message)
    }
}

pub(crate) fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}
