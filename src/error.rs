use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeErrorKind {
    #[error("type not serializable")]
    NotSerializable,
    #[error("malformed structure")]
    MalformedStructure,
    #[error("unsupported value")]
    UnsupportedValue,
    #[error("auto type rejected")]
    AutoTypeRejected,
    #[error("auto type unresolved")]
    AutoTypeUnresolved,
    #[error("schema violation")]
    SchemaViolation,
}

#[derive(Debug, Clone)]
pub struct DecodeError {
    pub kind: DecodeErrorKind,
    pub message: String,
    pub offset: usize,
}

impl DecodeError {
    pub fn new(kind: DecodeErrorKind, message: impl Into<String>, offset: usize) -> Self {
        Self {
            kind,
            message: message.into(),
            offset,
        }
    }

    pub fn not_serializable(type_name: &str, offset: usize) -> Self {
        Self::new(
            DecodeErrorKind::NotSerializable,
            format!("type {type_name} is not serializable"),
            offset,
        )
    }

    pub fn malformed(message: impl Into<String>, offset: usize) -> Self {
        Self::new(DecodeErrorKind::MalformedStructure, message, offset)
    }

    pub fn unsupported(message: impl Into<String>, offset: usize) -> Self {
        Self::new(DecodeErrorKind::UnsupportedValue, message, offset)
    }

    pub fn auto_type_rejected(type_name: &str, offset: usize) -> Self {
        Self::new(
            DecodeErrorKind::AutoTypeRejected,
            format!("auto type not supported: {type_name}"),
            offset,
        )
    }

    pub fn auto_type_unresolved(type_name: &str, offset: usize) -> Self {
        Self::new(
            DecodeErrorKind::AutoTypeUnresolved,
            format!("no decoder found for type: {type_name}"),
            offset,
        )
    }

    pub fn schema(message: impl Into<String>, offset: usize) -> Self {
        Self::new(DecodeErrorKind::SchemaViolation, message, offset)
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at offset {}", self.message, self.offset)
    }
}

impl std::error::Error for DecodeError {}
