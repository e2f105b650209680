use thiserror::Error;

/// Errors produced while converting wire payloads into model values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("invalid coordinate in field '{0}'")]
    InvalidCoordinate(&'static str),
}

pub type Result<T> = std::result::Result<T, ModelError>;
