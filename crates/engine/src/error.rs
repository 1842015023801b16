use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid classifier config: {0}")]
    InvalidClassifierConfig(String),

    #[error("invalid strategy for intent '{intent}': {reason}")]
    InvalidStrategy { intent: String, reason: String },

    #[error("{0}")]
    Other(String),
}
