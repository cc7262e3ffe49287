use thiserror::Error;

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(format!("JSON serialization error: {}", err))
    }
}

impl From<config::ConfigError> for LedgerError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Failed to parse entry at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

impl LedgerError {
    pub fn empty_event_type() -> Self {
        Self::InvalidInput("event type must not be empty".to_string())
    }

    pub fn payload_not_object(kind: &str) -> Self {
        Self::InvalidInput(format!("payload must be a JSON object, got {}", kind))
    }
}
