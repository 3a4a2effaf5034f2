use thiserror::Error;

#[derive(Debug, Error)]
pub enum LocolError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("appender init failed: {0}")]
    AppenderInitFailed(String),

    #[error("query failed: {0}")]
    QueryFailed(String),

    #[error("storage error: {0}")]
    Store(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("ingest error: {0}")]
    Ingest(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, LocolError>;
