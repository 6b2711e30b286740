/// Core error types for the Chatreel pipeline.

/// A specialized Result type for Chatreel operations.
pub type ChatreelResult<T> = Result<T, ChatreelError>;

/// Top-level error type encompassing every pipeline stage.
#[derive(Debug, thiserror::Error)]
pub enum ChatreelError {
    #[error("script contains no messages")]
    EmptyScript,

    #[error("script error at line {line}: {message}")]
    Script { line: usize, message: String },

    #[error("asset fetch failed for '{key}': {message}")]
    AssetFetch { key: String, message: String },

    #[error("render error: {0}")]
    Render(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("font error: {0}")]
    Font(String),

    #[error("job cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl ChatreelError {
    /// Create an asset fetch error.
    pub fn asset(key: impl Into<String>, message: impl Into<String>) -> Self {
        ChatreelError::AssetFetch {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create a script error with a 1-based line number.
    pub fn script(line: usize, message: impl Into<String>) -> Self {
        ChatreelError::Script {
            line,
            message: message.into(),
        }
    }

    /// Whether the pipeline may absorb this error locally instead of failing the job.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ChatreelError::AssetFetch { .. })
    }
}
