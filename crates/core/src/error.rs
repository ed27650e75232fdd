/// Result alias that carries the custom [`BoothError`] type.
pub type Result<T> = std::result::Result<T, BoothError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum BoothError {
    /// Free-form message for conditions that do not deserve their own variant.
    #[error("{0}")]
    Message(String),
    /// Inconsistent configuration detected while the booth is being set up.
    /// This is the only error the application treats as fatal.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// The spectral transform could not be planned or executed.
    #[error("spectral transform unavailable: {0}")]
    Transform(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Failure while decoding a WAV file.
    #[error("{0}")]
    Wav(#[from] hound::Error),
    /// Failure while parsing a JSON configuration file.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl BoothError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    /// Creates a configuration error.
    pub fn config<T: Into<String>>(msg: T) -> Self {
        Self::Config(msg.into())
    }
}

impl From<&str> for BoothError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for BoothError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
