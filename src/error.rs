//! Error types for the anugam daemon

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Anugam error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Serial port error
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration parse error
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration encode error
    #[error("Config encode error: {0}")]
    ConfigEncode(#[from] toml::ser::Error),

    /// WebSocket protocol error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] Box<tungstenite::Error>),

    /// Frame source failed persistently
    #[error("Frame source failed: {0}")]
    FrameSource(String),

    /// Detector backend failure
    #[error("Detector backend failed: {0}")]
    Detector(String),

    /// Startup initialization failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl From<tungstenite::Error> for Error {
    fn from(e: tungstenite::Error) -> Self {
        Error::WebSocket(Box::new(e))
    }
}
