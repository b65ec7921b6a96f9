//! Core error types for the protocol bridge

#[derive(thiserror::Error, Debug)]
pub enum BridgeError {
    /// A canonical packet is missing a field its translator requires.
    /// Indicates a producer bug; the offending connection gets disconnected.
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Protocol state misuse (version queried before handshake, or set twice)
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl BridgeError {
    /// Whether this error means the remote peer sent bytes we can't accept,
    /// as opposed to a local failure.
    pub fn is_bad_packet(&self) -> bool {
        matches!(self, Self::InvalidData(_) | Self::Protocol(_))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
