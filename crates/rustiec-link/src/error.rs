use rustiec_core::EncodeError;
use thiserror::Error;

/// Errors that can occur at the session layer.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),
    #[error("connect timed out")]
    ConnectTimeout,
    #[error("no acknowledgement within t1")]
    T1Timeout,
    #[error("receive sequence mismatch: expected {expected}, got {received}")]
    SequenceMismatch { expected: u16, received: u16 },
    #[error("peer acknowledged unsent sequence number {0}")]
    InvalidAck(u16),
    #[error("connection closed by peer")]
    PeerClosed,
    #[error("session closed")]
    Closed,
    #[error("session not connected")]
    NotConnected,
    #[error("session already started")]
    AlreadyStarted,
    #[error("send queue full")]
    QueueFull,
    #[error("send timed out")]
    SendTimeout,
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}
