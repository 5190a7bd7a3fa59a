//! Serial link error types and recovery policy

use crate::processing::frame::FrameError;
use thiserror::Error;

/// Failures of the serial link to the sensor board.
///
/// None of these are fatal: the acquisition loop closes the port and starts
/// discovery again.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("no sensor board answered on {ports} port(s)")]
    NoDevice { ports: usize },
    #[error("failed to open {port}: {reason}")]
    Open { port: String, reason: String },
    #[error("read timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("handshake on {port}: expected {expected} bytes, received {received}")]
    HandshakeMismatch { port: String, expected: usize, received: u32 },
    #[error("port {port} is disconnected")]
    Disconnected { port: String },
    #[error("malformed frame: {0}")]
    Frame(#[from] FrameError),
    #[error("serial port error: {0}")]
    Port(#[from] serialport::Error),
    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for link operations
pub type LinkResult<T> = Result<T, LinkError>;

/// What the acquisition loop does after a link failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStrategy {
    /// Start discovery again straight away
    Rediscover,
    /// Wait for the no-device backoff, then start discovery
    RediscoverAfterBackoff,
}

impl LinkError {
    pub fn recovery_strategy(&self) -> RecoveryStrategy {
        match self {
            LinkError::NoDevice { .. } => RecoveryStrategy::RediscoverAfterBackoff,
            // enumeration itself failing looks the same as an empty bus
            LinkError::Port(_) => RecoveryStrategy::RediscoverAfterBackoff,
            _ => RecoveryStrategy::Rediscover,
        }
    }

    /// Map an I/O error from a blocking read, turning timeouts into `Timeout`
    pub fn from_read(error: std::io::Error, timeout_ms: u64) -> Self {
        match error.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock | std::io::ErrorKind::UnexpectedEof => {
                LinkError::Timeout { timeout_ms }
            }
            _ => LinkError::Io(error),
        }
    }
}
