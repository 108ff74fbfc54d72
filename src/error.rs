//! Error taxonomy for the live session.
//!
//! Every failure path surfaces exactly one of these to the UI; the
//! carried string is the human-readable message shown to the user.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Microphone/camera permission denied or device missing.
    DeviceAccess(String),
    /// WebSocket open, transport, or remote failure.
    Connection(String),
    /// Malformed inbound audio payload. Logged and skipped, never fatal.
    Decode(String),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::DeviceAccess(msg) => write!(f, "Device access failed: {}", msg),
            SessionError::Connection(msg) => write!(f, "Connection error: {}", msg),
            SessionError::Decode(msg) => write!(f, "Audio decode error: {}", msg),
        }
    }
}

impl std::error::Error for SessionError {}
