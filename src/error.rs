//! Error types for the notifier pipeline
//!
//! Each layer has its own error so the loop can decide per kind whether to
//! skip, log or stop. None of them is fatal once the loop is running.

use std::io;

use thiserror::Error;

/// A frame that could not be turned into an event
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("malformed frame: {reason}")]
    MalformedFrame { reason: String },
}

impl DecodeError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        DecodeError::MalformedFrame { reason: reason.into() }
    }
}

/// A record that could not be handed to the network
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("record of {size} bytes exceeds the datagram limit of {limit} bytes")]
    Oversize { size: usize, limit: usize },

    #[error("send buffer full, record dropped")]
    WouldBlock,

    #[error("send to {target} failed: {source}")]
    Send {
        target: String,
        #[source]
        source: io::Error,
    },
}

/// Failures of the supervisor handshake channel
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("supervisor channel is closed")]
    Closed,

    #[error("channel operation {operation} not allowed in state {state}")]
    OutOfOrder { operation: &'static str, state: &'static str },

    #[error("supervisor channel I/O error: {0}")]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_display() {
        let err = DecodeError::malformed("missing eventname");
        assert_eq!(err.to_string(), "malformed frame: missing eventname");
    }

    #[test]
    fn test_oversize_display() {
        let err = TransportError::Oversize { size: 70000, limit: 65507 };
        assert!(err.to_string().contains("70000"));
    }
}
