//! Record transport
//!
//! Records leave the process as one JSON datagram each. Delivery is
//! at-most-once: a failed send is reported to the caller and forgotten.

use crate::error::TransportError;
use crate::record::LogRecord;

pub mod udp;

pub use udp::UdpTransport;

/// Largest payload a single UDP datagram can carry over IPv4
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// A best-effort sink for records
pub trait Transport {
    /// Send one record, returning the number of bytes handed to the network
    fn send(&mut self, record: &LogRecord) -> Result<usize, TransportError>;

    /// Human readable destination for diagnostics
    fn describe(&self) -> String;
}

/// Serialize a record the way the collector expects it
pub fn encode(record: &LogRecord, append_newline: bool) -> Result<Vec<u8>, TransportError> {
    let mut bytes = serde_json::to_vec(record)?;
    if append_newline {
        bytes.push(b'\n');
    }
    if bytes.len() > MAX_DATAGRAM_SIZE {
        return Err(TransportError::Oversize {
            size: bytes.len(),
            limit: MAX_DATAGRAM_SIZE,
        });
    }
    Ok(bytes)
}
