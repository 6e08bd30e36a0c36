//! Frame decoding
//!
//! Header lines are space separated `key:value` tokens. Values may contain
//! further colons; only the first one splits.

use super::{Event, EventKind, Headers};
use crate::channel::Frame;
use crate::error::DecodeError;

/// Decode one frame into an event. Pure; never touches I/O.
pub fn decode(frame: &Frame) -> Result<Event, DecodeError> {
    let header = std::str::from_utf8(&frame.header).map_err(|_| DecodeError::malformed("header is not UTF-8"))?;
    let protocol = parse_tokens(header)?;

    let name = protocol
        .get("eventname")
        .filter(|name| !name.is_empty())
        .cloned()
        .ok_or_else(|| DecodeError::malformed("header has no eventname"))?;

    if let Some(len) = protocol.get("len") {
        let declared: usize = len
            .parse()
            .map_err(|_| DecodeError::malformed(format!("invalid len '{}'", len)))?;
        if declared != frame.payload.len() {
            return Err(DecodeError::malformed(format!(
                "len {} does not match payload of {} bytes",
                declared,
                frame.payload.len()
            )));
        }
    }

    let (header_line, body) = split_payload(&frame.payload);
    let header_line =
        std::str::from_utf8(header_line).map_err(|_| DecodeError::malformed("event header is not UTF-8"))?;
    let headers = parse_tokens(header_line)?;

    Ok(Event {
        kind: EventKind::from_name(&name),
        name,
        protocol,
        headers,
        body,
    })
}

/// Parse `key:value key:value ...` into ordered headers
pub fn parse_tokens(line: &str) -> Result<Headers, DecodeError> {
    let mut headers = Headers::new();
    for token in line.split_whitespace() {
        let (key, value) = token
            .split_once(':')
            .ok_or_else(|| DecodeError::malformed(format!("token '{}' is not key:value", token)))?;
        if key.is_empty() {
            return Err(DecodeError::malformed(format!("token '{}' has an empty key", token)));
        }
        headers.insert(key.to_string(), value.to_string());
    }
    Ok(headers)
}

/// Split a payload into its event header line and the optional body
fn split_payload(payload: &[u8]) -> (&[u8], Option<Vec<u8>>) {
    match payload.iter().position(|b| *b == b'\n') {
        Some(pos) => (&payload[..pos], Some(payload[pos + 1..].to_vec())),
        None => (payload, None),
    }
}
