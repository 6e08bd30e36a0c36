//! Supervisor events
//!
//! Typed view of one frame of the event protocol. Events are decoded from a
//! [`Frame`](crate::channel::Frame) and consumed once by the record builder.

use indexmap::IndexMap;

pub mod decode;

pub use decode::decode;

/// Event families the supervisor emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ProcessStateChange,
    SupervisorStateChange,
    ProcessCommunication,
    ProcessLog,
    Tick,
    Unknown,
}

impl EventKind {
    /// Classify an event by its `eventname`
    pub fn from_name(name: &str) -> Self {
        if name.starts_with("PROCESS_STATE") {
            Self::ProcessStateChange
        } else if name.starts_with("SUPERVISOR_STATE_CHANGE") {
            Self::SupervisorStateChange
        } else if name.starts_with("PROCESS_COMMUNICATION") {
            Self::ProcessCommunication
        } else if name.starts_with("PROCESS_LOG") {
            Self::ProcessLog
        } else if name.starts_with("TICK") {
            Self::Tick
        } else {
            Self::Unknown
        }
    }
}

/// Ordered `key:value` pairs as they appeared on the wire
pub type Headers = IndexMap<String, String>;

/// One decoded supervisor event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    /// Protocol `eventname`, e.g. `PROCESS_STATE_RUNNING`
    pub name: String,
    /// Protocol header (ver, server, serial, pool, poolserial, eventname, len)
    pub protocol: Headers,
    /// Event header from the first payload line (processname, groupname, ...)
    pub headers: Headers,
    /// Payload bytes after the event header line, if any
    pub body: Option<Vec<u8>>,
}

impl Event {
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }

    pub fn process_name(&self) -> Option<&str> {
        self.header("processname")
    }

    pub fn group_name(&self) -> Option<&str> {
        self.header("groupname")
    }

    /// Body decoded as text with trailing line breaks removed
    pub fn body_text(&self) -> Option<String> {
        let body = self.body.as_ref()?;
        let text = String::from_utf8_lossy(body);
        let trimmed = text.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() { None } else { Some(trimmed.to_string()) }
    }
}
