//! Logstash records
//!
//! A [`LogRecord`] is the JSON document shipped to the collector for one
//! event. Key names and their order are part of the wire contract with the
//! Logstash pipeline, so the struct field order below is load bearing.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

pub mod builder;

pub use builder::{RecordBuilder, RecordContext};

/// Fields that differ between otherwise identical records
#[cfg(test)]
pub const VOLATILE_FIELDS: &[&str] = &["@timestamp", "host", "pid", "tries", "stack_info"];

/// Logstash record schema version
pub const SCHEMA_VERSION: &str = "1";

/// Record severity, named the way Logstash consumers expect
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One structured log line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    #[serde(rename = "@version")]
    pub version: String,
    #[serde(rename = "@timestamp")]
    pub timestamp: String,
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<String>,
    pub eventname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groupname: Option<String>,
    pub level: Severity,
    pub logger_name: String,
    pub message: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processname: Option<String>,
    pub tags: Vec<String>,
    #[serde(rename = "type")]
    pub record_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tries: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_state: Option<String>,
    /// Event headers without a dedicated field, forwarded verbatim
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_data: Option<IndexMap<String, String>>,
}

#[cfg(test)]
impl LogRecord {
    /// JSON view of the record with volatile fields removed
    pub fn comparable(&self) -> Value {
        strip_volatile(serde_json::to_value(self).unwrap_or(Value::Null))
    }
}

/// Drop volatile fields from a JSON record so two runs can be compared
#[cfg(test)]
pub fn strip_volatile(mut record: Value) -> Value {
    if let Value::Object(ref mut map) = record {
        for key in VOLATILE_FIELDS {
            map.remove(*key);
        }
    }
    record
}
