//! Event to record mapping

use chrono::Utc;
use indexmap::IndexMap;
use serde_json::Value;

use super::{LogRecord, SCHEMA_VERSION, Severity};
use crate::event::{Event, EventKind};

/// Event headers that map onto dedicated record fields
const DEDICATED_HEADERS: &[&str] = &["processname", "groupname", "from_state", "to_state", "pid", "tries"];

/// Record keys an event header may never overwrite
const RESERVED_KEYS: &[&str] = &[
    "@version",
    "@timestamp",
    "host",
    "eventname",
    "level",
    "logger_name",
    "message",
    "path",
    "tags",
    "type",
    "user_data",
];

/// Static context stamped onto every record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordContext {
    /// Logger identity (`logger_name`)
    pub logger_name: String,
    /// Source tag (`path`)
    pub source_tag: String,
    /// Logstash message type (`type`)
    pub message_type: String,
    pub tags: Vec<String>,
    pub host: String,
    pub user_data: Option<IndexMap<String, String>>,
}

impl Default for RecordContext {
    fn default() -> Self {
        Self {
            logger_name: "supervisor".to_string(),
            source_tag: default_source_tag(),
            message_type: "logstash".to_string(),
            tags: Vec::new(),
            host: crate::session::hostname(),
            user_data: None,
        }
    }
}

/// Source tag used when none is configured: the file that builds records
pub fn default_source_tag() -> String {
    file!().to_string()
}

/// How the human readable message is put together
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Template {
    /// `"{eventname} {groupname}"`, falling back to the process name
    EventAndGroup,
    /// The body text, else `"{eventname} {processname}"`
    BodyOrEventAndProcess,
    /// `"{eventname} {<header>}"`
    EventAndHeader(&'static str),
    /// `"{eventname}"`
    EventOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Rule {
    severity: Severity,
    template: Template,
}

fn rule_for(kind: EventKind, name: &str) -> Rule {
    match kind {
        EventKind::ProcessStateChange => Rule {
            severity: if name.ends_with("_FATAL") {
                Severity::Error
            } else if name.ends_with("_BACKOFF") {
                Severity::Warning
            } else {
                Severity::Info
            },
            template: Template::EventAndGroup,
        },
        EventKind::SupervisorStateChange => Rule {
            severity: Severity::Info,
            template: Template::EventOnly,
        },
        EventKind::ProcessCommunication => Rule {
            severity: Severity::Info,
            template: Template::BodyOrEventAndProcess,
        },
        EventKind::ProcessLog => Rule {
            severity: if name == "PROCESS_LOG_STDERR" { Severity::Warning } else { Severity::Info },
            template: Template::BodyOrEventAndProcess,
        },
        EventKind::Tick => Rule {
            severity: Severity::Debug,
            template: Template::EventAndHeader("when"),
        },
        EventKind::Unknown => Rule {
            severity: Severity::Info,
            template: Template::EventOnly,
        },
    }
}

fn with_suffix(name: &str, suffix: Option<&str>) -> String {
    match suffix {
        Some(s) if !s.is_empty() => format!("{} {}", name, s),
        _ => name.to_string(),
    }
}

impl Template {
    fn render(&self, event: &Event) -> String {
        match self {
            Template::EventAndGroup => with_suffix(&event.name, event.group_name().or(event.process_name())),
            Template::BodyOrEventAndProcess => event
                .body_text()
                .unwrap_or_else(|| with_suffix(&event.name, event.process_name())),
            Template::EventAndHeader(key) => with_suffix(&event.name, event.header(key)),
            Template::EventOnly => event.name.clone(),
        }
    }
}

/// Builds records against a fixed context
pub struct RecordBuilder<'a> {
    context: &'a RecordContext,
}

impl<'a> RecordBuilder<'a> {
    pub fn new(context: &'a RecordContext) -> Self {
        Self { context }
    }

    /// Map an event to exactly one record. Never fails: missing headers just
    /// leave their fields out.
    pub fn build(&self, event: &Event) -> LogRecord {
        let rule = rule_for(event.kind, &event.name);
        let owned = |key: &str| event.header(key).map(str::to_string);

        let mut extra = IndexMap::new();
        for (key, value) in &event.headers {
            if DEDICATED_HEADERS.contains(&key.as_str()) {
                continue;
            }
            if RESERVED_KEYS.contains(&key.as_str()) {
                log::debug!("Ignoring event header '{}' that clashes with a record field", key);
                continue;
            }
            extra.insert(key.clone(), Value::String(value.clone()));
        }

        LogRecord {
            version: SCHEMA_VERSION.to_string(),
            timestamp: Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
            host: self.context.host.clone(),
            pid: owned("pid"),
            eventname: event.name.clone(),
            from_state: owned("from_state"),
            groupname: owned("groupname"),
            level: rule.severity,
            logger_name: self.context.logger_name.clone(),
            message: rule.template.render(event),
            path: self.context.source_tag.clone(),
            processname: owned("processname"),
            tags: self.context.tags.clone(),
            record_type: self.context.message_type.clone(),
            tries: owned("tries"),
            to_state: owned("to_state"),
            extra,
            user_data: self.context.user_data.clone(),
        }
    }
}
