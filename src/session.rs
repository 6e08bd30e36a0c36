//! Process-wide notifier context
//!
//! Built once at startup from [`Config`] and read-only afterwards.

use std::fs;
use std::net::SocketAddr;

use eyre::{Context, Result};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::Config;
use crate::event::Event;
use crate::record::RecordContext;
use crate::record::builder::default_source_tag;
use crate::transport::udp::resolve;

static HOSTNAME: Lazy<String> = Lazy::new(|| {
    fs::read_to_string("/proc/sys/kernel/hostname")
        .ok()
        .or_else(|| fs::read_to_string("/etc/hostname").ok())
        .or_else(|| std::env::var("HOSTNAME").ok())
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
});

/// Name of the machine the notifier runs on
pub fn hostname() -> String {
    HOSTNAME.clone()
}

/// Decides which events are forwarded to the collector
#[derive(Debug, Clone)]
pub struct EventFilter {
    events: Vec<String>,
    processes: Option<Regex>,
    groups: Option<Regex>,
}

impl EventFilter {
    pub fn new(events: Vec<String>, processes: Option<&str>, groups: Option<&str>) -> Result<Self> {
        let processes = processes
            .map(|p| Regex::new(p).context(format!("Invalid process filter '{}'", p)))
            .transpose()?;
        let groups = groups
            .map(|g| Regex::new(g).context(format!("Invalid group filter '{}'", g)))
            .transpose()?;
        Ok(Self {
            events,
            processes,
            groups,
        })
    }

    /// Forward everything
    #[cfg(test)]
    pub fn allow_all() -> Self {
        Self {
            events: vec!["*".to_string()],
            processes: None,
            groups: None,
        }
    }

    pub fn matches_name(&self, name: &str) -> bool {
        self.events.iter().any(|pattern| match pattern.strip_suffix('*') {
            Some(prefix) => name.starts_with(prefix),
            None => pattern == name,
        })
    }

    /// Whether an event should become a record. Events without a process
    /// or group name are only judged by their event name.
    pub fn accepts(&self, event: &Event) -> bool {
        if !self.matches_name(&event.name) {
            return false;
        }
        if let (Some(re), Some(name)) = (&self.processes, event.process_name())
            && !re.is_match(name)
        {
            return false;
        }
        if let (Some(re), Some(name)) = (&self.groups, event.group_name())
            && !re.is_match(name)
        {
            return false;
        }
        true
    }
}

/// Read-only state shared by the whole listener run
#[derive(Debug, Clone)]
pub struct Session {
    pub collector: SocketAddr,
    pub context: RecordContext,
    pub filter: EventFilter,
    pub append_newline: bool,
}

impl Session {
    /// Build the session from configuration. Fails only on startup
    /// problems: unresolvable collector or invalid filters.
    pub fn from_config(config: &Config) -> Result<Self> {
        let collector = resolve(&config.collector.host, config.collector.port).context(format!(
            "Failed to resolve collector {}:{}",
            config.collector.host, config.collector.port
        ))?;

        let filter = EventFilter::new(
            config.effective_events(),
            config.filter.processes.as_deref(),
            config.filter.groups.as_deref(),
        )?;

        let context = RecordContext {
            logger_name: config.record.logger_name.clone(),
            source_tag: config.record.source_tag.clone().unwrap_or_else(default_source_tag),
            message_type: config.record.message_type.clone(),
            tags: config.record.tags.clone(),
            host: hostname(),
            user_data: user_data(&config.include, |key| std::env::var(key).ok()),
        };

        Ok(Self {
            collector,
            context,
            filter,
            append_newline: config.record.append_newline,
        })
    }
}

/// Collect the included environment variables; unset ones are skipped
pub fn user_data<F>(include: &[String], lookup: F) -> Option<IndexMap<String, String>>
where
    F: Fn(&str) -> Option<String>,
{
    if include.is_empty() {
        return None;
    }
    let mut data = IndexMap::new();
    for key in include {
        match lookup(key) {
            Some(value) => {
                data.insert(key.clone(), value);
            }
            None => log::warn!("Included environment variable {} is not set", key),
        }
    }
    Some(data)
}
