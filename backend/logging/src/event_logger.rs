//! Install Event Logger
//!
//! Milestones of the install pipeline, serialized as JSON onto the
//! `install_events` tracing target.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::redact::{redact_sensitive_data, redact_url};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InstallEvent {
    Resolved {
        source_url: String,
        file_path: String,
        already_installed: bool,
    },
    Fetched {
        file_path: String,
    },
    Loaded {
        file_path: String,
        greeting: String,
    },
    RolledBack {
        file_path: String,
        reason: String,
    },
    Failed {
        error_msg: String,
    },
}

impl InstallEvent {
    fn is_failure(&self) -> bool {
        matches!(self, InstallEvent::RolledBack { .. } | InstallEvent::Failed { .. })
    }
}

#[derive(Debug, Serialize)]
pub struct EventLogEntry {
    /// `<type>/<name>_<version>`
    pub plugin: String,
    pub timestamp: DateTime<Utc>,
    pub event: InstallEvent,
}

pub struct EventLogger;

impl EventLogger {
    /// Logs an install milestone, redacting credentials in every field first.
    pub fn log_event(plugin: &str, mut event: InstallEvent) -> EventLogEntry {
        match &mut event {
            InstallEvent::Resolved { source_url, .. } => *source_url = redact_url(source_url),
            InstallEvent::Fetched { .. } | InstallEvent::Loaded { .. } => {}
            InstallEvent::RolledBack { reason, .. } => *reason = redact_sensitive_data(reason),
            InstallEvent::Failed { error_msg } => *error_msg = redact_sensitive_data(error_msg),
        }

        let entry = EventLogEntry {
            plugin: plugin.into(),
            timestamp: Utc::now(),
            event,
        };

        let json = serde_json::to_string(&entry).unwrap_or_default();
        if entry.event.is_failure() {
            warn!(target: "install_events", event = %json, "Install event");
        } else {
            info!(target: "install_events", event = %json, "Install event");
        }
        entry
    }
}
