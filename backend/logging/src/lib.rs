//! Structured logging components for Kadende.
//!
//! Handles subscriber setup with file rotation, credential redaction for source
//! URLs, and install pipeline event logging.

pub mod event_logger;
pub mod logger;
pub mod redact;

pub use event_logger::{EventLogEntry, EventLogger, InstallEvent};
pub use logger::init_logger;
pub use redact::{redact_sensitive_data, redact_url};
