//! Log events

mod log_event;

pub use log_event::{LogEntry, LogEvent, LogEventKind};
