use crate::errors::CredmapError;
use crate::log_retention::enforce_total_budget;
use serde::Serialize;
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

pub const DEFAULT_DISK_BUDGET_BYTES: u64 = 50 * 1024 * 1024;
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogEvent<'a> {
    pub level: LogLevel,
    pub event_type: &'a str,
    pub payload: Value,
}

/// Destination for session events. Implementations must not fail the caller's
/// operation; the session ignores their errors.
pub trait EventLog: Send + Sync {
    fn record(&self, event: &LogEvent<'_>) -> Result<(), CredmapError>;
}

#[derive(Debug, Clone)]
pub struct JsonlLogger {
    pub path: PathBuf,
    pub max_payload_bytes: usize,
    pub budget_bytes: u64,
}

impl JsonlLogger {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            budget_bytes: DEFAULT_DISK_BUDGET_BYTES,
        }
    }

    pub fn append(&self, event: &LogEvent<'_>) -> Result<(), CredmapError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| CredmapError::Io(e.to_string()))?;
        }
        let truncated = truncate_json(event.payload.clone(), self.max_payload_bytes);
        let line = serde_json::to_string(&LogEvent {
            level: event.level,
            event_type: event.event_type,
            payload: truncated,
        })
        .map_err(|e| CredmapError::Io(e.to_string()))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| CredmapError::Io(e.to_string()))?;
        file.write_all(line.as_bytes())
            .map_err(|e| CredmapError::Io(e.to_string()))?;
        file.write_all(b"\n")
            .map_err(|e| CredmapError::Io(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            let _ = enforce_total_budget(parent, self.budget_bytes)?;
        }

        Ok(())
    }
}

impl EventLog for JsonlLogger {
    fn record(&self, event: &LogEvent<'_>) -> Result<(), CredmapError> {
        self.append(event)
    }
}

/// Keeps events in memory as `(level, event_type, payload)`.
#[derive(Debug, Default, Clone)]
pub struct MemoryLog {
    events: Arc<Mutex<Vec<(LogLevel, String, Value)>>>,
}

impl MemoryLog {
    pub fn events(&self) -> Vec<(LogLevel, String, Value)> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn event_types(&self) -> Vec<String> {
        self.events().into_iter().map(|(_, kind, _)| kind).collect()
    }
}

impl EventLog for MemoryLog {
    fn record(&self, event: &LogEvent<'_>) -> Result<(), CredmapError> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).push((
            event.level,
            event.event_type.to_string(),
            event.payload.clone(),
        ));
        Ok(())
    }
}

pub fn structured_fallback_line(scope: &str, state: &str, message: &str) -> String {
    format!(
        "scope={scope} state={state} message={} ",
        message.replace('\n', "\\n")
    )
}

fn truncate_json(value: Value, max_bytes: usize) -> Value {
    let rendered = serde_json::to_string(&value).unwrap_or_default();
    if rendered.len() <= max_bytes {
        return value;
    }
    let mut cut = max_bytes.saturating_sub(3);
    while !rendered.is_char_boundary(cut) {
        cut -= 1;
    }
    Value::String(format!("{}...", &rendered[..cut]))
}

#[cfg(test)]
mod tests {
    use super::{structured_fallback_line, EventLog, JsonlLogger, LogEvent, LogLevel, MemoryLog};
    use serde_json::json;

    #[test]
    fn logger_truncates_large_payloads_and_writes_jsonl() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("session.jsonl");
        let mut logger = JsonlLogger::new(&path);
        logger.max_payload_bytes = 20;
        logger.budget_bytes = 1024;

        logger
            .record(&LogEvent {
                level: LogLevel::Info,
                event_type: "field_moved",
                payload: json!({"text": "abcdefghijklmnopqrstuvwxyzé"}),
            })
            .expect("append");

        let text = std::fs::read_to_string(&path).expect("read");
        assert!(text.contains("\"event_type\":\"field_moved\""));
        assert!(text.contains("\"level\":\"info\""));
        assert!(text.contains("..."));
        assert_eq!(text.lines().count(), 1);
    }

    #[test]
    fn memory_log_keeps_event_order() {
        let log = MemoryLog::default();
        for kind in ["a", "b"] {
            log.record(&LogEvent {
                level: LogLevel::Warn,
                event_type: kind,
                payload: json!({}),
            })
            .expect("record");
        }
        assert_eq!(log.event_types(), vec!["a", "b"]);
    }

    #[test]
    fn fallback_line_is_deterministic() {
        let line = structured_fallback_line("session", "ready", "hello\nworld");
        assert_eq!(line, "scope=session state=ready message=hello\\nworld ");
    }
}
