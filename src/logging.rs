//! Concrete JSONL event log: one run log file per UTC day, appended to
//! with one JSON object per line — `{"ts", "event", ...payload}`. A
//! deliberately plain sink, not a pluggable `tower::Service` tree: the
//! orchestrator's own `submit`/`attempt_failed` events are the entire
//! surface, with `tracing` covering internal state-transition logging.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::Utc;
use serde_json::{Map, Value};

#[derive(Debug)]
pub struct EventLogger {
    base_dir: PathBuf,
    file_lock: Mutex<()>,
}

impl EventLogger {
    pub fn new(base_dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir, file_lock: Mutex::new(()) })
    }

    pub fn log(&self, event: &str, payload: Map<String, Value>) {
        let now = Utc::now();
        let mut record = Map::new();
        record.insert("ts".to_string(), Value::String(now.to_rfc3339()));
        record.insert("event".to_string(), Value::String(event.to_string()));
        for (key, value) in payload {
            record.insert(key, value);
        }
        let path = self.base_dir.join(format!("run-{}.jsonl", now.format("%Y%m%d")));
        let _guard = self.file_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let line = serde_json::to_string(&record).expect("event record serializes to JSON");
        if let Ok(mut file) = std::fs::OpenOptions::new().create(true).append(true).open(&path) {
            let _ = writeln!(file, "{}", line);
        } else {
            tracing::warn!(event, "failed to open event log file for append");
        }
    }
}
