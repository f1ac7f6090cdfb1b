use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

pub type EventPayload = Map<String, Value>;

/// Append-only pipeline log, one compact JSON object per line.
///
/// Every line carries `type`, `run_id` and `ts`; the caller payload is merged
/// after those and wins on key collisions. Clones share the same file lock, so
/// concurrent generation runs can log through one writer.
#[derive(Debug, Clone)]
pub struct EventWriter {
    inner: Arc<EventWriterInner>,
}

#[derive(Debug)]
struct EventWriterInner {
    path: PathBuf,
    run_id: String,
    lock: Mutex<()>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, run_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(EventWriterInner {
                path: path.into(),
                run_id: run_id.into(),
                lock: Mutex::new(()),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn run_id(&self) -> &str {
        &self.inner.run_id
    }

    pub fn emit(&self, event_type: &str, payload: EventPayload) -> anyhow::Result<Value> {
        let mut event = Map::new();
        event.insert("type".to_string(), Value::String(event_type.to_string()));
        event.insert(
            "run_id".to_string(),
            Value::String(self.inner.run_id.clone()),
        );
        event.insert("ts".to_string(), Value::String(now_utc_iso()));
        event.extend(payload);

        if let Some(parent) = self.inner.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let line = serde_json::to_string(&event)?;
        let _guard = self
            .inner
            .lock
            .lock()
            .map_err(|_| anyhow::anyhow!("event writer lock poisoned"))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.inner.path)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;

        Ok(Value::Object(event))
    }
}

pub(crate) fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::DateTime;
    use serde_json::json;

    use super::*;

    fn logged_types(path: &Path) -> anyhow::Result<Vec<String>> {
        Ok(fs::read_to_string(path)?
            .lines()
            .filter_map(|line| serde_json::from_str::<Value>(line).ok())
            .filter_map(|row| row.get("type").and_then(Value::as_str).map(str::to_string))
            .collect())
    }

    #[test]
    fn emit_writes_one_line_with_default_fields() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("logs").join("events.jsonl");
        let writer = EventWriter::new(&path, "batch-1");

        let mut payload = EventPayload::new();
        payload.insert("task_id".to_string(), json!("t-9"));
        let emitted = writer.emit("task_submitted", payload)?;

        let content = fs::read_to_string(&path)?;
        assert_eq!(content.lines().count(), 1);
        let parsed: Value = serde_json::from_str(content.trim_end())?;
        assert_eq!(parsed, emitted);
        assert_eq!(parsed["type"], json!("task_submitted"));
        assert_eq!(parsed["run_id"], json!("batch-1"));
        assert_eq!(parsed["task_id"], json!("t-9"));
        DateTime::parse_from_rfc3339(parsed["ts"].as_str().unwrap_or(""))?;
        Ok(())
    }

    #[test]
    fn payload_overrides_default_keys() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let writer = EventWriter::new(temp.path().join("events.jsonl"), "batch-1");

        let mut payload = EventPayload::new();
        payload.insert("run_id".to_string(), json!("item-3"));
        let emitted = writer.emit("asset_saved", payload)?;
        assert_eq!(emitted["run_id"], json!("item-3"));
        Ok(())
    }

    #[test]
    fn clones_append_in_emit_order() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let writer = EventWriter::new(&path, "batch-1");
        let shared = writer.clone();

        writer.emit("task_submitted", EventPayload::new())?;
        shared.emit("task_completed", EventPayload::new())?;
        fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .and_then(|mut file| file.write_all(b"not json\n"))?;
        writer.emit("asset_saved", EventPayload::new())?;

        assert_eq!(
            logged_types(&path)?,
            vec!["task_submitted", "task_completed", "asset_saved"]
        );
        Ok(())
    }
}
