use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::records::ContentRecord;
use crate::events::now_utc_iso;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub run_id: String,
    pub started_at: String,
    pub finished_at: String,
    pub requested: u64,
    pub records: Vec<ContentRecord>,
}

impl BatchSummary {
    pub fn succeeded(&self) -> u64 {
        self.records.iter().filter(|record| record.success).count() as u64
    }

    pub fn failed(&self) -> u64 {
        self.records.len() as u64 - self.succeeded()
    }
}

/// Writes `summary` as pretty JSON with derived counts and a `ts` stamp.
/// Keys in `extra` are merged last.
pub fn write_summary(
    path: &Path,
    summary: &BatchSummary,
    extra: Option<&Map<String, Value>>,
) -> anyhow::Result<()> {
    let mut payload = match serde_json::to_value(summary)? {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    payload.insert(
        "succeeded".to_string(),
        Value::Number(summary.succeeded().into()),
    );
    payload.insert("failed".to_string(), Value::Number(summary.failed().into()));
    payload.insert("ts".to_string(), Value::String(now_utc_iso()));
    if let Some(extra) = extra {
        for (key, value) in extra {
            payload.insert(key.clone(), value.clone());
        }
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(&Value::Object(payload))?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use serde_json::{json, Map, Value};

    use super::{write_summary, BatchSummary};
    use crate::runs::records::ContentRecord;

    #[test]
    fn write_summary_reports_counts_and_records() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("runs").join("summary.json");

        let summary = BatchSummary {
            run_id: "batch-42".to_string(),
            started_at: "2026-10-19T08:00:00+00:00".to_string(),
            finished_at: "2026-10-19T08:04:00+00:00".to_string(),
            requested: 3,
            records: vec![
                ContentRecord::succeeded(
                    "Ancient Rome",
                    "the colosseum",
                    PathBuf::from("a.jpg"),
                    "caption",
                ),
                ContentRecord::failed("Failed to generate image: timed out"),
                ContentRecord::succeeded("Ancient Rome", "the forum", PathBuf::from("b.jpg"), "c"),
            ],
        };
        let mut extra = Map::new();
        extra.insert("theme".to_string(), json!("Ancient Rome"));
        write_summary(&path, &summary, Some(&extra))?;

        let parsed: Value = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        assert_eq!(parsed["run_id"], json!("batch-42"));
        assert_eq!(parsed["requested"], json!(3));
        assert_eq!(parsed["succeeded"], json!(2));
        assert_eq!(parsed["failed"], json!(1));
        assert_eq!(parsed["records"][1]["success"], json!(false));
        assert_eq!(parsed["theme"], json!("Ancient Rome"));
        assert!(parsed.get("ts").and_then(Value::as_str).is_some());
        Ok(())
    }
}
