use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::warn;

use crate::diff::diff_json;

/// What the NDJSON message log records for responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLogMode {
    /// Every response body in full.
    Full,
    /// The first response per path in full, then only leaf changes.
    Diffed,
}

/// Callers pass only masked, validated documents; nothing here inspects them.
pub(crate) struct MessageLogger {
    mode: MessageLogMode,
    file: File,
    previous: HashMap<String, Value>,
}

impl MessageLogger {
    pub fn new(mode: MessageLogMode, path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            mode,
            file,
            previous: HashMap::new(),
        })
    }

    pub fn log_request(&mut self, method: &str, path: &str, body: Option<&Value>) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "req",
            "method": method,
            "path": path,
            "body": body,
        });
        self.write_line(&entry);
    }

    pub fn log_command(&mut self, action: &str, target: Option<&str>, body: &Value) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "cmd",
            "action": action,
            "target": target,
            "body": body,
        });
        self.write_line(&entry);
    }

    pub fn log_response(&mut self, path: &str, body: &Value) {
        let entry = match self.mode {
            MessageLogMode::Full => json!({
                "ts": Utc::now().to_rfc3339(),
                "dir": "resp",
                "path": path,
                "body": body,
            }),
            MessageLogMode::Diffed => match self.previous.get(path) {
                None => json!({
                    "ts": Utc::now().to_rfc3339(),
                    "dir": "resp",
                    "path": path,
                    "full": true,
                    "body": body,
                }),
                Some(prev) => {
                    let mut changes = Vec::new();
                    diff_json(prev, body, "", &mut changes);
                    let change_entries: Vec<Value> = changes
                        .iter()
                        .map(|(p, old, new)| json!({ "path": p, "old": old, "new": new }))
                        .collect();
                    json!({
                        "ts": Utc::now().to_rfc3339(),
                        "dir": "resp",
                        "path": path,
                        "changes": change_entries,
                    })
                }
            },
        };
        self.write_line(&entry);
        if self.mode == MessageLogMode::Diffed {
            self.previous.insert(path.to_string(), body.clone());
        }
    }

    fn write_line(&mut self, entry: &Value) {
        if let Ok(line) = serde_json::to_string(entry)
            && let Err(e) = writeln!(self.file, "{line}")
        {
            warn!("failed to write log entry: {e}");
        }
    }
}
