use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use crate::diff::diff_json;

const REDACTED: &str = "***";
const SECRET_FIELDS: &[&str] = &["password", "token"];

pub enum MessageLogMode {
    Full,
    Diffed,
}

/// NDJSON log of everything exchanged with the device.
pub(crate) struct MessageLogger {
    mode: MessageLogMode,
    file: File,
    cycle: Option<Uuid>,
    previous: HashMap<String, Value>,
}

fn redact(body: &Value) -> Value {
    match body {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| {
                    if SECRET_FIELDS.contains(&k.as_str()) {
                        (k.clone(), json!(REDACTED))
                    } else {
                        (k.clone(), redact(v))
                    }
                })
                .collect(),
        ),
        other => other.clone(),
    }
}

impl MessageLogger {
    pub fn new(mode: MessageLogMode, path: &str) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self {
            mode,
            file,
            cycle: None,
            previous: HashMap::new(),
        })
    }

    /// Start a poll or control; following entries carry the returned id.
    pub fn begin_cycle(&mut self, kind: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.cycle = Some(id);
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "cycle",
            "kind": kind,
            "cycle": id.to_string(),
        });
        self.write_line(&entry);
        id
    }

    pub fn log_request(&mut self, endpoint: &str, body: &Value) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "req",
            "cycle": self.cycle.map(|id| id.to_string()),
            "endpoint": endpoint,
            "body": redact(body),
        });
        self.write_line(&entry);
    }

    pub fn log_response(&mut self, label: &str, status: u16, body: &Value) {
        let body = redact(body);
        let cycle = self.cycle.map(|id| id.to_string());

        let entry = match self.mode {
            MessageLogMode::Full => json!({
                "ts": Utc::now().to_rfc3339(),
                "dir": "resp",
                "cycle": cycle,
                "label": label,
                "status": status,
                "body": body,
            }),
            MessageLogMode::Diffed => match self.previous.get(label) {
                None => json!({
                    "ts": Utc::now().to_rfc3339(),
                    "dir": "resp",
                    "cycle": cycle,
                    "label": label,
                    "status": status,
                    "full": true,
                    "body": body,
                }),
                Some(prev) => {
                    let mut changes = Vec::new();
                    diff_json(prev, &body, "", &mut changes);
                    let change_entries: Vec<Value> = changes
                        .iter()
                        .map(|(path, old, new)| json!({ "path": path, "old": old, "new": new }))
                        .collect();
                    json!({
                        "ts": Utc::now().to_rfc3339(),
                        "dir": "resp",
                        "cycle": cycle,
                        "label": label,
                        "status": status,
                        "changes": change_entries,
                    })
                }
            },
        };
        self.write_line(&entry);

        if matches!(self.mode, MessageLogMode::Diffed) {
            self.previous.insert(label.to_string(), body);
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

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn read_lines(path: &str) -> Vec<Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn request_secrets_are_redacted() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap();
        let mut logger = MessageLogger::new(MessageLogMode::Full, path).unwrap();
        logger.log_request(
            "services/auth/",
            &json!({"username": "admin", "password": "hunter2"}),
        );
        logger.log_response("auth", 200, &json!({"success": true, "token": "abc"}));

        let lines = read_lines(path);
        assert_eq!(lines[0]["dir"], "req");
        assert_eq!(lines[0]["body"]["username"], "admin");
        assert_eq!(lines[0]["body"]["password"], REDACTED);
        assert_eq!(lines[1]["body"]["token"], REDACTED);
        assert!(lines[0]["ts"].as_str().is_some());
    }

    #[test]
    fn cycle_id_stamped_on_following_entries() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap();
        let mut logger = MessageLogger::new(MessageLogMode::Full, path).unwrap();
        let id = logger.begin_cycle("poll");
        logger.log_request("services/retrieve/", &json!({"token": "abc"}));

        let lines = read_lines(path);
        assert_eq!(lines[0]["dir"], "cycle");
        assert_eq!(lines[0]["kind"], "poll");
        assert_eq!(lines[1]["cycle"], id.to_string());
    }

    #[test]
    fn diffed_mode_logs_full_first_then_changes() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap();
        let mut logger = MessageLogger::new(MessageLogMode::Diffed, path).unwrap();

        logger.log_response("states", 200, &json!({"outlets": {"1": "On"}}));
        logger.log_response("states", 200, &json!({"outlets": {"1": "Off"}}));
        logger.log_response("names", 200, &json!({"names": {}}));

        let lines = read_lines(path);
        assert_eq!(lines[0]["full"], true);
        assert!(lines[0]["body"].is_object());
        let changes = lines[1]["changes"].as_array().unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0]["path"], "outlets.1");
        assert_eq!(lines[2]["full"], true);
    }

    #[test]
    fn diffed_mode_no_changes_logs_empty_array() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap();
        let mut logger = MessageLogger::new(MessageLogMode::Diffed, path).unwrap();

        let body = json!({"outlets": {"1": "On"}});
        logger.log_response("states", 200, &body);
        logger.log_response("states", 200, &body);

        let lines = read_lines(path);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["changes"].as_array().unwrap().len(), 0);
    }
}
