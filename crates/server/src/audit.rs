//! Append-only audit trail of changes made through the API, one JSON object per line.

use crate::config::AuditConfig;
use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;
use tokio::io::AsyncWriteExt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Serialize)]
pub struct AuditRecord {
    #[serde(with = "time::serde::rfc3339")]
    pub at: OffsetDateTime,
    pub entity: &'static str,
    pub keys: Value,
    pub action: Action,
    /// State before the change, absent for creations.
    pub existing: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub by: Option<String>,
}

impl AuditRecord {
    pub fn new(entity: &'static str, keys: Value, action: Action, existing: Option<Value>) -> Self {
        Self {
            at: OffsetDateTime::now_utc(),
            entity,
            keys,
            action,
            existing,
            by: None,
        }
    }

    /// Subject of the caller that made the change.
    pub fn by(mut self, subject: impl Into<String>) -> Self {
        self.by = Some(subject.into());
        self
    }
}

/// Serialized state of a row for the `existing` field.
pub fn snapshot<T: Serialize>(value: &T) -> Option<Value> {
    serde_json::to_value(value).ok()
}

/// Queues a record for the audit file. Failures are logged, never returned.
pub fn record(config: &AuditConfig, entry: AuditRecord) {
    if !config.enabled {
        return;
    }
    let path = config.file_path.clone();
    tokio::spawn(async move {
        if let Err(e) = append(&path, &entry).await {
            tracing::error!(
                name = "audit.write_failed",
                target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                error = %e,
                path,
                entity = entry.entity,
                message = "Failed to write audit record"
            );
        }
    });
}

pub async fn append(path: &str, entry: &AuditRecord) -> std::io::Result<()> {
    let mut line = serde_json::to_vec(entry)?;
    line.push(b'\n');
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(&line).await?;
    file.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn appends_one_line_per_record() {
        let path = std::env::temp_dir().join(format!("audit-{}.jsonl", uuid::Uuid::new_v4()));
        let path_str = path.to_string_lossy().to_string();

        append(
            &path_str,
            &AuditRecord::new("role", json!({"id": "r1"}), Action::Create, None),
        )
        .await
        .unwrap();
        append(
            &path_str,
            &AuditRecord::new(
                "role",
                json!({"id": "r1"}),
                Action::Delete,
                Some(json!({"id": "r1", "name": "admin"})),
            ),
        )
        .await
        .unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<Value> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["action"], "create");
        assert!(lines[0]["existing"].is_null());
        assert_eq!(lines[1]["existing"]["name"], "admin");
        let _ = tokio::fs::remove_file(&path).await;
    }
}
