//! Appends each batch to a file as one JSON document per line.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::{HarvestBatch, ReportSink, SinkError};

#[derive(Debug)]
pub struct JsonLinesSink {
    path: PathBuf,
    // Serializes appends so lines never interleave.
    write_lock: Mutex<()>,
}

impl JsonLinesSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl ReportSink for JsonLinesSink {
    async fn push(&self, batch: &HarvestBatch) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(batch)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::MetricValue;

    fn batch(value: f64) -> HarvestBatch {
        HarvestBatch {
            component: "svc".to_string(),
            guid: "com.example.svc".to_string(),
            agent_version: "0.3.0".to_string(),
            instance_id: uuid::Uuid::new_v4(),
            host: "localhost".to_string(),
            timestamp: chrono::Utc::now(),
            duration_secs: 60,
            metrics: vec![MetricValue {
                name: "Custom/Value".to_string(),
                units: "u".to_string(),
                value,
            }],
        }
    }

    #[tokio::test]
    async fn test_appends_one_line_per_batch() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonLinesSink::new(dir.path().join("metrics.jsonl"));

        sink.push(&batch(1.0)).await.unwrap();
        sink.push(&batch(2.0)).await.unwrap();

        let contents = tokio::fs::read_to_string(sink.path()).await.unwrap();
        let batches: Vec<HarvestBatch> = contents
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[1].value("Custom/Value"), Some(2.0));
    }

    #[tokio::test]
    async fn test_missing_directory_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonLinesSink::new(dir.path().join("missing").join("metrics.jsonl"));
        let err = sink.push(&batch(1.0)).await.unwrap_err();
        assert!(matches!(err, SinkError::Io(_)));
    }
}
