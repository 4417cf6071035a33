//! In-process sink that keeps every accepted batch.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use super::{HarvestBatch, ReportSink, SinkError};

#[derive(Debug, Default)]
pub struct MemorySink {
    batches: Mutex<Vec<HarvestBatch>>,
    reject: AtomicBool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every push fails with `SinkError::Rejected`.
    pub fn set_rejecting(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    pub fn batches(&self) -> Vec<HarvestBatch> {
        self.batches.lock().clone()
    }

    pub fn last(&self) -> Option<HarvestBatch> {
        self.batches.lock().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.batches.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.lock().is_empty()
    }
}

#[async_trait::async_trait]
impl ReportSink for MemorySink {
    async fn push(&self, batch: &HarvestBatch) -> Result<(), SinkError> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(SinkError::Rejected("memory sink is rejecting".to_string()));
        }
        self.batches.lock().push(batch.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch() -> HarvestBatch {
        HarvestBatch {
            component: "svc".to_string(),
            guid: "com.example.svc".to_string(),
            agent_version: "0.3.0".to_string(),
            instance_id: uuid::Uuid::new_v4(),
            host: "localhost".to_string(),
            timestamp: chrono::Utc::now(),
            duration_secs: 60,
            metrics: Vec::new(),
        }
    }

    #[test]
    fn test_keeps_accepted_batches() {
        let sink = MemorySink::new();
        tokio_test::block_on(sink.push(&batch())).unwrap();
        tokio_test::block_on(sink.push(&batch())).unwrap();
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.last().unwrap().component, "svc");
    }

    #[test]
    fn test_rejecting_drops_batch() {
        let sink = MemorySink::new();
        sink.set_rejecting(true);
        let err = tokio_test::block_on(sink.push(&batch())).unwrap_err();
        assert_eq!(err.kind(), "rejected");
        assert!(sink.is_empty());
    }
}
