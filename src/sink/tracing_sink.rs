use tracing::info;

use super::{HarvestBatch, ReportSink, SinkError};

/// Logs every value as an `info` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

#[async_trait::async_trait]
impl ReportSink for TracingSink {
    async fn push(&self, batch: &HarvestBatch) -> Result<(), SinkError> {
        for metric in &batch.metrics {
            info!(
                component = %batch.component,
                metric = %metric.name,
                units = %metric.units,
                value = metric.value,
                "metric"
            );
        }
        Ok(())
    }
}
