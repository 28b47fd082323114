use async_trait::async_trait;
use tracing::info;

use crate::application::ports::EventPublisher;
use patrol_core::{
    error::{CoreError, Result},
    event_types::{EventRecord, InspectionEvent},
};

/// 将事件写入日志，事件体为 JSON
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingPublisher;

fn render(event: &InspectionEvent) -> Result<String> {
    serde_json::to_string(event).map_err(|e| CoreError::publish(e.to_string()))
}

#[async_trait]
impl EventPublisher for TracingPublisher {
    async fn publish(&self, record: EventRecord) -> Result<()> {
        let payload = render(&record.event)?;
        info!(
            job_id = %record.job_id,
            sequence = record.sequence,
            event_type = record.event.event_type(),
            host = record.event.host().unwrap_or("-"),
            event = %payload,
            "Inspection event"
        );
        Ok(())
    }
}
