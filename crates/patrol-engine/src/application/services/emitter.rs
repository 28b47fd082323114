use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::application::ports::EventPublisher;
use patrol_core::{
    core_types::JobId,
    event_types::{EventRecord, InspectionEvent},
};

/// 单个任务的事件发射器
///
/// 持锁分配序号并等待发布完成，保证同一任务的事件按序到达发布器。
pub struct EventEmitter {
    job_id: JobId,
    publisher: Arc<dyn EventPublisher>,
    sequence: Mutex<u64>,
}

impl EventEmitter {
    pub fn new(job_id: JobId, publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            job_id,
            publisher,
            sequence: Mutex::new(0),
        }
    }

    /// 发布事件；发布失败只记录日志，不影响任务
    pub async fn emit(&self, event: InspectionEvent) {
        let mut sequence = self.sequence.lock().await;
        *sequence += 1;

        let event_type = event.event_type();
        let record = EventRecord::new(self.job_id.clone(), *sequence, event);
        debug!(job_id = %self.job_id, sequence = *sequence, event_type, "Publishing event");

        if let Err(e) = self.publisher.publish(record).await {
            warn!(
                job_id = %self.job_id,
                sequence = *sequence,
                event_type,
                error = %e,
                "Failed to publish event"
            );
        }
    }

    #[cfg(test)]
    async fn emitted(&self) -> u64 {
        *self.sequence.lock().await
    }
}
