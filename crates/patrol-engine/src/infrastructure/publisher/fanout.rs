use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use tracing::warn;

use crate::application::ports::EventPublisher;
use patrol_core::{
    error::{CoreError, Result},
    event_types::EventRecord,
};

/// 将同一事件转发给多个发布器
///
/// 单个发布器失败只记录日志；全部失败时返回错误。
#[derive(Clone, Default)]
pub struct FanoutPublisher {
    publishers: Vec<Arc<dyn EventPublisher>>,
}

impl FanoutPublisher {
    pub fn new(publishers: Vec<Arc<dyn EventPublisher>>) -> Self {
        Self { publishers }
    }

    pub fn with(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publishers.push(publisher);
        self
    }

    pub fn len(&self) -> usize {
        self.publishers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.publishers.is_empty()
    }
}

#[async_trait]
impl EventPublisher for FanoutPublisher {
    async fn publish(&self, record: EventRecord) -> Result<()> {
        if self.publishers.is_empty() {
            return Ok(());
        }

        let results = join_all(
            self.publishers
                .iter()
                .map(|publisher| publisher.publish(record.clone())),
        )
        .await;

        let mut failures = 0;
        for (index, result) in results.into_iter().enumerate() {
            if let Err(e) = result {
                failures += 1;
                warn!(
                    publisher = index,
                    sequence = record.sequence,
                    error = %e,
                    "Fan-out publisher failed"
                );
            }
        }

        if failures == self.publishers.len() {
            return Err(CoreError::publish(format!(
                "all {failures} publishers failed"
            )));
        }
        Ok(())
    }
}
