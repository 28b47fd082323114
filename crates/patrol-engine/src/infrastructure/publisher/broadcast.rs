use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::trace;

use crate::application::ports::EventPublisher;
use patrol_core::{constants::EVENT_CHANNEL_CAPACITY, error::Result, event_types::EventRecord};

/// 广播发布器 - 任意数量的观察者各自订阅全部事件
///
/// 没有订阅者时事件被丢弃；订阅者落后超过容量时会收到 `Lagged`。
#[derive(Debug, Clone)]
pub struct BroadcastPublisher {
    sender: broadcast::Sender<EventRecord>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventRecord> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastPublisher {
    fn default() -> Self {
        Self::new(EVENT_CHANNEL_CAPACITY)
    }
}

#[async_trait]
impl EventPublisher for BroadcastPublisher {
    async fn publish(&self, record: EventRecord) -> Result<()> {
        if self.sender.send(record).is_err() {
            trace!("No event subscribers, event dropped");
        }
        Ok(())
    }
}
