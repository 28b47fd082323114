use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::application::ports::EventPublisher;
use patrol_core::{
    error::{CoreError, Result},
    event_types::EventRecord,
};

/// 单消费者发布器；通道满时发布方等待，形成背压
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    sender: mpsc::Sender<EventRecord>,
}

impl ChannelPublisher {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<EventRecord>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl EventPublisher for ChannelPublisher {
    async fn publish(&self, record: EventRecord) -> Result<()> {
        self.sender
            .send(record)
            .await
            .map_err(|_| CoreError::publish("event receiver dropped"))
    }
}
