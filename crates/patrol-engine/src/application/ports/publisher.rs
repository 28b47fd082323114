use async_trait::async_trait;
use patrol_core::{error::Result, event_types::EventRecord};

/// 事件发布接口
///
/// 同一任务的事件按序号依次调用 `publish`，前一次返回之后才会发布下一条。
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, record: EventRecord) -> Result<()>;
}
