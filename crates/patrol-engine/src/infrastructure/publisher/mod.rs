//! 进程内事件发布器实现

pub mod broadcast;
pub mod channel;
pub mod fanout;
pub mod tracing_log;

pub use broadcast::BroadcastPublisher;
pub use channel::ChannelPublisher;
pub use fanout::FanoutPublisher;
pub use tracing_log::TracingPublisher;
