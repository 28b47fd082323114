//! Ports 模块 - 引擎与外部协作方之间的接口

pub mod executor;
pub mod publisher;

pub use executor::{CheckExecutor, RemoteSession};
pub use publisher::EventPublisher;
