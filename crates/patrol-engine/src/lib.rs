//! Patrol Engine - 批量服务器巡检编排引擎
//!
//! 接收巡检任务，在并发上限内将目标分派给单机巡检器，
//! 汇总每台服务器的结论，并按序发布任务与服务器生命周期事件。

pub mod application;
pub mod infrastructure;

pub use application::ports::{CheckExecutor, EventPublisher, RemoteSession};
pub use application::services::{InspectionOrchestrator, JobHandle, ServerInspector};
pub use patrol_core::*;
