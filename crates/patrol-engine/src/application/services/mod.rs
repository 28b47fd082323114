//! Services 模块 - 单机巡检与任务编排

pub mod emitter;
pub mod inspector;
pub mod job_handle;
pub mod orchestrator;

pub use emitter::EventEmitter;
pub use inspector::ServerInspector;
pub use job_handle::JobHandle;
pub use orchestrator::InspectionOrchestrator;
