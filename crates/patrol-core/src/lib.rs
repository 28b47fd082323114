pub mod check_types;
pub mod core_types;
pub mod event_types;
pub mod inspection_types;
pub mod target;

pub mod config;
pub mod error;

pub mod constants;
pub mod limiter;
pub mod retry;
pub mod shutdown;
pub mod telemetry;

pub use constants::*;
