//! 统一错误处理系统

use crate::core_types::JobId;
use crate::inspection_types::CheckKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 核心错误类型 - 统一的错误处理
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CoreError {
    // === 提交校验错误 ===
    #[error("Invalid job: {reason}")]
    Validation { reason: String },

    // === 连接错误（认证失败、网络不可达、连接断开） ===
    #[error("Connection to {host} failed: {message}")]
    Connection { host: String, message: String },

    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    // === 单项巡检错误 ===
    #[error("Check {check} failed: {message}")]
    Check { check: CheckKind, message: String },

    // === 任务取消 ===
    #[error("cancelled")]
    Cancelled,

    #[error("Job not found: {job_id}")]
    JobNotFound { job_id: JobId },

    // === 事件发布错误 ===
    #[error("Event publish failed: {message}")]
    Publish { message: String },

    // === 配置错误 ===
    #[error("Config error: {message}")]
    Config { message: String },

    // === 系统错误 ===
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl CoreError {
    /// 判断错误是否可重试（仅连接建立阶段使用）
    pub fn is_retriable(&self) -> bool {
        matches!(self, CoreError::Connection { .. } | CoreError::Timeout { .. })
    }

    /// 判断错误是否意味着连接已经断开
    pub fn is_connection_loss(&self) -> bool {
        matches!(self, CoreError::Connection { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, CoreError::Cancelled)
    }

    /// 创建校验错误
    pub fn validation(reason: impl Into<String>) -> Self {
        CoreError::Validation {
            reason: reason.into(),
        }
    }

    /// 创建连接错误（带主机上下文）
    pub fn connection(host: impl Into<String>, message: impl Into<String>) -> Self {
        CoreError::Connection {
            host: host.into(),
            message: message.into(),
        }
    }

    /// 创建超时错误
    pub fn timeout(operation: impl Into<String>, timeout: std::time::Duration) -> Self {
        CoreError::Timeout {
            operation: operation.into(),
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    /// 创建单项巡检错误
    pub fn check(check: CheckKind, message: impl Into<String>) -> Self {
        CoreError::Check {
            check,
            message: message.into(),
        }
    }

    /// 创建发布错误
    pub fn publish(message: impl Into<String>) -> Self {
        CoreError::Publish {
            message: message.into(),
        }
    }

    /// 创建配置错误
    pub fn config_error(message: impl Into<String>) -> Self {
        CoreError::Config {
            message: message.into(),
        }
    }

    /// 创建内部错误
    pub fn internal(message: impl Into<String>) -> Self {
        CoreError::Internal {
            message: message.into(),
        }
    }
}

/// Core 操作的 Result 类型别名
pub type Result<T> = std::result::Result<T, CoreError>;

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        let message = err.to_string();
        match err.kind() {
            std::io::ErrorKind::TimedOut
            | std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::BrokenPipe => CoreError::Connection {
                host: "unknown".to_string(),
                message,
            },
            _ => CoreError::Internal { message },
        }
    }
}

impl CoreError {
    /// 从 IO 错误创建连接错误，保留主机上下文
    pub fn from_io_with_host(err: std::io::Error, host: impl Into<String>) -> Self {
        match CoreError::from(err) {
            CoreError::Connection { message, .. } => CoreError::Connection {
                host: host.into(),
                message,
            },
            other => other,
        }
    }
}

impl From<figment::Error> for CoreError {
    fn from(err: figment::Error) -> Self {
        CoreError::Config {
            message: err.to_string(),
        }
    }
}

impl From<anyhow::Error> for CoreError {
    fn from(err: anyhow::Error) -> Self {
        CoreError::Internal {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_connection_and_timeout_are_retriable() {
        assert!(CoreError::connection("10.0.0.1", "refused").is_retriable());
        assert!(CoreError::timeout("connect", Duration::from_secs(30)).is_retriable());
    }

    #[test]
    fn test_other_errors_are_not_retriable() {
        assert!(!CoreError::validation("empty").is_retriable());
        assert!(!CoreError::check(CheckKind::Cpu, "bad output").is_retriable());
        assert!(!CoreError::Cancelled.is_retriable());
    }

    #[test]
    fn test_connection_loss_excludes_timeout() {
        assert!(CoreError::connection("h", "reset").is_connection_loss());
        assert!(!CoreError::timeout("check cpu", Duration::from_secs(60)).is_connection_loss());
    }

    #[test]
    fn test_cancelled_display() {
        assert_eq!(CoreError::Cancelled.to_string(), "cancelled");
    }

    #[test]
    fn test_timeout_display() {
        let err = CoreError::timeout("connect to db-1", Duration::from_millis(1500));
        assert_eq!(err.to_string(), "connect to db-1 timed out after 1500ms");
    }

    #[test]
    fn test_io_error_with_host() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = CoreError::from_io_with_host(io, "web-1");
        match err {
            CoreError::Connection { host, .. } => assert_eq!(host, "web-1"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
