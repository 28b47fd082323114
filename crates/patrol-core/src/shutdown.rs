use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::{CoreError, Result};

/// 优雅停机管理器
#[derive(Debug, Clone)]
pub struct GracefulShutdown {
    /// 取消令牌，触发后所有巡检任务停止派发
    pub token: CancellationToken,
}

impl GracefulShutdown {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// 派生子令牌；父令牌取消时子令牌随之取消
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }

    pub fn shutdown(&self) {
        self.token.cancel();
    }
}

impl Default for GracefulShutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// 可取消地等待一个 future
pub async fn with_cancellation<T>(
    future: impl Future<Output = T>,
    cancel_token: &CancellationToken,
) -> Result<T> {
    tokio::select! {
        result = future => Ok(result),
        _ = cancel_token.cancelled() => Err(CoreError::Cancelled),
    }
}

/// 带超时的等待；`operation` 用于超时错误信息
pub async fn with_timeout<T>(
    future: impl Future<Output = T>,
    timeout: Duration,
    operation: &str,
) -> Result<T> {
    tokio::time::timeout(timeout, future)
        .await
        .map_err(|_| CoreError::timeout(operation, timeout))
}

/// 带超时和取消的等待
pub async fn with_cancellation_and_timeout<T>(
    future: impl Future<Output = T>,
    cancel_token: &CancellationToken,
    timeout: Duration,
    operation: &str,
) -> Result<T> {
    tokio::select! {
        result = future => Ok(result),
        _ = cancel_token.cancelled() => Err(CoreError::Cancelled),
        _ = tokio::time::sleep(timeout) => Err(CoreError::timeout(operation, timeout)),
    }
}

/// 可取消的休眠；被取消时返回 `Cancelled`
pub async fn sleep_or_cancel(duration: Duration, cancel_token: &CancellationToken) -> Result<()> {
    with_cancellation(tokio::time::sleep(duration), cancel_token).await
}
