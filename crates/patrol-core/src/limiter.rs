//! 并发限制器
//!
//! 基于 tokio 的公平信号量，等待者按到达顺序获得许可。

use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{CoreError, Result};

/// 同时巡检的目标数上限
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    bound: usize,
}

/// 一个并发槽位；释放或 drop 时归还
#[derive(Debug)]
pub struct Permit {
    _inner: OwnedSemaphorePermit,
}

impl Permit {
    /// 显式归还槽位
    pub fn release(self) {
        drop(self);
    }
}

impl ConcurrencyLimiter {
    pub fn new(bound: usize) -> Result<Self> {
        let bound = Self::checked_bound(bound)?;
        Ok(Self::with_bound(bound))
    }

    /// 上限已校验过时使用，不会失败
    pub fn with_bound(bound: NonZeroUsize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(bound.get())),
            bound: bound.get(),
        }
    }

    /// 校验并发上限；0 为配置错误
    pub fn checked_bound(bound: usize) -> Result<NonZeroUsize> {
        NonZeroUsize::new(bound)
            .ok_or_else(|| CoreError::config_error("max concurrency must be greater than 0"))
    }

    pub fn bound(&self) -> usize {
        self.bound
    }

    /// 当前空闲槽位数
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// 当前已发出的许可数
    pub fn in_flight(&self) -> usize {
        self.bound.saturating_sub(self.available())
    }

    /// 等待一个槽位；取消令牌触发时立即返回 `Cancelled`
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<Permit> {
        if cancel.is_cancelled() {
            return Err(CoreError::Cancelled);
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("permit acquisition cancelled");
                Err(CoreError::Cancelled)
            }
            permit = self.semaphore.clone().acquire_owned() => {
                let inner = permit.map_err(|_| CoreError::internal("concurrency limiter closed"))?;
                Ok(Permit { _inner: inner })
            }
        }
    }

    #[cfg(test)]
    fn try_acquire(&self) -> Option<Permit> {
        self.semaphore
            .clone()
            .try_acquire_owned()
            .ok()
            .map(|inner| Permit { _inner: inner })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_zero_bound_rejected() {
        assert!(matches!(
            ConcurrencyLimiter::new(0),
            Err(CoreError::Config { .. })
        ));
    }

    #[test]
    fn test_checked_bound_feeds_infallible_constructor() {
        let bound = ConcurrencyLimiter::checked_bound(3).unwrap();
        let limiter = ConcurrencyLimiter::with_bound(bound);
        assert_eq!(limiter.bound(), 3);
        assert_eq!(limiter.available(), 3);
        assert!(ConcurrencyLimiter::checked_bound(0).is_err());
    }

    #[tokio::test]
    async fn test_counts_follow_permits() {
        let limiter = ConcurrencyLimiter::new(2).unwrap();
        let token = CancellationToken::new();

        let a = limiter.acquire(&token).await.unwrap();
        assert_eq!(limiter.in_flight(), 1);
        let b = limiter.acquire(&token).await.unwrap();
        assert_eq!(limiter.available(), 0);
        assert!(limiter.try_acquire().is_none());

        a.release();
        assert_eq!(limiter.in_flight(), 1);
        drop(b);
        assert_eq!(limiter.available(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_waits_for_release() {
        let limiter = ConcurrencyLimiter::new(1).unwrap();
        let token = CancellationToken::new();
        let held = limiter.acquire(&token).await.unwrap();

        let waiter = {
            let limiter = limiter.clone();
            let token = token.clone();
            tokio::spawn(async move { limiter.acquire(&token).await.map(|_| ()) })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        held.release();
        assert!(waiter.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_acquire_is_cancellable() {
        let limiter = ConcurrencyLimiter::new(1).unwrap();
        let token = CancellationToken::new();
        let _held = limiter.acquire(&token).await.unwrap();

        let waiter = {
            let limiter = limiter.clone();
            let token = token.clone();
            tokio::spawn(async move { limiter.acquire(&token).await.map(|_| ()) })
        };

        token.cancel();
        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(CoreError::Cancelled)));
    }

    #[tokio::test]
    async fn test_cancelled_token_fails_fast() {
        let limiter = ConcurrencyLimiter::new(3).unwrap();
        let token = CancellationToken::new();
        token.cancel();
        assert!(limiter.acquire(&token).await.is_err());
        assert_eq!(limiter.available(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiters_admitted_in_arrival_order() {
        let limiter = ConcurrencyLimiter::new(1).unwrap();
        let token = CancellationToken::new();
        let held = limiter.acquire(&token).await.unwrap();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        for i in 0..3 {
            let limiter = limiter.clone();
            let token = token.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let permit = limiter.acquire(&token).await.unwrap();
                tx.send(i).unwrap();
                tokio::time::sleep(Duration::from_millis(1)).await;
                permit.release();
            });
            // 保证按顺序排队
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        drop(tx);

        held.release();
        let mut order = Vec::new();
        while let Some(i) = rx.recv().await {
            order.push(i);
        }
        assert_eq!(order, vec![0, 1, 2]);
    }
}
