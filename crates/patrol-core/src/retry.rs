//! 连接重试策略
//!
//! 策略只作用于建立连接阶段，且只对可重试错误（连接失败、连接超时）生效。
//! 策略本身无状态：`attempt` 从 1 开始，表示刚刚失败的是第几次尝试。

use backoff::ExponentialBackoff;
use std::fmt::Debug;
use std::time::Duration;

use crate::error::CoreError;

pub trait RetryPolicy: Debug + Send + Sync {
    /// 第 `attempt` 次尝试以 `error` 失败后是否继续
    fn should_retry(&self, attempt: u32, error: &CoreError) -> bool;

    /// 第 `attempt` 次失败之后、下一次尝试之前的等待时间
    fn delay_before(&self, attempt: u32) -> Duration;

    /// 最多重试次数（不含首次尝试）
    fn max_retries(&self) -> u32;
}

/// 固定间隔重试
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedRetryPolicy {
    pub retries: u32,
    pub delay: Duration,
}

impl FixedRetryPolicy {
    pub fn new(retries: u32, delay: Duration) -> Self {
        Self { retries, delay }
    }

    /// 不重试
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }
}

impl Default for FixedRetryPolicy {
    fn default() -> Self {
        Self::new(
            crate::constants::DEFAULT_RETRY_COUNT,
            Duration::from_secs(crate::constants::DEFAULT_RETRY_DELAY_SEC),
        )
    }
}

impl RetryPolicy for FixedRetryPolicy {
    fn should_retry(&self, attempt: u32, error: &CoreError) -> bool {
        error.is_retriable() && attempt <= self.retries
    }

    fn delay_before(&self, _attempt: u32) -> Duration {
        self.delay
    }

    fn max_retries(&self) -> u32 {
        self.retries
    }
}

/// 指数退避重试
///
/// 只使用 `ExponentialBackoff` 的 `initial_interval`、`multiplier` 与
/// `max_interval`，不做随机抖动，保证同样的输入得到同样的等待时间。
#[derive(Debug, Clone)]
pub struct ExponentialRetryPolicy {
    pub retries: u32,
    pub backoff: ExponentialBackoff,
}

impl ExponentialRetryPolicy {
    pub fn new(retries: u32, initial: Duration, multiplier: f64, max: Duration) -> Self {
        Self {
            retries,
            backoff: ExponentialBackoff {
                initial_interval: initial,
                max_interval: max,
                multiplier,
                randomization_factor: 0.0,
                max_elapsed_time: None,
                ..Default::default()
            },
        }
    }
}

impl RetryPolicy for ExponentialRetryPolicy {
    fn should_retry(&self, attempt: u32, error: &CoreError) -> bool {
        error.is_retriable() && attempt <= self.retries
    }

    fn delay_before(&self, attempt: u32) -> Duration {
        delay_for_attempt(&self.backoff, attempt.saturating_sub(1))
    }

    fn max_retries(&self) -> u32 {
        self.retries
    }
}

/// 第 `n` 次退避（从 0 开始）的等待时间，裁剪到 `max_interval`
pub fn delay_for_attempt(cfg: &ExponentialBackoff, n: u32) -> Duration {
    let base_ms = cfg.initial_interval.as_millis() as f64;
    let exponent = i32::try_from(n).unwrap_or(i32::MAX);
    let raw_ms = base_ms * cfg.multiplier.powi(exponent);
    let capped_ms = raw_ms.min(cfg.max_interval.as_millis() as f64);
    Duration::from_millis(capped_ms.max(0.0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refused() -> CoreError {
        CoreError::connection("10.0.0.1", "connection refused")
    }

    mod fixed {
        use super::*;

        #[test]
        fn test_retries_until_limit() {
            let policy = FixedRetryPolicy::new(3, Duration::from_secs(5));
            assert!(policy.should_retry(1, &refused()));
            assert!(policy.should_retry(3, &refused()));
            assert!(!policy.should_retry(4, &refused()));
        }

        #[test]
        fn test_delay_is_constant() {
            let policy = FixedRetryPolicy::default();
            assert_eq!(policy.delay_before(1), Duration::from_secs(5));
            assert_eq!(policy.delay_before(3), Duration::from_secs(5));
            assert_eq!(policy.max_retries(), 3);
        }

        #[test]
        fn test_timeout_is_retriable() {
            let policy = FixedRetryPolicy::default();
            let err = CoreError::timeout("connect", Duration::from_secs(30));
            assert!(policy.should_retry(1, &err));
        }

        #[test]
        fn test_non_retriable_errors() {
            let policy = FixedRetryPolicy::default();
            assert!(!policy.should_retry(1, &CoreError::Cancelled));
            assert!(!policy.should_retry(1, &CoreError::validation("bad")));
        }

        #[test]
        fn test_none_never_retries() {
            assert!(!FixedRetryPolicy::none().should_retry(1, &refused()));
        }
    }

    mod exponential {
        use super::*;

        #[test]
        fn test_delay_grows_and_caps() {
            let policy = ExponentialRetryPolicy::new(
                5,
                Duration::from_secs(1),
                2.0,
                Duration::from_secs(5),
            );
            assert_eq!(policy.delay_before(1), Duration::from_secs(1));
            assert_eq!(policy.delay_before(2), Duration::from_secs(2));
            assert_eq!(policy.delay_before(3), Duration::from_secs(4));
            assert_eq!(policy.delay_before(4), Duration::from_secs(5));
        }

        #[test]
        fn test_respects_retry_limit() {
            let policy = ExponentialRetryPolicy::new(
                1,
                Duration::from_millis(100),
                2.0,
                Duration::from_secs(1),
            );
            assert!(policy.should_retry(1, &refused()));
            assert!(!policy.should_retry(2, &refused()));
        }
    }
}
