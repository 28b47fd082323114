//! 巡检引擎的统一配置
//!
//! 加载顺序：内置默认值 → TOML 文件 → `PATROL__` 前缀的环境变量（`__` 分隔层级）。

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::constants::{
    CONFIG_ENV_PREFIX, CONFIG_FILE_NAME, DEFAULT_COMMAND_TIMEOUT_SEC, DEFAULT_CONNECT_TIMEOUT_SEC,
    DEFAULT_MAX_CONCURRENCY, DEFAULT_RETRY_COUNT, DEFAULT_RETRY_DELAY_SEC, DEFAULT_USERNAME,
};
use crate::error::{CoreError, Result};
use crate::retry::{ExponentialRetryPolicy, FixedRetryPolicy, RetryPolicy};
use crate::telemetry::LogConfig;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PatrolConfig {
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub inspection: InspectionConfig,
}

impl PatrolConfig {
    /// 从指定路径或当前目录中的 patrol.toml 加载配置，并用环境变量覆盖
    pub fn load_config(path: Option<&Path>) -> Result<Self> {
        use figment::{
            Figment,
            providers::{Env, Format, Serialized, Toml},
        };

        let mut figment = Figment::from(Serialized::defaults(PatrolConfig::default()));

        match path {
            Some(p) => {
                if !p.exists() {
                    return Err(CoreError::config_error(format!(
                        "config file not found: {}",
                        p.display()
                    )));
                }
                figment = figment.merge(Toml::file(p));
            }
            None => {
                let default_path = Path::new(CONFIG_FILE_NAME);
                if default_path.exists() {
                    figment = figment.merge(Toml::file(default_path));
                }
            }
        }

        figment = figment.merge(Env::prefixed(CONFIG_ENV_PREFIX).split("__"));

        let cfg: PatrolConfig = figment.extract()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        self.telemetry.validate()?;
        self.inspection.validate()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default)]
    pub log_no_ansi: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            log_no_ansi: false,
        }
    }
}

impl TelemetryConfig {
    fn validate(&self) -> Result<()> {
        const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
        if !LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(CoreError::config_error(format!(
                "unknown log_level '{}'",
                self.log_level
            )));
        }
        if !matches!(self.log_format.to_lowercase().as_str(), "text" | "json") {
            return Err(CoreError::config_error(format!(
                "unknown log_format '{}', expected text or json",
                self.log_format
            )));
        }
        Ok(())
    }

    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            level: self.log_level.clone(),
            format: self.log_format.clone(),
            no_ansi: self.log_no_ansi,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RetryStrategy {
    #[default]
    Fixed,
    Exponential,
}

/// 巡检行为配置（时间单位为秒）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct InspectionConfig {
    #[serde(default = "default_connect_timeout_sec")]
    pub connect_timeout_sec: u64,
    #[serde(default = "default_command_timeout_sec")]
    pub command_timeout_sec: u64,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_retry_delay_sec")]
    pub retry_delay_sec: u64,
    #[serde(default)]
    pub retry_strategy: RetryStrategy,
    /// 仅 exponential 使用
    #[serde(default = "default_retry_max_delay_sec")]
    pub retry_max_delay_sec: u64,
    /// 仅 exponential 使用
    #[serde(default = "default_retry_multiplier")]
    pub retry_multiplier: f64,
    #[serde(default = "default_username")]
    pub default_username: String,
}

impl Default for InspectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_sec: default_connect_timeout_sec(),
            command_timeout_sec: default_command_timeout_sec(),
            max_concurrency: default_max_concurrency(),
            retry_count: default_retry_count(),
            retry_delay_sec: default_retry_delay_sec(),
            retry_strategy: RetryStrategy::default(),
            retry_max_delay_sec: default_retry_max_delay_sec(),
            retry_multiplier: default_retry_multiplier(),
            default_username: default_username(),
        }
    }
}

impl InspectionConfig {
    fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(CoreError::config_error(
                "max_concurrency must be greater than 0",
            ));
        }
        if self.connect_timeout_sec == 0 || self.command_timeout_sec == 0 {
            return Err(CoreError::config_error(
                "connect_timeout_sec and command_timeout_sec must be greater than 0",
            ));
        }
        if self.default_username.trim().is_empty() {
            return Err(CoreError::config_error("default_username must not be empty"));
        }
        if self.retry_strategy == RetryStrategy::Exponential {
            if !(self.retry_multiplier.is_finite() && self.retry_multiplier >= 1.0) {
                return Err(CoreError::config_error(
                    "retry_multiplier must be a finite number >= 1.0",
                ));
            }
            if self.retry_max_delay_sec < self.retry_delay_sec {
                return Err(CoreError::config_error(
                    "retry_max_delay_sec must not be less than retry_delay_sec",
                ));
            }
        }
        Ok(())
    }

    pub fn settings(&self) -> InspectionSettings {
        InspectionSettings::from(self)
    }
}

/// 运行时使用的巡检参数
#[derive(Debug, Clone)]
pub struct InspectionSettings {
    pub connect_timeout: Duration,
    pub command_timeout: Duration,
    pub max_concurrency: usize,
    pub default_username: String,
    pub retry_policy: Arc<dyn RetryPolicy>,
}

impl InspectionSettings {
    pub fn with_retry_policy(mut self, policy: impl RetryPolicy + 'static) -> Self {
        self.retry_policy = Arc::new(policy);
        self
    }

    pub fn with_max_concurrency(mut self, bound: usize) -> Self {
        self.max_concurrency = bound;
        self
    }

    pub fn with_timeouts(mut self, connect: Duration, command: Duration) -> Self {
        self.connect_timeout = connect;
        self.command_timeout = command;
        self
    }
}

impl Default for InspectionSettings {
    fn default() -> Self {
        InspectionConfig::default().settings()
    }
}

impl From<&InspectionConfig> for InspectionSettings {
    fn from(cfg: &InspectionConfig) -> Self {
        let delay = Duration::from_secs(cfg.retry_delay_sec);
        let retry_policy: Arc<dyn RetryPolicy> = match cfg.retry_strategy {
            RetryStrategy::Fixed => Arc::new(FixedRetryPolicy::new(cfg.retry_count, delay)),
            RetryStrategy::Exponential => Arc::new(ExponentialRetryPolicy::new(
                cfg.retry_count,
                delay,
                cfg.retry_multiplier,
                Duration::from_secs(cfg.retry_max_delay_sec),
            )),
        };
        Self {
            connect_timeout: Duration::from_secs(cfg.connect_timeout_sec),
            command_timeout: Duration::from_secs(cfg.command_timeout_sec),
            max_concurrency: cfg.max_concurrency,
            default_username: cfg.default_username.clone(),
            retry_policy,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "text".to_string()
}
fn default_connect_timeout_sec() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SEC
}
fn default_command_timeout_sec() -> u64 {
    DEFAULT_COMMAND_TIMEOUT_SEC
}
fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}
fn default_retry_count() -> u32 {
    DEFAULT_RETRY_COUNT
}
fn default_retry_delay_sec() -> u64 {
    DEFAULT_RETRY_DELAY_SEC
}
fn default_retry_max_delay_sec() -> u64 {
    60
}
fn default_retry_multiplier() -> f64 {
    2.0
}
fn default_username() -> String {
    DEFAULT_USERNAME.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    mod defaults {
        use super::*;

        #[test]
        fn test_inspection_defaults() {
            let cfg = InspectionConfig::default();
            assert_eq!(cfg.connect_timeout_sec, 30);
            assert_eq!(cfg.command_timeout_sec, 60);
            assert_eq!(cfg.max_concurrency, 5);
            assert_eq!(cfg.retry_count, 3);
            assert_eq!(cfg.retry_delay_sec, 5);
            assert_eq!(cfg.default_username, "root");
            assert!(PatrolConfig::default().validate().is_ok());
        }

        #[test]
        fn test_settings_from_defaults() {
            let settings = InspectionSettings::default();
            assert_eq!(settings.connect_timeout, Duration::from_secs(30));
            assert_eq!(settings.command_timeout, Duration::from_secs(60));
            assert_eq!(settings.retry_policy.max_retries(), 3);
            assert_eq!(settings.retry_policy.delay_before(1), Duration::from_secs(5));
        }
    }

    mod loading {
        use super::*;

        // 环境变量为进程级共享状态，所有加载测试都在 Jail 中串行执行
        fn write_config(body: &str) -> tempfile::NamedTempFile {
            let mut file = tempfile::Builder::new()
                .suffix(".toml")
                .tempfile()
                .unwrap();
            file.write_all(body.as_bytes()).unwrap();
            file
        }

        #[test]
        fn test_load_from_explicit_file() {
            figment::Jail::expect_with(|_jail| {
                let file = write_config(
                    r#"
[telemetry]
log_level = "debug"
log_format = "json"

[inspection]
max_concurrency = 10
retry_strategy = "exponential"
retry_delay_sec = 1
retry_max_delay_sec = 8
"#,
                );
                let cfg = PatrolConfig::load_config(Some(file.path())).unwrap();
                assert_eq!(cfg.telemetry.log_level, "debug");
                assert_eq!(cfg.inspection.max_concurrency, 10);
                assert_eq!(cfg.inspection.connect_timeout_sec, 30);

                let settings = cfg.inspection.settings();
                assert_eq!(settings.retry_policy.delay_before(3), Duration::from_secs(4));
                assert_eq!(settings.retry_policy.delay_before(5), Duration::from_secs(8));
                Ok(())
            });
        }

        #[test]
        fn test_unknown_field_rejected() {
            figment::Jail::expect_with(|_jail| {
                let file = write_config("[inspection]\nmax_parallel = 3\n");
                assert!(PatrolConfig::load_config(Some(file.path())).is_err());
                Ok(())
            });
        }

        #[test]
        fn test_zero_concurrency_rejected() {
            figment::Jail::expect_with(|_jail| {
                let file = write_config("[inspection]\nmax_concurrency = 0\n");
                let err = PatrolConfig::load_config(Some(file.path())).unwrap_err();
                assert!(matches!(err, CoreError::Config { .. }));
                Ok(())
            });
        }

        #[test]
        fn test_missing_explicit_file_rejected() {
            figment::Jail::expect_with(|jail| {
                let missing = jail.directory().join("nope.toml");
                assert!(PatrolConfig::load_config(Some(&missing)).is_err());
                Ok(())
            });
        }

        #[test]
        fn test_env_overrides_file() {
            figment::Jail::expect_with(|jail| {
                jail.create_file(
                    "patrol.toml",
                    "[inspection]\nretry_count = 1\nmax_concurrency = 2\n",
                )?;
                jail.set_env("PATROL__INSPECTION__MAX_CONCURRENCY", "7");

                let cfg = PatrolConfig::load_config(None).map_err(|e| e.to_string())?;
                assert_eq!(cfg.inspection.retry_count, 1);
                assert_eq!(cfg.inspection.max_concurrency, 7);
                Ok(())
            });
        }
    }

    mod validation {
        use super::*;

        #[test]
        fn test_bad_log_format() {
            let mut cfg = PatrolConfig::default();
            cfg.telemetry.log_format = "xml".into();
            assert!(cfg.validate().is_err());
        }

        #[test]
        fn test_bad_multiplier() {
            let mut cfg = PatrolConfig::default();
            cfg.inspection.retry_strategy = RetryStrategy::Exponential;
            cfg.inspection.retry_multiplier = 0.5;
            assert!(cfg.validate().is_err());
        }

        #[test]
        fn test_log_config_from_telemetry() {
            let cfg = TelemetryConfig {
                log_level: "warn".into(),
                log_format: "json".into(),
                log_no_ansi: true,
            };
            let log = cfg.log_config();
            assert_eq!(log.level, "warn");
            assert!(log.no_ansi);
            crate::telemetry::init_tracing_with(&log);
        }

        #[test]
        fn test_zero_timeout() {
            let mut cfg = PatrolConfig::default();
            cfg.inspection.command_timeout_sec = 0;
            assert!(cfg.validate().is_err());
        }
    }
}
