use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::ports::{CheckExecutor, RemoteSession};
use patrol_core::{
    config::InspectionSettings,
    error::{CoreError, Result},
    inspection_types::{CheckKind, ServerOutcome, Target},
    shutdown::{sleep_or_cancel, with_cancellation_and_timeout, with_timeout},
};

/// 单机巡检器 - 驱动一个目标完成连接与全部巡检项
pub struct ServerInspector {
    executor: Arc<dyn CheckExecutor>,
    settings: InspectionSettings,
}

impl ServerInspector {
    pub fn new(executor: Arc<dyn CheckExecutor>, settings: InspectionSettings) -> Self {
        Self { executor, settings }
    }

    pub fn settings(&self) -> &InspectionSettings {
        &self.settings
    }

    /// 巡检单个目标，总是返回一个结论
    ///
    /// 连接建立可被取消；巡检项之间才观察取消，已发出的巡检命令要么完成，要么超时。
    pub async fn inspect(
        &self,
        target: &Target,
        checks: &BTreeSet<CheckKind>,
        cancel: &CancellationToken,
    ) -> ServerOutcome {
        let started = Instant::now();
        let elapsed_ms = || started.elapsed().as_millis() as u64;

        let (mut session, attempts) = match self.connect_with_retry(target, cancel).await {
            Ok(connected) => connected,
            Err((err, attempts)) => {
                warn!(host = %target.host, attempts, error = %err, "Connection failed");
                return ServerOutcome::failed(&target.host, err.to_string(), attempts, elapsed_ms());
            }
        };
        debug!(host = %target.host, attempts, "Connected");

        let mut results = BTreeMap::new();
        let mut failed_checks = BTreeMap::new();

        for &check in checks {
            if cancel.is_cancelled() {
                session.close().await;
                info!(host = %target.host, check = %check, "Inspection cancelled between checks");
                return ServerOutcome::failed(
                    &target.host,
                    CoreError::Cancelled.to_string(),
                    attempts,
                    elapsed_ms(),
                );
            }

            match self.run_check(session.as_mut(), check).await {
                Ok(result) => {
                    results.insert(check, result);
                }
                Err(err) if err.is_connection_loss() => {
                    session.close().await;
                    warn!(host = %target.host, check = %check, error = %err, "Connection lost, abandoning remaining checks");
                    return ServerOutcome::failed(&target.host, err.to_string(), attempts, elapsed_ms());
                }
                Err(err) => {
                    warn!(host = %target.host, check = %check, error = %err, "Check failed");
                    failed_checks.insert(check, err.to_string());
                }
            }
        }

        session.close().await;
        info!(
            host = %target.host,
            succeeded = results.len(),
            failed = failed_checks.len(),
            "Server inspected"
        );
        ServerOutcome::success(&target.host, results, failed_checks, attempts, elapsed_ms())
    }

    /// 建立连接；失败时返回最后一次错误与尝试次数
    async fn connect_with_retry(
        &self,
        target: &Target,
        cancel: &CancellationToken,
    ) -> std::result::Result<(Box<dyn RemoteSession>, u32), (CoreError, u32)> {
        let policy = &self.settings.retry_policy;
        let operation = format!("connect to {}", target.address());
        let mut attempt = 0;

        loop {
            if cancel.is_cancelled() {
                return Err((CoreError::Cancelled, attempt));
            }
            attempt += 1;

            // 连接建立过程中也响应取消，此时还没有会话需要关闭
            let err = match with_cancellation_and_timeout(
                self.executor.connect(target),
                cancel,
                self.settings.connect_timeout,
                &operation,
            )
            .await
            {
                Ok(Ok(session)) => return Ok((session, attempt)),
                Err(CoreError::Cancelled) => return Err((CoreError::Cancelled, attempt)),
                Ok(Err(err)) | Err(err) => err,
            };

            if !policy.should_retry(attempt, &err) {
                return Err((err, attempt));
            }

            let delay = policy.delay_before(attempt);
            warn!(
                host = %target.host,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Connection attempt failed, retrying"
            );
            if sleep_or_cancel(delay, cancel).await.is_err() {
                return Err((CoreError::Cancelled, attempt));
            }
        }
    }

    /// 执行单个巡检项，结果类型与巡检项不符视为输出异常
    async fn run_check(
        &self,
        session: &mut dyn RemoteSession,
        check: CheckKind,
    ) -> Result<patrol_core::check_types::CheckResult> {
        let operation = format!("check {check}");
        let result = with_timeout(
            session.run_check(check),
            self.settings.command_timeout,
            &operation,
        )
        .await??;

        if result.kind() != check {
            return Err(CoreError::check(
                check,
                format!("executor returned {} output", result.kind()),
            ));
        }
        Ok(result)
    }
}
