//! 巡检任务编排
//!
//! 每个任务由一个编排任务独占：
//!
//! - 派发循环按提交顺序为目标申请并发许可，每放行一个目标发出 `server_start`
//!   并启动一个巡检任务；
//! - 汇总 actor 是结论表的唯一写者，收到结论后发出终态事件再归还许可；
//! - 所有目标都有结论后发出唯一的 `inspection_complete`。

use chrono::Utc;
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::emitter::EventEmitter;
use super::inspector::ServerInspector;
use super::job_handle::{JobControl, JobHandle};
use crate::application::ports::{CheckExecutor, EventPublisher};
use patrol_core::{
    config::InspectionSettings,
    core_types::JobId,
    error::{CoreError, Result},
    event_types::InspectionEvent,
    inspection_types::{
        CheckKind, InspectionSummary, Job, JobReport, JobRequest, JobState, ServerOutcome, Target,
    },
    limiter::{ConcurrencyLimiter, Permit},
    shutdown::GracefulShutdown,
};

/// 注册表中的任务条目
struct JobEntry {
    control: Arc<JobControl>,
}

/// 发给汇总 actor 的消息
enum Completion {
    /// 已放行目标的结论，许可在终态事件发出后归还
    Finished {
        index: usize,
        outcome: ServerOutcome,
        permit: Permit,
    },
    /// 取消时尚未放行的目标
    Skipped { index: usize },
}

/// 巡检编排器
pub struct InspectionOrchestrator {
    inspector: Arc<ServerInspector>,
    publisher: Arc<dyn EventPublisher>,
    registry: Arc<DashMap<JobId, JobEntry>>,
    shutdown: GracefulShutdown,
    bound: NonZeroUsize,
}

impl InspectionOrchestrator {
    /// 并发上限为 0 时返回配置错误
    pub fn new(
        executor: Arc<dyn CheckExecutor>,
        publisher: Arc<dyn EventPublisher>,
        settings: InspectionSettings,
    ) -> Result<Self> {
        Self::with_shutdown(executor, publisher, settings, GracefulShutdown::new())
    }

    /// 使用外部停机管理器；停机时所有运行中的任务被取消
    pub fn with_shutdown(
        executor: Arc<dyn CheckExecutor>,
        publisher: Arc<dyn EventPublisher>,
        settings: InspectionSettings,
        shutdown: GracefulShutdown,
    ) -> Result<Self> {
        let bound = ConcurrencyLimiter::checked_bound(settings.max_concurrency)?;
        Ok(Self {
            inspector: Arc::new(ServerInspector::new(executor, settings)),
            publisher,
            registry: Arc::new(DashMap::new()),
            shutdown,
            bound,
        })
    }

    pub fn settings(&self) -> &InspectionSettings {
        self.inspector.settings()
    }

    /// 校验并启动任务
    ///
    /// 只有校验错误会从这里返回；校验失败时不发出任何事件。
    pub fn submit(&self, mut request: JobRequest) -> Result<JobHandle> {
        if request.default_username.is_none() {
            request.default_username = Some(self.settings().default_username.clone());
        }
        let job = Job::from_request(request)?;
        let limiter = ConcurrencyLimiter::with_bound(self.bound);

        let job_id = job.id.clone();
        let control = Arc::new(JobControl::new(self.shutdown.child_token(), job.state));

        self.registry.insert(
            job_id.clone(),
            JobEntry {
                control: control.clone(),
            },
        );

        info!(
            job_id = %job_id,
            targets = job.targets.len(),
            checks = job.checks.len(),
            "Inspection job submitted"
        );

        let run = JobRun {
            emitter: Arc::new(EventEmitter::new(job_id.clone(), self.publisher.clone())),
            inspector: self.inspector.clone(),
            limiter,
            control: control.clone(),
        };
        let registry = self.registry.clone();
        let task = tokio::spawn(async move {
            let job_id = job.id.clone();
            let report = run.execute(job).await;
            registry.remove(&job_id);
            report
        });

        Ok(JobHandle::new(job_id, control, task))
    }

    /// 取消任务
    pub fn cancel(&self, job_id: &JobId) -> Result<()> {
        let entry = self
            .registry
            .get(job_id)
            .ok_or_else(|| CoreError::JobNotFound {
                job_id: job_id.clone(),
            })?;
        let marked = entry.control.cancel();
        info!(job_id = %job_id, marked, "Cancelling inspection job");
        Ok(())
    }

    /// 查询运行中任务的状态
    pub fn job_state(&self, job_id: &JobId) -> Result<JobState> {
        self.registry
            .get(job_id)
            .map(|entry| entry.control.state())
            .ok_or_else(|| CoreError::JobNotFound {
                job_id: job_id.clone(),
            })
    }

    /// 尚未结束的任务
    pub fn active_jobs(&self) -> Vec<JobId> {
        self.registry.iter().map(|entry| entry.key().clone()).collect()
    }

    /// 取消所有运行中的任务
    pub fn shutdown(&self) {
        info!(active = self.registry.len(), "Shutting down inspection orchestrator");
        for entry in self.registry.iter() {
            entry.control.cancel();
        }
        self.shutdown.shutdown();
    }
}

/// 单个任务运行期间持有的资源
struct JobRun {
    emitter: Arc<EventEmitter>,
    inspector: Arc<ServerInspector>,
    limiter: ConcurrencyLimiter,
    control: Arc<JobControl>,
}

impl JobRun {
    async fn execute(self, mut job: Job) -> JobReport {
        let started_at = Utc::now();
        self.transition(&mut job, JobState::Running);

        let target_count = job.targets.len();
        self.emitter
            .emit(InspectionEvent::InspectionStart {
                job_id: job.id.clone(),
                target_count,
                message: format!("Starting inspection of {target_count} servers"),
            })
            .await;

        let targets: Arc<[Target]> = job.targets.clone().into();
        let checks = Arc::new(job.checks.clone());
        let (tx, rx) = mpsc::channel(target_count.max(1));

        let aggregator = tokio::spawn(aggregate(
            job.id.clone(),
            targets.clone(),
            self.emitter.clone(),
            rx,
        ));

        let admitted = self.dispatch(&targets, &checks, &tx).await;
        for index in admitted..target_count {
            // 容量等于目标数，发送不会阻塞
            let _ = tx.send(Completion::Skipped { index }).await;
        }
        drop(tx);

        let outcomes = match aggregator.await {
            Ok(outcomes) => outcomes,
            Err(e) => {
                error!(job_id = %job.id, error = %e, "Outcome aggregator aborted");
                targets
                    .iter()
                    .map(|t| ServerOutcome::failed(&t.host, "outcome aggregation aborted", 0, 0))
                    .collect()
            }
        };

        let summary = InspectionSummary::from_outcomes(&outcomes);
        let requested = if self.control.is_cancel_requested() {
            JobState::Cancelled
        } else {
            JobState::Completed
        };

        let message = match requested {
            JobState::Cancelled => format!(
                "Inspection cancelled: {} succeeded, {} failed",
                summary.success_count, summary.failure_count
            ),
            _ => format!(
                "Inspection complete: {} succeeded, {} failed",
                summary.success_count, summary.failure_count
            ),
        };
        self.emitter
            .emit(InspectionEvent::InspectionComplete {
                job_id: job.id.clone(),
                message,
                summary,
            })
            .await;
        self.transition(&mut job, requested);
        // 取消可能已提前标记状态，以共享状态为准
        let final_state = self.control.state();

        info!(
            job_id = %job.id,
            state = ?final_state,
            success = summary.success_count,
            failed = summary.failure_count,
            "Inspection job finished"
        );

        JobReport {
            job_id: job.id,
            state: final_state,
            outcomes,
            summary,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// 按顺序放行目标，返回放行数量；取消后停止放行
    async fn dispatch(
        &self,
        targets: &Arc<[Target]>,
        checks: &Arc<BTreeSet<CheckKind>>,
        tx: &mpsc::Sender<Completion>,
    ) -> usize {
        for (index, target) in targets.iter().enumerate() {
            let permit = match self.limiter.acquire(self.control.token()).await {
                Ok(permit) => permit,
                Err(_) => {
                    info!(
                        admitted = index,
                        skipped = targets.len() - index,
                        "Dispatch stopped by cancellation"
                    );
                    return index;
                }
            };

            debug!(
                host = %target.host,
                in_flight = self.limiter.in_flight(),
                bound = self.limiter.bound(),
                "Target admitted"
            );
            self.emitter
                .emit(InspectionEvent::ServerStart {
                    host: target.host.clone(),
                })
                .await;

            let inspector = self.inspector.clone();
            let targets = targets.clone();
            let checks = checks.clone();
            let cancel = self.control.token().clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let outcome = inspector.inspect(&targets[index], &checks, &cancel).await;
                let _ = tx
                    .send(Completion::Finished {
                        index,
                        outcome,
                        permit,
                    })
                    .await;
            });
        }
        targets.len()
    }

    /// 共享状态先推进，成功后同步到任务本身
    fn transition(&self, job: &mut Job, state: JobState) {
        if !self.control.advance(state) {
            debug!(
                job_id = %job.id,
                current = ?self.control.state(),
                requested = ?state,
                "Job state already settled"
            );
            return;
        }
        if let Err(e) = job.transition_to(state) {
            warn!(job_id = %job.id, error = %e, "Job state diverged from shared state");
        }
    }
}

/// 汇总 actor：唯一写结论表，按完成顺序发出终态事件
async fn aggregate(
    job_id: JobId,
    targets: Arc<[Target]>,
    emitter: Arc<EventEmitter>,
    mut rx: mpsc::Receiver<Completion>,
) -> Vec<ServerOutcome> {
    let mut outcomes: Vec<Option<ServerOutcome>> = vec![None; targets.len()];

    while let Some(completion) = rx.recv().await {
        match completion {
            Completion::Finished {
                index,
                outcome,
                permit,
            } => {
                emit_terminal(&emitter, &outcome).await;
                permit.release();
                outcomes[index] = Some(outcome);
            }
            Completion::Skipped { index } => {
                let outcome = ServerOutcome::cancelled(&targets[index].host);
                emit_terminal(&emitter, &outcome).await;
                outcomes[index] = Some(outcome);
            }
        }
    }

    // 巡检任务异常退出时不会送回结论
    let mut finished = Vec::with_capacity(outcomes.len());
    for (index, slot) in outcomes.into_iter().enumerate() {
        let outcome = match slot {
            Some(outcome) => outcome,
            None => {
                let host = &targets[index].host;
                error!(job_id = %job_id, host = %host, "Inspection task ended without an outcome");
                let outcome = ServerOutcome::failed(host, "inspection task aborted", 0, 0);
                emit_terminal(&emitter, &outcome).await;
                outcome
            }
        };
        finished.push(outcome);
    }
    finished
}

async fn emit_terminal(emitter: &EventEmitter, outcome: &ServerOutcome) {
    let event = match (&outcome.results, &outcome.error) {
        (Some(results), _) if outcome.is_success() => InspectionEvent::ServerResult {
            host: outcome.host.clone(),
            result: results.clone(),
        },
        (_, error) => InspectionEvent::ServerError {
            host: outcome.host.clone(),
            message: error.clone().unwrap_or_else(|| "unknown error".to_string()),
        },
    };
    emitter.emit(event).await;
}
