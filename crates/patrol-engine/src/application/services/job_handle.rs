use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use patrol_core::{
    core_types::JobId,
    error::{CoreError, Result},
    inspection_types::{JobReport, JobState},
};

/// 任务的取消令牌与生命周期状态，注册表、句柄和运行中的任务共用一份
#[derive(Debug)]
pub(crate) struct JobControl {
    cancel: CancellationToken,
    state: watch::Sender<JobState>,
}

impl JobControl {
    pub(crate) fn new(cancel: CancellationToken, initial: JobState) -> Self {
        let (state, _) = watch::channel(initial);
        Self { cancel, state }
    }

    pub(crate) fn state(&self) -> JobState {
        *self.state.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<JobState> {
        self.state.subscribe()
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// 已请求取消（显式取消或上层停机）
    pub(crate) fn is_cancel_requested(&self) -> bool {
        self.cancel.is_cancelled() || self.state() == JobState::Cancelled
    }

    /// 按状态机推进；非法转换不生效，返回是否生效
    pub(crate) fn advance(&self, next: JobState) -> bool {
        self.state.send_if_modified(|current| {
            if current.can_transition_to(next) {
                *current = next;
                true
            } else {
                false
            }
        })
    }

    /// 先标记 `Cancelled` 再触发令牌，观察到令牌的一方总能读到取消状态
    pub(crate) fn cancel(&self) -> bool {
        let marked = self.advance(JobState::Cancelled);
        self.cancel.cancel();
        marked
    }
}

/// 已提交任务的句柄
#[derive(Debug)]
pub struct JobHandle {
    job_id: JobId,
    control: Arc<JobControl>,
    task: JoinHandle<JobReport>,
}

impl JobHandle {
    pub(crate) fn new(job_id: JobId, control: Arc<JobControl>, task: JoinHandle<JobReport>) -> Self {
        Self {
            job_id,
            control,
            task,
        }
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// 当前生命周期状态
    pub fn state(&self) -> JobState {
        self.control.state()
    }

    /// 订阅状态变化
    pub fn watch_state(&self) -> watch::Receiver<JobState> {
        self.control.subscribe()
    }

    /// 请求取消并立即标记为 `Cancelled`；对已结束的任务无效果
    pub fn cancel(&self) {
        self.control.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// 等待任务结束并取得报告
    pub async fn wait(self) -> Result<JobReport> {
        self.task.await.map_err(|e| {
            CoreError::internal(format!("inspection job {} aborted: {}", self.job_id, e))
        })
    }
}
