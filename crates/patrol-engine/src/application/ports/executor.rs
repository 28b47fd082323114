use async_trait::async_trait;
use patrol_core::{
    check_types::CheckResult,
    error::Result,
    inspection_types::{CheckKind, Target},
};

/// 远程执行器：负责传输、认证与命令输出解析
#[async_trait]
pub trait CheckExecutor: Send + Sync {
    /// 建立到目标的逻辑连接
    ///
    /// 认证失败、不可达等应返回 `CoreError::Connection`，以便重试策略识别。
    async fn connect(&self, target: &Target) -> Result<Box<dyn RemoteSession>>;
}

/// 单个目标上的远程会话，由一个巡检任务独占
#[async_trait]
pub trait RemoteSession: Send {
    /// 在该连接上执行一个巡检项
    ///
    /// 返回 `CoreError::Connection` 表示连接已断开，其余错误视为单项失败。
    async fn run_check(&mut self, check: CheckKind) -> Result<CheckResult>;

    /// 关闭连接
    async fn close(self: Box<Self>);
}
