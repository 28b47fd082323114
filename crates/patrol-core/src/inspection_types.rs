use crate::check_types::CheckResult;
use crate::constants::{DEFAULT_CHECKS, DEFAULT_USERNAME};
use crate::core_types::JobId;
use crate::error::{CoreError, Result};
use crate::target::{TargetDefaults, TargetLine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// 巡检项
///
/// 声明顺序即单台服务器上的执行顺序。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckKind {
    System,
    Cpu,
    Memory,
    Disk,
    Network,
    Process,
    Service,
}

impl CheckKind {
    pub const ALL: [CheckKind; 7] = [
        CheckKind::System,
        CheckKind::Cpu,
        CheckKind::Memory,
        CheckKind::Disk,
        CheckKind::Network,
        CheckKind::Process,
        CheckKind::Service,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckKind::System => "system",
            CheckKind::Cpu => "cpu",
            CheckKind::Memory => "memory",
            CheckKind::Disk => "disk",
            CheckKind::Network => "network",
            CheckKind::Process => "process",
            CheckKind::Service => "service",
        }
    }

    /// 解析一组巡检项名称：去重，未知名称直接拒绝
    pub fn parse_set<I, S>(names: I) -> Result<BTreeSet<CheckKind>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = BTreeSet::new();
        for name in names {
            set.insert(name.as_ref().parse::<CheckKind>()?);
        }
        if set.is_empty() {
            return Err(CoreError::validation("at least one check is required"));
        }
        Ok(set)
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim();
        CheckKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| CoreError::validation(format!("unknown check kind: {name:?}")))
    }
}

/// 登录凭据：密码或私钥路径，二者只能取其一
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Credential {
    Password(String),
    KeyFile(PathBuf),
}

impl Credential {
    /// 以 `/` 开头视为私钥路径，否则视为密码
    pub fn from_secret(secret: &str) -> Self {
        if secret.starts_with('/') {
            Credential::KeyFile(PathBuf::from(secret))
        } else {
            Credential::Password(secret.to_string())
        }
    }

    pub fn is_key(&self) -> bool {
        matches!(self, Credential::KeyFile(_))
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Password(_) => f.write_str("Password(***)"),
            Credential::KeyFile(path) => f.debug_tuple("KeyFile").field(path).finish(),
        }
    }
}

/// 巡检目标
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub credential: Credential,
}

impl Target {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        credential: Credential,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            credential,
        }
    }

    /// `host:port` 形式的地址
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// 校验目标是否完整可用
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(CoreError::validation("target host cannot be empty"));
        }
        if self.host.chars().any(char::is_whitespace) {
            return Err(CoreError::validation(format!(
                "target host contains whitespace: {:?}",
                self.host
            )));
        }
        if self.port == 0 {
            return Err(CoreError::validation(format!(
                "target {} has invalid port 0",
                self.host
            )));
        }
        if self.username.trim().is_empty() {
            return Err(CoreError::validation(format!(
                "target {} has an empty username",
                self.host
            )));
        }
        match &self.credential {
            Credential::Password(p) if p.is_empty() => Err(CoreError::validation(format!(
                "target {} has an empty password",
                self.host
            ))),
            Credential::KeyFile(path) if path.as_os_str().is_empty() => Err(
                CoreError::validation(format!("target {} has an empty key path", self.host)),
            ),
            _ => Ok(()),
        }
    }
}

/// 结构化的目标描述（API 提交用）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetSpec {
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub key_path: Option<PathBuf>,
}

impl TargetSpec {
    /// 合并默认值得到最终目标；同时给出密钥和密码时以密钥为准
    pub fn resolve(self, defaults: &TargetDefaults<'_>) -> Result<Target> {
        let credential = match (self.key_path, self.password) {
            (Some(path), _) if !path.as_os_str().is_empty() => Some(Credential::KeyFile(path)),
            (_, Some(password)) if !password.is_empty() => Some(Credential::Password(password)),
            _ => None,
        };
        TargetLine {
            host: self.host,
            port: self.port.unwrap_or(crate::constants::DEFAULT_SSH_PORT),
            username: self.username.filter(|u| !u.is_empty()),
            credential,
        }
        .resolve(defaults)
    }
}

/// 目标输入：`host:port:username:password_or_keypath` 行或结构化描述
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TargetInput {
    Line(String),
    Spec(TargetSpec),
}

impl From<&str> for TargetInput {
    fn from(line: &str) -> Self {
        TargetInput::Line(line.to_string())
    }
}

impl From<String> for TargetInput {
    fn from(line: String) -> Self {
        TargetInput::Line(line)
    }
}

impl From<TargetSpec> for TargetInput {
    fn from(spec: TargetSpec) -> Self {
        TargetInput::Spec(spec)
    }
}

/// 巡检请求
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    pub targets: Vec<TargetInput>,
    #[serde(default = "default_check_names")]
    pub checks: Vec<String>,
    #[serde(default)]
    pub default_password: Option<String>,
    #[serde(default)]
    pub default_username: Option<String>,
}

impl JobRequest {
    pub fn new<T, I>(targets: I, checks: &[CheckKind]) -> Self
    where
        T: Into<TargetInput>,
        I: IntoIterator<Item = T>,
    {
        Self {
            targets: targets.into_iter().map(Into::into).collect(),
            checks: checks.iter().map(|c| c.as_str().to_string()).collect(),
            default_password: None,
            default_username: None,
        }
    }

    pub fn with_default_password(mut self, password: impl Into<String>) -> Self {
        self.default_password = Some(password.into());
        self
    }

    pub fn with_default_username(mut self, username: impl Into<String>) -> Self {
        self.default_username = Some(username.into());
        self
    }
}

fn default_check_names() -> Vec<String> {
    DEFAULT_CHECKS.iter().map(|c| c.as_str().to_string()).collect()
}

/// 任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    #[default]
    Created,
    Running,
    Completed,
    Cancelled,
}

impl JobState {
    /// 检查状态是否为终端状态
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Cancelled)
    }

    /// 检查状态是否为可取消状态
    pub fn is_cancellable(&self) -> bool {
        matches!(self, JobState::Created | JobState::Running)
    }

    /// 合法转换：Created → Running → Completed，未结束时可转为 Cancelled
    pub fn can_transition_to(&self, next: JobState) -> bool {
        match (self, next) {
            (JobState::Created, JobState::Running) => true,
            (JobState::Running, JobState::Completed) => true,
            (state, JobState::Cancelled) => state.is_cancellable(),
            _ => false,
        }
    }
}

/// 巡检任务：目标与巡检项在创建后不可变
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub targets: Vec<Target>,
    pub checks: BTreeSet<CheckKind>,
    #[serde(skip)]
    pub default_password: Option<String>,
    pub created_at: DateTime<Utc>,
    pub state: JobState,
}

impl Job {
    /// 校验请求并创建任务；任何一项不合法都拒绝整个请求
    pub fn from_request(request: JobRequest) -> Result<Self> {
        if request.targets.is_empty() {
            return Err(CoreError::validation("at least one target is required"));
        }
        let checks = CheckKind::parse_set(&request.checks)?;

        let username = request
            .default_username
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or(DEFAULT_USERNAME);
        let defaults = TargetDefaults {
            username,
            password: request.default_password.as_deref().filter(|p| !p.is_empty()),
        };

        let targets = request
            .targets
            .into_iter()
            .map(|input| match input {
                TargetInput::Line(line) => TargetLine::parse(&line).resolve(&defaults),
                TargetInput::Spec(spec) => spec.resolve(&defaults),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            id: JobId::generate(),
            targets,
            checks,
            default_password: request.default_password,
            created_at: Utc::now(),
            state: JobState::Created,
        })
    }

    /// 转换状态
    pub fn transition_to(&mut self, new_state: JobState) -> Result<()> {
        if !self.state.can_transition_to(new_state) {
            return Err(CoreError::internal(format!(
                "Invalid job state transition from {:?} to {:?}",
                self.state, new_state
            )));
        }
        self.state = new_state;
        Ok(())
    }
}

/// 单台服务器的巡检结论
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Failed,
}

/// 单台服务器的终态结果，每个目标恰好一个
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerOutcome {
    pub host: String,
    pub status: OutcomeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<BTreeMap<CheckKind, CheckResult>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub failed_checks: BTreeMap<CheckKind, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub attempts: u32,
    pub duration_ms: u64,
}

impl ServerOutcome {
    pub fn success(
        host: impl Into<String>,
        results: BTreeMap<CheckKind, CheckResult>,
        failed_checks: BTreeMap<CheckKind, String>,
        attempts: u32,
        duration_ms: u64,
    ) -> Self {
        Self {
            host: host.into(),
            status: OutcomeStatus::Success,
            results: Some(results),
            failed_checks,
            error: None,
            attempts,
            duration_ms,
        }
    }

    pub fn failed(
        host: impl Into<String>,
        error: impl Into<String>,
        attempts: u32,
        duration_ms: u64,
    ) -> Self {
        Self {
            host: host.into(),
            status: OutcomeStatus::Failed,
            results: None,
            failed_checks: BTreeMap::new(),
            error: Some(error.into()),
            attempts,
            duration_ms,
        }
    }

    /// 未开始即被取消的目标
    pub fn cancelled(host: impl Into<String>) -> Self {
        Self::failed(host, CoreError::Cancelled.to_string(), 0, 0)
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == OutcomeStatus::Failed
            && self.error.as_deref() == Some(CoreError::Cancelled.to_string().as_str())
    }
}

/// 任务汇总
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectionSummary {
    pub success_count: usize,
    pub failure_count: usize,
}

impl InspectionSummary {
    pub fn from_outcomes<'a>(outcomes: impl IntoIterator<Item = &'a ServerOutcome>) -> Self {
        outcomes
            .into_iter()
            .fold(Self::default(), |mut summary, outcome| {
                if outcome.is_success() {
                    summary.success_count += 1;
                } else {
                    summary.failure_count += 1;
                }
                summary
            })
    }

    pub fn total(&self) -> usize {
        self.success_count + self.failure_count
    }
}

/// 任务结束后的汇总报告
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReport {
    pub job_id: JobId,
    pub state: JobState,
    pub outcomes: Vec<ServerOutcome>,
    pub summary: InspectionSummary,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl JobReport {
    pub fn is_cancelled(&self) -> bool {
        self.state == JobState::Cancelled
    }

    /// 失败的主机及原因
    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.outcomes.iter().filter(|o| !o.is_success()).map(|o| {
            (
                o.host.as_str(),
                o.error.as_deref().unwrap_or_default(),
            )
        })
    }
}
