#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{watch, Semaphore};

use patrol_engine::{
    check_types::{CheckResult, CpuInfo, MemoryInfo, NetworkInfo, SystemInfo},
    error::{CoreError, Result},
    event_types::{EventRecord, InspectionEvent},
    inspection_types::{CheckKind, Target},
    CheckExecutor, EventPublisher, RemoteSession,
};

/// 某台主机的脚本化行为
#[derive(Debug, Clone, Default)]
pub struct HostPlan {
    /// 前 N 次连接以连接错误失败
    pub connect_failures: u32,
    /// 这些巡检项返回单项错误
    pub broken_checks: Vec<CheckKind>,
    /// 执行到该巡检项时连接断开
    pub drop_on: Option<CheckKind>,
    /// 每个巡检项耗时
    pub check_delay: Duration,
}

#[derive(Default)]
struct Shared {
    open_sessions: AtomicUsize,
    high_water: AtomicUsize,
    closed: AtomicUsize,
    connects: Mutex<HashMap<String, u32>>,
    seen_targets: Mutex<Vec<Target>>,
}

/// 可编排的执行器，记录连接次数与会话并发峰值
pub struct MockExecutor {
    plans: HashMap<String, HostPlan>,
    default_plan: HostPlan,
    gate: Option<Arc<Semaphore>>,
    shared: Arc<Shared>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self {
            plans: HashMap::new(),
            default_plan: HostPlan::default(),
            gate: None,
            shared: Arc::new(Shared::default()),
        }
    }

    pub fn with_plan(mut self, host: &str, plan: HostPlan) -> Self {
        self.plans.insert(host.to_string(), plan);
        self
    }

    pub fn with_default_plan(mut self, plan: HostPlan) -> Self {
        self.default_plan = plan;
        self
    }

    /// 每个巡检项开始前需要从闸门取得许可
    pub fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn high_water(&self) -> usize {
        self.shared.high_water.load(Ordering::SeqCst)
    }

    pub fn open_sessions(&self) -> usize {
        self.shared.open_sessions.load(Ordering::SeqCst)
    }

    pub fn closed_sessions(&self) -> usize {
        self.shared.closed.load(Ordering::SeqCst)
    }

    pub fn connect_attempts(&self, host: &str) -> u32 {
        self.shared
            .connects
            .lock()
            .unwrap()
            .get(host)
            .copied()
            .unwrap_or(0)
    }

    pub fn seen_targets(&self) -> Vec<Target> {
        self.shared.seen_targets.lock().unwrap().clone()
    }
}

#[async_trait]
impl CheckExecutor for MockExecutor {
    async fn connect(&self, target: &Target) -> Result<Box<dyn RemoteSession>> {
        let plan = self
            .plans
            .get(&target.host)
            .cloned()
            .unwrap_or_else(|| self.default_plan.clone());

        let attempt = {
            let mut connects = self.shared.connects.lock().unwrap();
            let n = connects.entry(target.host.clone()).or_default();
            *n += 1;
            *n
        };
        if attempt <= plan.connect_failures {
            return Err(CoreError::connection(&target.host, "connection refused"));
        }

        self.shared.seen_targets.lock().unwrap().push(target.clone());
        let open = self.shared.open_sessions.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.high_water.fetch_max(open, Ordering::SeqCst);

        Ok(Box::new(MockSession {
            host: target.host.clone(),
            plan,
            gate: self.gate.clone(),
            shared: self.shared.clone(),
        }))
    }
}

struct MockSession {
    host: String,
    plan: HostPlan,
    gate: Option<Arc<Semaphore>>,
    shared: Arc<Shared>,
}

#[async_trait]
impl RemoteSession for MockSession {
    async fn run_check(&mut self, check: CheckKind) -> Result<CheckResult> {
        if let Some(gate) = &self.gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|_| CoreError::internal("gate closed"))?;
            permit.forget();
        }
        if !self.plan.check_delay.is_zero() {
            tokio::time::sleep(self.plan.check_delay).await;
        }
        if self.plan.drop_on == Some(check) {
            return Err(CoreError::connection(&self.host, "connection reset by peer"));
        }
        if self.plan.broken_checks.contains(&check) {
            return Err(CoreError::check(check, "unexpected command output"));
        }
        Ok(sample_result(check))
    }

    async fn close(self: Box<Self>) {
        self.shared.open_sessions.fetch_sub(1, Ordering::SeqCst);
        self.shared.closed.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn sample_result(check: CheckKind) -> CheckResult {
    match check {
        CheckKind::System => CheckResult::System(SystemInfo {
            os_name: "Ubuntu".into(),
            os_version: "22.04".into(),
            kernel_version: "5.15.0".into(),
            hostname: "node".into(),
            uptime: "3 days".into(),
            boot_time: "2026-10-15 08:00".into(),
        }),
        CheckKind::Cpu => CheckResult::Cpu(CpuInfo {
            core_count: 8,
            usage_percent: 12.5,
            load_average: [0.4, 0.3, 0.2],
            model: "Xeon".into(),
        }),
        CheckKind::Memory => CheckResult::Memory(MemoryInfo {
            total_bytes: 16u64 << 30,
            used_bytes: 4u64 << 30,
            free_bytes: 12u64 << 30,
            available_bytes: 12u64 << 30,
            usage_percent: 25.0,
            ..MemoryInfo::default()
        }),
        CheckKind::Disk => CheckResult::Disk(vec![]),
        CheckKind::Network => CheckResult::Network(NetworkInfo::default()),
        CheckKind::Process => CheckResult::Process(vec![]),
        CheckKind::Service => CheckResult::Service(vec![]),
    }
}

/// 记录所有事件的发布器
pub struct RecordingPublisher {
    records: Mutex<Vec<EventRecord>>,
    count: watch::Sender<usize>,
    fail: bool,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            count: watch::channel(0).0,
            fail: false,
        }
    }

    /// 记录事件但总是返回错误
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn records(&self) -> Vec<EventRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<InspectionEvent> {
        self.records().into_iter().map(|r| r.event).collect()
    }

    pub fn count_of(&self, event_type: &str) -> usize {
        self.events()
            .iter()
            .filter(|e| e.event_type() == event_type)
            .count()
    }

    /// 等待直到记录满足条件
    pub async fn wait_until(&self, pred: impl Fn(&[InspectionEvent]) -> bool) {
        let mut rx = self.count.subscribe();
        let _ = rx.wait_for(|_| pred(&self.events())).await;
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, record: EventRecord) -> Result<()> {
        let len = {
            let mut records = self.records.lock().unwrap();
            records.push(record);
            records.len()
        };
        self.count.send_replace(len);
        if self.fail {
            return Err(CoreError::publish("observer unavailable"));
        }
        Ok(())
    }
}

pub fn target_line(host: &str) -> String {
    format!("{host}:22:root:secret")
}
