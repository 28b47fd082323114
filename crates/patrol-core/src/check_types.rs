//! 巡检结果载荷
//!
//! 结构由 Check Executor 负责填充，引擎只做透传。

use crate::inspection_types::CheckKind;
use serde::{Deserialize, Serialize};

/// 单个巡检项的结构化结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CheckResult {
    System(SystemInfo),
    Cpu(CpuInfo),
    Memory(MemoryInfo),
    Disk(Vec<DiskInfo>),
    Network(NetworkInfo),
    Process(Vec<ProcessInfo>),
    Service(Vec<ServiceInfo>),
}

impl CheckResult {
    /// 结果所属的巡检项
    pub fn kind(&self) -> CheckKind {
        match self {
            CheckResult::System(_) => CheckKind::System,
            CheckResult::Cpu(_) => CheckKind::Cpu,
            CheckResult::Memory(_) => CheckKind::Memory,
            CheckResult::Disk(_) => CheckKind::Disk,
            CheckResult::Network(_) => CheckKind::Network,
            CheckResult::Process(_) => CheckKind::Process,
            CheckResult::Service(_) => CheckKind::Service,
        }
    }
}

/// 系统信息
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    pub os_name: String,
    pub os_version: String,
    pub kernel_version: String,
    pub hostname: String,
    pub uptime: String,
    pub boot_time: String,
}

/// CPU 信息
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuInfo {
    pub core_count: u32,
    pub usage_percent: f64,
    pub load_average: [f64; 3],
    pub model: String,
}

/// 内存信息（字节）
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryInfo {
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub free_bytes: u64,
    pub available_bytes: u64,
    pub usage_percent: f64,
    pub swap_total_bytes: u64,
    pub swap_used_bytes: u64,
    pub swap_free_bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiskKind {
    Root,
    Data,
    Other,
}

impl DiskKind {
    /// 根据挂载点判断磁盘类型
    pub fn from_mountpoint(mountpoint: &str) -> Self {
        if mountpoint == "/" {
            DiskKind::Root
        } else if mountpoint.starts_with("/data") || mountpoint.starts_with("/storage") {
            DiskKind::Data
        } else {
            DiskKind::Other
        }
    }
}

/// 磁盘信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskInfo {
    pub mountpoint: String,
    pub device: String,
    pub filesystem: String,
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub free_bytes: u64,
    pub usage_percent: f64,
    pub kind: DiskKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceKind {
    Physical,
    Bond,
    Virtual,
    Loopback,
}

impl InterfaceKind {
    /// 根据接口名推断类型
    pub fn from_name(name: &str) -> Self {
        if name == "lo" {
            InterfaceKind::Loopback
        } else if name.starts_with("bond") {
            InterfaceKind::Bond
        } else if name.starts_with("veth") || name.starts_with("docker") {
            InterfaceKind::Virtual
        } else {
            InterfaceKind::Physical
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterface {
    pub name: String,
    pub ip_address: String,
    pub netmask: String,
    pub mac_address: String,
    pub kind: InterfaceKind,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BondInfo {
    pub name: String,
    pub mode: String,
    pub status: String,
}

/// 虚拟 IP（如 keepalived 的 secondary 地址）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VipInfo {
    pub ip: String,
    pub kind: String,
    pub interface: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteInfo {
    pub destination: String,
    pub gateway: String,
    pub interface: String,
}

/// 网络信息
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInfo {
    pub interfaces: Vec<NetworkInterface>,
    pub bonds: Vec<BondInfo>,
    pub vips: Vec<VipInfo>,
    #[serde(default)]
    pub routes: Vec<RouteInfo>,
}

/// 进程摘要（按 CPU 排序的 top-N）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub status: String,
    pub command: String,
}

/// 服务摘要（运行中的服务 top-N）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInfo {
    pub name: String,
    pub status: String,
    pub enabled: bool,
    pub description: String,
}
