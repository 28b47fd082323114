use crate::inspection_types::CheckKind;

// 目标解析缺省值
pub const DEFAULT_SSH_PORT: u16 = 22;
pub const DEFAULT_USERNAME: &str = "root";

/// 请求未指定巡检项时使用的集合
pub const DEFAULT_CHECKS: [CheckKind; 5] = [
    CheckKind::System,
    CheckKind::Cpu,
    CheckKind::Memory,
    CheckKind::Disk,
    CheckKind::Network,
];

// 巡检配置缺省值（秒）
pub const DEFAULT_CONNECT_TIMEOUT_SEC: u64 = 30;
pub const DEFAULT_COMMAND_TIMEOUT_SEC: u64 = 60;
pub const DEFAULT_MAX_CONCURRENCY: usize = 5;
pub const DEFAULT_RETRY_COUNT: u32 = 3;
pub const DEFAULT_RETRY_DELAY_SEC: u64 = 5;

/// 配置文件名与环境变量前缀
pub const CONFIG_FILE_NAME: &str = "patrol.toml";
pub const CONFIG_ENV_PREFIX: &str = "PATROL__";

/// 事件广播通道容量
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;
