//! 巡检事件
//!
//! 每个任务的事件按发出顺序编号，只追加、不撤回。

use crate::check_types::CheckResult;
use crate::core_types::JobId;
use crate::inspection_types::{CheckKind, InspectionSummary};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 巡检事件（字段名为对外约定）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum InspectionEvent {
    InspectionStart {
        job_id: JobId,
        target_count: usize,
        message: String,
    },
    ServerStart {
        host: String,
    },
    ServerResult {
        host: String,
        result: BTreeMap<CheckKind, CheckResult>,
    },
    ServerError {
        host: String,
        message: String,
    },
    InspectionComplete {
        job_id: JobId,
        message: String,
        summary: InspectionSummary,
    },
}

impl InspectionEvent {
    /// 事件类型名
    pub fn event_type(&self) -> &'static str {
        match self {
            InspectionEvent::InspectionStart { .. } => "inspection_start",
            InspectionEvent::ServerStart { .. } => "server_start",
            InspectionEvent::ServerResult { .. } => "server_result",
            InspectionEvent::ServerError { .. } => "server_error",
            InspectionEvent::InspectionComplete { .. } => "inspection_complete",
        }
    }

    /// 事件涉及的主机（任务级事件返回 None）
    pub fn host(&self) -> Option<&str> {
        match self {
            InspectionEvent::ServerStart { host }
            | InspectionEvent::ServerResult { host, .. }
            | InspectionEvent::ServerError { host, .. } => Some(host),
            _ => None,
        }
    }

    /// 是否为单台服务器的终态事件
    pub fn is_terminal_for_host(&self) -> bool {
        matches!(
            self,
            InspectionEvent::ServerResult { .. } | InspectionEvent::ServerError { .. }
        )
    }
}

/// 事件信封：带任务 ID 与任务内序号
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub job_id: JobId,
    pub sequence: u64,
    pub emitted_at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: InspectionEvent,
}

impl EventRecord {
    pub fn new(job_id: JobId, sequence: u64, event: InspectionEvent) -> Self {
        Self {
            job_id,
            sequence,
            emitted_at: Utc::now(),
            event,
        }
    }
}
