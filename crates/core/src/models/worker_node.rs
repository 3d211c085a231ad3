use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 构建流水线中的节点角色
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeRole {
    /// 原始数据处理, 追加写角色
    #[serde(rename = "PROCESSOR")]
    Processor,
    #[serde(rename = "BUILDER")]
    Builder,
    #[serde(rename = "MERGER")]
    Merger,
}

impl NodeRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeRole::Processor => "processor",
            NodeRole::Builder => "builder",
            NodeRole::Merger => "merger",
        }
    }

    pub fn from_task_type(task_type: &str) -> Option<Self> {
        match task_type {
            "processor" => Some(NodeRole::Processor),
            "builder" => Some(NodeRole::Builder),
            "merger" => Some(NodeRole::Merger),
            _ => None,
        }
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 节点唯一标识: (角色, 分区, 备份编号); backup_id 为 0 表示主节点
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey {
    pub role: NodeRole,
    pub partition_id: u32,
    pub backup_id: u32,
}

impl NodeKey {
    pub fn primary(role: NodeRole, partition_id: u32) -> Self {
        Self {
            role,
            partition_id,
            backup_id: 0,
        }
    }

    pub fn backup(role: NodeRole, partition_id: u32, backup_id: u32) -> Self {
        Self {
            role,
            partition_id,
            backup_id,
        }
    }

    pub fn is_primary(&self) -> bool {
        self.backup_id == 0
    }

    /// 角色组标识, 也是备份信息持久化映射的键
    pub fn group_id(&self) -> String {
        format!("{}.{}", self.role, self.partition_id)
    }

    /// 从角色组标识反解出 (角色, 分区)
    pub fn parse_group_id(group_id: &str) -> Option<(NodeRole, u32)> {
        let (role_str, partition_str) = group_id.rsplit_once('.')?;
        let role = NodeRole::from_task_type(role_str)?;
        let partition_id = partition_str.parse().ok()?;
        Some((role, partition_id))
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.role, self.partition_id, self.backup_id)
    }
}

/// Worker上报的运行状态快照, 永远是最近一次异步心跳的内容
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NodeStatusSnapshot {
    pub finished: bool,
    pub suspended: bool,
    pub last_heartbeat: Option<DateTime<Utc>>,
    /// 分区处理吞吐(条/秒)
    pub throughput: f64,
    /// 进度标记, 重启后从此处续做
    pub locator: u64,
}

/// 管控端下发的期望状态
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NodeTarget {
    pub suspend: bool,
    pub generation: u64,
}

/// 一个分区的Worker实例
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerNode {
    pub key: NodeKey,
    pub reported: NodeStatusSnapshot,
    pub target: NodeTarget,
    pub finished: bool,
    pub suspended: bool,
}

impl WorkerNode {
    pub fn new(key: NodeKey) -> Self {
        Self {
            key,
            reported: NodeStatusSnapshot::default(),
            target: NodeTarget::default(),
            finished: false,
            suspended: false,
        }
    }

    pub fn is_primary(&self) -> bool {
        self.key.is_primary()
    }

    /// 检查心跳是否超时; 从未上报过心跳的节点以 fallback 时间起算
    pub fn is_heartbeat_expired(
        &self,
        now: DateTime<Utc>,
        fallback: DateTime<Utc>,
        timeout_seconds: i64,
    ) -> bool {
        let reference = self.reported.last_heartbeat.unwrap_or(fallback);
        (now - reference).num_seconds() > timeout_seconds
    }

    /// 杀掉重建后重置上报状态, 换代避免旧心跳串扰
    pub fn reset_for_relaunch(&mut self) {
        self.reported = NodeStatusSnapshot::default();
        self.target.generation += 1;
    }
}
