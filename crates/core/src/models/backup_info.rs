use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::AdminError;
use crate::AdminResult;

/// 角色组 -> 在途备份节点编号列表
///
/// 作为任务属性持久化, 管控端重启后据此恢复在途备份节点。
/// 使用 BTreeMap 保证序列化结果规范化, 空映射固定序列化为 `{}`。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackupInfo {
    groups: BTreeMap<String, Vec<u32>>,
}

impl BackupInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn add(&mut self, group_id: &str, backup_id: u32) {
        let ids = self.groups.entry(group_id.to_string()).or_default();
        if !ids.contains(&backup_id) {
            ids.push(backup_id);
            ids.sort_unstable();
        }
    }

    pub fn remove_group(&mut self, group_id: &str) -> Option<Vec<u32>> {
        self.groups.remove(group_id)
    }

    pub fn backup_ids(&self, group_id: &str) -> &[u32] {
        self.groups.get(group_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn backup_count(&self, group_id: &str) -> usize {
        self.backup_ids(group_id).len()
    }

    pub fn groups(&self) -> &BTreeMap<String, Vec<u32>> {
        &self.groups
    }

    pub fn to_json(&self) -> AdminResult<String> {
        serde_json::to_string(self).map_err(|e| AdminError::serialization(e.to_string()))
    }

    pub fn from_json(raw: &str) -> AdminResult<Self> {
        serde_json::from_str(raw)
            .map_err(|e| AdminError::serialization(format!("备份信息解析失败: {e}")))
    }
}
