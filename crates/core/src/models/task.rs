use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::BackupInfo;
use crate::AdminResult;

/// 任务生命周期状态
///
/// NORMAL -> SUSPENDING -> SUSPENDED; NORMAL -> STOPPED; NORMAL -> FINISHED。
/// STOPPED 与 FINISHED 为终态。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    #[serde(rename = "NORMAL")]
    Normal,
    #[serde(rename = "SUSPENDING")]
    Suspending,
    #[serde(rename = "SUSPENDED")]
    Suspended,
    #[serde(rename = "STOPPED")]
    Stopped,
    #[serde(rename = "FINISHED")]
    Finished,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Normal => "NORMAL",
            TaskStatus::Suspending => "SUSPENDING",
            TaskStatus::Suspended => "SUSPENDED",
            TaskStatus::Stopped => "STOPPED",
            TaskStatus::Finished => "FINISHED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Stopped | TaskStatus::Finished)
    }
}

/// 备份信息在属性表中的检查点键
pub const PROP_BACKUP_NODE_INFO: &str = "backup_node_info";

/// 任务属性表
///
/// 与外部存储交互的扁平 string->string 映射, 既承载检查点字段也承载
/// 对运维可见的状态标签。已知检查点键通过类型化方法访问。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct TaskProperties {
    entries: BTreeMap<String, String>,
}

impl TaskProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }

    pub fn backup_node_info(&self) -> AdminResult<Option<BackupInfo>> {
        match self.get(PROP_BACKUP_NODE_INFO) {
            Some(raw) => Ok(Some(BackupInfo::from_json(raw)?)),
            None => Ok(None),
        }
    }

    pub fn set_backup_node_info(&mut self, info: &BackupInfo) -> AdminResult<()> {
        let raw = info.to_json()?;
        self.set(PROP_BACKUP_NODE_INFO, &raw);
        Ok(())
    }

    pub fn clear_backup_node_info(&mut self) {
        self.entries.remove(PROP_BACKUP_NODE_INFO);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_terminal() {
        assert!(TaskStatus::Stopped.is_terminal());
        assert!(TaskStatus::Finished.is_terminal());
        assert!(!TaskStatus::Normal.is_terminal());
        assert!(!TaskStatus::Suspending.is_terminal());
        assert!(!TaskStatus::Suspended.is_terminal());
    }

    #[test]
    fn test_status_wire_tokens() {
        let raw = serde_json::to_string(&TaskStatus::Suspending).unwrap();
        assert_eq!(raw, "\"SUSPENDING\"");
        let parsed: TaskStatus = serde_json::from_str("\"FINISHED\"").unwrap();
        assert_eq!(parsed, TaskStatus::Finished);
    }

    #[test]
    fn test_backup_node_info_accessors() {
        let mut props = TaskProperties::new();
        assert!(props.backup_node_info().unwrap().is_none());

        let mut info = BackupInfo::new();
        info.add("builder.0", 1);
        props.set_backup_node_info(&info).unwrap();

        let restored = props.backup_node_info().unwrap().unwrap();
        assert_eq!(restored, info);

        props.clear_backup_node_info();
        assert!(props.backup_node_info().unwrap().is_none());
    }

    #[test]
    fn test_backup_node_info_garbage_is_error() {
        let mut props = TaskProperties::new();
        props.set(PROP_BACKUP_NODE_INFO, "###");
        assert!(props.backup_node_info().is_err());
    }
}
