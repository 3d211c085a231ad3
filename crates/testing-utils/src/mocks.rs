//! 外部协作方的内存mock实现
//!
//! 不依赖真实进程调度与外部存储, 记录调用内容供断言。

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use admin_core::models::NodeKey;
use admin_core::traits::{AlertReporter, AlertSeverity, CheckpointStore, NodeOperator, ResourceReader};
use admin_core::{AdminError, AdminResult};

/// 节点操作记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeAction {
    Kill(NodeKey),
    Restart(NodeKey),
    LaunchBackup(NodeKey),
}

/// 记录所有下发动作的节点操作mock
#[derive(Debug, Clone, Default)]
pub struct MockNodeOperator {
    actions: Arc<Mutex<Vec<NodeAction>>>,
}

impl MockNodeOperator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn actions(&self) -> Vec<NodeAction> {
        self.actions.lock().unwrap().clone()
    }

    pub fn action_count(&self) -> usize {
        self.actions.lock().unwrap().len()
    }

    pub fn launched_backups(&self) -> Vec<NodeKey> {
        self.actions
            .lock()
            .unwrap()
            .iter()
            .filter_map(|a| match a {
                NodeAction::LaunchBackup(key) => Some(*key),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.actions.lock().unwrap().clear();
    }
}

#[async_trait]
impl NodeOperator for MockNodeOperator {
    async fn kill_node(&self, key: &NodeKey) -> AdminResult<()> {
        self.actions.lock().unwrap().push(NodeAction::Kill(*key));
        Ok(())
    }

    async fn restart_node(&self, key: &NodeKey) -> AdminResult<()> {
        self.actions.lock().unwrap().push(NodeAction::Restart(*key));
        Ok(())
    }

    async fn launch_backup(&self, key: &NodeKey) -> AdminResult<()> {
        self.actions
            .lock()
            .unwrap()
            .push(NodeAction::LaunchBackup(*key));
        Ok(())
    }
}

/// 内存检查点存储
#[derive(Debug, Clone, Default)]
pub struct MemoryCheckpointStore {
    docs: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.docs.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn write(&self, key: &str, content: &str) -> AdminResult<()> {
        self.docs
            .lock()
            .unwrap()
            .insert(key.to_string(), content.to_string());
        Ok(())
    }

    async fn read(&self, key: &str) -> AdminResult<Option<String>> {
        Ok(self.docs.lock().unwrap().get(key).cloned())
    }

    async fn remove(&self, key: &str) -> AdminResult<()> {
        self.docs.lock().unwrap().remove(key);
        Ok(())
    }
}

/// 记录所有告警的上报mock
#[derive(Debug, Clone, Default)]
pub struct RecordingAlertReporter {
    events: Arc<Mutex<Vec<(AlertSeverity, String, String)>>>,
}

impl RecordingAlertReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(AlertSeverity, String, String)> {
        self.events.lock().unwrap().clone()
    }

    pub fn event_count(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

impl AlertReporter for RecordingAlertReporter {
    fn report(&self, severity: AlertSeverity, event: &str, message: &str) {
        self.events
            .lock()
            .unwrap()
            .push((severity, event.to_string(), message.to_string()));
    }
}

/// 按预置表解析资源定义的mock; 未预置的资源解析失败
#[derive(Debug, Clone, Default)]
pub struct MockResourceReader {
    known: Arc<Mutex<HashMap<String, serde_json::Value>>>,
}

impl MockResourceReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resource(self, name: &str, value: serde_json::Value) -> Self {
        self.known.lock().unwrap().insert(name.to_string(), value);
        self
    }
}

impl ResourceReader for MockResourceReader {
    fn read(&self, resource_name: &str) -> AdminResult<serde_json::Value> {
        self.known
            .lock()
            .unwrap()
            .get(resource_name)
            .cloned()
            .ok_or_else(|| AdminError::resource_not_found(resource_name))
    }
}
