use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use admin_core::models::{NodeKey, NodeRole, SlowNodeMetric, TaskProperties, TaskStatus, WorkerNode};
use admin_core::{AdminError, AdminResult};

use crate::node_status_manager::NodeStatusManager;
use crate::slow_node_detector::SlowNodeDetector;

/// 任务生命周期接口
///
/// 具体任务为封闭集合, 共享行为通过组合 [`TaskBase`] 复用而非继承。
#[async_trait]
pub trait AdminTask: Send + Sync {
    fn task_id(&self) -> &str;

    fn task_type(&self) -> &str;

    /// 校验配置并启动; 失败时快速返回且状态不变
    async fn start(&mut self, params: &BTreeMap<String, String>) -> AdminResult<()>;

    /// 推进一轮控制循环; 返回任务是否已进入终态
    async fn run(&mut self) -> AdminResult<bool>;

    fn suspend_task(&mut self, force: bool) -> AdminResult<()>;

    fn resume_task(&mut self) -> AdminResult<()>;

    /// 无条件置为 STOPPED
    fn notify_stopped(&mut self);

    fn is_task_suspended(&self) -> bool;

    fn status(&self) -> TaskStatus;

    fn get_property(&self, key: &str) -> Option<String>;

    fn set_property(&mut self, key: &str, value: &str);

    /// 属性表全量快照, 随流检查点一起持久化
    fn properties(&self) -> BTreeMap<String, String>;
}

/// 各具体任务组合复用的生命周期状态机与备份信息检查点
pub struct TaskBase {
    pub task_id: String,
    pub status: TaskStatus,
    pub properties: TaskProperties,
    pub nodes: Vec<WorkerNode>,
    pub status_manager: NodeStatusManager,
    pub detector: Option<SlowNodeDetector>,
    pub start_time: Option<DateTime<Utc>>,
    last_reported_metric: Option<SlowNodeMetric>,
    last_report_time: Option<DateTime<Utc>>,
    report_interval_seconds: i64,
}

impl TaskBase {
    pub fn new(task_id: &str, report_interval_seconds: i64) -> Self {
        Self {
            task_id: task_id.to_string(),
            status: TaskStatus::Normal,
            properties: TaskProperties::new(),
            nodes: Vec::new(),
            status_manager: NodeStatusManager::new(),
            detector: None,
            start_time: None,
            last_reported_metric: None,
            last_report_time: None,
            report_interval_seconds,
        }
    }

    pub fn mark_started(&mut self, now: DateTime<Utc>) {
        self.status = TaskStatus::Normal;
        self.start_time = Some(now);
    }

    /// 挂起任务
    ///
    /// 终态任务一律拒绝挂起。force 直接跳到 SUSPENDED; 已挂起的任务
    /// 再次非强制挂起返回失败(幂等信号); 尚无节点时立即 SUSPENDED,
    /// 否则进入 SUSPENDING, 由运行循环在所有节点确认后收敛到 SUSPENDED。
    pub fn suspend(&mut self, force: bool) -> AdminResult<()> {
        if self.status.is_terminal() {
            return Err(AdminError::invalid_task_state(
                self.status.as_str(),
                "suspend",
            ));
        }

        if force {
            for node in &mut self.nodes {
                node.target.suspend = true;
                node.suspended = true;
            }
            self.status = TaskStatus::Suspended;
            info!("任务 {} 被强制挂起", self.task_id);
            return Ok(());
        }

        match self.status {
            TaskStatus::Suspended => Err(AdminError::invalid_task_state("SUSPENDED", "suspend")),
            _ if self.nodes.is_empty() => {
                self.status = TaskStatus::Suspended;
                info!("任务 {} 尚无节点, 立即挂起", self.task_id);
                Ok(())
            }
            _ => {
                for node in &mut self.nodes {
                    node.target.suspend = true;
                }
                self.status = TaskStatus::Suspending;
                info!("任务 {} 进入挂起排水", self.task_id);
                Ok(())
            }
        }
    }

    /// 恢复任务; SUSPENDING 期间拒绝(调用方需等待 SUSPENDED)
    pub fn resume(&mut self) -> AdminResult<()> {
        match self.status {
            TaskStatus::Suspending => {
                Err(AdminError::invalid_task_state("SUSPENDING", "resume"))
            }
            TaskStatus::Stopped | TaskStatus::Finished => Err(AdminError::invalid_task_state(
                self.status.as_str(),
                "resume",
            )),
            _ => {
                for node in &mut self.nodes {
                    node.target.suspend = false;
                    node.suspended = false;
                }
                self.status = TaskStatus::Normal;
                info!("任务 {} 已恢复", self.task_id);
                Ok(())
            }
        }
    }

    pub fn notify_stopped(&mut self) {
        self.status = TaskStatus::Stopped;
        info!("任务 {} 已停止", self.task_id);
    }

    pub fn is_suspended(&self) -> bool {
        self.status == TaskStatus::Suspended
    }

    /// SUSPENDING 期间观察各节点挂起确认, 全部确认后收敛到 SUSPENDED
    pub fn observe_suspend_acks(&mut self) {
        if self.status != TaskStatus::Suspending {
            return;
        }
        if self.nodes.iter().all(|n| n.reported.suspended) {
            for node in &mut self.nodes {
                node.suspended = true;
            }
            self.status = TaskStatus::Suspended;
            info!("任务 {} 全部节点已确认挂起", self.task_id);
        }
    }

    /// 从持久化的备份信息恢复在途备份节点
    ///
    /// 备份节点被拼接回活跃节点集; processor 角色是追加写处理,
    /// 一旦存在备份即从活跃集中去掉主节点(显式特例, 不外推到其他角色)。
    /// 解析失败向上传播, 调用方放弃本次恢复并回退到干净初始化。
    pub fn recover_from_back_info(&mut self) -> AdminResult<()> {
        let info = match self.properties.backup_node_info()? {
            Some(info) => info,
            None => return Ok(()),
        };

        for (group_id, backup_ids) in info.groups() {
            let (role, partition_id) = NodeKey::parse_group_id(group_id).ok_or_else(|| {
                AdminError::serialization(format!("备份信息中的非法角色组: {group_id}"))
            })?;

            for &backup_id in backup_ids {
                let key = NodeKey::backup(role, partition_id, backup_id);
                if !self.nodes.iter().any(|n| n.key == key) {
                    self.nodes.push(WorkerNode::new(key));
                    debug!("任务 {} 恢复在途备份节点 {}", self.task_id, key);
                }
            }

            if role == NodeRole::Processor && !backup_ids.is_empty() {
                let primary = NodeKey::primary(role, partition_id);
                let before = self.nodes.len();
                self.nodes.retain(|n| n.key != primary);
                if self.nodes.len() < before {
                    warn!(
                        "任务 {} 角色组 {} 已有备份, 去掉processor主节点",
                        self.task_id, group_id
                    );
                }
            }
        }

        self.status_manager.set_backup_info(info);
        Ok(())
    }

    /// 将活的备份簿记同步到任务属性(有变化才写)
    pub fn save_backup_info(&mut self) -> AdminResult<()> {
        let current = self.status_manager.serialize_back_info()?;
        if self.properties.get(admin_core::PROP_BACKUP_NODE_INFO) != Some(current.as_str()) {
            self.properties
                .set(admin_core::PROP_BACKUP_NODE_INFO, &current);
        }
        Ok(())
    }

    pub fn clear_backup_info(&mut self) {
        self.status_manager.clear_backup_info();
        self.properties.clear_backup_node_info();
    }

    /// 告警节流: 指标有变化且距上次上报超过配置间隔才上报
    pub fn should_report_metric(&mut self, metric: &SlowNodeMetric, now: DateTime<Utc>) -> bool {
        if self.last_reported_metric.as_ref() == Some(metric) {
            return false;
        }
        if let Some(last) = self.last_report_time {
            if (now - last).num_seconds() < self.report_interval_seconds {
                return false;
            }
        }
        self.last_reported_metric = Some(metric.clone());
        self.last_report_time = Some(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use admin_core::models::BackupInfo;
    use admin_testing_utils::WorkerNodeBuilder;

    fn base_with_nodes() -> TaskBase {
        let mut base = TaskBase::new("job1.builder", 60);
        base.nodes = vec![
            WorkerNodeBuilder::new(NodeRole::Builder, 0).build(),
            WorkerNodeBuilder::new(NodeRole::Builder, 1).build(),
        ];
        base
    }

    #[test]
    fn test_suspend_without_nodes_is_immediate() {
        let mut base = TaskBase::new("t", 60);
        base.suspend(false).unwrap();
        assert_eq!(base.status, TaskStatus::Suspended);
    }

    #[test]
    fn test_suspend_with_nodes_drains() {
        let mut base = base_with_nodes();
        base.suspend(false).unwrap();
        assert_eq!(base.status, TaskStatus::Suspending);
        assert!(base.nodes.iter().all(|n| n.target.suspend));

        // 节点尚未全部确认
        base.nodes[0].reported.suspended = true;
        base.observe_suspend_acks();
        assert_eq!(base.status, TaskStatus::Suspending);

        base.nodes[1].reported.suspended = true;
        base.observe_suspend_acks();
        assert_eq!(base.status, TaskStatus::Suspended);
        assert!(base.nodes.iter().all(|n| n.suspended));
    }

    #[test]
    fn test_second_suspend_after_suspended_fails() {
        let mut base = TaskBase::new("t", 60);
        base.suspend(false).unwrap();
        assert!(base.suspend(false).is_err());
        // 强制挂起总是成功
        base.suspend(true).unwrap();
    }

    #[test]
    fn test_resume_refused_while_suspending() {
        let mut base = base_with_nodes();
        base.suspend(false).unwrap();
        assert!(base.resume().is_err());

        for node in &mut base.nodes {
            node.reported.suspended = true;
        }
        base.observe_suspend_acks();
        base.resume().unwrap();
        assert_eq!(base.status, TaskStatus::Normal);
        assert!(base.nodes.iter().all(|n| !n.target.suspend));
    }

    #[test]
    fn test_notify_stopped_is_unconditional() {
        let mut base = base_with_nodes();
        base.suspend(false).unwrap();
        base.notify_stopped();
        assert_eq!(base.status, TaskStatus::Stopped);
        assert!(base.suspend(false).is_err());
    }

    #[test]
    fn test_terminal_task_refuses_force_suspend() {
        let mut base = base_with_nodes();
        base.notify_stopped();
        assert!(base.suspend(true).is_err());
        assert_eq!(base.status, TaskStatus::Stopped);

        let mut base = base_with_nodes();
        base.status = TaskStatus::Finished;
        assert!(base.suspend(true).is_err());
        assert_eq!(base.status, TaskStatus::Finished);
    }

    #[test]
    fn test_recover_from_back_info_splices_backups() {
        let mut base = base_with_nodes();
        let mut info = BackupInfo::new();
        info.add("builder.0", 1);
        base.properties.set_backup_node_info(&info).unwrap();

        base.recover_from_back_info().unwrap();

        assert_eq!(base.nodes.len(), 3);
        assert!(base
            .nodes
            .iter()
            .any(|n| n.key == NodeKey::backup(NodeRole::Builder, 0, 1)));
        // builder 角色主节点保留
        assert!(base
            .nodes
            .iter()
            .any(|n| n.key == NodeKey::primary(NodeRole::Builder, 0)));
    }

    #[test]
    fn test_recover_drops_processor_primary_once_backup_exists() {
        let mut base = TaskBase::new("job1.processor", 60);
        base.nodes = vec![
            WorkerNodeBuilder::new(NodeRole::Processor, 0).build(),
            WorkerNodeBuilder::new(NodeRole::Processor, 1).build(),
        ];
        let mut info = BackupInfo::new();
        info.add("processor.0", 1);
        base.properties.set_backup_node_info(&info).unwrap();

        base.recover_from_back_info().unwrap();

        assert!(!base
            .nodes
            .iter()
            .any(|n| n.key == NodeKey::primary(NodeRole::Processor, 0)));
        assert!(base
            .nodes
            .iter()
            .any(|n| n.key == NodeKey::backup(NodeRole::Processor, 0, 1)));
        // 没有备份的分区不受影响
        assert!(base
            .nodes
            .iter()
            .any(|n| n.key == NodeKey::primary(NodeRole::Processor, 1)));
    }

    #[test]
    fn test_recover_with_garbage_property_fails() {
        let mut base = TaskBase::new("t", 60);
        base.properties.set(admin_core::PROP_BACKUP_NODE_INFO, "##");
        assert!(base.recover_from_back_info().is_err());
    }

    #[test]
    fn test_metric_report_throttling() {
        let mut base = TaskBase::new("t", 60);
        let now = Utc::now();
        let mut metric = SlowNodeMetric::default();
        metric.dead_node_kill_times = 1;

        assert!(base.should_report_metric(&metric, now));
        // 同一指标不重复上报
        assert!(!base.should_report_metric(&metric, now + chrono::Duration::seconds(120)));

        metric.dead_node_kill_times = 2;
        // 指标变化但未到间隔
        assert!(!base.should_report_metric(&metric, now + chrono::Duration::seconds(10)));
        // 指标变化且超过间隔
        assert!(base.should_report_metric(&metric, now + chrono::Duration::seconds(61)));
    }
}
