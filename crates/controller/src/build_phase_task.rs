use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};

use admin_core::config::SlowNodeConfig;
use admin_core::models::{NodeKey, NodeRole, TaskStatus};
use admin_core::traits::{AlertReporter, AlertSeverity, NodeOperator};
use admin_core::{AdminError, AdminResult};

use crate::admin_task::{AdminTask, TaskBase};
use crate::slow_node_detector::SlowNodeDetector;

/// 一个构建阶段(processor/builder/merger)的管控任务
///
/// 每轮 run 依次执行: 状态同步 -> 慢节点检测处置 -> 完成检查 ->
/// 备份信息落盘。顺序不可调换, 检测与完成检查都读取同步后的快照。
pub struct BuildPhaseTask {
    base: TaskBase,
    role: NodeRole,
    slow_node_config: SlowNodeConfig,
    operator: Arc<dyn NodeOperator>,
    reporter: Arc<dyn AlertReporter>,
}

impl BuildPhaseTask {
    pub fn new(
        task_id: &str,
        role: NodeRole,
        slow_node_config: SlowNodeConfig,
        operator: Arc<dyn NodeOperator>,
        reporter: Arc<dyn AlertReporter>,
        report_interval_seconds: i64,
    ) -> Self {
        Self {
            base: TaskBase::new(task_id, report_interval_seconds),
            role,
            slow_node_config,
            operator,
            reporter,
        }
    }

    pub fn nodes(&self) -> &[admin_core::models::WorkerNode] {
        &self.base.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut Vec<admin_core::models::WorkerNode> {
        &mut self.base.nodes
    }

    fn parse_partition_count(params: &BTreeMap<String, String>) -> AdminResult<u32> {
        let raw = params
            .get("partition_count")
            .ok_or_else(|| AdminError::configuration("缺少启动参数 partition_count"))?;
        let count: u32 = raw
            .parse()
            .map_err(|_| AdminError::Configuration(format!("非法的 partition_count: {raw}")))?;
        if count == 0 {
            return Err(AdminError::configuration("partition_count 必须为正数"));
        }
        Ok(count)
    }
}

#[async_trait]
impl AdminTask for BuildPhaseTask {
    fn task_id(&self) -> &str {
        &self.base.task_id
    }

    fn task_type(&self) -> &str {
        self.role.as_str()
    }

    async fn start(&mut self, params: &BTreeMap<String, String>) -> AdminResult<()> {
        // 配置与参数先行校验, 任何失败都不改动任务状态
        let partition_count = Self::parse_partition_count(params)?;
        let now = Utc::now();
        let detector = SlowNodeDetector::init(self.slow_node_config.clone(), now)?;

        if self.base.nodes.is_empty() {
            self.base.nodes = (0..partition_count)
                .map(|p| admin_core::models::WorkerNode::new(NodeKey::primary(self.role, p)))
                .collect();
        }
        // 属性表中可能带着上一代管控进程留下的备份信息
        self.base.recover_from_back_info()?;

        self.base.detector = Some(detector);
        self.base.mark_started(now);
        info!(
            "任务 {} 启动, 角色 {}, 分区数 {}",
            self.base.task_id, self.role, partition_count
        );
        Ok(())
    }

    async fn run(&mut self) -> AdminResult<bool> {
        if self.base.status.is_terminal() {
            return Ok(true);
        }
        if self.base.status == TaskStatus::Suspended {
            return Ok(false);
        }

        let now = Utc::now();
        self.base.status_manager.update(&self.base.nodes);

        let simple_handle_only = self.base.status == TaskStatus::Suspending;
        if let Some(detector) = self.base.detector.as_mut() {
            let metric = detector
                .detect_and_handle(
                    self.operator.as_ref(),
                    &mut self.base.status_manager,
                    &mut self.base.nodes,
                    now,
                    simple_handle_only,
                )
                .await?;
            if metric.has_handled_any() && self.base.should_report_metric(&metric, now) {
                self.reporter.report(
                    AlertSeverity::Warning,
                    "slow_node_status",
                    &format!(
                        "任务 {} 慢节点处置: 杀慢{} 杀死{} 重启{} 备份{} 有效备份{}",
                        self.base.task_id,
                        metric.slow_node_kill_times,
                        metric.dead_node_kill_times,
                        metric.restart_node_kill_times,
                        metric.slow_node_backup_create_times,
                        metric.effective_backup_count,
                    ),
                );
            }
        }

        let check = self.base.status_manager.check_finished(&self.base.nodes);
        for key in &check.finished_nodes {
            if let Some(node) = self.base.nodes.iter_mut().find(|n| n.key == *key) {
                node.finished = true;
            }
        }

        if self.base.status == TaskStatus::Suspending {
            self.base.observe_suspend_acks();
        }

        if check.all_finished && self.base.status == TaskStatus::Normal {
            info!("任务 {} 全部角色组完成", self.base.task_id);
            self.base.clear_backup_info();
            self.base.nodes.clear();
            self.base.status = TaskStatus::Finished;
            return Ok(true);
        }

        // 备份簿记在本轮返回前同步到属性表, 崩溃最多丢失当前轮
        self.base.save_backup_info()?;
        debug!(
            "任务 {} 本轮完成 {}/{} 组",
            self.base.task_id,
            check.finished_groups.len(),
            self.base.status_manager.group_count()
        );
        Ok(false)
    }

    fn suspend_task(&mut self, force: bool) -> AdminResult<()> {
        self.base.suspend(force)
    }

    fn resume_task(&mut self) -> AdminResult<()> {
        self.base.resume()
    }

    fn notify_stopped(&mut self) {
        self.base.notify_stopped();
    }

    fn is_task_suspended(&self) -> bool {
        self.base.is_suspended()
    }

    fn status(&self) -> TaskStatus {
        self.base.status
    }

    fn get_property(&self, key: &str) -> Option<String> {
        self.base.properties.get(key).map(str::to_string)
    }

    fn set_property(&mut self, key: &str, value: &str) {
        self.base.properties.set(key, value);
    }

    fn properties(&self) -> BTreeMap<String, String> {
        self.base.properties.entries().clone()
    }
}
