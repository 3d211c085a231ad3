use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use admin_core::config::{ConfigValidator, HandleStrategy, SlowNodeConfig};
use admin_core::models::{NodeKey, SlowNodeMetric, WorkerNode};
use admin_core::traits::NodeOperator;
use admin_core::AdminResult;

use crate::node_status_manager::NodeStatusManager;

/// 慢节点/死节点检测与处置
///
/// 所有判定都基于最近一次异步上报的心跳, 天然是过期的尽力而为信息;
/// 死与慢的歧义按配置的阈值与策略启发式裁决。
pub struct SlowNodeDetector {
    config: SlowNodeConfig,
    task_start: DateTime<Utc>,
    metric: SlowNodeMetric,
}

impl SlowNodeDetector {
    /// 创建检测器; 配置不一致时失败
    pub fn init(config: SlowNodeConfig, task_start: DateTime<Utc>) -> AdminResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            task_start,
            metric: SlowNodeMetric::default(),
        })
    }

    pub fn metric(&self) -> &SlowNodeMetric {
        &self.metric
    }

    /// 心跳超时判死; 从未上报过心跳的节点以任务启动时间起算
    fn is_node_dead(&self, node: &WorkerNode, now: DateTime<Utc>) -> bool {
        node.is_heartbeat_expired(now, self.task_start, self.config.dead_node_timeout_seconds)
    }

    /// 有心跳但吞吐落后组内基线的节点判慢
    fn is_node_slow(&self, node: &WorkerNode, baseline: f64) -> bool {
        node.reported.last_heartbeat.is_some()
            && baseline > 0.0
            && node.reported.throughput < self.config.slow_qps_ratio * baseline
    }

    /// 基线参与项: 活跃未完成未挂起且有心跳的主节点的吞吐总和与个数
    fn baseline_terms(nodes: &[WorkerNode]) -> (f64, usize) {
        let mut sum = 0.0;
        let mut count = 0usize;
        for node in nodes {
            if node.is_primary()
                && !node.finished
                && !node.reported.finished
                && !node.suspended
                && !node.reported.suspended
                && node.reported.last_heartbeat.is_some()
            {
                sum += node.reported.throughput;
                count += 1;
            }
        }
        (sum, count)
    }

    /// 候选节点的同辈基线: 其余参与项的平均吞吐, 不含候选自身,
    /// 避免候选自己的低吞吐把基线拉低
    fn sibling_baseline(sum: f64, count: usize, node: &WorkerNode) -> f64 {
        if node.reported.last_heartbeat.is_some() {
            if count <= 1 {
                0.0
            } else {
                (sum - node.reported.throughput) / (count - 1) as f64
            }
        } else if count == 0 {
            0.0
        } else {
            sum / count as f64
        }
    }

    fn next_backup_id(
        status_mgr: &NodeStatusManager,
        pending: &[WorkerNode],
        group_id: &str,
    ) -> u32 {
        let persisted_max = status_mgr
            .backup_info()
            .backup_ids(group_id)
            .iter()
            .max()
            .copied()
            .unwrap_or(0);
        let pending_max = pending
            .iter()
            .filter(|n| n.key.group_id() == group_id)
            .map(|n| n.key.backup_id)
            .max()
            .unwrap_or(0);
        persisted_max.max(pending_max) + 1
    }

    /// 检测并处置慢/死节点, 返回累计指标快照
    ///
    /// `simple_handle_only` 为真时跳过备份创建(挂起排水期间使用)。
    /// 调用前必须先执行 `NodeStatusManager::update`。
    pub async fn detect_and_handle(
        &mut self,
        operator: &dyn NodeOperator,
        status_mgr: &mut NodeStatusManager,
        nodes: &mut Vec<WorkerNode>,
        now: DateTime<Utc>,
        simple_handle_only: bool,
    ) -> AdminResult<SlowNodeMetric> {
        if !self.config.enable_slow_detect {
            return Ok(self.metric.clone());
        }
        if (now - self.task_start).num_seconds() < self.config.judge_start_seconds {
            debug!("任务启动未满判定窗口, 跳过慢节点检测");
            return Ok(self.metric.clone());
        }

        let (baseline_sum, baseline_count) = Self::baseline_terms(nodes);
        let mut new_backups: Vec<WorkerNode> = Vec::new();

        for node in nodes.iter_mut() {
            if !node.is_primary() {
                continue;
            }
            if node.suspended || node.reported.suspended {
                continue;
            }
            if node.finished || node.reported.finished {
                continue;
            }

            let baseline = Self::sibling_baseline(baseline_sum, baseline_count, node);
            let group_id = node.key.group_id();
            let pending_backups = new_backups
                .iter()
                .filter(|n| n.key.group_id() == group_id)
                .count();
            let at_backup_cap = status_mgr.backup_count(&group_id) + pending_backups
                >= self.config.max_backup_count_per_group;

            if self.is_node_dead(node, now) {
                warn!("检测到死节点 {}, 杀掉重建", node.key);
                operator.kill_node(&node.key).await?;
                node.reset_for_relaunch();
                self.metric.dead_node_kill_times += 1;

                if !simple_handle_only
                    && self.config.handle_strategy == HandleStrategy::SpawnBackup
                    && !at_backup_cap
                {
                    let backup_id = Self::next_backup_id(status_mgr, &new_backups, &group_id);
                    let key = NodeKey::backup(node.key.role, node.key.partition_id, backup_id);
                    operator.launch_backup(&key).await?;
                    status_mgr.add_backup(&key);
                    self.metric.slow_node_backup_create_times += 1;
                    info!("为角色组 {} 拉起备份节点 {}", group_id, key);
                    new_backups.push(WorkerNode::new(key));
                }
                continue;
            }

            if self.is_node_slow(node, baseline) {
                match self.config.handle_strategy {
                    HandleStrategy::RestartNode => {
                        warn!(
                            "检测到慢节点 {} (吞吐 {:.1}, 基线 {:.1}), 原地重启",
                            node.key, node.reported.throughput, baseline
                        );
                        operator.restart_node(&node.key).await?;
                        node.reset_for_relaunch();
                        self.metric.restart_node_kill_times += 1;
                    }
                    HandleStrategy::SpawnBackup if at_backup_cap => {
                        // 备份已达上限的组只能杀掉重建
                        warn!("慢节点 {} 所在组备份已达上限, 杀掉重建", node.key);
                        operator.kill_node(&node.key).await?;
                        node.reset_for_relaunch();
                        self.metric.slow_node_kill_times += 1;
                    }
                    HandleStrategy::SpawnBackup => {
                        if simple_handle_only {
                            continue;
                        }
                        let backup_id = Self::next_backup_id(status_mgr, &new_backups, &group_id);
                        let key = NodeKey::backup(node.key.role, node.key.partition_id, backup_id);
                        operator.launch_backup(&key).await?;
                        status_mgr.add_backup(&key);
                        self.metric.slow_node_backup_create_times += 1;
                        info!(
                            "慢节点 {} (吞吐 {:.1}, 基线 {:.1}), 拉起备份节点 {}",
                            node.key, node.reported.throughput, baseline, key
                        );
                        new_backups.push(WorkerNode::new(key));
                    }
                }
            }
        }

        nodes.extend(new_backups);

        self.metric.effective_backup_count = status_mgr.effective_backup_count();
        self.metric.refresh_effective_rate();
        Ok(self.metric.clone())
    }
}
