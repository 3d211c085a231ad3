use serde::{Deserialize, Serialize};

use super::validation::{ConfigValidator, ValidationUtils};
use crate::AdminResult;

/// 慢节点处置策略
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum HandleStrategy {
    /// 拉起备份节点与可疑主节点赛跑
    #[serde(rename = "spawn_backup")]
    SpawnBackup,
    /// 原地重启可疑节点
    #[serde(rename = "restart_node")]
    RestartNode,
}

impl Default for HandleStrategy {
    fn default() -> Self {
        HandleStrategy::SpawnBackup
    }
}

/// 慢节点检测配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlowNodeConfig {
    /// 是否启用慢节点检测
    pub enable_slow_detect: bool,
    /// 任务启动后多久才开始判定(秒)
    pub judge_start_seconds: i64,
    /// 心跳超时判死时间(秒)
    pub dead_node_timeout_seconds: i64,
    /// 每个角色组的备份节点上限
    pub max_backup_count_per_group: usize,
    /// 吞吐低于组内平均值的该比例判定为慢
    pub slow_qps_ratio: f64,
    /// 处置策略
    pub handle_strategy: HandleStrategy,
}

impl Default for SlowNodeConfig {
    fn default() -> Self {
        Self {
            enable_slow_detect: true,
            judge_start_seconds: 300,      // 启动5分钟内不判定
            dead_node_timeout_seconds: 90, // 90秒心跳超时判死
            max_backup_count_per_group: 1,
            slow_qps_ratio: 0.5,
            handle_strategy: HandleStrategy::default(),
        }
    }
}

impl ConfigValidator for SlowNodeConfig {
    fn validate(&self) -> AdminResult<()> {
        if self.judge_start_seconds < 0 {
            return Err(crate::AdminError::Configuration(format!(
                "slow_node.judge_start_seconds 不能为负数, 当前值: {}",
                self.judge_start_seconds
            )));
        }
        ValidationUtils::validate_positive_seconds(
            self.dead_node_timeout_seconds,
            "slow_node.dead_node_timeout_seconds",
        )?;
        ValidationUtils::validate_count(
            self.max_backup_count_per_group,
            "slow_node.max_backup_count_per_group",
            100,
        )?;
        ValidationUtils::validate_ratio(self.slow_qps_ratio, "slow_node.slow_qps_ratio")?;
        Ok(())
    }
}

/// 管控主循环配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// 控制循环间隔(毫秒)
    pub tick_interval_ms: u64,
    /// 检查点存储根目录
    pub checkpoint_root: String,
    /// 构建代数, 参与检查点路径
    pub generation: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            checkpoint_root: "checkpoints".to_string(),
            generation: 0,
        }
    }
}

impl ConfigValidator for ControllerConfig {
    fn validate(&self) -> AdminResult<()> {
        if self.tick_interval_ms == 0 {
            return Err(crate::AdminError::configuration(
                "controller.tick_interval_ms 必须为正数",
            ));
        }
        ValidationUtils::validate_not_empty(&self.checkpoint_root, "controller.checkpoint_root")?;
        Ok(())
    }
}

/// 告警上报配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    pub enabled: bool,
    /// 慢节点状态告警的最小上报间隔(秒)
    pub min_report_interval_seconds: i64,
}

/// 默认告警上报间隔
pub const DEFAULT_ALERT_REPORT_INTERVAL_SECONDS: i64 = 60;

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_report_interval_seconds: DEFAULT_ALERT_REPORT_INTERVAL_SECONDS,
        }
    }
}

impl ConfigValidator for AlertConfig {
    fn validate(&self) -> AdminResult<()> {
        ValidationUtils::validate_positive_seconds(
            self.min_report_interval_seconds,
            "alert.min_report_interval_seconds",
        )?;
        Ok(())
    }
}
