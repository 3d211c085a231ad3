use serde::{Deserialize, Serialize};

/// 慢节点处理的累计指标
///
/// 每轮检测返回一份快照, 与上一次上报的值比较, 只有发生变化才触发告警。
/// 所有计数只增不减。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlowNodeMetric {
    /// 慢节点被杀掉重建的次数
    pub slow_node_kill_times: u64,
    /// 死节点被杀掉重建的次数
    pub dead_node_kill_times: u64,
    /// 慢节点被原地重启的次数
    pub restart_node_kill_times: u64,
    /// 备份节点创建次数
    pub slow_node_backup_create_times: u64,
    /// 备份节点抢先完成的角色组数
    pub effective_backup_count: u64,
    /// effective_backup_count / slow_node_backup_create_times
    pub effective_backup_rate: f64,
}

impl SlowNodeMetric {
    pub fn refresh_effective_rate(&mut self) {
        self.effective_backup_rate = if self.slow_node_backup_create_times > 0 {
            self.effective_backup_count as f64 / self.slow_node_backup_create_times as f64
        } else {
            0.0
        };
    }

    pub fn has_handled_any(&self) -> bool {
        self.slow_node_kill_times > 0
            || self.dead_node_kill_times > 0
            || self.restart_node_kill_times > 0
            || self.slow_node_backup_create_times > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_rate() {
        let mut metric = SlowNodeMetric::default();
        metric.refresh_effective_rate();
        assert_eq!(metric.effective_backup_rate, 0.0);

        metric.slow_node_backup_create_times = 4;
        metric.effective_backup_count = 1;
        metric.refresh_effective_rate();
        assert_eq!(metric.effective_backup_rate, 0.25);
    }

    #[test]
    fn test_change_gating_by_equality() {
        let a = SlowNodeMetric::default();
        let mut b = a.clone();
        assert_eq!(a, b);

        b.dead_node_kill_times += 1;
        assert_ne!(a, b);
    }
}
