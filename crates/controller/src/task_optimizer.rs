use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// 待合并的任务描述
///
/// range_from/range_to 为闭区间的分区范围。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub task_id: String,
    pub task_type: String,
    pub cluster: String,
    pub build_step: String,
    pub config_path: String,
    pub range_from: u32,
    pub range_to: u32,
}

impl TaskDescriptor {
    /// 合并分桶键: 只有同集群同步骤同配置的任务才可合并
    fn merge_key(&self) -> (String, String, String) {
        (
            self.cluster.clone(),
            self.build_step.clone(),
            self.config_path.clone(),
        )
    }
}

/// 同类任务的合并优化接口
pub trait TaskOptimizer: Send + Sync {
    /// 吸纳一个待优化任务
    fn collect(&mut self, descriptor: TaskDescriptor);

    /// 产出合并后的任务集合并清空内部缓存
    fn optimize(&mut self) -> Vec<TaskDescriptor>;
}

/// 连续分区范围合并器
///
/// 同一 (cluster, build_step, config_path) 下, 区间首尾相接的任务
/// 合并为一个更宽的任务; 有空洞则保持分段。
pub struct RangeMergeOptimizer {
    pending: Vec<TaskDescriptor>,
}

impl RangeMergeOptimizer {
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
        }
    }
}

impl Default for RangeMergeOptimizer {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskOptimizer for RangeMergeOptimizer {
    fn collect(&mut self, descriptor: TaskDescriptor) {
        self.pending.push(descriptor);
    }

    fn optimize(&mut self) -> Vec<TaskDescriptor> {
        let mut buckets: BTreeMap<(String, String, String), Vec<TaskDescriptor>> = BTreeMap::new();
        for descriptor in self.pending.drain(..) {
            buckets.entry(descriptor.merge_key()).or_default().push(descriptor);
        }

        let mut merged = Vec::new();
        for (_, mut bucket) in buckets {
            bucket.sort_by_key(|d| (d.range_from, d.range_to));
            let mut iter = bucket.into_iter();
            let mut current = match iter.next() {
                Some(first) => first,
                None => continue,
            };
            for next in iter {
                // 闭区间首尾相接才合并, 重叠视为调用方配置错误也一并吸收
                if next.range_from <= current.range_to.saturating_add(1) {
                    if next.range_to > current.range_to {
                        current.range_to = next.range_to;
                    }
                    debug!(
                        "合并任务 {} 入 {} ({}..={})",
                        next.task_id, current.task_id, current.range_from, current.range_to
                    );
                } else {
                    merged.push(std::mem::replace(&mut current, next));
                }
            }
            merged.push(current);
        }
        merged
    }
}

/// 优化器工厂: 按任务类型惰性创建并缓存优化器实例
pub struct TaskOptimizerFactory {
    optimizers: HashMap<String, Box<dyn TaskOptimizer>>,
}

impl TaskOptimizerFactory {
    pub fn new() -> Self {
        Self {
            optimizers: HashMap::new(),
        }
    }

    /// 同类型多次获取返回同一实例, 已吸纳的任务不丢失
    pub fn get_optimizer(&mut self, task_type: &str) -> &mut dyn TaskOptimizer {
        self.optimizers
            .entry(task_type.to_string())
            .or_insert_with(|| Box::new(RangeMergeOptimizer::new()))
            .as_mut()
    }

    pub fn optimizer_count(&self) -> usize {
        self.optimizers.len()
    }
}

impl Default for TaskOptimizerFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(id: &str, cluster: &str, from: u32, to: u32) -> TaskDescriptor {
        TaskDescriptor {
            task_id: id.to_string(),
            task_type: "builder".to_string(),
            cluster: cluster.to_string(),
            build_step: "full".to_string(),
            config_path: "/conf/a".to_string(),
            range_from: from,
            range_to: to,
        }
    }

    #[test]
    fn test_contiguous_ranges_merge() {
        let mut optimizer = RangeMergeOptimizer::new();
        optimizer.collect(descriptor("t1", "c1", 0, 3));
        optimizer.collect(descriptor("t2", "c1", 4, 7));
        optimizer.collect(descriptor("t3", "c1", 8, 15));

        let merged = optimizer.optimize();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].range_from, 0);
        assert_eq!(merged[0].range_to, 15);
    }

    #[test]
    fn test_gap_keeps_segments() {
        let mut optimizer = RangeMergeOptimizer::new();
        optimizer.collect(descriptor("t1", "c1", 0, 3));
        optimizer.collect(descriptor("t2", "c1", 6, 9));

        let merged = optimizer.optimize();
        assert_eq!(merged.len(), 2);
        assert_eq!((merged[0].range_from, merged[0].range_to), (0, 3));
        assert_eq!((merged[1].range_from, merged[1].range_to), (6, 9));
    }

    #[test]
    fn test_different_clusters_never_merge() {
        let mut optimizer = RangeMergeOptimizer::new();
        optimizer.collect(descriptor("t1", "c1", 0, 3));
        optimizer.collect(descriptor("t2", "c2", 4, 7));

        let merged = optimizer.optimize();
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_unsorted_input_merges() {
        let mut optimizer = RangeMergeOptimizer::new();
        optimizer.collect(descriptor("t2", "c1", 4, 7));
        optimizer.collect(descriptor("t1", "c1", 0, 3));

        let merged = optimizer.optimize();
        assert_eq!(merged.len(), 1);
        assert_eq!((merged[0].range_from, merged[0].range_to), (0, 7));
    }

    #[test]
    fn test_optimize_drains_pending() {
        let mut optimizer = RangeMergeOptimizer::new();
        optimizer.collect(descriptor("t1", "c1", 0, 3));
        assert_eq!(optimizer.optimize().len(), 1);
        assert!(optimizer.optimize().is_empty());
    }

    #[test]
    fn test_factory_caches_per_type() {
        let mut factory = TaskOptimizerFactory::new();
        factory
            .get_optimizer("builder")
            .collect(descriptor("t1", "c1", 0, 3));
        factory
            .get_optimizer("builder")
            .collect(descriptor("t2", "c1", 4, 7));
        factory
            .get_optimizer("merger")
            .collect(descriptor("t3", "c1", 0, 3));

        assert_eq!(factory.optimizer_count(), 2);
        let merged = factory.get_optimizer("builder").optimize();
        assert_eq!(merged.len(), 1);
        assert_eq!((merged[0].range_from, merged[0].range_to), (0, 7));
    }
}
