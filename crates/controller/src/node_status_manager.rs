use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use admin_core::models::{BackupInfo, NodeKey, WorkerNode};
use admin_core::AdminResult;

/// 完成检查的输出
///
/// 只描述结论, 不产生副作用; finished/suspended 标记由调用方落实。
#[derive(Debug, Clone, Default)]
pub struct FinishedCheck {
    pub all_finished: bool,
    pub finished_nodes: Vec<NodeKey>,
    pub finished_groups: Vec<String>,
}

/// 按角色组维护节点状态与备份簿记
///
/// 角色组 = 同一 (角色, 分区) 的主节点与全部备份节点。
/// 不变式: 组内任一成员完成即视为组完成, 从不要求全部成员完成。
#[derive(Debug, Default)]
pub struct NodeStatusManager {
    /// 最近一次同步的 角色组 -> 成员 快照
    group_members: BTreeMap<String, Vec<NodeKey>>,
    /// 已记录完成的角色组(幂等)
    finished_groups: BTreeSet<String>,
    /// 由备份节点抢先完成的角色组
    effective_backup_groups: BTreeSet<String>,
    backup_info: BackupInfo,
}

impl NodeStatusManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以最新上报的节点集重建状态快照
    ///
    /// 同一轮控制循环内必须先于慢节点检测与完成检查执行。
    pub fn update(&mut self, nodes: &[WorkerNode]) {
        self.group_members.clear();
        for node in nodes {
            self.group_members
                .entry(node.key.group_id())
                .or_default()
                .push(node.key);
        }
    }

    /// 完成检查: 组内任一成员(主或备)完成即组完成
    ///
    /// 空节点集退化为"已经完成", 不是错误。
    pub fn check_finished(&mut self, nodes: &[WorkerNode]) -> FinishedCheck {
        let mut groups: BTreeMap<String, Vec<&WorkerNode>> = BTreeMap::new();
        for node in nodes {
            groups.entry(node.key.group_id()).or_default().push(node);
        }

        let mut check = FinishedCheck {
            all_finished: true,
            ..Default::default()
        };

        for (group_id, members) in &groups {
            let group_finished = members
                .iter()
                .any(|n| n.finished || n.reported.finished);
            if !group_finished {
                check.all_finished = false;
                continue;
            }

            let primary_finished = members
                .iter()
                .any(|n| n.is_primary() && (n.finished || n.reported.finished));
            if !primary_finished && self.effective_backup_groups.insert(group_id.clone()) {
                debug!("角色组 {} 由备份节点抢先完成", group_id);
            }

            if self.finished_groups.insert(group_id.clone()) {
                debug!("角色组 {} 已完成", group_id);
            }
            check.finished_groups.push(group_id.clone());
            // 组完成后所有成员(包括未完成的主节点)都标记完成
            for member in members {
                check.finished_nodes.push(member.key);
            }
        }

        check
    }

    pub fn group_count(&self) -> usize {
        self.group_members.len()
    }

    pub fn effective_backup_count(&self) -> u64 {
        self.effective_backup_groups.len() as u64
    }

    pub fn is_group_finished(&self, group_id: &str) -> bool {
        self.finished_groups.contains(group_id)
    }

    /// 登记一个新备份节点
    pub fn add_backup(&mut self, key: &NodeKey) {
        self.backup_info.add(&key.group_id(), key.backup_id);
    }

    pub fn backup_count(&self, group_id: &str) -> usize {
        self.backup_info.backup_count(group_id)
    }

    pub fn backup_info(&self) -> &BackupInfo {
        &self.backup_info
    }

    pub fn set_backup_info(&mut self, info: BackupInfo) {
        self.backup_info = info;
    }

    pub fn clear_backup_info(&mut self) {
        self.backup_info = BackupInfo::new();
    }

    pub fn serialize_back_info(&self) -> AdminResult<String> {
        self.backup_info.to_json()
    }

    pub fn deserialize_back_info(&mut self, raw: &str) -> AdminResult<()> {
        self.backup_info = BackupInfo::from_json(raw)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use admin_core::models::NodeRole;
    use admin_testing_utils::WorkerNodeBuilder;

    #[test]
    fn test_group_finished_iff_any_member_finished() {
        let mut mgr = NodeStatusManager::new();
        let nodes = vec![
            WorkerNodeBuilder::new(NodeRole::Builder, 0).finished().build(),
            WorkerNodeBuilder::new(NodeRole::Builder, 0).backup(1).build(),
            WorkerNodeBuilder::new(NodeRole::Builder, 1).build(),
        ];

        mgr.update(&nodes);
        let check = mgr.check_finished(&nodes);

        assert!(!check.all_finished);
        assert_eq!(check.finished_groups, vec!["builder.0".to_string()]);
        // 组完成后未完成的备份成员也在待标记列表里
        assert_eq!(check.finished_nodes.len(), 2);
        assert!(mgr.is_group_finished("builder.0"));
        assert!(!mgr.is_group_finished("builder.1"));
    }

    #[test]
    fn test_backup_finishing_first_counts_effective_backup_once() {
        let mut mgr = NodeStatusManager::new();
        let nodes = vec![
            WorkerNodeBuilder::new(NodeRole::Processor, 0).build(),
            WorkerNodeBuilder::new(NodeRole::Processor, 0)
                .backup(1)
                .finished()
                .build(),
        ];

        mgr.update(&nodes);
        let check = mgr.check_finished(&nodes);
        assert!(check.all_finished);
        assert_eq!(mgr.effective_backup_count(), 1);

        // 重复检查保持幂等
        let _ = mgr.check_finished(&nodes);
        assert_eq!(mgr.effective_backup_count(), 1);
    }

    #[test]
    fn test_primary_finishing_is_not_effective_backup() {
        let mut mgr = NodeStatusManager::new();
        let nodes = vec![
            WorkerNodeBuilder::new(NodeRole::Builder, 0).finished().build(),
            WorkerNodeBuilder::new(NodeRole::Builder, 0).backup(1).build(),
        ];

        mgr.update(&nodes);
        let check = mgr.check_finished(&nodes);
        assert!(check.all_finished);
        assert_eq!(mgr.effective_backup_count(), 0);
    }

    #[test]
    fn test_empty_node_set_degenerates_to_done() {
        let mut mgr = NodeStatusManager::new();
        mgr.update(&[]);
        let check = mgr.check_finished(&[]);
        assert!(check.all_finished);
        assert!(check.finished_nodes.is_empty());
        assert!(check.finished_groups.is_empty());
    }

    #[test]
    fn test_back_info_round_trip() {
        let mut mgr = NodeStatusManager::new();
        mgr.add_backup(&NodeKey::backup(NodeRole::Builder, 2, 1));
        mgr.add_backup(&NodeKey::backup(NodeRole::Processor, 0, 1));

        let raw = mgr.serialize_back_info().unwrap();
        let mut restored = NodeStatusManager::new();
        restored.deserialize_back_info(&raw).unwrap();
        assert_eq!(restored.serialize_back_info().unwrap(), raw);
        assert_eq!(restored.backup_count("builder.2"), 1);
    }
}
