//! 测试数据builder

use chrono::{DateTime, Utc};

use admin_core::models::{NodeKey, NodeRole, WorkerNode};

/// WorkerNode 测试数据builder
pub struct WorkerNodeBuilder {
    node: WorkerNode,
}

impl WorkerNodeBuilder {
    pub fn new(role: NodeRole, partition_id: u32) -> Self {
        Self {
            node: WorkerNode::new(NodeKey::primary(role, partition_id)),
        }
    }

    pub fn backup(mut self, backup_id: u32) -> Self {
        self.node.key.backup_id = backup_id;
        self
    }

    pub fn finished(mut self) -> Self {
        self.node.finished = true;
        self.node.reported.finished = true;
        self
    }

    pub fn reported_finished(mut self) -> Self {
        self.node.reported.finished = true;
        self
    }

    pub fn suspended(mut self) -> Self {
        self.node.suspended = true;
        self.node.reported.suspended = true;
        self
    }

    pub fn reported_suspended(mut self) -> Self {
        self.node.reported.suspended = true;
        self
    }

    pub fn heartbeat_at(mut self, at: DateTime<Utc>) -> Self {
        self.node.reported.last_heartbeat = Some(at);
        self
    }

    pub fn throughput(mut self, qps: f64) -> Self {
        self.node.reported.throughput = qps;
        self
    }

    pub fn locator(mut self, locator: u64) -> Self {
        self.node.reported.locator = locator;
        self
    }

    pub fn build(self) -> WorkerNode {
        self.node
    }
}
