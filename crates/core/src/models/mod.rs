pub mod backup_info;
pub mod metric;
pub mod task;
pub mod worker_node;

pub use backup_info::BackupInfo;
pub use metric::SlowNodeMetric;
pub use task::{TaskProperties, TaskStatus, PROP_BACKUP_NODE_INFO};
pub use worker_node::{NodeKey, NodeRole, NodeStatusSnapshot, NodeTarget, WorkerNode};
