pub mod config;
pub mod errors;
pub mod local_store;
pub mod models;
pub mod traits;

pub use errors::*;
pub use local_store::LocalCheckpointStore;
pub use models::{
    BackupInfo, NodeKey, NodeRole, NodeStatusSnapshot, NodeTarget, SlowNodeMetric, TaskProperties,
    TaskStatus, WorkerNode, PROP_BACKUP_NODE_INFO,
};
pub use traits::{
    AlertReporter, AlertSeverity, CheckpointStore, LogAlertReporter, LoggingNodeOperator,
    NodeOperator, ResourceReader,
};

/// 统一的Result类型
pub type AdminResult<T> = std::result::Result<T, AdminError>;
