//! 构建任务管控
//!
//! 单个构建任务内的控制面逻辑: 节点状态簿记、慢节点投机执行、
//! 任务生命周期状态机与备份信息检查点, 以及任务级共享资源管理。

pub mod admin_task;
pub mod build_phase_task;
pub mod node_status_manager;
pub mod resource_manager;
pub mod slow_node_detector;
pub mod task_container;
pub mod task_optimizer;

pub use admin_task::{AdminTask, TaskBase};
pub use build_phase_task::BuildPhaseTask;
pub use node_status_manager::{FinishedCheck, NodeStatusManager};
pub use resource_manager::{ResourceGuard, ResourceKeeper, TaskResourceManager};
pub use slow_node_detector::SlowNodeDetector;
pub use task_container::{DefaultTaskFactory, TaskContainer, TaskFactory};
pub use task_optimizer::{RangeMergeOptimizer, TaskDescriptor, TaskOptimizer, TaskOptimizerFactory};
