//! 任务流编排
//!
//! 把构建任务组织成带依赖门控的有向流图: 外部驱动每个tick对所有活跃
//! 流调用一次 step_run, 流推进自己名下的任务并按任务结果推导流状态。
//! 整个流集合可序列化为单个检查点文档用于崩溃恢复。

pub mod flow_container;
pub mod flow_factory;
pub mod task_flow;

pub use flow_container::FlowContainer;
pub use flow_factory::{FlowDefinition, FlowFactory};
pub use task_flow::{FlowStatus, FlowTask, FlowUpstream, TaskFlow};
