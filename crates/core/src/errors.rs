use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("配置错误: {0}")]
    Configuration(String),
    #[error("序列化错误: {0}")]
    Serialization(String),
    #[error("检查点存储错误: {0}")]
    CheckpointStore(String),
    #[error("任务未找到: {id}")]
    TaskNotFound { id: String },
    #[error("不支持的任务类型: {0}")]
    UnsupportedTaskType(String),
    #[error("任务流未找到: {id}")]
    FlowNotFound { id: u64 },
    #[error("无效的任务流定义: {0}")]
    InvalidFlowDefinition(String),
    #[error("资源未找到: {name}")]
    ResourceNotFound { name: String },
    #[error("任务状态 {current} 不允许操作: {operation}")]
    InvalidTaskState { current: String, operation: String },
    #[error("节点操作失败: {0}")]
    NodeOperation(String),
    #[error("内部错误: {0}")]
    Internal(String),
}

impl AdminError {
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
    pub fn serialization<S: Into<String>>(msg: S) -> Self {
        Self::Serialization(msg.into())
    }
    pub fn checkpoint_store<S: Into<String>>(msg: S) -> Self {
        Self::CheckpointStore(msg.into())
    }
    pub fn task_not_found<S: Into<String>>(id: S) -> Self {
        Self::TaskNotFound { id: id.into() }
    }
    pub fn resource_not_found<S: Into<String>>(name: S) -> Self {
        Self::ResourceNotFound { name: name.into() }
    }
    pub fn invalid_task_state<S: Into<String>>(current: S, operation: S) -> Self {
        Self::InvalidTaskState {
            current: current.into(),
            operation: operation.into(),
        }
    }
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<serde_json::Error> for AdminError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
