use async_trait::async_trait;

use crate::AdminResult;

/// 检查点存储
///
/// 以 job/generation 路径为键读写结构化文档, 任务状态、备份信息与
/// 流图状态都经由它持久化; 具体存储介质由外部实现。
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn write(&self, key: &str, content: &str) -> AdminResult<()>;

    async fn read(&self, key: &str) -> AdminResult<Option<String>>;

    async fn remove(&self, key: &str) -> AdminResult<()>;
}
