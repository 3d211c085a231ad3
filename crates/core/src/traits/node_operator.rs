use async_trait::async_trait;
use tracing::info;

use crate::models::NodeKey;
use crate::AdminResult;

/// 节点进程操作接口
///
/// 慢节点处置的落地动作, 具体通信协议(心跳下发、进程拉起)由外部实现。
#[async_trait]
pub trait NodeOperator: Send + Sync {
    /// 杀掉节点进程, 调度系统随后重建
    async fn kill_node(&self, key: &NodeKey) -> AdminResult<()>;

    /// 原地重启节点进程
    async fn restart_node(&self, key: &NodeKey) -> AdminResult<()>;

    /// 拉起备份节点进程
    async fn launch_backup(&self, key: &NodeKey) -> AdminResult<()>;
}

/// 只记日志的节点操作实现, 用于单机运行与演练
pub struct LoggingNodeOperator;

#[async_trait]
impl NodeOperator for LoggingNodeOperator {
    async fn kill_node(&self, key: &NodeKey) -> AdminResult<()> {
        info!("下发杀节点指令: {}", key);
        Ok(())
    }

    async fn restart_node(&self, key: &NodeKey) -> AdminResult<()> {
        info!("下发重启节点指令: {}", key);
        Ok(())
    }

    async fn launch_backup(&self, key: &NodeKey) -> AdminResult<()> {
        info!("下发拉起备份节点指令: {}", key);
        Ok(())
    }
}
