use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::errors::AdminError;
use crate::traits::CheckpointStore;
use crate::AdminResult;

/// 本地文件检查点存储
///
/// 键按相对路径落盘到根目录下, 供单机部署与测试使用;
/// 生产部署替换为分布式存储的 CheckpointStore 实现。
pub struct LocalCheckpointStore {
    root: PathBuf,
}

impl LocalCheckpointStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, key: &str) -> AdminResult<PathBuf> {
        // 拒绝越出根目录的键
        if key.is_empty() || key.starts_with('/') || key.split('/').any(|seg| seg == "..") {
            return Err(AdminError::checkpoint_store(format!("非法的检查点键: {key}")));
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl CheckpointStore for LocalCheckpointStore {
    async fn write(&self, key: &str, content: &str) -> AdminResult<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AdminError::checkpoint_store(format!("创建目录失败: {e}")))?;
        }
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| AdminError::checkpoint_store(format!("写入 {key} 失败: {e}")))?;
        debug!("检查点已写入: {}", key);
        Ok(())
    }

    async fn read(&self, key: &str) -> AdminResult<Option<String>> {
        let path = self.path_for(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AdminError::checkpoint_store(format!("读取 {key} 失败: {e}"))),
        }
    }

    async fn remove(&self, key: &str) -> AdminResult<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AdminError::checkpoint_store(format!("删除 {key} 失败: {e}"))),
        }
    }
}
