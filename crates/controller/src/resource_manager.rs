use std::any::{type_name, Any};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use admin_core::traits::ResourceReader;
use admin_core::{AdminError, AdminResult};

/// 命名外部共享资源的句柄定义(可序列化)
///
/// 只持久化定义; 活的引用计数在恢复时通过重放 apply_resource 重建。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceKeeper {
    pub name: String,
    pub keeper_type: String,
    pub params: BTreeMap<String, String>,
}

#[derive(Debug)]
struct KeeperState {
    keeper: ResourceKeeper,
    ref_count: AtomicUsize,
    teardown_times: AtomicUsize,
}

/// 作用域化的资源引用
///
/// drop 时递减引用计数, 最后一个引用释放触发资源下线。
pub struct ResourceGuard {
    state: Arc<KeeperState>,
    role_name: String,
}

impl ResourceGuard {
    pub fn resource_name(&self) -> &str {
        &self.state.keeper.name
    }

    pub fn role_name(&self) -> &str {
        &self.role_name
    }
}

impl Drop for ResourceGuard {
    fn drop(&mut self) {
        if self.state.ref_count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.state.teardown_times.fetch_add(1, Ordering::SeqCst);
            info!(
                "资源 {} 引用归零, 触发下线 (角色 {})",
                self.state.keeper.name, self.role_name
            );
        }
    }
}

/// 单个构建任务作用域内的共享资源管理器
///
/// 一个构建任务一个实例, 绝不跨任务共享; 内部状态由管理器级互斥保护。
pub struct TaskResourceManager {
    keepers: Mutex<BTreeMap<String, Arc<KeeperState>>>,
    /// 任务内单例交换用的类型化注册表
    typed: Mutex<BTreeMap<String, Arc<dyn Any + Send + Sync>>>,
}

impl TaskResourceManager {
    pub fn new() -> Self {
        Self {
            keepers: Mutex::new(BTreeMap::new()),
            typed: Mutex::new(BTreeMap::new()),
        }
    }

    /// 幂等的创建或查找命名资源句柄
    pub async fn declare_resource_keeper(
        &self,
        keeper_type: &str,
        name: &str,
        params: BTreeMap<String, String>,
    ) -> ResourceKeeper {
        let mut keepers = self.keepers.lock().await;
        if let Some(state) = keepers.get(name) {
            return state.keeper.clone();
        }
        let keeper = ResourceKeeper {
            name: name.to_string(),
            keeper_type: keeper_type.to_string(),
            params,
        };
        keepers.insert(
            name.to_string(),
            Arc::new(KeeperState {
                keeper: keeper.clone(),
                ref_count: AtomicUsize::new(0),
                teardown_times: AtomicUsize::new(0),
            }),
        );
        debug!("声明资源 {} (类型 {})", name, keeper_type);
        keeper
    }

    /// 检出一个命名资源的作用域引用
    ///
    /// 未知资源或定义解析失败都视为检出方操作的硬失败。
    pub async fn apply_resource(
        &self,
        role_name: &str,
        resource_name: &str,
        reader: &dyn ResourceReader,
    ) -> AdminResult<ResourceGuard> {
        let keepers = self.keepers.lock().await;
        let state = keepers
            .get(resource_name)
            .cloned()
            .ok_or_else(|| AdminError::resource_not_found(resource_name))?;
        drop(keepers);

        reader.read(resource_name)?;

        state.ref_count.fetch_add(1, Ordering::SeqCst);
        debug!("角色 {} 检出资源 {}", role_name, resource_name);
        Ok(ResourceGuard {
            state,
            role_name: role_name.to_string(),
        })
    }

    pub async fn ref_count(&self, resource_name: &str) -> Option<usize> {
        self.keepers
            .lock()
            .await
            .get(resource_name)
            .map(|s| s.ref_count.load(Ordering::SeqCst))
    }

    pub async fn teardown_times(&self, resource_name: &str) -> Option<usize> {
        self.keepers
            .lock()
            .await
            .get(resource_name)
            .map(|s| s.teardown_times.load(Ordering::SeqCst))
    }

    /// 注册任务内单例(配置访问器、上报器等), 以类型名为默认键
    pub async fn add_resource<T: Any + Send + Sync>(&self, value: Arc<T>) {
        self.add_resource_with_id(type_name::<T>(), value).await;
    }

    pub async fn add_resource_with_id<T: Any + Send + Sync>(&self, id: &str, value: Arc<T>) {
        self.typed.lock().await.insert(id.to_string(), value);
    }

    pub async fn get_resource<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.get_resource_by_id(type_name::<T>()).await
    }

    pub async fn get_resource_by_id<T: Any + Send + Sync>(&self, id: &str) -> Option<Arc<T>> {
        let typed = self.typed.lock().await;
        typed
            .get(id)
            .cloned()
            .and_then(|any| any.downcast::<T>().ok())
    }

    /// 检查点: 只序列化资源句柄定义
    pub async fn serialize_resource_keepers(&self) -> AdminResult<String> {
        let keepers = self.keepers.lock().await;
        let defs: BTreeMap<&String, &ResourceKeeper> =
            keepers.iter().map(|(k, v)| (k, &v.keeper)).collect();
        serde_json::to_string(&defs).map_err(|e| AdminError::serialization(e.to_string()))
    }

    /// 从检查点恢复资源句柄定义, 引用计数归零等待重放
    pub async fn deserialize_resource_keepers(&self, raw: &str) -> AdminResult<()> {
        let defs: BTreeMap<String, ResourceKeeper> = serde_json::from_str(raw)
            .map_err(|e| AdminError::serialization(format!("资源定义解析失败: {e}")))?;
        let mut keepers = self.keepers.lock().await;
        keepers.clear();
        for (name, keeper) in defs {
            keepers.insert(
                name,
                Arc::new(KeeperState {
                    keeper,
                    ref_count: AtomicUsize::new(0),
                    teardown_times: AtomicUsize::new(0),
                }),
            );
        }
        Ok(())
    }
}

impl Default for TaskResourceManager {
    fn default() -> Self {
        Self::new()
    }
}
