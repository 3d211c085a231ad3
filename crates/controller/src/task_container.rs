use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use admin_core::config::{AlertConfig, SlowNodeConfig};
use admin_core::models::NodeRole;
use admin_core::traits::{AlertReporter, NodeOperator};
use admin_core::{AdminError, AdminResult};

use crate::admin_task::AdminTask;
use crate::build_phase_task::BuildPhaseTask;
use crate::resource_manager::TaskResourceManager;

/// 具体任务的创建接口
///
/// 流编排层只依赖 (id, type) 的创建/查找契约。
pub trait TaskFactory: Send + Sync {
    fn create_task(&self, task_id: &str, task_type: &str) -> AdminResult<Box<dyn AdminTask>>;
}

/// 默认任务工厂: 按类型字符串实例化构建阶段任务
///
/// 持有本构建任务作用域内的协作方句柄与资源管理器, 不跨任务共享。
pub struct DefaultTaskFactory {
    operator: Arc<dyn NodeOperator>,
    reporter: Arc<dyn AlertReporter>,
    resource_manager: Arc<TaskResourceManager>,
    slow_node_config: SlowNodeConfig,
    alert_config: AlertConfig,
}

impl DefaultTaskFactory {
    pub fn new(
        operator: Arc<dyn NodeOperator>,
        reporter: Arc<dyn AlertReporter>,
        resource_manager: Arc<TaskResourceManager>,
        slow_node_config: SlowNodeConfig,
        alert_config: AlertConfig,
    ) -> Self {
        Self {
            operator,
            reporter,
            resource_manager,
            slow_node_config,
            alert_config,
        }
    }

    pub fn resource_manager(&self) -> Arc<TaskResourceManager> {
        self.resource_manager.clone()
    }
}

impl TaskFactory for DefaultTaskFactory {
    fn create_task(&self, task_id: &str, task_type: &str) -> AdminResult<Box<dyn AdminTask>> {
        let role = NodeRole::from_task_type(task_type)
            .ok_or_else(|| AdminError::UnsupportedTaskType(task_type.to_string()))?;
        Ok(Box::new(BuildPhaseTask::new(
            task_id,
            role,
            self.slow_node_config.clone(),
            self.operator.clone(),
            self.reporter.clone(),
            self.alert_config.min_report_interval_seconds,
        )))
    }
}

/// 任务注册表: 按 id 跟踪在管任务
pub struct TaskContainer {
    tasks: Mutex<BTreeMap<String, Arc<Mutex<Box<dyn AdminTask>>>>>,
}

impl TaskContainer {
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(BTreeMap::new()),
        }
    }

    /// 幂等的创建或查找
    pub async fn declare_task(
        &self,
        factory: &dyn TaskFactory,
        task_id: &str,
        task_type: &str,
    ) -> AdminResult<Arc<Mutex<Box<dyn AdminTask>>>> {
        let mut tasks = self.tasks.lock().await;
        if let Some(task) = tasks.get(task_id) {
            return Ok(task.clone());
        }
        let task = Arc::new(Mutex::new(factory.create_task(task_id, task_type)?));
        tasks.insert(task_id.to_string(), task.clone());
        debug!("登记任务 {} (类型 {})", task_id, task_type);
        Ok(task)
    }

    pub async fn get_task(&self, task_id: &str) -> Option<Arc<Mutex<Box<dyn AdminTask>>>> {
        self.tasks.lock().await.get(task_id).cloned()
    }

    pub async fn remove_task(&self, task_id: &str) -> bool {
        self.tasks.lock().await.remove(task_id).is_some()
    }

    pub async fn task_ids(&self) -> Vec<String> {
        self.tasks.lock().await.keys().cloned().collect()
    }

    pub async fn clear(&self) {
        self.tasks.lock().await.clear();
    }
}

impl Default for TaskContainer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use admin_core::traits::{LogAlertReporter, LoggingNodeOperator};

    fn test_factory() -> DefaultTaskFactory {
        DefaultTaskFactory::new(
            Arc::new(LoggingNodeOperator),
            Arc::new(LogAlertReporter),
            Arc::new(TaskResourceManager::new()),
            SlowNodeConfig::default(),
            AlertConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_declare_task_is_idempotent() {
        let container = TaskContainer::new();
        let factory = test_factory();

        let a = container
            .declare_task(&factory, "job1.builder", "builder")
            .await
            .unwrap();
        let b = container
            .declare_task(&factory, "job1.builder", "builder")
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(container.task_ids().await, vec!["job1.builder".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_task_type_fails() {
        let container = TaskContainer::new();
        let factory = test_factory();
        let result = container.declare_task(&factory, "x", "shuffler").await;
        assert!(matches!(result, Err(AdminError::UnsupportedTaskType(_))));
    }

    #[tokio::test]
    async fn test_remove_task() {
        let container = TaskContainer::new();
        let factory = test_factory();
        container
            .declare_task(&factory, "t1", "merger")
            .await
            .unwrap();
        assert!(container.remove_task("t1").await);
        assert!(!container.remove_task("t1").await);
        assert!(container.get_task("t1").await.is_none());
    }
}
