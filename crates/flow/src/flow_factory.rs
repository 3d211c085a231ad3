use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tracing::info;

use admin_core::{AdminError, AdminResult};

use crate::task_flow::{FlowTask, FlowUpstream, TaskFlow};

/// 声明式流定义文件的结构
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowDefinition {
    pub graph_name: String,
    pub tasks: Vec<FlowDefinitionTask>,
    #[serde(default)]
    pub upstream: Vec<FlowUpstream>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowDefinitionTask {
    pub task_type: String,
    /// 同一流里出现多个同类型任务时用来区分; 缺省用任务类型
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

/// 流工厂: 分配数值流id并从声明式定义构造流
pub struct FlowFactory {
    next_id: AtomicU64,
}

impl FlowFactory {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
        }
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// 恢复后把计数器推进到已分配id之后, 避免复用
    pub fn advance_to(&self, next_id: u64) {
        self.next_id.fetch_max(next_id, Ordering::SeqCst);
    }

    /// 从 root_path/file_name 的JSON定义文件构造流
    pub async fn create_flow(
        &self,
        root_path: &Path,
        file_name: &str,
        global_params: BTreeMap<String, String>,
    ) -> AdminResult<TaskFlow> {
        let path = root_path.join(file_name);
        let raw = tokio::fs::read_to_string(&path).await.map_err(|e| {
            AdminError::InvalidFlowDefinition(format!("读取流定义 {} 失败: {e}", path.display()))
        })?;
        let definition: FlowDefinition = serde_json::from_str(&raw).map_err(|e| {
            AdminError::InvalidFlowDefinition(format!("解析流定义 {} 失败: {e}", path.display()))
        })?;
        if definition.tasks.is_empty() {
            return Err(AdminError::InvalidFlowDefinition(format!(
                "流定义 {} 不含任何任务",
                path.display()
            )));
        }

        let flow_id = self.allocate_id();
        let mut flow = TaskFlow::new(flow_id, &definition.graph_name);
        flow.global_params = global_params;
        flow.upstream = definition.upstream;
        flow.tags = definition.tags;
        for task in &definition.tasks {
            let name = task.name.as_deref().unwrap_or(&task.task_type);
            flow.tasks.push(FlowTask {
                task_id: format!("{flow_id}.{name}"),
                task_type: task.task_type.clone(),
                params: task.params.clone(),
                properties: BTreeMap::new(),
            });
        }

        info!(
            "从定义 {} 创建任务流 {} ({})",
            file_name, flow.flow_id, flow.graph_name
        );
        Ok(flow)
    }

    /// 临时的单任务流
    pub fn create_simple_flow(
        &self,
        task_type: &str,
        params: BTreeMap<String, String>,
        tags: Vec<String>,
        upstream: Vec<FlowUpstream>,
    ) -> TaskFlow {
        let flow_id = self.allocate_id();
        let mut flow = TaskFlow::new(flow_id, task_type);
        flow.tags = tags;
        flow.upstream = upstream;
        flow.tasks.push(FlowTask {
            task_id: format!("{flow_id}.{task_type}"),
            task_type: task_type.to_string(),
            params,
            properties: BTreeMap::new(),
        });
        info!("创建单任务流 {} ({})", flow.flow_id, task_type);
        flow
    }
}

impl Default for FlowFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task_flow::FlowStatus;
    use std::io::Write;

    #[test]
    fn test_simple_flow_ids_are_sequential() {
        let factory = FlowFactory::new();
        let f1 = factory.create_simple_flow("builder", BTreeMap::new(), vec![], vec![]);
        let f2 = factory.create_simple_flow("merger", BTreeMap::new(), vec![], vec![]);
        assert_eq!(f1.flow_id, "1");
        assert_eq!(f2.flow_id, "2");
        assert_eq!(f2.tasks[0].task_id, "2.merger");
        assert_eq!(f2.status, FlowStatus::Inactive);
    }

    #[test]
    fn test_advance_to_skips_used_ids() {
        let factory = FlowFactory::new();
        factory.advance_to(100);
        let flow = factory.create_simple_flow("builder", BTreeMap::new(), vec![], vec![]);
        assert_eq!(flow.flow_id, "100");
    }

    #[tokio::test]
    async fn test_create_flow_from_definition() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("full_build.json")).unwrap();
        file.write_all(
            br#"{
                "graph_name": "full_build",
                "tasks": [
                    {"task_type": "processor"},
                    {"task_type": "builder", "params": {"partition_count": "8"}}
                ],
                "tags": ["main"]
            }"#,
        )
        .unwrap();

        let factory = FlowFactory::new();
        let mut global = BTreeMap::new();
        global.insert("partition_count".to_string(), "4".to_string());
        let flow = factory
            .create_flow(dir.path(), "full_build.json", global)
            .await
            .unwrap();

        assert_eq!(flow.graph_name, "full_build");
        assert_eq!(flow.tasks.len(), 2);
        assert_eq!(flow.tasks[0].task_id, "1.processor");
        assert!(flow.has_tag("main"));
    }

    #[tokio::test]
    async fn test_definition_without_tasks_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("empty.json"),
            r#"{"graph_name": "empty", "tasks": []}"#,
        )
        .unwrap();

        let factory = FlowFactory::new();
        let result = factory
            .create_flow(dir.path(), "empty.json", BTreeMap::new())
            .await;
        assert!(matches!(
            result,
            Err(AdminError::InvalidFlowDefinition(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_definition_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let factory = FlowFactory::new();
        assert!(factory
            .create_flow(dir.path(), "nope.json", BTreeMap::new())
            .await
            .is_err());
    }
}
