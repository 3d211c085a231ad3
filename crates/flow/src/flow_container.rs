use std::collections::BTreeMap;

use tokio::sync::RwLock;
use tracing::{debug, info};

use admin_controller::{TaskContainer, TaskFactory};
use admin_core::{AdminError, AdminResult};

use crate::task_flow::{FlowStatus, TaskFlow};

/// 流集合的属主
///
/// 按数值流id排序存放, 序列化为单个JSON文档时键序即数值序,
/// 反序列化后再序列化逐字节一致。
pub struct FlowContainer {
    flows: RwLock<BTreeMap<u64, TaskFlow>>,
}

impl FlowContainer {
    pub fn new() -> Self {
        Self {
            flows: RwLock::new(BTreeMap::new()),
        }
    }

    pub async fn add_flow(&self, flow: TaskFlow) -> AdminResult<u64> {
        let id = flow.numeric_id()?;
        let mut flows = self.flows.write().await;
        if flows.contains_key(&id) {
            return Err(AdminError::InvalidFlowDefinition(format!(
                "流id {id} 已存在"
            )));
        }
        debug!("登记任务流 {} ({})", id, flow.graph_name);
        flows.insert(id, flow);
        Ok(id)
    }

    pub async fn remove_flow(&self, flow_id: u64) -> bool {
        self.flows.write().await.remove(&flow_id).is_some()
    }

    pub async fn get_flow(&self, flow_id: u64) -> Option<TaskFlow> {
        self.flows.read().await.get(&flow_id).cloned()
    }

    /// 线性扫描标签, 返回数值序最小的命中流
    pub async fn get_flow_id_by_tag(&self, tag: &str) -> Option<u64> {
        self.flows
            .read()
            .await
            .iter()
            .find(|(_, flow)| flow.has_tag(tag))
            .map(|(id, _)| *id)
    }

    pub async fn flow_ids(&self) -> Vec<u64> {
        self.flows.read().await.keys().copied().collect()
    }

    pub async fn flow_count(&self) -> usize {
        self.flows.read().await.len()
    }

    pub async fn max_flow_id(&self) -> Option<u64> {
        self.flows.read().await.keys().next_back().copied()
    }

    /// 手动停止一个流
    pub async fn stop_flow(&self, flow_id: u64, container: &TaskContainer) -> AdminResult<()> {
        let mut flows = self.flows.write().await;
        let flow = flows
            .get_mut(&flow_id)
            .ok_or(AdminError::FlowNotFound { id: flow_id })?;
        flow.stop(container).await;
        Ok(())
    }

    /// 推进所有流一个tick
    ///
    /// 上游状态在tick开始时统一快照, 同一tick内的门控判断彼此一致;
    /// 单个流的错误折叠进它自己的粘滞错误, 不影响兄弟流。
    pub async fn step_run_all(&self, container: &TaskContainer, factory: &dyn TaskFactory) {
        let mut flows = self.flows.write().await;
        let statuses: BTreeMap<u64, FlowStatus> =
            flows.iter().map(|(id, flow)| (*id, flow.status)).collect();

        for flow in flows.values_mut() {
            flow.step_run(container, factory, &statuses).await;
        }
    }

    /// 整个流集合序列化为一个JSON文档
    pub async fn serialize(&self) -> AdminResult<String> {
        let flows = self.flows.read().await;
        serde_json::to_string(&*flows).map_err(|e| AdminError::serialization(e.to_string()))
    }

    /// 从检查点文档恢复流集合并重绑任务
    ///
    /// 任何一步失败都让整个恢复失败, 调用方回退到干净初始化。
    pub async fn deserialize(
        &self,
        raw: &str,
        container: &TaskContainer,
        factory: &dyn TaskFactory,
    ) -> AdminResult<()> {
        let restored: BTreeMap<u64, TaskFlow> = serde_json::from_str(raw)
            .map_err(|e| AdminError::serialization(format!("流检查点解析失败: {e}")))?;

        for (id, flow) in &restored {
            if flow.numeric_id()? != *id {
                return Err(AdminError::InvalidFlowDefinition(format!(
                    "流检查点键 {id} 与流id {} 不一致",
                    flow.flow_id
                )));
            }
            flow.rebind_tasks(container, factory).await?;
        }

        let count = restored.len();
        *self.flows.write().await = restored;
        info!("从检查点恢复 {} 个任务流", count);
        Ok(())
    }

    pub async fn clear(&self) {
        self.flows.write().await.clear();
    }
}

impl Default for FlowContainer {
    fn default() -> Self {
        Self::new()
    }
}
