use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use admin_controller::{TaskContainer, TaskFactory};
use admin_core::models::TaskStatus;
use admin_core::{AdminError, AdminResult};

/// 任务流状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowStatus {
    /// 等待上游依赖满足
    Inactive,
    Active,
    Stopped,
    Finished,
    /// 终态; 错误信息在 error_msg 中粘滞累积
    Error,
}

impl FlowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowStatus::Inactive => "INACTIVE",
            FlowStatus::Active => "ACTIVE",
            FlowStatus::Stopped => "STOPPED",
            FlowStatus::Finished => "FINISHED",
            FlowStatus::Error => "ERROR",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FlowStatus::Stopped | FlowStatus::Finished | FlowStatus::Error
        )
    }
}

/// 流名下的一个任务声明
///
/// properties 是活任务属性表的检查点副本, 每tick回写;
/// 备份信息等任务侧状态经由它随流文档一起落盘。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowTask {
    pub task_id: String,
    pub task_type: String,
    pub params: BTreeMap<String, String>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

/// 上游依赖: 上游流到达 wait_status 指定的状态后本流才激活
///
/// wait_status 取值 "stop" 或 "finish"。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowUpstream {
    pub flow_id: String,
    pub wait_status: String,
}

impl FlowUpstream {
    pub fn new(flow_id: u64, wait_status: &str) -> Self {
        Self {
            flow_id: flow_id.to_string(),
            wait_status: wait_status.to_string(),
        }
    }

    fn expected_status(&self) -> AdminResult<FlowStatus> {
        match self.wait_status.as_str() {
            "stop" => Ok(FlowStatus::Stopped),
            "finish" => Ok(FlowStatus::Finished),
            other => Err(AdminError::InvalidFlowDefinition(format!(
                "未知的上游触发条件: {other}"
            ))),
        }
    }
}

/// 流图中的一个节点
///
/// flow_id 是数字字符串, 排序按数值而非字典序; 数据部分整体可序列化,
/// 任务实例本身不入档, 恢复时由工厂重建。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFlow {
    pub flow_id: String,
    pub graph_name: String,
    pub status: FlowStatus,
    pub tasks: Vec<FlowTask>,
    pub global_params: BTreeMap<String, String>,
    pub upstream: Vec<FlowUpstream>,
    pub tags: Vec<String>,
    pub error_msg: String,
}

impl TaskFlow {
    pub fn new(flow_id: u64, graph_name: &str) -> Self {
        Self {
            flow_id: flow_id.to_string(),
            graph_name: graph_name.to_string(),
            status: FlowStatus::Inactive,
            tasks: Vec::new(),
            global_params: BTreeMap::new(),
            upstream: Vec::new(),
            tags: Vec::new(),
            error_msg: String::new(),
        }
    }

    pub fn numeric_id(&self) -> AdminResult<u64> {
        self.flow_id.parse().map_err(|_| {
            AdminError::InvalidFlowDefinition(format!("非数字的流id: {}", self.flow_id))
        })
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// 累积粘滞错误并进入 ERROR 终态
    pub fn set_error(&mut self, msg: &str) {
        if self.error_msg.is_empty() {
            self.error_msg = msg.to_string();
        } else {
            self.error_msg.push_str("; ");
            self.error_msg.push_str(msg);
        }
        self.status = FlowStatus::Error;
        warn!("任务流 {} 进入错误态: {}", self.flow_id, msg);
    }

    /// 任务启动参数: 全局参数打底, 任务自身参数覆盖
    fn merged_params(&self, task: &FlowTask) -> BTreeMap<String, String> {
        let mut params = self.global_params.clone();
        params.extend(task.params.iter().map(|(k, v)| (k.clone(), v.clone())));
        params
    }

    /// 上游依赖是否全部满足
    ///
    /// 已被移除的上游流按未满足处理, 等待运维介入而非误激活。
    pub fn upstream_ready(&self, statuses: &BTreeMap<u64, FlowStatus>) -> AdminResult<bool> {
        for item in &self.upstream {
            let upstream_id: u64 = item.flow_id.parse().map_err(|_| {
                AdminError::InvalidFlowDefinition(format!("非数字的上游流id: {}", item.flow_id))
            })?;
            let expected = item.expected_status()?;
            match statuses.get(&upstream_id) {
                Some(actual) if *actual == expected => {}
                Some(_) => return Ok(false),
                None => {
                    debug!("任务流 {} 的上游 {} 不在容器中", self.flow_id, upstream_id);
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    /// 推进一个tick
    ///
    /// INACTIVE 且上游满足 → 启动名下任务并转 ACTIVE; ACTIVE → 每个任务
    /// 推进一轮并按任务结果推导流状态。错误不出tick边界: 任何失败都
    /// 折叠进粘滞错误信息。
    pub async fn step_run(
        &mut self,
        container: &TaskContainer,
        factory: &dyn TaskFactory,
        upstream_statuses: &BTreeMap<u64, FlowStatus>,
    ) {
        match self.status {
            FlowStatus::Inactive => {
                match self.upstream_ready(upstream_statuses) {
                    Ok(true) => {
                        if let Err(e) = self.activate(container, factory).await {
                            self.set_error(&format!("激活失败: {e}"));
                        }
                    }
                    Ok(false) => {}
                    Err(e) => self.set_error(&format!("上游依赖非法: {e}")),
                }
            }
            FlowStatus::Active => {
                if let Err(e) = self.advance_tasks(container).await {
                    self.set_error(&format!("任务推进失败: {e}"));
                }
            }
            _ => {}
        }
    }

    /// 声明并启动一个任务; 保存的属性在 start 之前写回,
    /// 任务启动时才能从属性表恢复在途备份
    async fn launch_task(
        &self,
        container: &TaskContainer,
        factory: &dyn TaskFactory,
        task: &FlowTask,
    ) -> AdminResult<()> {
        let handle = container
            .declare_task(factory, &task.task_id, &task.task_type)
            .await?;
        let mut guard = handle.lock().await;
        for (key, value) in &task.properties {
            guard.set_property(key, value);
        }
        let params = self.merged_params(task);
        guard.start(&params).await
    }

    async fn activate(
        &mut self,
        container: &TaskContainer,
        factory: &dyn TaskFactory,
    ) -> AdminResult<()> {
        for task in &self.tasks {
            self.launch_task(container, factory, task).await?;
        }
        self.status = FlowStatus::Active;
        info!("任务流 {} ({}) 激活", self.flow_id, self.graph_name);
        Ok(())
    }

    async fn advance_tasks(&mut self, container: &TaskContainer) -> AdminResult<()> {
        let mut all_finished = !self.tasks.is_empty();
        let mut any_stopped = false;

        for task in &mut self.tasks {
            let handle = container
                .get_task(&task.task_id)
                .await
                .ok_or_else(|| AdminError::task_not_found(&task.task_id))?;
            let mut guard = handle.lock().await;
            guard.run().await?;
            // 任务属性回写进流文档, 本tick的备份簿记随检查点落盘
            task.properties = guard.properties();
            match guard.status() {
                TaskStatus::Finished => {}
                TaskStatus::Stopped => {
                    any_stopped = true;
                    all_finished = false;
                }
                _ => all_finished = false,
            }
        }

        if any_stopped {
            self.status = FlowStatus::Stopped;
            info!("任务流 {} 已停止", self.flow_id);
        } else if all_finished {
            self.status = FlowStatus::Finished;
            info!("任务流 {} 全部任务完成", self.flow_id);
        }
        Ok(())
    }

    /// 停止整个流: 通知名下任务停止并直接进入 STOPPED
    pub async fn stop(&mut self, container: &TaskContainer) {
        for task in &self.tasks {
            if let Some(handle) = container.get_task(&task.task_id).await {
                handle.lock().await.notify_stopped();
            }
        }
        self.status = FlowStatus::Stopped;
        info!("任务流 {} 被手动停止", self.flow_id);
    }

    /// 恢复时把活跃流名下的任务重新声明并启动
    ///
    /// 持久化的属性副本先于 start 写回, 在途备份节点由任务启动时
    /// 的恢复逻辑重新拼接。
    pub async fn rebind_tasks(
        &self,
        container: &TaskContainer,
        factory: &dyn TaskFactory,
    ) -> AdminResult<()> {
        if self.status != FlowStatus::Active {
            return Ok(());
        }
        for task in &self.tasks {
            self.launch_task(container, factory, task).await?;
        }
        Ok(())
    }
}
