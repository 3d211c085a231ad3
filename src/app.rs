use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use admin_controller::{DefaultTaskFactory, TaskContainer, TaskResourceManager};
use admin_core::config::AppConfig;
use admin_core::traits::{CheckpointStore, LogAlertReporter, LoggingNodeOperator};
use admin_core::LocalCheckpointStore;
use admin_flow::{FlowContainer, FlowFactory};

/// 管控端应用: 装配协作方并驱动控制循环
///
/// 每个tick推进所有活跃流一轮, 流集合有变化时写回检查点。
pub struct Application {
    config: AppConfig,
    checkpoint: Arc<dyn CheckpointStore>,
    task_container: Arc<TaskContainer>,
    task_factory: Arc<DefaultTaskFactory>,
    flow_container: Arc<FlowContainer>,
    flow_factory: Arc<FlowFactory>,
    recovered: bool,
}

impl Application {
    pub async fn new(config: AppConfig) -> Result<Self> {
        let checkpoint: Arc<dyn CheckpointStore> = Arc::new(LocalCheckpointStore::new(
            &config.controller.checkpoint_root,
        ));
        let task_factory = Arc::new(DefaultTaskFactory::new(
            Arc::new(LoggingNodeOperator),
            Arc::new(LogAlertReporter),
            Arc::new(TaskResourceManager::new()),
            config.slow_node.clone(),
            config.alert.clone(),
        ));
        let task_container = Arc::new(TaskContainer::new());
        let flow_container = Arc::new(FlowContainer::new());
        let flow_factory = Arc::new(FlowFactory::new());

        let mut app = Self {
            config,
            checkpoint,
            task_container,
            task_factory,
            flow_container,
            flow_factory,
            recovered: false,
        };
        app.recover().await?;
        Ok(app)
    }

    fn flow_checkpoint_key(&self) -> String {
        format!("generation_{}/flows", self.config.controller.generation)
    }

    /// 从检查点恢复流集合
    ///
    /// 恢复失败不是致命错误: 告警后回退到干净初始化。
    async fn recover(&mut self) -> Result<()> {
        let key = self.flow_checkpoint_key();
        let snapshot = self
            .checkpoint
            .read(&key)
            .await
            .with_context(|| format!("读取流检查点 {key} 失败"))?;

        let raw = match snapshot {
            Some(raw) => raw,
            None => {
                info!("无流检查点, 干净启动");
                return Ok(());
            }
        };

        match self
            .flow_container
            .deserialize(&raw, &self.task_container, self.task_factory.as_ref())
            .await
        {
            Ok(()) => {
                if let Some(max_id) = self.flow_container.max_flow_id().await {
                    self.flow_factory.advance_to(max_id + 1);
                }
                self.recovered = true;
            }
            Err(e) => {
                warn!("流检查点恢复失败, 回退到干净初始化: {e}");
                self.flow_container.clear().await;
                self.task_container.clear().await;
            }
        }
        Ok(())
    }

    /// 干净启动时从流定义目录装载初始流集合
    pub async fn load_flow_definitions(&self, flow_root: &str) -> Result<()> {
        if self.recovered {
            info!("已从检查点恢复, 跳过流定义目录 {flow_root}");
            return Ok(());
        }
        let root = std::path::Path::new(flow_root);
        if !root.is_dir() {
            info!("流定义目录 {flow_root} 不存在, 不装载初始流");
            return Ok(());
        }

        let mut entries = tokio::fs::read_dir(root)
            .await
            .with_context(|| format!("读取流定义目录 {flow_root} 失败"))?;
        let mut file_names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(".json") {
                file_names.push(name);
            }
        }
        // 目录遍历顺序不稳定, 排序后装载保证流id分配可复现
        file_names.sort();

        for name in file_names {
            let flow = self
                .flow_factory
                .create_flow(root, &name, BTreeMap::new())
                .await
                .with_context(|| format!("装载流定义 {name} 失败"))?;
            self.flow_container
                .add_flow(flow)
                .await
                .with_context(|| format!("登记流定义 {name} 失败"))?;
        }
        Ok(())
    }

    /// 控制循环: 单线程协作式, 每tick推进一轮
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let mut ticker =
            tokio::time::interval(Duration::from_millis(self.config.controller.tick_interval_ms));
        let mut last_snapshot = self.flow_container.serialize().await?;
        info!(
            "控制循环启动, tick间隔 {}ms, 在管流 {} 个",
            self.config.controller.tick_interval_ms,
            self.flow_container.flow_count().await
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.flow_container
                        .step_run_all(&self.task_container, self.task_factory.as_ref())
                        .await;

                    match self.flow_container.serialize().await {
                        Ok(snapshot) => {
                            if snapshot != last_snapshot {
                                if let Err(e) = self
                                    .checkpoint
                                    .write(&self.flow_checkpoint_key(), &snapshot)
                                    .await
                                {
                                    error!("流检查点写入失败: {e}");
                                } else {
                                    last_snapshot = snapshot;
                                }
                            }
                        }
                        Err(e) => error!("流集合序列化失败: {e}"),
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("控制循环收到关闭信号");
                    break;
                }
            }
        }

        // 退出前把最终状态落盘
        let snapshot = self.flow_container.serialize().await?;
        self.checkpoint
            .write(&self.flow_checkpoint_key(), &snapshot)
            .await
            .context("关闭时写入流检查点失败")?;
        info!("控制循环退出, 最终检查点已落盘");
        Ok(())
    }
}
