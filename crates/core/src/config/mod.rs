pub mod models;
pub mod validation;

pub use models::{
    AlertConfig, ControllerConfig, HandleStrategy, SlowNodeConfig,
    DEFAULT_ALERT_REPORT_INTERVAL_SECONDS,
};
pub use validation::{ConfigValidator, ValidationUtils};

use std::path::Path;

use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

/// 管控端总配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub slow_node: SlowNodeConfig,
    #[serde(default)]
    pub alert: AlertConfig,
}

impl AppConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
        }

        // 环境变量覆盖: BUILD_ADMIN__SLOW_NODE__DEAD_NODE_TIMEOUT_SECONDS 等
        builder = builder.add_source(
            Environment::with_prefix("BUILD_ADMIN")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder.build().context("构建配置失败")?;
        let config: AppConfig = settings.try_deserialize().context("解析配置失败")?;

        config.validate_all().context("配置校验失败")?;
        Ok(config)
    }

    pub fn validate_all(&self) -> crate::AdminResult<()> {
        self.controller.validate()?;
        self.slow_node.validate()?;
        self.alert.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate_all().is_ok());
        assert_eq!(config.controller.tick_interval_ms, 1000);
        assert!(config.slow_node.enable_slow_detect);
    }

    #[test]
    fn test_load_missing_file_fails() {
        assert!(AppConfig::load(Some("/no/such/config.toml")).is_err());
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            r#"
[controller]
tick_interval_ms = 500
checkpoint_root = "/tmp/ckpt"
generation = 3

[slow_node]
enable_slow_detect = true
judge_start_seconds = 10
dead_node_timeout_seconds = 30
max_backup_count_per_group = 2
slow_qps_ratio = 0.4
handle_strategy = "restart_node"

[alert]
enabled = false
min_report_interval_seconds = 120
"#
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path().to_str().unwrap())).unwrap();
        assert_eq!(config.controller.tick_interval_ms, 500);
        assert_eq!(config.controller.generation, 3);
        assert_eq!(config.slow_node.max_backup_count_per_group, 2);
        assert_eq!(config.slow_node.handle_strategy, HandleStrategy::RestartNode);
        assert!(!config.alert.enabled);
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            r#"
[slow_node]
slow_qps_ratio = 2.0
"#
        )
        .unwrap();

        assert!(AppConfig::load(Some(file.path().to_str().unwrap())).is_err());
    }
}
