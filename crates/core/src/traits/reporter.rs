use tracing::{error, info, warn};

/// 告警级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// 告警上报接口
///
/// 尽力而为, 不构成正确性依赖; 上报失败只损失可观测性。
/// 节流与变化门控由调用方负责。
pub trait AlertReporter: Send + Sync {
    fn report(&self, severity: AlertSeverity, event: &str, message: &str);
}

/// 默认实现: 仅写日志
pub struct LogAlertReporter;

impl AlertReporter for LogAlertReporter {
    fn report(&self, severity: AlertSeverity, event: &str, message: &str) {
        match severity {
            AlertSeverity::Info => info!("[告警:{event}] {message}"),
            AlertSeverity::Warning => warn!("[告警:{event}] {message}"),
            AlertSeverity::Error | AlertSeverity::Critical => error!("[告警:{event}] {message}"),
        }
    }
}
