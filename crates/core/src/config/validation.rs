use crate::errors::AdminError;
use crate::AdminResult;

/// 配置校验接口, 所有组件配置在使用前必须通过校验
pub trait ConfigValidator {
    fn validate(&self) -> AdminResult<()>;
}

pub struct ValidationUtils;

impl ValidationUtils {
    pub fn validate_not_empty(value: &str, field: &str) -> AdminResult<()> {
        if value.trim().is_empty() {
            return Err(AdminError::Configuration(format!("{field} 不能为空")));
        }
        Ok(())
    }

    pub fn validate_positive_seconds(value: i64, field: &str) -> AdminResult<()> {
        if value <= 0 {
            return Err(AdminError::Configuration(format!(
                "{field} 必须为正数, 当前值: {value}"
            )));
        }
        Ok(())
    }

    pub fn validate_count(value: usize, field: &str, max: usize) -> AdminResult<()> {
        if value == 0 || value > max {
            return Err(AdminError::Configuration(format!(
                "{field} 必须在 1..={max} 范围内, 当前值: {value}"
            )));
        }
        Ok(())
    }

    /// 比例参数必须落在 (0, 1] 区间
    pub fn validate_ratio(value: f64, field: &str) -> AdminResult<()> {
        if !(value > 0.0 && value <= 1.0) {
            return Err(AdminError::Configuration(format!(
                "{field} 必须在 (0, 1] 区间内, 当前值: {value}"
            )));
        }
        Ok(())
    }
}
