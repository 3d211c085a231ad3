use crate::AdminResult;

/// 资源描述读取接口
///
/// 在资源检出时解析外部共享资源(如消息队列topic)的定义;
/// 解析失败视为检出失败。
pub trait ResourceReader: Send + Sync {
    fn read(&self, resource_name: &str) -> AdminResult<serde_json::Value>;
}
