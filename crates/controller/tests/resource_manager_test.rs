//! 任务级共享资源管理的引用计数与恢复测试

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::json;

use admin_controller::TaskResourceManager;
use admin_core::AdminError;
use admin_testing_utils::MockResourceReader;

fn reader() -> MockResourceReader {
    MockResourceReader::new().with_resource("swift_topic", json!({"partitions": 8}))
}

#[tokio::test]
async fn test_guard_refcount_and_single_teardown() {
    let manager = TaskResourceManager::new();
    manager
        .declare_resource_keeper("swift", "swift_topic", BTreeMap::new())
        .await;
    let reader = reader();

    let g1 = manager
        .apply_resource("processor", "swift_topic", &reader)
        .await
        .unwrap();
    let g2 = manager
        .apply_resource("builder", "swift_topic", &reader)
        .await
        .unwrap();
    assert_eq!(manager.ref_count("swift_topic").await, Some(2));

    drop(g1);
    assert_eq!(manager.ref_count("swift_topic").await, Some(1));
    assert_eq!(manager.teardown_times("swift_topic").await, Some(0));

    // 最后一个引用释放时恰好触发一次下线
    drop(g2);
    assert_eq!(manager.ref_count("swift_topic").await, Some(0));
    assert_eq!(manager.teardown_times("swift_topic").await, Some(1));
}

#[tokio::test]
async fn test_reacquire_after_teardown_starts_new_cycle() {
    let manager = TaskResourceManager::new();
    manager
        .declare_resource_keeper("swift", "swift_topic", BTreeMap::new())
        .await;
    let reader = reader();

    let g = manager
        .apply_resource("merger", "swift_topic", &reader)
        .await
        .unwrap();
    drop(g);
    assert_eq!(manager.teardown_times("swift_topic").await, Some(1));

    let g = manager
        .apply_resource("merger", "swift_topic", &reader)
        .await
        .unwrap();
    assert_eq!(manager.ref_count("swift_topic").await, Some(1));
    drop(g);
    assert_eq!(manager.teardown_times("swift_topic").await, Some(2));
}

#[tokio::test]
async fn test_apply_unknown_resource_fails() {
    let manager = TaskResourceManager::new();
    let result = manager
        .apply_resource("builder", "no_such", &reader())
        .await;
    assert!(matches!(result, Err(AdminError::ResourceNotFound { .. })));
}

#[tokio::test]
async fn test_apply_fails_when_definition_unreadable() {
    let manager = TaskResourceManager::new();
    manager
        .declare_resource_keeper("swift", "other_topic", BTreeMap::new())
        .await;
    // 句柄已声明但定义解析不出来, 引用计数不得增加
    let result = manager
        .apply_resource("builder", "other_topic", &reader())
        .await;
    assert!(result.is_err());
    assert_eq!(manager.ref_count("other_topic").await, Some(0));
}

#[tokio::test]
async fn test_declare_is_idempotent() {
    let manager = TaskResourceManager::new();
    let mut params = BTreeMap::new();
    params.insert("zk_root".to_string(), "/build".to_string());

    let first = manager
        .declare_resource_keeper("swift", "swift_topic", params)
        .await;
    let second = manager
        .declare_resource_keeper("swift", "swift_topic", BTreeMap::new())
        .await;
    // 二次声明返回已存在的定义, 参数不被覆盖
    assert_eq!(first, second);
    assert_eq!(second.params.get("zk_root").map(String::as_str), Some("/build"));
}

#[tokio::test]
async fn test_keeper_definitions_roundtrip() {
    let manager = TaskResourceManager::new();
    let mut params = BTreeMap::new();
    params.insert("zk_root".to_string(), "/build".to_string());
    manager
        .declare_resource_keeper("swift", "swift_topic", params)
        .await;
    manager
        .declare_resource_keeper("table", "main_table", BTreeMap::new())
        .await;

    let raw = manager.serialize_resource_keepers().await.unwrap();

    let restored = TaskResourceManager::new();
    restored.deserialize_resource_keepers(&raw).await.unwrap();
    assert_eq!(
        restored.serialize_resource_keepers().await.unwrap(),
        raw
    );
    // 恢复后的句柄引用计数从零开始
    assert_eq!(restored.ref_count("swift_topic").await, Some(0));
}

#[tokio::test]
async fn test_typed_registry() {
    #[derive(Debug, PartialEq)]
    struct BuildClock(u64);

    let manager = TaskResourceManager::new();
    assert!(manager.get_resource::<BuildClock>().await.is_none());

    manager.add_resource(Arc::new(BuildClock(42))).await;
    let clock = manager.get_resource::<BuildClock>().await.unwrap();
    assert_eq!(*clock, BuildClock(42));

    manager
        .add_resource_with_id("secondary_clock", Arc::new(BuildClock(7)))
        .await;
    let secondary = manager
        .get_resource_by_id::<BuildClock>("secondary_clock")
        .await
        .unwrap();
    assert_eq!(*secondary, BuildClock(7));
    // 类型对不上时拿不到
    assert!(manager.get_resource_by_id::<String>("secondary_clock").await.is_none());
}
