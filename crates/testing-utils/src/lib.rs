//! # Admin Testing Utils
//!
//! 工作区内共享的测试工具: 外部协作方的内存mock与测试数据builder。
//! 作为 dev-dependency 被其他crate引用:
//!
//! ```toml
//! [dev-dependencies]
//! admin-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod mocks;

pub use builders::*;
pub use mocks::*;
