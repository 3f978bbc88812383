//! # `tidewatch-core` - 领域内核
//!
//! 定义 K 线实体、周期枚举、各层错误类型以及存储与行情源的端口 (Port) 契约。
//! 本 crate 不依赖任何具体基础设施，所有实现均由下游 crate 通过 Trait 注入。

pub mod common;
pub mod config;

pub mod market {
    pub mod entity;
    pub mod error;
    pub mod port;
}

pub mod store {
    pub mod error;
    pub mod port;
}

#[cfg(feature = "test-utils")]
pub mod test_utils;
