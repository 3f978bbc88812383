//! # `tidewatch-store` - SQLite 持久化适配层
//!
//! 为 `tidewatch-core` 中的存储端口提供基于 `sqlx` 的 SQLite 实现。
//! 所有存储共享同一个连接池与数据库文件，表结构在各自构造时初始化。

pub mod cube;
pub mod db;
pub mod kline;
pub mod monitor;
pub mod portfolio;
