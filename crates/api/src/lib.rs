//! # `tidewatch-api` - HTTP API 层
//!
//! 使用 `axum` 构建路由与控制器，通过 `utoipa` 自动生成 OpenAPI 3.0 Swagger 文档。
//!
//! ## 架构职责
//! - 暴露 K 线查询与刷新接口
//! - 监控股票与持仓的增删改查
//! - 成本价计算与 K 线 CSV 导出等小工具
//! - 将领域模型转换为 DTO 返回给前端

pub mod error;
pub mod routes;
pub mod server;
pub mod types;
