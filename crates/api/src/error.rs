//! # API 统一错误处理
//!
//! 将下层各 crate 的错误类型统一映射到 HTTP 状态码与 JSON 响应体。

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tidewatch_core::store::error::StoreError;
use tidewatch_kline::error::KlineError;

use crate::types::ApiErrorResponse;

/// API 层统一错误枚举
#[derive(Error, Debug)]
pub enum ApiError {
    /// 资源未找到 (404)
    #[error("资源未找到: {0}")]
    NotFound(String),

    /// 请求参数错误 (400)
    #[error("请求参数错误: {0}")]
    BadRequest(String),

    /// 资源正被占用 (409)
    #[error("请求冲突: {0}")]
    Conflict(String),

    /// 上游行情源失败 (502)
    #[error("行情源错误: {0}")]
    Upstream(String),

    /// 下层业务错误 (500)
    #[error("内部服务错误: {0}")]
    Internal(String),
}

/// 将 `ApiError` 转换为 axum 的 HTTP 响应
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            ApiError::Upstream(msg) => {
                tracing::warn!("行情源错误: {}", msg);
                (StatusCode::BAD_GATEWAY, msg.clone())
            }
            ApiError::Internal(msg) => {
                // 内部错误只记录日志，不向客户端透传细节
                tracing::error!("内部服务错误: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "服务器内部错误".to_string(),
                )
            }
        };

        let body = Json(ApiErrorResponse::from_msg(message));
        (status, body).into_response()
    }
}

/// 从 `KlineError` 转换
impl From<KlineError> for ApiError {
    fn from(err: KlineError) -> Self {
        match err {
            KlineError::Provider(msg) => ApiError::Upstream(msg),
            KlineError::Validation(msg) => ApiError::BadRequest(msg),
            KlineError::Busy(symbol) => ApiError::Conflict(format!("{} 正在刷新中", symbol)),
            KlineError::Persistence(e) => ApiError::from(e),
        }
    }
}

/// 从 `StoreError` 转换。记录不存在由各存储以 `Option`/`bool` 表达，路由自行返回 404。
impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
