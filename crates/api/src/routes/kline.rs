//! # K 线路由控制器
//!
//! 实现 `/api/v1/kline` 路径下的查询与刷新接口。

use axum::Json;
use axum::extract::{Path, Query, State};
use tidewatch_core::common::{Timeframe, normalize_symbol};

use crate::error::ApiError;
use crate::server::AppState;
use crate::types::{
    ApiResponse, BatchRefreshResponse, KlineQuery, KlineSeriesResponse, RefreshOutcomeResponse,
    RefreshRequest,
};

/// 获取指定周期的 K 线与 EMA
///
/// 只读取本地缓存的日线，不会触发刷新。
#[utoipa::path(
    get,
    path = "/api/v1/kline/{symbol}",
    tag = "K线 (Kline)",
    params(
        ("symbol" = String, Path, description = "股票代码，可不带交易所前缀"),
        ("timeframe" = Option<String>, Query, description = "周期: 1d / 2d / 3d，默认 1d"),
        ("count" = Option<usize>, Query, description = "返回根数，默认 250")
    ),
    responses(
        (status = 200, description = "获取成功", body = ApiResponse<KlineSeriesResponse>),
        (status = 400, description = "周期参数非法")
    )
)]
pub async fn get_kline(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(query): Query<KlineQuery>,
) -> Result<Json<ApiResponse<KlineSeriesResponse>>, ApiError> {
    let timeframe = match query.timeframe.as_deref() {
        Some(raw) => raw.parse::<Timeframe>().map_err(ApiError::BadRequest)?,
        None => Timeframe::Daily,
    };
    let count = query
        .count
        .unwrap_or(state.kline_service.config().default_count);

    let series = state
        .kline_service
        .get_series(&symbol, timeframe, count)
        .await?;
    Ok(Json(ApiResponse::ok(KlineSeriesResponse::from(series))))
}

/// 刷新全部启用的监控股票
///
/// 增量模式只刷新数据过期或缺失的股票；单只股票失败不影响其他股票。
#[utoipa::path(
    post,
    path = "/api/v1/kline/refresh",
    tag = "K线 (Kline)",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "刷新完成", body = ApiResponse<BatchRefreshResponse>),
        (status = 500, description = "服务器内部错误")
    )
)]
pub async fn refresh_all(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<ApiResponse<BatchRefreshResponse>>, ApiError> {
    let report = state.kline_service.refresh_all(req.force_full).await?;
    Ok(Json(ApiResponse::ok(BatchRefreshResponse::from(&report))))
}

/// 刷新单只股票
#[utoipa::path(
    post,
    path = "/api/v1/kline/refresh/{symbol}",
    tag = "K线 (Kline)",
    params(
        ("symbol" = String, Path, description = "股票代码，可不带交易所前缀")
    ),
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "刷新完成", body = ApiResponse<RefreshOutcomeResponse>),
        (status = 409, description = "该股票正在刷新中"),
        (status = 502, description = "行情源错误")
    )
)]
pub async fn refresh_one(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<ApiResponse<RefreshOutcomeResponse>>, ApiError> {
    let outcome = state
        .kline_service
        .refresh_one(&symbol, req.force_full)
        .await?;
    Ok(Json(ApiResponse::ok(RefreshOutcomeResponse::new(
        normalize_symbol(&symbol),
        outcome,
    ))))
}
