//! # 监控股票路由控制器
//!
//! 实现 `/api/v1/monitor-stocks` 路径下的 REST 接口。

use axum::Json;
use axum::extract::{Path, Query, State};
use tidewatch_core::common::{Timeframe, normalize_symbol};
use tidewatch_core::store::port::PeBand;

use crate::error::ApiError;
use crate::server::AppState;
use crate::types::{
    ApiResponse, CreateMonitorStockRequest, MonitorListQuery, MonitorStockResponse,
    SetEnabledRequest, UpdateMonitorStockRequest,
};

fn parse_timeframe(raw: &str) -> Result<Timeframe, ApiError> {
    raw.parse::<Timeframe>().map_err(ApiError::BadRequest)
}

fn validate_pe_band(band: PeBand) -> Result<PeBand, ApiError> {
    if !band.is_valid() {
        return Err(ApiError::BadRequest(
            "合理市盈率需为正数且下限不大于上限".to_string(),
        ));
    }
    Ok(band)
}

/// 根据代码读取监控股票，不存在时返回 404。
async fn load(state: &AppState, code: &str) -> Result<MonitorStockResponse, ApiError> {
    state
        .monitor_store
        .get(code)
        .await?
        .map(MonitorStockResponse::from)
        .ok_or_else(|| ApiError::NotFound(format!("监控股票 {} 不存在", code)))
}

/// 列出监控股票
#[utoipa::path(
    get,
    path = "/api/v1/monitor-stocks",
    tag = "监控 (Monitor)",
    params(
        ("enabled_only" = Option<bool>, Query, description = "只返回启用的股票，默认 false")
    ),
    responses(
        (status = 200, description = "获取成功", body = ApiResponse<Vec<MonitorStockResponse>>)
    )
)]
pub async fn list_monitor_stocks(
    State(state): State<AppState>,
    Query(query): Query<MonitorListQuery>,
) -> Result<Json<ApiResponse<Vec<MonitorStockResponse>>>, ApiError> {
    let stocks = state
        .monitor_store
        .list(query.enabled_only.unwrap_or(false))
        .await?;
    Ok(Json(ApiResponse::ok(
        stocks.into_iter().map(MonitorStockResponse::from).collect(),
    )))
}

/// 新增监控股票
#[utoipa::path(
    post,
    path = "/api/v1/monitor-stocks",
    tag = "监控 (Monitor)",
    request_body = CreateMonitorStockRequest,
    responses(
        (status = 200, description = "添加成功", body = ApiResponse<MonitorStockResponse>),
        (status = 400, description = "参数非法或股票已存在")
    )
)]
pub async fn create_monitor_stock(
    State(state): State<AppState>,
    Json(req): Json<CreateMonitorStockRequest>,
) -> Result<Json<ApiResponse<MonitorStockResponse>>, ApiError> {
    let timeframe = parse_timeframe(&req.timeframe)?;
    let pe_band = validate_pe_band(PeBand::new(req.reasonable_pe_min, req.reasonable_pe_max))?;
    let code = normalize_symbol(&req.code);
    if code.is_empty() || req.name.trim().is_empty() {
        return Err(ApiError::BadRequest("股票代码和名称不能为空".to_string()));
    }

    if !state
        .monitor_store
        .add(&code, req.name.trim(), timeframe, pe_band)
        .await?
    {
        return Err(ApiError::BadRequest(format!("股票 {} 已存在", code)));
    }
    tracing::info!("Added monitor stock {} ({})", code, timeframe);
    Ok(Json(ApiResponse::ok(load(&state, &code).await?)))
}

/// 修改监控股票
///
/// 未提供的合理市盈率字段保持原值。
#[utoipa::path(
    put,
    path = "/api/v1/monitor-stocks/{code}",
    tag = "监控 (Monitor)",
    params(
        ("code" = String, Path, description = "股票代码")
    ),
    request_body = UpdateMonitorStockRequest,
    responses(
        (status = 200, description = "修改成功", body = ApiResponse<MonitorStockResponse>),
        (status = 400, description = "周期或合理市盈率非法"),
        (status = 404, description = "股票不存在")
    )
)]
pub async fn update_monitor_stock(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(req): Json<UpdateMonitorStockRequest>,
) -> Result<Json<ApiResponse<MonitorStockResponse>>, ApiError> {
    let timeframe = parse_timeframe(&req.timeframe)?;
    let code = normalize_symbol(&code);
    let current = state
        .monitor_store
        .get(&code)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("监控股票 {} 不存在", code)))?;
    let pe_band = validate_pe_band(PeBand::new(
        req.reasonable_pe_min.unwrap_or(current.reasonable_pe_min),
        req.reasonable_pe_max.unwrap_or(current.reasonable_pe_max),
    ))?;

    if !state
        .monitor_store
        .update(&code, req.name.trim(), timeframe, pe_band, req.enabled)
        .await?
    {
        return Err(ApiError::NotFound(format!("监控股票 {} 不存在", code)));
    }
    Ok(Json(ApiResponse::ok(load(&state, &code).await?)))
}

/// 删除监控股票
///
/// 只删除监控配置，已缓存的日线保留。
#[utoipa::path(
    delete,
    path = "/api/v1/monitor-stocks/{code}",
    tag = "监控 (Monitor)",
    params(
        ("code" = String, Path, description = "股票代码")
    ),
    responses(
        (status = 200, description = "删除成功", body = ApiResponse<String>),
        (status = 404, description = "股票不存在")
    )
)]
pub async fn delete_monitor_stock(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<ApiResponse<String>>, ApiError> {
    let code = normalize_symbol(&code);
    if !state.monitor_store.delete(&code).await? {
        return Err(ApiError::NotFound(format!("监控股票 {} 不存在", code)));
    }
    Ok(Json(ApiResponse::ok("ok".to_string())))
}

/// 启用或停用监控股票
#[utoipa::path(
    patch,
    path = "/api/v1/monitor-stocks/{code}/enabled",
    tag = "监控 (Monitor)",
    params(
        ("code" = String, Path, description = "股票代码")
    ),
    request_body = SetEnabledRequest,
    responses(
        (status = 200, description = "修改成功", body = ApiResponse<MonitorStockResponse>),
        (status = 404, description = "股票不存在")
    )
)]
pub async fn set_monitor_enabled(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(req): Json<SetEnabledRequest>,
) -> Result<Json<ApiResponse<MonitorStockResponse>>, ApiError> {
    let code = normalize_symbol(&code);
    if !state.monitor_store.set_enabled(&code, req.enabled).await? {
        return Err(ApiError::NotFound(format!("监控股票 {} 不存在", code)));
    }
    Ok(Json(ApiResponse::ok(load(&state, &code).await?)))
}
