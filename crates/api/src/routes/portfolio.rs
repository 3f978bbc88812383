//! # 持仓路由控制器
//!
//! 实现 `/api/v1/portfolio` 路径下的 REST 接口。

use axum::Json;
use axum::extract::{Path, State};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tidewatch_core::common::normalize_symbol;
use tidewatch_core::store::port::Holding;
use tidewatch_kline::valuation::value_holdings;

use crate::error::ApiError;
use crate::server::AppState;
use crate::types::{
    ApiResponse, CreateHoldingRequest, HoldingResponse, PortfolioResponse, UpdateHoldingRequest,
};

fn validate(cost_price: Decimal, shares: i64) -> Result<(), ApiError> {
    if cost_price <= Decimal::ZERO || shares <= 0 {
        return Err(ApiError::BadRequest("成本价和股数必须大于0".to_string()));
    }
    Ok(())
}

/// # Summary
/// 列出全部持仓及估值汇总。
///
/// # Logic
/// 1. 读取全部持仓。
/// 2. 逐只读取库中最新一根日线作为现价。
/// 3. 计算每行的市值、盈亏与盈亏比例，以及组合汇总。
#[utoipa::path(
    get,
    path = "/api/v1/portfolio",
    tag = "持仓 (Portfolio)",
    responses(
        (status = 200, description = "获取成功", body = ApiResponse<PortfolioResponse>)
    )
)]
pub async fn list_holdings(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<PortfolioResponse>>, ApiError> {
    let holdings = state.portfolio_store.list().await?;

    let mut latest = BTreeMap::new();
    for holding in &holdings {
        if let Some(bar) = state.bar_store.range_query(&holding.code, 1).await?.pop() {
            latest.insert(holding.code.clone(), bar);
        }
    }

    let valuation = value_holdings(&holdings, &latest)?;
    Ok(Json(ApiResponse::ok(PortfolioResponse::from(valuation))))
}

/// 新增持仓
#[utoipa::path(
    post,
    path = "/api/v1/portfolio",
    tag = "持仓 (Portfolio)",
    request_body = CreateHoldingRequest,
    responses(
        (status = 200, description = "添加成功", body = ApiResponse<HoldingResponse>),
        (status = 400, description = "参数非法或持仓已存在")
    )
)]
pub async fn create_holding(
    State(state): State<AppState>,
    Json(req): Json<CreateHoldingRequest>,
) -> Result<Json<ApiResponse<HoldingResponse>>, ApiError> {
    validate(req.cost_price, req.shares)?;
    let holding = Holding {
        code: normalize_symbol(&req.code),
        name: req.name.trim().to_string(),
        cost_price: req.cost_price,
        shares: req.shares,
    };

    if !state.portfolio_store.add(&holding).await? {
        return Err(ApiError::BadRequest(format!("持仓 {} 已存在", holding.code)));
    }
    Ok(Json(ApiResponse::ok(HoldingResponse::from(holding))))
}

/// 修改持仓
#[utoipa::path(
    put,
    path = "/api/v1/portfolio/{code}",
    tag = "持仓 (Portfolio)",
    params(
        ("code" = String, Path, description = "股票代码")
    ),
    request_body = UpdateHoldingRequest,
    responses(
        (status = 200, description = "修改成功", body = ApiResponse<HoldingResponse>),
        (status = 404, description = "持仓不存在")
    )
)]
pub async fn update_holding(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(req): Json<UpdateHoldingRequest>,
) -> Result<Json<ApiResponse<HoldingResponse>>, ApiError> {
    validate(req.cost_price, req.shares)?;
    let holding = Holding {
        code: normalize_symbol(&code),
        name: req.name.trim().to_string(),
        cost_price: req.cost_price,
        shares: req.shares,
    };

    if !state.portfolio_store.update(&holding).await? {
        return Err(ApiError::NotFound(format!("持仓 {} 不存在", holding.code)));
    }
    Ok(Json(ApiResponse::ok(HoldingResponse::from(holding))))
}

/// 删除持仓
#[utoipa::path(
    delete,
    path = "/api/v1/portfolio/{code}",
    tag = "持仓 (Portfolio)",
    params(
        ("code" = String, Path, description = "股票代码")
    ),
    responses(
        (status = 200, description = "删除成功", body = ApiResponse<String>),
        (status = 404, description = "持仓不存在")
    )
)]
pub async fn delete_holding(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<ApiResponse<String>>, ApiError> {
    let code = normalize_symbol(&code);
    if !state.portfolio_store.delete(&code).await? {
        return Err(ApiError::NotFound(format!("持仓 {} 不存在", code)));
    }
    Ok(Json(ApiResponse::ok("ok".to_string())))
}
