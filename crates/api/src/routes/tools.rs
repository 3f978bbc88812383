//! # 工具路由控制器
//!
//! 成本价计算与 K 线 CSV 导出。

use axum::Json;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use rust_decimal::Decimal;
use tidewatch_core::common::normalize_symbol;
use tidewatch_core::market::entity::Bar;

use crate::error::ApiError;
use crate::server::AppState;
use crate::types::{
    ApiResponse, CalculateCostRequest, CalculateCostResponse, ExportKlineRequest,
    ExportStockResponse,
};

/// CSV 表头 (与前端导出模板一致)
const CSV_HEADER: [&str; 6] = ["日期", "开盘", "收盘", "最高", "最低", "成交额"];

/// 计算多笔买入后的持仓成本价
#[utoipa::path(
    post,
    path = "/api/v1/tools/calculate-cost",
    tag = "工具 (Tools)",
    request_body = CalculateCostRequest,
    responses(
        (status = 200, description = "计算成功", body = ApiResponse<CalculateCostResponse>),
        (status = 400, description = "买入记录为空或价格、股数非正")
    )
)]
pub async fn calculate_cost(
    Json(req): Json<CalculateCostRequest>,
) -> Result<Json<ApiResponse<CalculateCostResponse>>, ApiError> {
    if req.positions.is_empty() {
        return Err(ApiError::BadRequest("请提供买入记录".to_string()));
    }

    let overflow = || ApiError::BadRequest("数值超出范围".to_string());
    let mut total_shares: i64 = 0;
    let mut total_cost = Decimal::ZERO;
    for record in &req.positions {
        if record.price <= Decimal::ZERO || record.shares <= 0 {
            return Err(ApiError::BadRequest("价格和股数必须大于0".to_string()));
        }
        total_shares = total_shares.checked_add(record.shares).ok_or_else(overflow)?;
        let cost = record
            .price
            .checked_mul(Decimal::from(record.shares))
            .ok_or_else(overflow)?;
        total_cost = total_cost.checked_add(cost).ok_or_else(overflow)?;
    }

    let average_cost = total_cost
        .checked_div(Decimal::from(total_shares))
        .ok_or_else(overflow)?
        .round_dp(2);

    Ok(Json(ApiResponse::ok(CalculateCostResponse {
        total_shares,
        total_cost: total_cost.to_string(),
        average_cost: average_cost.to_string(),
    })))
}

/// 列出可导出 K 线的股票
///
/// 返回全部启用的监控股票及其本地最新交易日。
#[utoipa::path(
    get,
    path = "/api/v1/tools/export-kline/stocks",
    tag = "工具 (Tools)",
    responses(
        (status = 200, description = "获取成功", body = ApiResponse<Vec<ExportStockResponse>>)
    )
)]
pub async fn list_export_stocks(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<ExportStockResponse>>>, ApiError> {
    let stocks = state.monitor_store.list(true).await?;

    let mut result = Vec::with_capacity(stocks.len());
    for stock in stocks {
        let latest = state.bar_store.latest_date(&stock.code).await?;
        result.push(ExportStockResponse {
            code: stock.code,
            name: stock.name,
            latest_date: latest.map(|d| d.format("%Y-%m-%d").to_string()),
        });
    }
    Ok(Json(ApiResponse::ok(result)))
}

fn render_csv(bars: &[Bar]) -> Result<Vec<u8>, ApiError> {
    // UTF-8 BOM，保证表格软件正确识别中文表头
    let mut buf = "\u{feff}".as_bytes().to_vec();
    let mut writer = csv::Writer::from_writer(&mut buf);

    writer
        .write_record(CSV_HEADER)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    for bar in bars {
        writer
            .write_record([
                bar.trade_date.format("%Y-%m-%d").to_string(),
                bar.open.to_string(),
                bar.close.to_string(),
                bar.high.to_string(),
                bar.low.to_string(),
                bar.amount.to_string(),
            ])
            .map_err(|e| ApiError::Internal(e.to_string()))?;
    }
    writer
        .flush()
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    drop(writer);

    Ok(buf)
}

/// 导出日 K 线为 CSV 附件
#[utoipa::path(
    post,
    path = "/api/v1/tools/export-kline",
    tag = "工具 (Tools)",
    request_body = ExportKlineRequest,
    responses(
        (status = 200, description = "导出成功", content_type = "text/csv", body = String),
        (status = 400, description = "日期区间非法或没有可导出的数据")
    )
)]
pub async fn export_kline(
    State(state): State<AppState>,
    Json(req): Json<ExportKlineRequest>,
) -> Result<Response, ApiError> {
    if req.start_date > req.end_date {
        return Err(ApiError::BadRequest("开始日期不能晚于结束日期".to_string()));
    }
    let code = normalize_symbol(&req.code);

    let bars = state
        .bar_store
        .export_range(&code, req.start_date, req.end_date)
        .await?;
    if bars.is_empty() {
        return Err(ApiError::BadRequest("没有可导出的数据".to_string()));
    }

    let body = render_csv(&bars)?;
    let filename = format!(
        "{}_{}_{}.csv",
        code,
        req.start_date.format("%Y%m%d"),
        req.end_date.format("%Y%m%d")
    );
    tracing::info!("Exported {} bars for {}", bars.len(), code);

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response())
}
