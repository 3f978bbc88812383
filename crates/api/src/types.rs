//! # DTO (Data Transfer Object) 层
//!
//! 将内部领域模型转化为面向前端 JSON 输出的轻量结构体。
//! 所有 DTO 必须派生 `utoipa::ToSchema` 以自动进入 Swagger 文档。

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tidewatch_core::market::entity::Bar;
use tidewatch_core::store::port::{
    DEFAULT_PE_MAX, DEFAULT_PE_MIN, Holding, MonitorStock, XueqiuCube,
};
use tidewatch_kline::batch::BatchReport;
use tidewatch_kline::fetcher::RefreshOutcome;
use tidewatch_kline::service::KlineSeries;
use tidewatch_kline::valuation::{HoldingValuation, PortfolioSummary, PortfolioValuation};
use utoipa::ToSchema;

// ============================================================
//  K 线相关 DTO
// ============================================================

/// K 线数据 DTO
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BarResponse {
    /// 交易日 (合成 K 线为窗口内最后一个交易日)
    #[schema(example = "2026-02-10")]
    pub trade_date: String,
    /// 开盘价
    #[schema(example = 10.5)]
    pub open: f64,
    /// 最高价
    #[schema(example = 11.0)]
    pub high: f64,
    /// 最低价
    #[schema(example = 10.3)]
    pub low: f64,
    /// 收盘价
    #[schema(example = 10.8)]
    pub close: f64,
    /// 成交额
    #[schema(example = 10800000.0)]
    pub amount: f64,
}

impl From<&Bar> for BarResponse {
    fn from(bar: &Bar) -> Self {
        Self {
            trade_date: bar.trade_date.format("%Y-%m-%d").to_string(),
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            amount: bar.amount,
        }
    }
}

/// K 线序列与 EMA 指标 DTO
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct KlineSeriesResponse {
    /// 股票代码
    #[schema(example = "sh600000")]
    pub symbol: String,
    /// 周期 (1d / 2d / 3d)
    #[schema(example = "2d")]
    pub timeframe: String,
    /// 按交易日升序的 K 线
    pub bars: Vec<BarResponse>,
    /// 以窗口长度为键的 EMA 序列，与 `bars` 逐位对齐
    pub ema: BTreeMap<u32, Vec<f64>>,
}

impl From<KlineSeries> for KlineSeriesResponse {
    fn from(series: KlineSeries) -> Self {
        Self {
            symbol: series.symbol,
            timeframe: series.timeframe.as_str().to_string(),
            bars: series.bars.iter().map(BarResponse::from).collect(),
            ema: series.ema,
        }
    }
}

/// K 线查询参数
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct KlineQuery {
    /// 周期，缺省为日线
    pub timeframe: Option<String>,
    /// 返回根数，缺省使用配置值
    pub count: Option<usize>,
}

/// 刷新请求体
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct RefreshRequest {
    /// 是否忽略本地数据从回看起点重新抓取
    #[serde(default)]
    #[schema(example = false)]
    pub force_full: bool,
}

/// 单只股票刷新失败明细
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RefreshFailure {
    #[schema(example = "sh600000")]
    pub symbol: String,
    #[schema(example = "Provider error: HTTP 503")]
    pub error: String,
}

/// 批量刷新汇总 DTO
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BatchRefreshResponse {
    /// 成功数量
    #[schema(example = 4)]
    pub succeeded: usize,
    /// 提交数量
    #[schema(example = 5)]
    pub total: usize,
    /// 失败明细
    pub failed: Vec<RefreshFailure>,
}

impl From<&BatchReport> for BatchRefreshResponse {
    fn from(report: &BatchReport) -> Self {
        Self {
            succeeded: report.succeeded,
            total: report.total,
            failed: report
                .failed()
                .into_iter()
                .map(|(symbol, error)| RefreshFailure {
                    symbol: symbol.to_string(),
                    error,
                })
                .collect(),
        }
    }
}

/// 单只股票刷新结果 DTO
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RefreshOutcomeResponse {
    #[schema(example = "sh600000")]
    pub symbol: String,
    /// up_to_date / no_new_data / updated
    #[schema(example = "updated")]
    pub status: String,
    /// 写入的日线根数
    #[schema(example = 3)]
    pub written: usize,
}

impl RefreshOutcomeResponse {
    pub fn new(symbol: String, outcome: RefreshOutcome) -> Self {
        let (status, written) = match outcome {
            RefreshOutcome::UpToDate => ("up_to_date", 0),
            RefreshOutcome::NoNewData => ("no_new_data", 0),
            RefreshOutcome::Updated { written } => ("updated", written),
        };
        Self {
            symbol,
            status: status.to_string(),
            written,
        }
    }
}

// ============================================================
//  监控股票 DTO
// ============================================================

/// 监控股票 DTO
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MonitorStockResponse {
    #[schema(example = "sh601919")]
    pub code: String,
    #[schema(example = "中远海控")]
    pub name: String,
    #[schema(example = "1d")]
    pub timeframe: String,
    /// 合理市盈率下限
    #[schema(example = 15.0)]
    pub reasonable_pe_min: f64,
    /// 合理市盈率上限
    #[schema(example = 20.0)]
    pub reasonable_pe_max: f64,
    #[schema(example = true)]
    pub enabled: bool,
    #[schema(example = "2026-03-01T00:00:00Z")]
    pub created_at: String,
    #[schema(example = "2026-03-01T00:00:00Z")]
    pub updated_at: String,
}

impl From<MonitorStock> for MonitorStockResponse {
    fn from(stock: MonitorStock) -> Self {
        Self {
            code: stock.code,
            name: stock.name,
            timeframe: stock.timeframe.as_str().to_string(),
            reasonable_pe_min: stock.reasonable_pe_min,
            reasonable_pe_max: stock.reasonable_pe_max,
            enabled: stock.enabled,
            created_at: stock.created_at.to_rfc3339(),
            updated_at: stock.updated_at.to_rfc3339(),
        }
    }
}

/// 监控股票与雪球组合列表的查询参数
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct MonitorListQuery {
    /// 只返回启用项
    pub enabled_only: Option<bool>,
}

/// 新增监控股票请求体
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateMonitorStockRequest {
    /// 股票代码，可不带交易所前缀
    #[schema(example = "600000")]
    pub code: String,
    #[schema(example = "浦发银行")]
    pub name: String,
    #[schema(example = "2d")]
    pub timeframe: String,
    /// 合理市盈率下限，缺省 15
    #[serde(default = "default_pe_min")]
    #[schema(example = 15.0)]
    pub reasonable_pe_min: f64,
    /// 合理市盈率上限，缺省 20
    #[serde(default = "default_pe_max")]
    #[schema(example = 20.0)]
    pub reasonable_pe_max: f64,
}

fn default_pe_min() -> f64 {
    DEFAULT_PE_MIN
}

fn default_pe_max() -> f64 {
    DEFAULT_PE_MAX
}

/// 修改监控股票请求体
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateMonitorStockRequest {
    #[schema(example = "浦发银行")]
    pub name: String,
    #[schema(example = "3d")]
    pub timeframe: String,
    /// 缺省时保持原值
    #[schema(example = 18.0)]
    pub reasonable_pe_min: Option<f64>,
    /// 缺省时保持原值
    #[schema(example = 25.0)]
    pub reasonable_pe_max: Option<f64>,
    /// 缺省时保持原状态
    pub enabled: Option<bool>,
}

/// 启用/停用请求体
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SetEnabledRequest {
    #[schema(example = false)]
    pub enabled: bool,
}

// ============================================================
//  持仓 DTO
// ============================================================

/// 持仓 DTO
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HoldingResponse {
    #[schema(example = "sh600000")]
    pub code: String,
    #[schema(example = "浦发银行")]
    pub name: String,
    /// 成本价
    #[schema(example = "10.55")]
    pub cost_price: String,
    /// 持股数
    #[schema(example = 1000)]
    pub shares: i64,
}

impl From<Holding> for HoldingResponse {
    fn from(holding: Holding) -> Self {
        Self {
            code: holding.code,
            name: holding.name,
            cost_price: holding.cost_price.to_string(),
            shares: holding.shares,
        }
    }
}

fn money(value: Decimal) -> String {
    value.to_string()
}

/// 持仓估值行 DTO。金额均为字符串，无日线时现价相关字段为 null。
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HoldingValuationResponse {
    #[schema(example = "sh600938")]
    pub code: String,
    #[schema(example = "中国海油")]
    pub name: String,
    #[schema(example = "10.00")]
    pub cost_price: String,
    #[schema(example = 1000)]
    pub shares: i64,
    /// 持仓成本
    #[schema(example = "10000.00")]
    pub cost: String,
    /// 现价所属交易日
    #[schema(example = "2026-02-10")]
    pub price_date: Option<String>,
    /// 最新收盘价
    #[schema(example = "11")]
    pub current_price: Option<String>,
    #[schema(example = "11000")]
    pub market_value: Option<String>,
    #[schema(example = "1000")]
    pub profit_loss: Option<String>,
    /// 盈亏百分比
    #[schema(example = "10.00")]
    pub profit_loss_pct: Option<String>,
}

impl From<HoldingValuation> for HoldingValuationResponse {
    fn from(row: HoldingValuation) -> Self {
        Self {
            code: row.code,
            name: row.name,
            cost_price: money(row.cost_price),
            shares: row.shares,
            cost: money(row.cost),
            price_date: row.price_date.map(|d| d.format("%Y-%m-%d").to_string()),
            current_price: row.current_price.map(money),
            market_value: row.market_value.map(money),
            profit_loss: row.profit_loss.map(money),
            profit_loss_pct: row.profit_loss_pct.map(money),
        }
    }
}

/// 组合汇总 DTO
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PortfolioSummaryResponse {
    #[schema(example = "12000.00")]
    pub total_cost: String,
    /// 缺少日线的持仓按成本计入
    #[schema(example = "13000.00")]
    pub total_market_value: String,
    #[schema(example = "1000.00")]
    pub total_profit_loss: String,
    #[schema(example = "8.33")]
    pub total_profit_loss_pct: String,
    /// 取得现价的持仓数
    #[schema(example = 1)]
    pub priced: usize,
    /// 缺少日线的持仓数
    #[schema(example = 1)]
    pub unpriced: usize,
}

impl From<PortfolioSummary> for PortfolioSummaryResponse {
    fn from(summary: PortfolioSummary) -> Self {
        Self {
            total_cost: money(summary.total_cost),
            total_market_value: money(summary.total_market_value),
            total_profit_loss: money(summary.total_profit_loss),
            total_profit_loss_pct: money(summary.total_profit_loss_pct),
            priced: summary.priced,
            unpriced: summary.unpriced,
        }
    }
}

/// 持仓列表与汇总 DTO
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PortfolioResponse {
    pub rows: Vec<HoldingValuationResponse>,
    pub summary: PortfolioSummaryResponse,
}

impl From<PortfolioValuation> for PortfolioResponse {
    fn from(valuation: PortfolioValuation) -> Self {
        Self {
            rows: valuation
                .rows
                .into_iter()
                .map(HoldingValuationResponse::from)
                .collect(),
            summary: PortfolioSummaryResponse::from(valuation.summary),
        }
    }
}

/// 新增持仓请求体
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateHoldingRequest {
    #[schema(example = "600000")]
    pub code: String,
    #[schema(example = "浦发银行")]
    pub name: String,
    #[schema(value_type = String, example = "10.55")]
    pub cost_price: Decimal,
    #[schema(example = 1000)]
    pub shares: i64,
}

/// 修改持仓请求体
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateHoldingRequest {
    #[schema(example = "浦发银行")]
    pub name: String,
    #[schema(value_type = String, example = "10.20")]
    pub cost_price: Decimal,
    #[schema(example = 1500)]
    pub shares: i64,
}

// ============================================================
//  雪球组合 DTO
// ============================================================

/// 雪球组合配置 DTO
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct XueqiuCubeResponse {
    #[schema(example = "ZH123456")]
    pub cube_symbol: String,
    #[schema(example = "价值投资组合")]
    pub cube_name: String,
    #[schema(example = true)]
    pub enabled: bool,
    #[schema(example = "2026-03-01T00:00:00Z")]
    pub created_at: String,
    #[schema(example = "2026-03-01T00:00:00Z")]
    pub updated_at: String,
}

impl From<XueqiuCube> for XueqiuCubeResponse {
    fn from(cube: XueqiuCube) -> Self {
        Self {
            cube_symbol: cube.cube_symbol,
            cube_name: cube.cube_name,
            enabled: cube.enabled,
            created_at: cube.created_at.to_rfc3339(),
            updated_at: cube.updated_at.to_rfc3339(),
        }
    }
}

/// 新增雪球组合请求体
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateXueqiuCubeRequest {
    #[schema(example = "ZH123456")]
    pub cube_symbol: String,
    #[schema(example = "价值投资组合")]
    pub cube_name: String,
    /// 缺省为启用
    #[serde(default = "default_enabled")]
    #[schema(example = true)]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// 修改雪球组合请求体
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateXueqiuCubeRequest {
    #[schema(example = "更新后的组合")]
    pub cube_name: String,
    /// 缺省时保持原状态
    pub enabled: Option<bool>,
}

// ============================================================
//  工具 DTO
// ============================================================

/// 单笔买入记录
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BuyRecord {
    #[schema(value_type = String, example = "10.5")]
    pub price: Decimal,
    #[schema(example = 1000)]
    pub shares: i64,
}

/// 成本价计算请求体
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CalculateCostRequest {
    pub positions: Vec<BuyRecord>,
}

/// 成本价计算结果
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CalculateCostResponse {
    #[schema(example = 1500)]
    pub total_shares: i64,
    #[schema(example = "16000.0")]
    pub total_cost: String,
    /// 保留两位小数
    #[schema(example = "10.67")]
    pub average_cost: String,
}

/// 可导出股票 DTO
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ExportStockResponse {
    #[schema(example = "sh600000")]
    pub code: String,
    #[schema(example = "浦发银行")]
    pub name: String,
    /// 本地最新交易日，无数据时为 null
    #[schema(example = "2026-02-10")]
    pub latest_date: Option<String>,
}

/// K 线导出请求体
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ExportKlineRequest {
    #[schema(example = "sh600000")]
    pub code: String,
    #[schema(value_type = String, example = "2026-01-01")]
    pub start_date: NaiveDate,
    #[schema(value_type = String, example = "2026-02-10")]
    pub end_date: NaiveDate,
}

// ============================================================
//  通用响应 DTO
// ============================================================

/// 统一 API 响应包装器
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T: Serialize + ToSchema> {
    /// 是否成功
    pub success: bool,
    /// 数据载荷 (成功时)
    pub data: Option<T>,
    /// 错误信息 (失败时)
    pub error: Option<String>,
}

impl<T: Serialize + ToSchema> ApiResponse<T> {
    /// 构建成功响应
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// 构建失败响应 (不含泛型载荷)
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiErrorResponse {
    /// 固定为 false
    pub success: bool,
    /// 错误描述信息
    pub error: String,
}

impl ApiErrorResponse {
    /// 从错误信息构建
    pub fn from_msg(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            error: msg.into(),
        }
    }
}
