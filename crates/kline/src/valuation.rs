use crate::error::KlineError;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tidewatch_core::market::entity::Bar;
use tidewatch_core::store::port::Holding;

/// 现价保留的小数位
const PRICE_DP: u32 = 3;
/// 金额保留的小数位
const MONEY_DP: u32 = 2;

/// # Summary
/// 单个持仓的估值行。
///
/// # Invariants
/// - 库中没有该股票日线时，现价、市值与盈亏字段均为 `None`。
#[derive(Debug, Clone, PartialEq)]
pub struct HoldingValuation {
    pub code: String,
    pub name: String,
    pub cost_price: Decimal,
    pub shares: i64,
    // 持仓成本 = 成本价 × 股数
    pub cost: Decimal,
    // 现价对应的交易日
    pub price_date: Option<NaiveDate>,
    pub current_price: Option<Decimal>,
    pub market_value: Option<Decimal>,
    pub profit_loss: Option<Decimal>,
    // 百分比，保留两位小数
    pub profit_loss_pct: Option<Decimal>,
}

/// 组合汇总。未取得现价的持仓按成本计入市值。
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioSummary {
    pub total_cost: Decimal,
    pub total_market_value: Decimal,
    pub total_profit_loss: Decimal,
    pub total_profit_loss_pct: Decimal,
    // 取得现价的持仓数
    pub priced: usize,
    // 缺少日线的持仓数
    pub unpriced: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioValuation {
    pub rows: Vec<HoldingValuation>,
    pub summary: PortfolioSummary,
}

fn overflow() -> KlineError {
    KlineError::Validation("valuation overflow".to_string())
}

/// 盈亏百分比，成本为零时记为 0。
fn percent(profit: Decimal, base: Decimal) -> Result<Decimal, KlineError> {
    if base.is_zero() {
        return Ok(Decimal::ZERO);
    }
    let pct = profit
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|v| v.checked_div(base))
        .ok_or_else(overflow)?;
    Ok(pct.round_dp(MONEY_DP))
}

/// # Summary
/// 用最新收盘价为持仓估值并汇总。
///
/// # Logic
/// 1. 成本 = 成本价 × 股数。
/// 2. `latest` 中有该股票的日线时，现价取其收盘价，计算市值、盈亏与盈亏比例。
/// 3. 缺少日线的持仓按成本计入总市值，盈亏为零。
/// 4. 全部运算使用带检查的 `Decimal` 运算。
///
/// # Arguments
/// * `holdings`: 持仓列表。
/// * `latest`: 以持仓代码为键的最新日线。
///
/// # Returns
/// 估值结果；溢出或收盘价无法转换时返回 `Validation`。
pub fn value_holdings(
    holdings: &[Holding],
    latest: &BTreeMap<String, Bar>,
) -> Result<PortfolioValuation, KlineError> {
    let mut rows = Vec::with_capacity(holdings.len());
    let mut total_cost = Decimal::ZERO;
    let mut total_market_value = Decimal::ZERO;
    let mut priced = 0;

    for holding in holdings {
        let shares = Decimal::from(holding.shares);
        let cost = holding
            .cost_price
            .checked_mul(shares)
            .ok_or_else(overflow)?
            .round_dp(MONEY_DP);
        total_cost = total_cost.checked_add(cost).ok_or_else(overflow)?;

        let mut row = HoldingValuation {
            code: holding.code.clone(),
            name: holding.name.clone(),
            cost_price: holding.cost_price,
            shares: holding.shares,
            cost,
            price_date: None,
            current_price: None,
            market_value: None,
            profit_loss: None,
            profit_loss_pct: None,
        };

        match latest.get(&holding.code) {
            Some(bar) => {
                let price = Decimal::try_from(bar.close)
                    .map_err(|e| KlineError::Validation(e.to_string()))?
                    .round_dp(PRICE_DP);
                let market_value = price
                    .checked_mul(shares)
                    .ok_or_else(overflow)?
                    .round_dp(MONEY_DP);
                let profit_loss = market_value.checked_sub(cost).ok_or_else(overflow)?;

                row.price_date = Some(bar.trade_date);
                row.current_price = Some(price);
                row.market_value = Some(market_value);
                row.profit_loss = Some(profit_loss);
                row.profit_loss_pct = Some(percent(profit_loss, cost)?);
                total_market_value = total_market_value
                    .checked_add(market_value)
                    .ok_or_else(overflow)?;
                priced += 1;
            }
            None => {
                total_market_value = total_market_value.checked_add(cost).ok_or_else(overflow)?;
            }
        }
        rows.push(row);
    }

    let total_profit_loss = total_market_value
        .checked_sub(total_cost)
        .ok_or_else(overflow)?;
    let summary = PortfolioSummary {
        total_cost,
        total_market_value,
        total_profit_loss,
        total_profit_loss_pct: percent(total_profit_loss, total_cost)?,
        priced,
        unpriced: rows.len() - priced,
    };

    Ok(PortfolioValuation { rows, summary })
}
