use crate::error::KlineError;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tidewatch_core::market::entity::{Bar, RawBarRow};
use tracing::warn;

fn require<'a>(field: &'static str, value: &'a Option<String>) -> Result<&'a str, KlineError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| KlineError::Validation(format!("missing {}", field)))
}

fn parse_date(raw: &str) -> Result<NaiveDate, KlineError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y%m%d"))
        .map_err(|_| KlineError::Validation(format!("malformed trade_date {:?}", raw)))
}

fn parse_number(field: &'static str, raw: &str) -> Result<f64, KlineError> {
    let value: f64 = raw
        .parse()
        .map_err(|_| KlineError::Validation(format!("malformed {} {:?}", field, raw)))?;
    if !value.is_finite() {
        return Err(KlineError::Validation(format!("non-finite {}", field)));
    }
    Ok(value)
}

fn parse_price(field: &'static str, value: &Option<String>) -> Result<f64, KlineError> {
    let price = parse_number(field, require(field, value)?)?;
    if price <= 0.0 {
        return Err(KlineError::Validation(format!(
            "{} must be positive, got {}",
            field, price
        )));
    }
    Ok(price)
}

/// # Summary
/// 将单条原始行转换为 `Bar`。
///
/// # Logic
/// 1. 交易日必须存在，接受 `YYYY-MM-DD` 或 `YYYYMMDD`。
/// 2. 四个价格必须存在且为正数。
/// 3. 成交额必须存在且非负。
///
/// # Arguments
/// * `symbol`: 写入 `Bar` 的股票代码。
/// * `row`: 行情源返回的原始行。
///
/// # Returns
/// 合法时返回 `Bar`，否则返回 `KlineError::Validation`。
pub fn normalize_row(symbol: &str, row: &RawBarRow) -> Result<Bar, KlineError> {
    let trade_date = parse_date(require("trade_date", &row.date)?)?;
    let open = parse_price("open", &row.open)?;
    let high = parse_price("high", &row.high)?;
    let low = parse_price("low", &row.low)?;
    let close = parse_price("close", &row.close)?;

    let amount = parse_number("amount", require("amount", &row.amount)?)?;
    if amount < 0.0 {
        return Err(KlineError::Validation(format!(
            "amount must be non-negative, got {}",
            amount
        )));
    }

    Ok(Bar {
        symbol: symbol.to_string(),
        trade_date,
        open,
        high,
        low,
        close,
        amount,
    })
}

/// # Summary
/// 批量规范化原始行，非法行记录告警后丢弃。
///
/// # Logic
/// 1. 逐行调用 `normalize_row`。
/// 2. 同一交易日出现多次时保留最后一次。
/// 3. 按交易日升序输出。
pub fn normalize_rows(symbol: &str, rows: &[RawBarRow]) -> Vec<Bar> {
    let mut by_date = BTreeMap::new();
    for row in rows {
        match normalize_row(symbol, row) {
            Ok(bar) => {
                by_date.insert(bar.trade_date, bar);
            }
            Err(e) => warn!("Dropping invalid row for {}: {} ({:?})", symbol, e, row),
        }
    }
    by_date.into_values().collect()
}
