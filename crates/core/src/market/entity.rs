use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// # Summary
/// 单根日 K 线实体，记录某只股票一个交易日的行情概要。
///
/// # Invariants
/// - (`symbol`, `trade_date`) 在存储中唯一。
/// - 价格为正数，`amount` 非负。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    // 带交易所前缀的代码 (例如: sh600000)
    pub symbol: String,
    // 交易日
    pub trade_date: NaiveDate,
    // 开盘价
    pub open: f64,
    // 最高价
    pub high: f64,
    // 最低价
    pub low: f64,
    // 收盘价
    pub close: f64,
    // 成交额
    pub amount: f64,
}

/// # Summary
/// 行情源返回的原始行，字段已按名称映射但尚未解析与校验。
///
/// # Invariants
/// - 缺失的字段以 `None` 表示，由规范化步骤负责拒绝。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawBarRow {
    pub date: Option<String>,
    pub open: Option<String>,
    pub high: Option<String>,
    pub low: Option<String>,
    pub close: Option<String>,
    pub amount: Option<String>,
}
