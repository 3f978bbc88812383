use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderValue, REFERER, USER_AGENT};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tidewatch_core::common::normalize_symbol;
use tidewatch_core::market::entity::RawBarRow;
use tidewatch_core::market::error::MarketError;
use tidewatch_core::market::port::DailyBarProvider;
use tracing::debug;

const KLINE_URL: &str = "https://proxy.finance.qq.com/ifzqgtimg/appstock/app/newfqkline/get";

// 单次请求的最大行数，一年的交易日远小于该值
const ROWS_PER_REQUEST: u32 = 640;

/// # Summary
/// 腾讯证券前复权日 K 线行情提供者。
///
/// # Invariants
/// - 按自然年拆分请求，避免单次返回被截断。
/// - 只负责按列位置映射字段，数值校验交给下游规范化步骤。
#[derive(Clone)]
pub struct TencentProvider {
    /// 内部使用的 HTTP 客户端
    client: Client,
}

impl TencentProvider {
    /// # Summary
    /// 创建一个新的 TencentProvider 实例。
    ///
    /// # Logic
    /// 1. 安装 rustls 加密后端。
    /// 2. 设置浏览器 User-Agent 与 Referer。
    /// 3. 以给定超时构建 reqwest 客户端。
    ///
    /// # Arguments
    /// * `timeout`: 单次 HTTP 请求的超时时间。
    ///
    /// # Returns
    /// 成功返回提供者实例，客户端构建失败返回 `MarketError::Network`。
    pub fn new(timeout: Duration) -> Result<Self, MarketError> {
        crate::install_crypto_provider();

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
            ),
        );
        headers.insert(REFERER, HeaderValue::from_static("https://gu.qq.com/"));

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| MarketError::Network(e.to_string()))?;

        Ok(Self { client })
    }

    async fn fetch_year(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<RawBarRow>, MarketError> {
        let var_name = format!("kline_dayqfq{}", from.year());
        let param = format!(
            "{},day,{},{},{},qfq",
            symbol,
            from.format("%Y-%m-%d"),
            to.format("%Y-%m-%d"),
            ROWS_PER_REQUEST
        );

        let resp = self
            .client
            .get(KLINE_URL)
            .query(&[("_var", var_name.as_str()), ("param", param.as_str())])
            .send()
            .await
            .map_err(|e| MarketError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(MarketError::Network(format!("HTTP {}", resp.status())));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| MarketError::Network(e.to_string()))?;

        parse_kline_payload(symbol, &body)
    }
}

#[async_trait]
impl DailyBarProvider for TencentProvider {
    /// # Summary
    /// 从腾讯证券抓取日 K 线原始行。
    ///
    /// # Logic
    /// 1. 规范化股票代码 (补全 sh/sz 前缀)。
    /// 2. 将 `[start, end]` 按自然年切分，逐年请求。
    /// 3. 解析 JSONP 包装的响应体并映射为 `RawBarRow`。
    /// 4. 丢弃日期落在区间外的行。
    ///
    /// # Arguments
    /// * `symbol`: 股票代码。
    /// * `start`: 开始日期（包含）。
    /// * `end`: 结束日期（包含）。
    ///
    /// # Returns
    /// 成功返回原始行列表，失败返回 `MarketError`。
    async fn fetch_daily_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawBarRow>, MarketError> {
        let symbol = normalize_symbol(symbol);
        let mut rows = Vec::new();

        for (from, to) in year_windows(start, end) {
            let chunk = self.fetch_year(&symbol, from, to).await?;
            debug!("Fetched {} rows for {} in {}", chunk.len(), symbol, from.year());
            rows.extend(chunk);
        }

        rows.retain(|row| within_range(row, start, end));
        Ok(rows)
    }
}

/// 响应体外层结构，`data` 在出错时可能是空数组，因此保留为原始 JSON。
#[derive(Deserialize, Debug)]
struct TencentEnvelope {
    code: i64,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    data: Value,
}

/// # Summary
/// 将 `[start, end]` 切分为互不重叠的自然年区间。
fn year_windows(start: NaiveDate, end: NaiveDate) -> Vec<(NaiveDate, NaiveDate)> {
    let mut windows = Vec::new();
    if start > end {
        return windows;
    }

    for year in start.year()..=end.year() {
        let first = NaiveDate::from_ymd_opt(year, 1, 1).unwrap_or(start);
        let last = NaiveDate::from_ymd_opt(year, 12, 31).unwrap_or(end);
        windows.push((first.max(start), last.min(end)));
    }
    windows
}

/// 日期无法解析的行保留下来，由规范化步骤拒绝并记录。
fn within_range(row: &RawBarRow, start: NaiveDate, end: NaiveDate) -> bool {
    match row
        .date
        .as_deref()
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
    {
        Some(date) => date >= start && date <= end,
        None => true,
    }
}

fn cell(row: &[Value], index: usize) -> Option<String> {
    match row.get(index)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// # Summary
/// 解析腾讯 K 线接口的响应体。
///
/// # Logic
/// 1. 去掉 `kline_dayqfqYYYY=` 形式的变量前缀，截取 JSON 对象。
/// 2. `code` 非 0 视为接口错误。
/// 3. 优先读取 `qfqday`，缺失时回退到 `day`。
/// 4. 每行按 `[date, open, close, high, low, amount, ...]` 的列位置映射。
///
/// # Arguments
/// * `symbol`: 带交易所前缀的股票代码，用于定位 `data` 下的节点。
/// * `body`: 原始响应文本。
///
/// # Returns
/// 原始行列表；股票不存在或区间无数据时返回空列表。
pub fn parse_kline_payload(symbol: &str, body: &str) -> Result<Vec<RawBarRow>, MarketError> {
    let json_start = body
        .find('{')
        .ok_or_else(|| MarketError::Parse("response contains no JSON object".into()))?;

    let envelope: TencentEnvelope = serde_json::from_str(body[json_start..].trim_end())
        .map_err(|e| MarketError::Parse(e.to_string()))?;

    if envelope.code != 0 {
        return Err(MarketError::Unknown(format!(
            "code {}: {}",
            envelope.code, envelope.msg
        )));
    }

    let Some(node) = envelope.data.get(symbol) else {
        return Ok(Vec::new());
    };

    let Some(rows) = node
        .get("qfqday")
        .or_else(|| node.get("day"))
        .and_then(Value::as_array)
    else {
        return Ok(Vec::new());
    };

    Ok(rows
        .iter()
        .map(|row| match row.as_array() {
            Some(cells) => RawBarRow {
                date: cell(cells, 0),
                open: cell(cells, 1),
                close: cell(cells, 2),
                high: cell(cells, 3),
                low: cell(cells, 4),
                amount: cell(cells, 5),
            },
            None => RawBarRow::default(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    const PAYLOAD: &str = r#"kline_dayqfq2024={"code":0,"msg":"","data":{"sh600000":{"qfqday":[["2024-01-02","6.580","6.600","6.620","6.550","317530.000"],["2024-01-03","6.600","6.640","6.650","6.580","402115.000",{"nd":"2023"}],"garbage"],"qt":{}}}}"#;

    #[test]
    fn test_parse_maps_columns_by_position() {
        let rows = parse_kline_payload("sh600000", PAYLOAD).unwrap();
        assert_eq!(rows.len(), 3);

        assert_eq!(rows[0].date.as_deref(), Some("2024-01-02"));
        assert_eq!(rows[0].open.as_deref(), Some("6.580"));
        assert_eq!(rows[0].close.as_deref(), Some("6.600"));
        assert_eq!(rows[0].high.as_deref(), Some("6.620"));
        assert_eq!(rows[0].low.as_deref(), Some("6.550"));
        assert_eq!(rows[0].amount.as_deref(), Some("317530.000"));

        // 附加的分红信息列被忽略
        assert_eq!(rows[1].amount.as_deref(), Some("402115.000"));
        // 非数组行映射为全空，由规范化拒绝
        assert_eq!(rows[2], RawBarRow::default());
    }

    #[test]
    fn test_parse_falls_back_to_plain_day_rows() {
        let body = r#"x={"code":0,"data":{"sz000001":{"day":[["2024-02-01",10.5,10.6,10.8,10.4,1000]]}}}"#;
        let rows = parse_kline_payload("sz000001", body).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].open.as_deref(), Some("10.5"));
        assert_eq!(rows[0].amount.as_deref(), Some("1000"));
    }

    #[test]
    fn test_parse_unknown_symbol_is_empty() {
        let body = r#"kline_dayqfq2024={"code":0,"msg":"","data":[]}"#;
        assert!(parse_kline_payload("sh999999", body).unwrap().is_empty());
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            parse_kline_payload("sh600000", "<html>blocked</html>"),
            Err(MarketError::Parse(_))
        ));
        assert!(matches!(
            parse_kline_payload("sh600000", "v={\"code\":0,"),
            Err(MarketError::Parse(_))
        ));
        assert!(matches!(
            parse_kline_payload("sh600000", r#"v={"code":-1,"msg":"param error"}"#),
            Err(MarketError::Unknown(_))
        ));
    }

    #[test]
    fn test_year_windows_do_not_overlap() {
        let windows = year_windows(date(2022, 11, 15), date(2024, 3, 1));
        assert_eq!(
            windows,
            vec![
                (date(2022, 11, 15), date(2022, 12, 31)),
                (date(2023, 1, 1), date(2023, 12, 31)),
                (date(2024, 1, 1), date(2024, 3, 1)),
            ]
        );
        assert!(year_windows(date(2024, 3, 2), date(2024, 3, 1)).is_empty());
    }

    #[test]
    fn test_within_range_keeps_unparseable_dates() {
        let start = date(2024, 1, 3);
        let end = date(2024, 1, 5);
        let row = |d: &str| RawBarRow {
            date: Some(d.to_string()),
            ..RawBarRow::default()
        };
        assert!(!within_range(&row("2024-01-02"), start, end));
        assert!(within_range(&row("2024-01-03"), start, end));
        assert!(within_range(&row("2024-01-05"), start, end));
        assert!(!within_range(&row("2024-01-06"), start, end));
        assert!(within_range(&row("not-a-date"), start, end));
    }
}
