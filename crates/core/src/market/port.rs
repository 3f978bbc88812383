use crate::market::entity::RawBarRow;
use crate::market::error::MarketError;
use async_trait::async_trait;
use chrono::NaiveDate;

/// # Summary
/// 日 K 线行情源接口（原始数据源）。
///
/// # Invariants
/// - 返回的行已按字段名映射，但不保证数值合法。
/// - 区间内没有数据时返回空列表而非错误。
#[async_trait]
pub trait DailyBarProvider: Send + Sync {
    /// # Summary
    /// 获取特定股票在闭区间 `[start, end]` 内的日 K 线原始行。
    ///
    /// # Logic
    /// 1. 将代码转换为数据源识别的格式。
    /// 2. 构建请求并执行网络调用。
    /// 3. 按列位置将响应映射为 `RawBarRow`。
    ///
    /// # Arguments
    /// * `symbol`: 带交易所前缀的股票代码。
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
    ) -> Result<Vec<RawBarRow>, MarketError>;
}
