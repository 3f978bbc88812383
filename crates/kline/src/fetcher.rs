use crate::error::KlineError;
use crate::normalize::normalize_rows;
use chrono::{Datelike, NaiveDate};
use dashmap::DashSet;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tidewatch_core::common::time::TimeProvider;
use tidewatch_core::config::KlineConfig;
use tidewatch_core::market::error::MarketError;
use tidewatch_core::market::port::DailyBarProvider;
use tidewatch_core::store::port::BarStore;
use tracing::{Instrument, Span, debug, info, info_span};

/// # Summary
/// 单只股票一次刷新的结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RefreshOutcome {
    // 抓取窗口为空，未调用行情源
    UpToDate,
    // 行情源未返回任何合法行
    NoNewData,
    // 写入了 `written` 根日线
    Updated { written: usize },
}

/// 刷新结束时把股票从执行集合中移除。
struct InFlightGuard<'a> {
    set: &'a DashSet<String>,
    symbol: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set.remove(&self.symbol);
    }
}

/// # Summary
/// 增量抓取器：只向行情源请求本地缺失的日线并合并写入 Bar Store。
///
/// # Invariants
/// - 同一股票同一时刻最多只有一个刷新在执行，重复请求返回 `KlineError::Busy`。
/// - "今天"始终来自注入的 `TimeProvider`。
pub struct IncrementalFetcher {
    // 日线持久化存储
    store: Arc<dyn BarStore>,
    // 原始行情源
    provider: Arc<dyn DailyBarProvider>,
    // 时钟
    clock: Arc<dyn TimeProvider>,
    // 全量抓取的起始日期
    lookback_floor: NaiveDate,
    // 每个自然年窗口的超时
    timeout: Duration,
    // 正在刷新的股票集合
    in_flight: DashSet<String>,
    span: Span,
}

impl IncrementalFetcher {
    /// # Summary
    /// 创建增量抓取器。
    ///
    /// # Arguments
    /// * `store`: Bar Store。
    /// * `provider`: 行情源。
    /// * `clock`: 时钟。
    /// * `config`: 提供回看起点与超时设置。
    /// * `parent`: 父级 Span，抓取器的日志挂在其下。
    pub fn new(
        store: Arc<dyn BarStore>,
        provider: Arc<dyn DailyBarProvider>,
        clock: Arc<dyn TimeProvider>,
        config: &KlineConfig,
        parent: &Span,
    ) -> Self {
        Self {
            store,
            provider,
            clock,
            lookback_floor: config.lookback_floor,
            timeout: Duration::from_secs(config.provider_timeout_secs),
            in_flight: DashSet::new(),
            span: info_span!(parent: parent, "incremental_fetcher"),
        }
    }

    /// # Summary
    /// 刷新单只股票的日线。
    ///
    /// # Logic
    /// 1. 登记到执行集合，已在刷新中则返回 `Busy`。
    /// 2. `force_full` 或本地无数据时从回看起点开始，否则从最新交易日的次日开始。
    /// 3. 起点不早于今天时直接返回 `UpToDate`，不调用行情源。
    /// 4. 在超时限制内调用行情源，超时或失败返回 `Provider`。超时预算按窗口跨越的自然年数放大。
    /// 5. 规范化原始行，非法行被丢弃。
    /// 6. 没有合法行返回 `NoNewData`，否则合并写入并返回 `Updated`。
    ///
    /// # Arguments
    /// * `symbol`: 带交易所前缀的股票代码。
    /// * `force_full`: 是否忽略本地数据从回看起点重新抓取。
    ///
    /// # Returns
    /// 刷新结果或 `KlineError`。
    pub async fn refresh(
        &self,
        symbol: &str,
        force_full: bool,
    ) -> Result<RefreshOutcome, KlineError> {
        if !self.in_flight.insert(symbol.to_string()) {
            return Err(KlineError::Busy(symbol.to_string()));
        }
        let _guard = InFlightGuard {
            set: &self.in_flight,
            symbol: symbol.to_string(),
        };

        let span = info_span!(parent: &self.span, "refresh", symbol, force_full);
        self.refresh_window(symbol, force_full).instrument(span).await
    }

    async fn refresh_window(
        &self,
        symbol: &str,
        force_full: bool,
    ) -> Result<RefreshOutcome, KlineError> {
        let start = if force_full {
            self.lookback_floor
        } else {
            match self.store.latest_date(symbol).await? {
                Some(latest) => latest.succ_opt().unwrap_or(latest),
                None => self.lookback_floor,
            }
        };
        let end = self.clock.today();

        if start >= end {
            debug!("Window {}..{} is empty, skipping provider", start, end);
            return Ok(RefreshOutcome::UpToDate);
        }

        let budget = fetch_budget(self.timeout, start, end);
        let rows = tokio::time::timeout(
            budget,
            self.provider.fetch_daily_bars(symbol, start, end),
        )
        .await
        .map_err(|_| KlineError::Provider(MarketError::Timeout(budget.as_secs()).to_string()))?
        .map_err(|e| KlineError::Provider(e.to_string()))?;

        let bars = normalize_rows(symbol, &rows);
        if bars.is_empty() {
            debug!("No valid rows in {}..{}", start, end);
            return Ok(RefreshOutcome::NoNewData);
        }

        let written = self.store.merge(symbol, &bars).await?;
        info!("Merged {} bars ({}..{})", written, start, end);
        Ok(RefreshOutcome::Updated { written })
    }
}

/// 行情源按自然年分段顺序请求，总超时为单段超时乘以窗口跨越的年数。
fn fetch_budget(per_year: Duration, start: NaiveDate, end: NaiveDate) -> Duration {
    let years = u32::try_from(end.year() - start.year() + 1)
        .unwrap_or(1)
        .max(1);
    per_year.saturating_mul(years)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;
    use tidewatch_core::common::time::FakeClockProvider;
    use tidewatch_core::market::entity::{Bar, RawBarRow};
    use tidewatch_core::test_utils::MemoryBarStore;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    fn row(date: NaiveDate, close: f64) -> RawBarRow {
        RawBarRow {
            date: Some(date.format("%Y-%m-%d").to_string()),
            open: Some(close.to_string()),
            high: Some((close + 1.0).to_string()),
            low: Some((close - 1.0).to_string()),
            close: Some(close.to_string()),
            amount: Some("1000".to_string()),
        }
    }

    /// 记录请求窗口并按窗口返回每日一行的模拟行情源。
    #[derive(Default)]
    struct RecordingProvider {
        calls: Mutex<Vec<(String, NaiveDate, NaiveDate)>>,
        delay: Option<Duration>,
        rows_override: Option<Vec<RawBarRow>>,
    }

    impl RecordingProvider {
        fn calls(&self) -> Vec<(String, NaiveDate, NaiveDate)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DailyBarProvider for RecordingProvider {
        async fn fetch_daily_bars(
            &self,
            symbol: &str,
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<Vec<RawBarRow>, MarketError> {
            self.calls
                .lock()
                .unwrap()
                .push((symbol.to_string(), start, end));
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(rows) = &self.rows_override {
                return Ok(rows.clone());
            }
            Ok(start
                .iter_days()
                .take_while(|d| *d <= end)
                .map(|d| row(d, 10.0))
                .collect())
        }
    }

    fn clock_at(m: u32, d: u32) -> Arc<FakeClockProvider> {
        Arc::new(FakeClockProvider::new(
            Utc.with_ymd_and_hms(2024, m, d, 2, 0, 0).unwrap(),
        ))
    }

    fn config(floor: NaiveDate) -> KlineConfig {
        KlineConfig {
            lookback_floor: floor,
            provider_timeout_secs: 1,
            ..KlineConfig::default()
        }
    }

    fn fetcher(
        store: Arc<MemoryBarStore>,
        provider: Arc<RecordingProvider>,
        floor: NaiveDate,
    ) -> IncrementalFetcher {
        IncrementalFetcher::new(
            store,
            provider,
            clock_at(3, 10),
            &config(floor),
            &Span::none(),
        )
    }

    fn seeded_bar(symbol: &str, trade_date: NaiveDate) -> Bar {
        Bar {
            symbol: symbol.to_string(),
            trade_date,
            open: 9.0,
            high: 9.5,
            low: 8.5,
            close: 9.0,
            amount: 10.0,
        }
    }

    #[tokio::test]
    async fn test_window_starts_day_after_latest() {
        let store = Arc::new(MemoryBarStore::new());
        store
            .merge("sh600000", &[seeded_bar("sh600000", date(3, 5))])
            .await
            .unwrap();
        let provider = Arc::new(RecordingProvider::default());
        let fetcher = fetcher(store.clone(), provider.clone(), date(1, 1));

        let outcome = fetcher.refresh("sh600000", false).await.unwrap();

        assert_eq!(provider.calls(), vec![("sh600000".to_string(), date(3, 6), date(3, 10))]);
        assert_eq!(outcome, RefreshOutcome::Updated { written: 5 });
        assert_eq!(store.row_count("sh600000"), 6);
    }

    #[tokio::test]
    async fn test_no_prior_data_or_force_full_uses_floor() {
        let store = Arc::new(MemoryBarStore::new());
        store
            .merge("sz000001", &[seeded_bar("sz000001", date(3, 8))])
            .await
            .unwrap();
        let provider = Arc::new(RecordingProvider::default());
        let fetcher = fetcher(store, provider.clone(), date(3, 1));

        fetcher.refresh("sz000002", false).await.unwrap();
        fetcher.refresh("sz000001", true).await.unwrap();

        let calls = provider.calls();
        assert_eq!(calls[0], ("sz000002".to_string(), date(3, 1), date(3, 10)));
        assert_eq!(calls[1], ("sz000001".to_string(), date(3, 1), date(3, 10)));
    }

    #[tokio::test]
    async fn test_up_to_date_skips_provider() {
        let store = Arc::new(MemoryBarStore::new());
        store
            .merge("sh600000", &[seeded_bar("sh600000", date(3, 9))])
            .await
            .unwrap();
        let provider = Arc::new(RecordingProvider::default());
        let fetcher = fetcher(store, provider.clone(), date(1, 1));

        let outcome = fetcher.refresh("sh600000", false).await.unwrap();
        assert_eq!(outcome, RefreshOutcome::UpToDate);
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_rows_are_dropped() {
        let store = Arc::new(MemoryBarStore::new());
        let mut bad = row(date(3, 4), 10.0);
        bad.close = Some("-3".to_string());
        let provider = Arc::new(RecordingProvider {
            rows_override: Some(vec![row(date(3, 3), 10.0), bad]),
            ..RecordingProvider::default()
        });
        let fetcher = fetcher(store.clone(), provider, date(3, 1));

        let outcome = fetcher.refresh("sh600000", false).await.unwrap();
        assert_eq!(outcome, RefreshOutcome::Updated { written: 1 });
        assert_eq!(store.row_count("sh600000"), 1);
    }

    #[tokio::test]
    async fn test_empty_provider_result_is_no_new_data() {
        let store = Arc::new(MemoryBarStore::new());
        let provider = Arc::new(RecordingProvider {
            rows_override: Some(vec![]),
            ..RecordingProvider::default()
        });
        let fetcher = fetcher(store.clone(), provider, date(3, 1));

        let outcome = fetcher.refresh("sh600000", false).await.unwrap();
        assert_eq!(outcome, RefreshOutcome::NoNewData);
        assert_eq!(store.row_count("sh600000"), 0);
    }

    #[tokio::test]
    async fn test_store_failure_is_persistence_error() {
        let store = Arc::new(MemoryBarStore::new());
        store.set_fail_writes(true);
        let provider = Arc::new(RecordingProvider::default());
        let fetcher = fetcher(store, provider, date(3, 1));

        let result = fetcher.refresh("sh600000", false).await;
        assert!(matches!(result, Err(KlineError::Persistence(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_provider_timeout() {
        let store = Arc::new(MemoryBarStore::new());
        let provider = Arc::new(RecordingProvider {
            delay: Some(Duration::from_secs(5)),
            ..RecordingProvider::default()
        });
        let fetcher = fetcher(store, provider, date(3, 1));

        let result = fetcher.refresh("sh600000", false).await;
        assert!(matches!(result, Err(KlineError::Provider(_))));
        assert!(result.unwrap_err().to_string().contains("timed out after 1s"));
    }

    #[test]
    fn test_fetch_budget_scales_with_years() {
        let per_year = Duration::from_secs(30);
        let d = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap();

        assert_eq!(fetch_budget(per_year, d(2024, 1, 1), d(2024, 3, 10)), per_year);
        assert_eq!(
            fetch_budget(per_year, d(2020, 1, 1), d(2024, 3, 10)),
            Duration::from_secs(150)
        );
        // 起点晚于终点时至少保留一段
        assert_eq!(fetch_budget(per_year, d(2025, 1, 1), d(2024, 3, 10)), per_year);
    }

    #[tokio::test(start_paused = true)]
    async fn test_multi_year_window_gets_scaled_timeout() {
        let store = Arc::new(MemoryBarStore::new());
        // 超过单段超时，但在两年窗口的预算之内
        let provider = Arc::new(RecordingProvider {
            delay: Some(Duration::from_millis(1500)),
            rows_override: Some(vec![row(date(3, 3), 10.0)]),
            ..RecordingProvider::default()
        });
        let floor = NaiveDate::from_ymd_opt(2023, 6, 1).unwrap();
        let fetcher = fetcher(store.clone(), provider.clone(), floor);

        let outcome = fetcher.refresh("sh600000", false).await.unwrap();
        assert_eq!(outcome, RefreshOutcome::Updated { written: 1 });
        assert_eq!(provider.calls()[0].1, floor);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_refresh_of_same_symbol_is_busy() {
        let store = Arc::new(MemoryBarStore::new());
        let provider = Arc::new(RecordingProvider {
            delay: Some(Duration::from_millis(500)),
            ..RecordingProvider::default()
        });
        let fetcher = fetcher(store, provider, date(3, 1));

        let (first, second) = tokio::join!(
            fetcher.refresh("sh600000", false),
            fetcher.refresh("sh600000", false)
        );
        assert!(first.is_ok());
        assert!(matches!(second, Err(KlineError::Busy(_))));

        // 前一次结束后可以再次刷新
        assert!(fetcher.refresh("sh600000", false).await.is_ok());
    }
}
