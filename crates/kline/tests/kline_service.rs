use async_trait::async_trait;
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use std::sync::{Arc, Mutex};
use tidewatch_core::common::Timeframe;
use tidewatch_core::common::time::FakeClockProvider;
use tidewatch_core::config::KlineConfig;
use tidewatch_core::market::entity::{Bar, RawBarRow};
use tidewatch_core::market::error::MarketError;
use tidewatch_core::market::port::DailyBarProvider;
use tidewatch_core::store::port::BarStore;
use tidewatch_core::test_utils::{MemoryBarStore, MemoryMonitorStore};
use tidewatch_kline::error::KlineError;
use tidewatch_kline::fetcher::RefreshOutcome;
use tidewatch_kline::indicator::compute_ema;
use tidewatch_kline::resample::resample;
use tidewatch_kline::service::KlineService;
use tracing::Span;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 14).unwrap()
}

fn bar(symbol: &str, trade_date: NaiveDate, close: f64) -> Bar {
    Bar {
        symbol: symbol.to_string(),
        trade_date,
        open: close - 0.2,
        high: close + 0.5,
        low: close - 0.5,
        close,
        amount: 1000.0,
    }
}

/// 连续 `n` 个自然日的日线，最后一根落在 `last`。
fn history(symbol: &str, n: u32, last: NaiveDate) -> Vec<Bar> {
    (0..n)
        .map(|i| {
            let trade_date = last - Duration::days(i64::from(n - 1 - i));
            bar(symbol, trade_date, 10.0 + f64::from(i) * 0.1)
        })
        .collect()
}

/// 记录被请求股票的模拟行情源，`failing` 中的股票返回网络错误。
#[derive(Default)]
struct MockProvider {
    requested: Mutex<Vec<String>>,
    failing: Vec<String>,
}

impl MockProvider {
    fn requested(&self) -> Vec<String> {
        let mut symbols = self.requested.lock().unwrap().clone();
        symbols.sort();
        symbols
    }
}

#[async_trait]
impl DailyBarProvider for MockProvider {
    async fn fetch_daily_bars(
        &self,
        symbol: &str,
        _start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawBarRow>, MarketError> {
        self.requested.lock().unwrap().push(symbol.to_string());
        if self.failing.iter().any(|s| s == symbol) {
            return Err(MarketError::Network("503 Service Unavailable".into()));
        }
        Ok(vec![RawBarRow {
            date: Some(end.format("%Y-%m-%d").to_string()),
            open: Some("5.0".into()),
            high: Some("5.5".into()),
            low: Some("4.8".into()),
            close: Some("5.2".into()),
            amount: Some("880000".into()),
        }])
    }
}

struct Fixture {
    service: KlineService,
    store: Arc<MemoryBarStore>,
    provider: Arc<MockProvider>,
}

fn fixture(monitor: MemoryMonitorStore, failing: &[&str]) -> Fixture {
    let config = KlineConfig {
        lookback_floor: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        ..KlineConfig::default()
    };
    fixture_with(monitor, failing, config)
}

fn fixture_with(monitor: MemoryMonitorStore, failing: &[&str], config: KlineConfig) -> Fixture {
    let store = Arc::new(MemoryBarStore::new());
    let provider = Arc::new(MockProvider {
        failing: failing.iter().map(|s| s.to_string()).collect(),
        ..MockProvider::default()
    });
    let clock = Arc::new(FakeClockProvider::new(
        Utc.with_ymd_and_hms(2024, 6, 14, 2, 0, 0).unwrap(),
    ));
    let service = KlineService::new(
        store.clone(),
        Arc::new(monitor),
        provider.clone(),
        clock,
        config,
        &Span::none(),
    );
    Fixture {
        service,
        store,
        provider,
    }
}

#[tokio::test]
async fn test_get_series_daily_returns_all_windows() -> anyhow::Result<()> {
    let fx = fixture(MemoryMonitorStore::new(), &[]);
    fx.store
        .merge("sh601919", &history("sh601919", 7, today()))
        .await?;

    let series = fx.service.get_series("601919", Timeframe::Daily, 250).await?;

    assert_eq!(series.symbol, "sh601919");
    assert_eq!(series.bars.len(), 7);
    assert_eq!(series.ema.keys().copied().collect::<Vec<_>>(), vec![5, 10, 20, 144, 188]);
    for values in series.ema.values() {
        assert_eq!(values.len(), 7);
        assert!((values[0] - series.bars[0].close).abs() < 1e-9);
    }
    Ok(())
}

#[tokio::test]
async fn test_get_series_two_day_drops_partial_tail() -> anyhow::Result<()> {
    let fx = fixture(MemoryMonitorStore::new(), &[]);
    let daily = history("sh600938", 7, today());
    fx.store.merge("sh600938", &daily).await?;

    let series = fx.service.get_series("sh600938", Timeframe::TwoDay, 250).await?;

    assert_eq!(series.bars.len(), 3);
    assert_eq!(series.bars[0].open, daily[0].open);
    assert_eq!(series.bars[0].close, daily[1].close);
    assert_eq!(series.bars[2].trade_date, daily[5].trade_date);
    assert_eq!(series.ema.keys().copied().collect::<Vec<_>>(), vec![10, 30, 60]);
    Ok(())
}

#[tokio::test]
async fn test_get_series_truncates_after_computing_ema() -> anyhow::Result<()> {
    let fx = fixture(MemoryMonitorStore::new(), &[]);
    let daily = history("sh600886", 30, today());
    fx.store.merge("sh600886", &daily).await?;

    let series = fx.service.get_series("sh600886", Timeframe::ThreeDay, 4).await?;

    let full = resample(&daily, 3);
    let full_ema = compute_ema(&full, &[7, 21, 42]);
    assert_eq!(series.bars, full[6..].to_vec());
    for (window, values) in &series.ema {
        assert_eq!(values.len(), 4);
        assert_eq!(values.as_slice(), &full_ema[window][6..]);
    }
    Ok(())
}

#[tokio::test]
async fn test_get_series_unknown_symbol_is_empty() -> anyhow::Result<()> {
    let fx = fixture(MemoryMonitorStore::new(), &[]);

    let series = fx.service.get_series("sz000000", Timeframe::Daily, 10).await?;

    assert!(series.bars.is_empty());
    assert!(series.ema.values().all(|v| v.is_empty()));
    Ok(())
}

#[tokio::test]
async fn test_refresh_all_incremental_only_touches_stale_or_missing() -> anyhow::Result<()> {
    let monitor = MemoryMonitorStore::with_stocks(&[
        ("sh600001", Timeframe::Daily, true),
        ("sh600002", Timeframe::TwoDay, true),
        ("sz000003", Timeframe::ThreeDay, true),
        ("sh600004", Timeframe::Daily, false),
    ]);
    let fx = fixture(monitor, &[]);
    let yesterday = today() - Duration::days(1);
    fx.store
        .merge("sh600001", &[bar("sh600001", yesterday, 8.0)])
        .await?;
    fx.store
        .merge("sh600002", &[bar("sh600002", today() - Duration::days(5), 8.0)])
        .await?;

    let report = fx.service.refresh_all(false).await?;

    assert_eq!(report.total, 2);
    assert_eq!(report.succeeded, 2);
    assert_eq!(fx.provider.requested(), vec!["sh600002", "sz000003"]);
    assert_eq!(fx.store.latest_date("sz000003").await?, Some(today()));
    Ok(())
}

#[tokio::test]
async fn test_refresh_all_force_full_covers_every_enabled_stock() -> anyhow::Result<()> {
    let monitor = MemoryMonitorStore::with_stocks(&[
        ("sh600001", Timeframe::Daily, true),
        ("sh600002", Timeframe::TwoDay, true),
        ("sz000003", Timeframe::ThreeDay, true),
        ("sh600004", Timeframe::Daily, false),
    ]);
    let fx = fixture(monitor, &["sh600002"]);
    fx.store
        .merge("sh600001", &[bar("sh600001", today() - Duration::days(1), 8.0)])
        .await?;

    let report = fx.service.refresh_all(true).await?;

    assert_eq!(report.total, 3);
    assert_eq!(report.succeeded, 2);
    let failed = report.failed();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].0, "sh600002");
    assert_eq!(
        fx.provider.requested(),
        vec!["sh600001", "sh600002", "sz000003"]
    );
    Ok(())
}

#[tokio::test]
async fn test_refresh_all_overflowing_staleness_treats_all_as_stale() -> anyhow::Result<()> {
    let monitor = MemoryMonitorStore::with_stocks(&[
        ("sh600001", Timeframe::Daily, true),
        ("sz000003", Timeframe::ThreeDay, true),
    ]);
    let config = KlineConfig {
        lookback_floor: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        staleness_days: i64::MAX,
        ..KlineConfig::default()
    };
    let fx = fixture_with(monitor, &[], config);
    fx.store
        .merge("sh600001", &[bar("sh600001", today() - Duration::days(3), 8.0)])
        .await?;

    let report = fx.service.refresh_all(false).await?;

    assert_eq!(report.total, 2);
    assert_eq!(fx.provider.requested(), vec!["sh600001", "sz000003"]);
    Ok(())
}

#[tokio::test]
async fn test_refresh_one_surfaces_errors() -> anyhow::Result<()> {
    let fx = fixture(MemoryMonitorStore::new(), &["sh601169"]);

    let result = fx.service.refresh_one("601169", false).await;
    assert!(matches!(result, Err(KlineError::Provider(_))));

    let outcome = fx.service.refresh_one("sz000895", false).await?;
    assert_eq!(outcome, RefreshOutcome::Updated { written: 1 });

    fx.store.set_fail_writes(true);
    let result = fx.service.refresh_one("sh600938", false).await;
    assert!(matches!(result, Err(KlineError::Persistence(_))));
    Ok(())
}
