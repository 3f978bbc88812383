use chrono::NaiveDate;
use tidewatch_core::market::entity::Bar;
use tidewatch_core::store::port::BarStore;
use tidewatch_store::db::open_pool;
use tidewatch_store::kline::SqliteBarStore;
use tempfile::TempDir;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 2, d).unwrap()
}

fn bar(symbol: &str, d: u32, close: f64) -> Bar {
    Bar {
        symbol: symbol.to_string(),
        trade_date: day(d),
        open: close - 0.1,
        high: close + 0.2,
        low: close - 0.3,
        close,
        amount: 1_000_000.0,
    }
}

async fn setup() -> (SqliteBarStore, TempDir) {
    let tmp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let pool = open_pool(tmp_dir.path()).await.unwrap();
    let store = SqliteBarStore::new(pool).await.unwrap();
    (store, tmp_dir)
}

#[tokio::test]
async fn test_merge_same_bar_twice_keeps_one_row_with_latest_values() {
    let (store, _tmp) = setup().await;

    store.merge("sh600000", &[bar("sh600000", 2, 10.0)]).await.unwrap();
    let mut revised = bar("sh600000", 2, 10.5);
    revised.amount = 2_000_000.0;
    let written = store.merge("sh600000", &[revised.clone()]).await.unwrap();
    assert_eq!(written, 1);

    let all = store.range_query("sh600000", 100).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0], revised);
}

#[tokio::test]
async fn test_latest_date_ignores_insertion_order() {
    let (store, _tmp) = setup().await;

    let bars = vec![
        bar("sz000001", 4, 11.0),
        bar("sz000001", 2, 10.0),
        bar("sz000001", 6, 12.0),
        bar("sz000001", 3, 10.5),
        bar("sz000001", 5, 11.5),
    ];
    store.merge("sz000001", &bars).await.unwrap();

    assert_eq!(store.latest_date("sz000001").await.unwrap(), Some(day(6)));
    assert_eq!(store.latest_date("sz999999").await.unwrap(), None);
}

#[tokio::test]
async fn test_range_query_returns_most_recent_ascending() {
    let (store, _tmp) = setup().await;

    let bars: Vec<Bar> = (2..=9).map(|d| bar("sh601919", d, f64::from(d))).collect();
    store.merge("sh601919", &bars).await.unwrap();

    let recent = store.range_query("sh601919", 3).await.unwrap();
    let dates: Vec<NaiveDate> = recent.iter().map(|b| b.trade_date).collect();
    assert_eq!(dates, vec![day(7), day(8), day(9)]);

    let empty = store.range_query("sh000000", 10).await.unwrap();
    assert!(empty.is_empty());
}

#[tokio::test]
async fn test_symbols_needing_refresh() {
    let (store, _tmp) = setup().await;

    store.merge("fresh", &[bar("fresh", 9, 1.0)]).await.unwrap();
    store.merge("stale", &[bar("stale", 3, 1.0)]).await.unwrap();

    let candidates = vec!["fresh".to_string(), "missing".to_string()];
    let result = store
        .symbols_needing_refresh(chrono::Duration::days(1), day(10), &candidates)
        .await
        .unwrap();

    assert!(result.contains("stale"));
    assert!(result.contains("missing"));
    assert!(!result.contains("fresh"));
}

#[tokio::test]
async fn test_export_range_is_inclusive() {
    let (store, _tmp) = setup().await;

    let bars: Vec<Bar> = (2..=9).map(|d| bar("sh600886", d, f64::from(d))).collect();
    store.merge("sh600886", &bars).await.unwrap();

    let exported = store.export_range("sh600886", day(4), day(6)).await.unwrap();
    assert_eq!(exported.len(), 3);
    assert_eq!(exported[0].trade_date, day(4));
    assert_eq!(exported[2].trade_date, day(6));
}

#[tokio::test]
async fn test_concurrent_merges_for_different_symbols() -> anyhow::Result<()> {
    let (store, _tmp) = setup().await;
    let store = std::sync::Arc::new(store);

    let mut handles = vec![];
    for i in 0..6u32 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let symbol = format!("sz00000{}", i);
            let bars: Vec<Bar> = (2..=8).map(|d| bar(&symbol, d, f64::from(d + i))).collect();
            store.merge(&symbol, &bars).await
        }));
    }
    for handle in handles {
        assert_eq!(handle.await??, 7);
    }

    for i in 0..6u32 {
        let symbol = format!("sz00000{}", i);
        assert_eq!(store.range_query(&symbol, 100).await?.len(), 7);
    }
    Ok(())
}

#[tokio::test]
async fn test_symbols_needing_refresh_with_overflowing_staleness() {
    let (store, _tmp) = setup().await;

    store.merge("fresh", &[bar("fresh", 9, 1.0)]).await.unwrap();

    let candidates = vec!["missing".to_string()];
    let result = store
        .symbols_needing_refresh(chrono::TimeDelta::MAX, day(10), &candidates)
        .await
        .unwrap();

    // 过期线溢出时全部视为过期
    assert!(result.contains("fresh"));
    assert!(result.contains("missing"));
}
