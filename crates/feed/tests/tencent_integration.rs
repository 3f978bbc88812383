use chrono::NaiveDate;
use std::time::Duration;
use tidewatch_core::market::port::DailyBarProvider;
use tidewatch_feed::tencent::TencentProvider;

/// # Summary
/// 腾讯证券日 K 线抓取的集成测试 (需要外网)。
///
/// # Logic
/// 1. 初始化 TencentProvider。
/// 2. 抓取浦发银行跨年的一段日线。
/// 3. 断言数据非空且全部落在请求区间内。
#[tokio::test]
#[ignore = "requires network access"]
async fn test_tencent_real_fetch() -> anyhow::Result<()> {
    let provider = TencentProvider::new(Duration::from_secs(30))?;
    let start = NaiveDate::from_ymd_opt(2023, 12, 20).unwrap();
    let end = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();

    let rows = provider.fetch_daily_bars("600000", start, end).await?;
    assert!(!rows.is_empty(), "rows should not be empty");

    for row in &rows {
        let date = NaiveDate::parse_from_str(row.date.as_deref().unwrap(), "%Y-%m-%d")?;
        assert!(date >= start && date <= end);
        assert!(row.close.is_some());
    }
    println!("Fetched {} rows for sh600000", rows.len());
    Ok(())
}
