use crate::error::KlineError;
use crate::fetcher::{IncrementalFetcher, RefreshOutcome};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc, oneshot};
use tracing::{Instrument, Span, debug, info, info_span, warn};

type RefreshResult = Result<RefreshOutcome, KlineError>;

/// 提交给 worker 的刷新任务。
struct RefreshJob {
    symbol: String,
    force_full: bool,
    reply: oneshot::Sender<RefreshResult>,
}

/// # Summary
/// 一次批量刷新的汇总结果。
///
/// # Invariants
/// - `outcomes` 覆盖本次提交的每只股票，`total == outcomes.len()`。
#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: usize,
    pub total: usize,
    pub outcomes: BTreeMap<String, RefreshResult>,
}

impl BatchReport {
    /// 失败的股票及错误描述。
    pub fn failed(&self) -> Vec<(&str, String)> {
        self.outcomes
            .iter()
            .filter_map(|(symbol, result)| match result {
                Ok(_) => None,
                Err(e) => Some((symbol.as_str(), e.to_string())),
            })
            .collect()
    }
}

/// # Summary
/// 批量刷新驱动，持有固定数量的常驻 worker。
///
/// # Invariants
/// - 任务队列有界，队列满时提交方等待。
/// - 股票之间没有顺序保证，单只股票失败不影响其他股票。
/// - 驱动被销毁后队列关闭，worker 随之退出。
pub struct BatchRefresher {
    jobs: mpsc::Sender<RefreshJob>,
    workers: usize,
    span: Span,
}

impl BatchRefresher {
    /// # Summary
    /// 创建驱动并启动 worker。
    ///
    /// # Logic
    /// 1. worker 数量至少为 1。
    /// 2. 创建容量为 worker 数两倍的有界队列。
    /// 3. 启动 worker，共享同一个接收端。
    ///
    /// # Arguments
    /// * `fetcher`: 实际执行单只股票刷新的抓取器。
    /// * `concurrency`: worker 数量。
    /// * `parent`: 父级 Span。
    ///
    /// # Returns
    /// 新的驱动实例。必须在 Tokio 运行时内调用。
    pub fn new(fetcher: Arc<IncrementalFetcher>, concurrency: usize, parent: &Span) -> Self {
        let workers = concurrency.max(1);
        let span = info_span!(parent: parent, "batch_refresher", workers);
        let (tx, rx) = mpsc::channel::<RefreshJob>(workers * 2);
        let rx = Arc::new(Mutex::new(rx));

        for id in 0..workers {
            let fetcher = fetcher.clone();
            let rx = rx.clone();
            let worker_span = info_span!(parent: &span, "refresh_worker", id);
            tokio::spawn(Self::run_worker(fetcher, rx).instrument(worker_span));
        }
        info!(parent: &span, "Started {} refresh workers", workers);

        Self {
            jobs: tx,
            workers,
            span,
        }
    }

    async fn run_worker(
        fetcher: Arc<IncrementalFetcher>,
        rx: Arc<Mutex<mpsc::Receiver<RefreshJob>>>,
    ) {
        loop {
            let job = rx.lock().await.recv().await;
            let Some(job) = job else {
                debug!("Job queue closed, worker exiting");
                break;
            };

            let result = fetcher.refresh(&job.symbol, job.force_full).await;
            match &result {
                Ok(outcome) => debug!("{} refreshed: {:?}", job.symbol, outcome),
                Err(e) => warn!("{} refresh failed: {}", job.symbol, e),
            }
            if job.reply.send(result).is_err() {
                debug!("Submitter for {} went away", job.symbol);
            }
        }
    }

    /// worker 数量。
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// # Summary
    /// 并发刷新一组股票并汇总结果。
    ///
    /// # Logic
    /// 1. 去重后逐个提交到有界队列，队列满时等待。
    /// 2. 依次等待每个任务的回复。
    /// 3. 统计成功数量。
    ///
    /// # Arguments
    /// * `symbols`: 待刷新的股票代码。
    /// * `force_full`: 是否全量重新抓取。
    ///
    /// # Returns
    /// 批量汇总结果。
    pub async fn refresh_many(&self, symbols: &[String], force_full: bool) -> BatchReport {
        let unique: BTreeSet<&String> = symbols.iter().collect();
        let span = info_span!(parent: &self.span, "refresh_many", total = unique.len(), force_full);

        async move {
            let mut pending = Vec::with_capacity(unique.len());
            let mut outcomes = BTreeMap::new();

            for symbol in unique {
                let (reply, rx) = oneshot::channel();
                let job = RefreshJob {
                    symbol: symbol.clone(),
                    force_full,
                    reply,
                };
                if self.jobs.send(job).await.is_err() {
                    outcomes.insert(
                        symbol.clone(),
                        Err(KlineError::Provider("refresh workers unavailable".into())),
                    );
                    continue;
                }
                pending.push((symbol.clone(), rx));
            }

            for (symbol, rx) in pending {
                let result = rx.await.unwrap_or_else(|_| {
                    Err(KlineError::Provider("refresh worker dropped the job".into()))
                });
                outcomes.insert(symbol, result);
            }

            let succeeded = outcomes.values().filter(|r| r.is_ok()).count();
            let report = BatchReport {
                succeeded,
                total: outcomes.len(),
                outcomes,
            };
            info!("Batch refresh finished: {}/{} succeeded", report.succeeded, report.total);
            report
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{NaiveDate, TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tidewatch_core::common::time::FakeClockProvider;
    use tidewatch_core::config::KlineConfig;
    use tidewatch_core::market::entity::RawBarRow;
    use tidewatch_core::market::error::MarketError;
    use tidewatch_core::market::port::DailyBarProvider;
    use tidewatch_core::store::port::BarStore;
    use tidewatch_core::test_utils::MemoryBarStore;

    /// 对指定股票返回网络错误，其余返回一行数据，并记录并发峰值。
    #[derive(Default)]
    struct FlakyProvider {
        failing: Vec<String>,
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl DailyBarProvider for FlakyProvider {
        async fn fetch_daily_bars(
            &self,
            symbol: &str,
            _start: NaiveDate,
            end: NaiveDate,
        ) -> Result<Vec<RawBarRow>, MarketError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);

            if self.failing.iter().any(|s| s == symbol) {
                return Err(MarketError::Network("connection reset".into()));
            }
            Ok(vec![RawBarRow {
                date: Some(end.format("%Y-%m-%d").to_string()),
                open: Some("10".into()),
                high: Some("11".into()),
                low: Some("9".into()),
                close: Some("10.5".into()),
                amount: Some("500".into()),
            }])
        }
    }

    fn setup(failing: &[&str], workers: usize) -> (BatchRefresher, Arc<MemoryBarStore>, Arc<FlakyProvider>) {
        let store = Arc::new(MemoryBarStore::new());
        let provider = Arc::new(FlakyProvider {
            failing: failing.iter().map(|s| s.to_string()).collect(),
            ..FlakyProvider::default()
        });
        let clock = Arc::new(FakeClockProvider::new(
            Utc.with_ymd_and_hms(2024, 6, 14, 2, 0, 0).unwrap(),
        ));
        let config = KlineConfig {
            lookback_floor: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            ..KlineConfig::default()
        };
        let fetcher = Arc::new(IncrementalFetcher::new(
            store.clone(),
            provider.clone(),
            clock,
            &config,
            &Span::none(),
        ));
        (BatchRefresher::new(fetcher, workers, &Span::none()), store, provider)
    }

    #[tokio::test]
    async fn test_partial_failure_does_not_abort_batch() {
        let (batch, store, _) = setup(&["B"], 3);
        let symbols = vec!["A".to_string(), "B".to_string(), "C".to_string()];

        let report = batch.refresh_many(&symbols, false).await;

        assert_eq!(report.succeeded, 2);
        assert_eq!(report.total, 3);
        assert!(matches!(report.outcomes["B"], Err(KlineError::Provider(_))));
        assert_eq!(report.failed().len(), 1);
        assert_eq!(report.failed()[0].0, "B");

        let expected = NaiveDate::from_ymd_opt(2024, 6, 14).unwrap();
        assert_eq!(store.latest_date("A").await.unwrap(), Some(expected));
        assert_eq!(store.latest_date("C").await.unwrap(), Some(expected));
        assert_eq!(store.latest_date("B").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded_by_workers() {
        let (batch, _, provider) = setup(&[], 2);
        assert_eq!(batch.workers(), 2);
        let symbols: Vec<String> = (0..8).map(|i| format!("sz30000{}", i)).collect();

        let report = batch.refresh_many(&symbols, true).await;

        assert_eq!(report.succeeded, 8);
        assert!(provider.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_duplicates_and_empty_input() {
        let (batch, _, _) = setup(&[], 0);
        assert_eq!(batch.workers(), 1);

        let empty = batch.refresh_many(&[], false).await;
        assert_eq!(empty.total, 0);
        assert_eq!(empty.succeeded, 0);

        let symbols = vec!["A".to_string(), "A".to_string()];
        let report = batch.refresh_many(&symbols, false).await;
        assert_eq!(report.total, 1);
        assert_eq!(report.succeeded, 1);
    }
}
