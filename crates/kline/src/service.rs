use crate::batch::{BatchRefresher, BatchReport};
use crate::error::KlineError;
use crate::fetcher::{IncrementalFetcher, RefreshOutcome};
use crate::indicator::compute_ema;
use crate::resample::resample;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tidewatch_core::common::time::TimeProvider;
use tidewatch_core::common::{Timeframe, normalize_symbol};
use tidewatch_core::config::KlineConfig;
use tidewatch_core::market::entity::Bar;
use tidewatch_core::market::port::DailyBarProvider;
use tidewatch_core::store::port::{BarStore, MonitorStore};
use tracing::{Instrument, Span, debug, info, info_span};

/// # Summary
/// 读路径返回的 K 线序列及其 EMA 指标。
///
/// # Invariants
/// - `ema` 中每条序列与 `bars` 等长且逐位对齐。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KlineSeries {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub bars: Vec<Bar>,
    pub ema: BTreeMap<u32, Vec<f64>>,
}

/// # Summary
/// K 线管线门面，组合 Bar Store、增量抓取器、批量驱动与计算步骤。
///
/// # Invariants
/// - 读路径只读取本地数据，从不等待刷新。
/// - 合成 K 线与 EMA 每次读取时重新计算，不做缓存。
pub struct KlineService {
    // 日线存储
    store: Arc<dyn BarStore>,
    // 监控股票列表
    monitor: Arc<dyn MonitorStore>,
    fetcher: Arc<IncrementalFetcher>,
    batch: BatchRefresher,
    clock: Arc<dyn TimeProvider>,
    config: KlineConfig,
    span: Span,
}

impl KlineService {
    /// # Summary
    /// 组装 K 线服务。
    ///
    /// # Logic
    /// 1. 创建服务自身的 Span，挂在 `parent` 下。
    /// 2. 构造增量抓取器与批量驱动，二者共享同一个抓取器以保证单股单写。
    ///
    /// # Arguments
    /// * `store`: Bar Store。
    /// * `monitor`: 监控股票存储。
    /// * `provider`: 行情源。
    /// * `clock`: 时钟。
    /// * `config`: K 线配置。
    /// * `parent`: 父级 Span。
    ///
    /// # Returns
    /// 服务实例。必须在 Tokio 运行时内调用。
    pub fn new(
        store: Arc<dyn BarStore>,
        monitor: Arc<dyn MonitorStore>,
        provider: Arc<dyn DailyBarProvider>,
        clock: Arc<dyn TimeProvider>,
        config: KlineConfig,
        parent: &Span,
    ) -> Self {
        let span = info_span!(parent: parent, "kline_service");
        let fetcher = Arc::new(IncrementalFetcher::new(
            store.clone(),
            provider,
            clock.clone(),
            &config,
            &span,
        ));
        let batch = BatchRefresher::new(fetcher.clone(), config.concurrency, &span);

        Self {
            store,
            monitor,
            fetcher,
            batch,
            clock,
            config,
            span,
        }
    }

    /// # Summary
    /// 读取指定周期的 K 线与 EMA。
    ///
    /// # Logic
    /// 1. 从 Bar Store 读取最多 `history_limit` 根日线。
    /// 2. 按周期重采样。
    /// 3. 在完整的重采样序列上计算 EMA。
    /// 4. 只保留最后 `count` 根 K 线及对齐的 EMA 尾部。
    ///
    /// # Arguments
    /// * `symbol`: 股票代码，会补全交易所前缀。
    /// * `timeframe`: 周期。
    /// * `count`: 返回的 K 线根数上限。
    ///
    /// # Returns
    /// K 线序列；本地无数据时返回空序列。
    pub async fn get_series(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<KlineSeries, KlineError> {
        let symbol = normalize_symbol(symbol);
        let span = info_span!(parent: &self.span, "get_series", %symbol, %timeframe, count);

        async {
            let daily = self
                .store
                .range_query(&symbol, self.config.history_limit)
                .await?;
            let mut bars = resample(&daily, timeframe.period());
            let mut ema = compute_ema(&bars, self.config.ema_windows.for_timeframe(timeframe));

            let skip = bars.len().saturating_sub(count);
            bars = bars.split_off(skip);
            for values in ema.values_mut() {
                *values = values.split_off(skip);
            }
            debug!("Serving {} bars from {} daily rows", bars.len(), daily.len());

            Ok::<_, KlineError>(KlineSeries {
                symbol: symbol.clone(),
                timeframe,
                bars,
                ema,
            })
        }
        .instrument(span)
        .await
    }

    /// # Summary
    /// 刷新全部启用的监控股票。
    ///
    /// # Logic
    /// 1. 读取启用的监控股票。
    /// 2. 全量模式下刷新全部股票。
    /// 3. 增量模式下只刷新 Bar Store 判定为过期或缺失的股票；过期天数溢出时全部视为过期。
    /// 4. 交给批量驱动并发执行。
    ///
    /// # Arguments
    /// * `force_full`: 是否全量重新抓取。
    ///
    /// # Returns
    /// 批量汇总结果；读取监控列表或过期判断失败时返回 `Persistence`。
    pub async fn refresh_all(&self, force_full: bool) -> Result<BatchReport, KlineError> {
        let span = info_span!(parent: &self.span, "refresh_all", force_full);

        async {
            let codes: Vec<String> = self
                .monitor
                .list(true)
                .await?
                .into_iter()
                .map(|s| normalize_symbol(&s.code))
                .collect();

            let staleness = chrono::TimeDelta::try_days(self.config.staleness_days);
            let targets = match staleness {
                Some(staleness) if !force_full => {
                    let stale = self
                        .store
                        .symbols_needing_refresh(staleness, self.clock.today(), &codes)
                        .await?;
                    codes.into_iter().filter(|c| stale.contains(c)).collect()
                }
                // 全量模式，或过期天数超出可表示范围时全部刷新
                _ => codes,
            };

            info!("Refreshing {} monitor stocks", targets.len());
            Ok::<_, KlineError>(self.batch.refresh_many(&targets, force_full).await)
        }
        .instrument(span)
        .await
    }

    /// 刷新单只股票，错误原样返回给调用方。
    pub async fn refresh_one(
        &self,
        symbol: &str,
        force_full: bool,
    ) -> Result<RefreshOutcome, KlineError> {
        let symbol = normalize_symbol(symbol);
        self.fetcher.refresh(&symbol, force_full).await
    }

    /// 当前生效的 K 线配置。
    pub fn config(&self) -> &KlineConfig {
        &self.config
    }
}
