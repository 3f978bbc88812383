//! 供下游 crate 测试使用的内存版存储实现。

use crate::common::Timeframe;
use crate::market::entity::Bar;
use crate::store::error::StoreError;
use crate::store::port::{
    BarStore, DEFAULT_PE_MAX, DEFAULT_PE_MIN, MonitorStock, MonitorStore, PeBand,
};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use dashmap::DashMap;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};

/// # Summary
/// 基于 DashMap 的内存 K 线存储。
///
/// # Invariants
/// - 每只股票的 K 线以交易日为键保存在 `BTreeMap` 中，天然有序且唯一。
#[derive(Default)]
pub struct MemoryBarStore {
    bars: DashMap<String, BTreeMap<NaiveDate, Bar>>,
    // 置位后所有写入均返回数据库错误
    fail_writes: AtomicBool,
}

impl MemoryBarStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 模拟存储不可用。
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// 某只股票当前保存的行数。
    pub fn row_count(&self, symbol: &str) -> usize {
        self.bars.get(symbol).map(|m| m.len()).unwrap_or(0)
    }
}

#[async_trait]
impl BarStore for MemoryBarStore {
    async fn merge(&self, symbol: &str, bars: &[Bar]) -> Result<usize, StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Database("memory store offline".into()));
        }
        let mut entry = self.bars.entry(symbol.to_string()).or_default();
        for bar in bars {
            entry.insert(bar.trade_date, bar.clone());
        }
        Ok(bars.len())
    }

    async fn range_query(&self, symbol: &str, limit: usize) -> Result<Vec<Bar>, StoreError> {
        Ok(self
            .bars
            .get(symbol)
            .map(|m| {
                let skip = m.len().saturating_sub(limit);
                m.values().skip(skip).cloned().collect()
            })
            .unwrap_or_default())
    }

    async fn latest_date(&self, symbol: &str) -> Result<Option<NaiveDate>, StoreError> {
        Ok(self
            .bars
            .get(symbol)
            .and_then(|m| m.keys().next_back().copied()))
    }

    async fn symbols_needing_refresh(
        &self,
        staleness: chrono::Duration,
        today: NaiveDate,
        candidates: &[String],
    ) -> Result<BTreeSet<String>, StoreError> {
        // 过期线溢出时视为全部过期
        let threshold = today.checked_sub_signed(staleness).unwrap_or(NaiveDate::MAX);
        let mut result: BTreeSet<String> = self
            .bars
            .iter()
            .filter(|e| e.value().keys().next_back().is_some_and(|d| *d < threshold))
            .map(|e| e.key().clone())
            .collect();
        for code in candidates {
            let stale = self
                .bars
                .get(code)
                .and_then(|m| m.keys().next_back().copied())
                .is_none_or(|d| d < threshold);
            if stale {
                result.insert(code.clone());
            }
        }
        Ok(result)
    }

    async fn export_range(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Bar>, StoreError> {
        if start > end {
            return Ok(Vec::new());
        }
        Ok(self
            .bars
            .get(symbol)
            .map(|m| m.range(start..=end).map(|(_, b)| b.clone()).collect())
            .unwrap_or_default())
    }
}

/// # Summary
/// 基于 DashMap 的内存监控股票存储。
#[derive(Default)]
pub struct MemoryMonitorStore {
    stocks: DashMap<String, MonitorStock>,
}

impl MemoryMonitorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以 (代码, 周期, 启用) 三元组批量构造。
    pub fn with_stocks(entries: &[(&str, Timeframe, bool)]) -> Self {
        let store = Self::new();
        let now = Utc::now();
        for (code, timeframe, enabled) in entries {
            store.stocks.insert(
                code.to_string(),
                MonitorStock {
                    code: code.to_string(),
                    name: code.to_string(),
                    timeframe: *timeframe,
                    reasonable_pe_min: DEFAULT_PE_MIN,
                    reasonable_pe_max: DEFAULT_PE_MAX,
                    enabled: *enabled,
                    created_at: now,
                    updated_at: now,
                },
            );
        }
        store
    }
}

#[async_trait]
impl MonitorStore for MemoryMonitorStore {
    async fn list(&self, enabled_only: bool) -> Result<Vec<MonitorStock>, StoreError> {
        let mut stocks: Vec<MonitorStock> = self
            .stocks
            .iter()
            .filter(|e| !enabled_only || e.value().enabled)
            .map(|e| e.value().clone())
            .collect();
        stocks.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(stocks)
    }

    async fn get(&self, code: &str) -> Result<Option<MonitorStock>, StoreError> {
        Ok(self.stocks.get(code).map(|e| e.value().clone()))
    }

    async fn add(
        &self,
        code: &str,
        name: &str,
        timeframe: Timeframe,
        pe_band: PeBand,
    ) -> Result<bool, StoreError> {
        if self.stocks.contains_key(code) {
            return Ok(false);
        }
        let now = Utc::now();
        self.stocks.insert(
            code.to_string(),
            MonitorStock {
                code: code.to_string(),
                name: name.to_string(),
                timeframe,
                reasonable_pe_min: pe_band.min,
                reasonable_pe_max: pe_band.max,
                enabled: true,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(true)
    }

    async fn update(
        &self,
        code: &str,
        name: &str,
        timeframe: Timeframe,
        pe_band: PeBand,
        enabled: Option<bool>,
    ) -> Result<bool, StoreError> {
        match self.stocks.get_mut(code) {
            Some(mut stock) => {
                stock.name = name.to_string();
                stock.timeframe = timeframe;
                stock.reasonable_pe_min = pe_band.min;
                stock.reasonable_pe_max = pe_band.max;
                if let Some(enabled) = enabled {
                    stock.enabled = enabled;
                }
                stock.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_enabled(&self, code: &str, enabled: bool) -> Result<bool, StoreError> {
        match self.stocks.get_mut(code) {
            Some(mut stock) => {
                stock.enabled = enabled;
                stock.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, code: &str) -> Result<bool, StoreError> {
        Ok(self.stocks.remove(code).is_some())
    }
}
