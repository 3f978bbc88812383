use super::error::StoreError;
use crate::common::Timeframe;
use crate::market::entity::Bar;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// 合理市盈率区间下限的默认值
pub const DEFAULT_PE_MIN: f64 = 15.0;
/// 合理市盈率区间上限的默认值
pub const DEFAULT_PE_MAX: f64 = 20.0;

/// # Summary
/// 合理市盈率区间，估值判断的上下沿。
///
/// # Invariants
/// - 合法区间满足 `0 < min <= max` 且均为有限值，见 [`PeBand::is_valid`]。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeBand {
    pub min: f64,
    pub max: f64,
}

impl PeBand {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min > 0.0 && self.min <= self.max
    }
}

impl Default for PeBand {
    fn default() -> Self {
        Self::new(DEFAULT_PE_MIN, DEFAULT_PE_MAX)
    }
}

/// # Summary
/// 监控股票配置实体，决定批量刷新范围与指标窗口。
///
/// # Invariants
/// - `code` 全局唯一。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorStock {
    // 股票代码
    pub code: String,
    // 股票名称
    pub name: String,
    // 监控周期
    pub timeframe: Timeframe,
    // 合理市盈率下限
    pub reasonable_pe_min: f64,
    // 合理市盈率上限
    pub reasonable_pe_max: f64,
    // 是否参与刷新与监控
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MonitorStock {
    /// 当前配置的合理市盈率区间。
    pub fn pe_band(&self) -> PeBand {
        PeBand::new(self.reasonable_pe_min, self.reasonable_pe_max)
    }
}

/// # Summary
/// 雪球组合跟踪配置。
///
/// # Invariants
/// - `cube_symbol` 全局唯一，统一为大写 (如 `ZH123456`)。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XueqiuCube {
    // 组合代码
    pub cube_symbol: String,
    // 组合名称
    pub cube_name: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// # Summary
/// 持仓实体，记录用户在特定股票上的成本与股数。
///
/// # Invariants
/// - `code` 全局唯一。
/// - `cost_price` 非负。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    // 股票代码
    pub code: String,
    // 股票名称
    pub name: String,
    // 持仓成本价
    pub cost_price: Decimal,
    // 持股数量
    pub shares: i64,
}

/// # Summary
/// 日 K 线存储接口，负责 K 线的合并写入与读取。
///
/// # Invariants
/// - 每个 (`symbol`, `trade_date`) 至多一行，写入冲突时以后写为准。
/// - 对不同股票的并发写入互不影响。
#[async_trait]
pub trait BarStore: Send + Sync {
    /// # Summary
    /// 合并写入一批日 K 线。
    ///
    /// # Logic
    /// 1. 在单个事务中逐条执行 Upsert。
    /// 2. 冲突时整行覆盖为新值。
    ///
    /// # Arguments
    /// * `symbol`: 目标股票代码。
    /// * `bars`: 待写入的 K 线。
    ///
    /// # Returns
    /// 成功返回写入条数，失败返回 `StoreError`。
    async fn merge(&self, symbol: &str, bars: &[Bar]) -> Result<usize, StoreError>;

    /// # Summary
    /// 读取最近的若干根日 K 线。
    ///
    /// # Logic
    /// 按交易日倒序取 `limit` 条后翻转为升序。
    ///
    /// # Arguments
    /// * `symbol`: 目标股票代码。
    /// * `limit`: 数量上限。
    ///
    /// # Returns
    /// 升序排列的 K 线；无数据时返回空列表。
    async fn range_query(&self, symbol: &str, limit: usize) -> Result<Vec<Bar>, StoreError>;

    /// # Summary
    /// 查询已存储的最新交易日。
    ///
    /// # Returns
    /// 有数据返回 `Some(date)`，否则返回 `None`。
    async fn latest_date(&self, symbol: &str) -> Result<Option<NaiveDate>, StoreError>;

    /// # Summary
    /// 找出需要刷新的股票。
    ///
    /// # Logic
    /// 1. 以 `today - staleness` 作为过期线。
    /// 2. 库中最新交易日早于过期线的股票视为过期。
    /// 3. `candidates` 中在库里没有任何数据的股票同样需要刷新。
    /// 4. 过期线超出日期范围时，库中全部股票与全部 `candidates` 均视为过期。
    ///
    /// # Arguments
    /// * `staleness`: 允许的最大数据滞后。
    /// * `today`: 当前交易所日期。
    /// * `candidates`: 额外检查的股票代码（通常为监控列表）。
    ///
    /// # Returns
    /// 去重后的股票代码集合。
    async fn symbols_needing_refresh(
        &self,
        staleness: chrono::Duration,
        today: NaiveDate,
        candidates: &[String],
    ) -> Result<BTreeSet<String>, StoreError>;

    /// # Summary
    /// 读取闭区间内的全部日 K 线（导出用）。
    ///
    /// # Returns
    /// 升序排列的 K 线。
    async fn export_range(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Bar>, StoreError>;
}

/// # Summary
/// 监控股票配置存储接口。
///
/// # Invariants
/// - 变更类操作以布尔值表示是否命中记录，而非返回错误。
#[async_trait]
pub trait MonitorStore: Send + Sync {
    /// 列出监控股票，`enabled_only` 为真时只返回启用项，按代码排序。
    async fn list(&self, enabled_only: bool) -> Result<Vec<MonitorStock>, StoreError>;

    /// 根据代码获取单条配置。
    async fn get(&self, code: &str) -> Result<Option<MonitorStock>, StoreError>;

    /// 新增配置（默认启用），代码已存在时返回 `false`。
    async fn add(
        &self,
        code: &str,
        name: &str,
        timeframe: Timeframe,
        pe_band: PeBand,
    ) -> Result<bool, StoreError>;

    /// # Summary
    /// 更新名称、周期、市盈率区间及（可选）启用状态。
    ///
    /// # Returns
    /// 命中记录返回 `true`。
    async fn update(
        &self,
        code: &str,
        name: &str,
        timeframe: Timeframe,
        pe_band: PeBand,
        enabled: Option<bool>,
    ) -> Result<bool, StoreError>;

    /// 启用或停用监控。
    async fn set_enabled(&self, code: &str, enabled: bool) -> Result<bool, StoreError>;

    /// 删除配置。
    async fn delete(&self, code: &str) -> Result<bool, StoreError>;
}

/// # Summary
/// 持仓存储接口。
#[async_trait]
pub trait PortfolioStore: Send + Sync {
    /// 按代码排序列出全部持仓。
    async fn list(&self) -> Result<Vec<Holding>, StoreError>;

    /// 根据代码获取持仓。
    async fn get(&self, code: &str) -> Result<Option<Holding>, StoreError>;

    /// 新增持仓，代码已存在时返回 `false`。
    async fn add(&self, holding: &Holding) -> Result<bool, StoreError>;

    /// 覆盖更新持仓，未命中返回 `false`。
    async fn update(&self, holding: &Holding) -> Result<bool, StoreError>;

    /// 删除持仓。
    async fn delete(&self, code: &str) -> Result<bool, StoreError>;
}

/// # Summary
/// 雪球组合配置存储接口。
///
/// # Invariants
/// - 与 `MonitorStore` 相同，变更类操作以布尔值表示是否命中记录。
#[async_trait]
pub trait CubeStore: Send + Sync {
    /// 列出组合，`enabled_only` 为真时只返回启用项，按代码排序。
    async fn list(&self, enabled_only: bool) -> Result<Vec<XueqiuCube>, StoreError>;

    /// 根据组合代码获取配置。
    async fn get(&self, cube_symbol: &str) -> Result<Option<XueqiuCube>, StoreError>;

    /// 新增组合，代码已存在时返回 `false`。
    async fn add(
        &self,
        cube_symbol: &str,
        cube_name: &str,
        enabled: bool,
    ) -> Result<bool, StoreError>;

    /// 更新名称及（可选）启用状态，未命中返回 `false`。
    async fn update(
        &self,
        cube_symbol: &str,
        cube_name: &str,
        enabled: Option<bool>,
    ) -> Result<bool, StoreError>;

    /// 启用或停用组合。
    async fn set_enabled(&self, cube_symbol: &str, enabled: bool) -> Result<bool, StoreError>;

    /// 删除组合。
    async fn delete(&self, cube_symbol: &str) -> Result<bool, StoreError>;
}
