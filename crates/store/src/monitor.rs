use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tidewatch_core::common::Timeframe;
use tidewatch_core::store::error::StoreError;
use tidewatch_core::store::port::{MonitorStock, MonitorStore, PeBand};
use tracing::info;

/// 监控表为空时写入的默认关注股票 (代码, 名称, 周期)
const DEFAULT_MONITOR_STOCKS: [(&str, &str, Timeframe); 5] = [
    ("sh601919", "中远海控", Timeframe::Daily),
    ("sz000895", "双汇发展", Timeframe::Daily),
    ("sh600938", "中国海油", Timeframe::TwoDay),
    ("sh600886", "国投电力", Timeframe::ThreeDay),
    ("sh601169", "北京银行", Timeframe::TwoDay),
];

type MonitorRow = (
    String,
    String,
    String,
    f64,
    f64,
    bool,
    DateTime<Utc>,
    DateTime<Utc>,
);

const MONITOR_COLUMNS: &str =
    "code, name, timeframe, reasonable_pe_min, reasonable_pe_max, enabled, created_at, updated_at";

/// MonitorStore 的 SQLite 实现。
///
/// # Summary
/// 在 `monitor_stocks` 表中维护关注股票及其监控周期。
///
/// # Invariants
/// * `code` 为主键。
/// * 周期以短标签 (`1d`/`2d`/`3d`) 存储。
/// * 合理市盈率区间缺省为 15 ~ 20。
pub struct SqliteMonitorStore {
    pool: SqlitePool,
}

impl SqliteMonitorStore {
    /// 创建新的 SqliteMonitorStore 并初始化表结构。
    ///
    /// # Arguments
    /// * `pool` - 共享的 SQLite 连接池。
    ///
    /// # Returns
    /// * `Result<Self, StoreError>` - 存储实例或数据库错误。
    pub async fn new(pool: SqlitePool) -> Result<Self, StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS monitor_stocks (
                code TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                timeframe TEXT NOT NULL,
                reasonable_pe_min REAL NOT NULL DEFAULT 15,
                reasonable_pe_max REAL NOT NULL DEFAULT 20,
                enabled INTEGER NOT NULL DEFAULT 1,
                created_at DATETIME NOT NULL,
                updated_at DATETIME NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_monitor_enabled ON monitor_stocks (enabled);
            "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| StoreError::InitError(e.to_string()))?;

        Ok(Self { pool })
    }

    /// # Summary
    /// 表为空时写入默认关注股票。
    ///
    /// # Logic
    /// 1. 统计现有记录数，非空则直接返回。
    /// 2. 逐条插入默认配置。
    ///
    /// # Returns
    /// * `Result<usize, StoreError>` - 实际写入的条数。
    pub async fn seed_defaults(&self) -> Result<usize, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM monitor_stocks")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        if count > 0 {
            return Ok(0);
        }

        let mut inserted = 0;
        for (code, name, timeframe) in DEFAULT_MONITOR_STOCKS {
            if self.add(code, name, timeframe, PeBand::default()).await? {
                inserted += 1;
            }
        }
        info!("Seeded {} default monitor stocks", inserted);
        Ok(inserted)
    }

    fn to_entity(row: MonitorRow) -> Result<MonitorStock, StoreError> {
        let timeframe = row
            .2
            .parse::<Timeframe>()
            .map_err(StoreError::Corrupted)?;
        Ok(MonitorStock {
            code: row.0,
            name: row.1,
            timeframe,
            reasonable_pe_min: row.3,
            reasonable_pe_max: row.4,
            enabled: row.5,
            created_at: row.6,
            updated_at: row.7,
        })
    }
}

#[async_trait]
impl MonitorStore for SqliteMonitorStore {
    async fn list(&self, enabled_only: bool) -> Result<Vec<MonitorStock>, StoreError> {
        let filter = if enabled_only { "WHERE enabled = 1" } else { "" };
        let sql = format!(
            "SELECT {} FROM monitor_stocks {} ORDER BY code",
            MONITOR_COLUMNS, filter
        );

        sqlx::query_as::<_, MonitorRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?
            .into_iter()
            .map(Self::to_entity)
            .collect()
    }

    async fn get(&self, code: &str) -> Result<Option<MonitorStock>, StoreError> {
        let sql = format!("SELECT {} FROM monitor_stocks WHERE code = ?", MONITOR_COLUMNS);
        sqlx::query_as::<_, MonitorRow>(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(Self::to_entity)
            .transpose()
    }

    /// # Summary
    /// 新增监控股票。
    ///
    /// # Logic
    /// 执行 `INSERT OR IGNORE`，以受影响行数判断代码是否已存在。
    async fn add(
        &self,
        code: &str,
        name: &str,
        timeframe: Timeframe,
        pe_band: PeBand,
    ) -> Result<bool, StoreError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO monitor_stocks
                (code, name, timeframe, reasonable_pe_min, reasonable_pe_max, enabled, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, 1, ?, ?)
            "#,
        )
        .bind(code)
        .bind(name)
        .bind(timeframe.as_str())
        .bind(pe_band.min)
        .bind(pe_band.max)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(result.rows_affected() == 1)
    }

    async fn update(
        &self,
        code: &str,
        name: &str,
        timeframe: Timeframe,
        pe_band: PeBand,
        enabled: Option<bool>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE monitor_stocks
            SET name = ?, timeframe = ?, reasonable_pe_min = ?, reasonable_pe_max = ?,
                enabled = COALESCE(?, enabled), updated_at = ?
            WHERE code = ?
            "#,
        )
        .bind(name)
        .bind(timeframe.as_str())
        .bind(pe_band.min)
        .bind(pe_band.max)
        .bind(enabled)
        .bind(Utc::now())
        .bind(code)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_enabled(&self, code: &str, enabled: bool) -> Result<bool, StoreError> {
        let result =
            sqlx::query("UPDATE monitor_stocks SET enabled = ?, updated_at = ? WHERE code = ?")
                .bind(enabled)
                .bind(Utc::now())
                .bind(code)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, code: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM monitor_stocks WHERE code = ?")
            .bind(code)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }
}
