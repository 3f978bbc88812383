use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;
use std::collections::BTreeSet;
use tidewatch_core::market::entity::Bar;
use tidewatch_core::store::error::StoreError;
use tidewatch_core::store::port::BarStore;
use tracing::debug;

/// 日 K 线查询结果行
type BarRow = (NaiveDate, f64, f64, f64, f64, f64);

/// BarStore 的 SQLite 实现。
///
/// # Summary
/// 所有股票的日 K 线保存在同一张 `kline_daily` 表中，以 (symbol, trade_date) 为主键。
///
/// # Invariants
/// * 主键保证每只股票每个交易日至多一行。
/// * `idx_kline_symbol_date` 支撑"最新交易日"与倒序分页查询。
pub struct SqliteBarStore {
    pool: SqlitePool,
}

impl SqliteBarStore {
    /// 创建新的 SqliteBarStore 并初始化表结构。
    ///
    /// # Logic
    /// 1. 在共享连接池上执行 DDL 建表与建索引。
    ///
    /// # Arguments
    /// * `pool` - 共享的 SQLite 连接池。
    ///
    /// # Returns
    /// * `Result<Self, StoreError>` - 存储实例或数据库错误。
    pub async fn new(pool: SqlitePool) -> Result<Self, StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kline_daily (
                symbol TEXT NOT NULL,
                trade_date TEXT NOT NULL,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                amount REAL NOT NULL,
                updated_at DATETIME NOT NULL,
                PRIMARY KEY (symbol, trade_date)
            );

            CREATE INDEX IF NOT EXISTS idx_kline_symbol_date
                ON kline_daily (symbol, trade_date DESC);
            "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| StoreError::InitError(e.to_string()))?;

        Ok(Self { pool })
    }

    fn to_bar(symbol: &str, row: BarRow) -> Bar {
        Bar {
            symbol: symbol.to_string(),
            trade_date: row.0,
            open: row.1,
            high: row.2,
            low: row.3,
            close: row.4,
            amount: row.5,
        }
    }
}

#[async_trait]
impl BarStore for SqliteBarStore {
    /// # Summary
    /// 合并写入日 K 线。
    ///
    /// # Logic
    /// 1. 开启事务。
    /// 2. 逐条执行 `INSERT ... ON CONFLICT DO UPDATE`，冲突时覆盖全部价格字段。
    /// 3. 提交事务，任一条失败则整体回滚。
    ///
    /// # Arguments
    /// * `symbol` - 目标股票，作为主键的一部分。
    /// * `bars` - 待写入的 K 线。
    ///
    /// # Returns
    /// * `Result<usize, StoreError>` - 写入条数。
    async fn merge(&self, symbol: &str, bars: &[Bar]) -> Result<usize, StoreError> {
        if bars.is_empty() {
            return Ok(0);
        }

        let now = Utc::now();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        for bar in bars {
            sqlx::query(
                r#"
                INSERT INTO kline_daily (symbol, trade_date, open, high, low, close, amount, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(symbol, trade_date) DO UPDATE SET
                    open = excluded.open,
                    high = excluded.high,
                    low = excluded.low,
                    close = excluded.close,
                    amount = excluded.amount,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(symbol)
            .bind(bar.trade_date)
            .bind(bar.open)
            .bind(bar.high)
            .bind(bar.low)
            .bind(bar.close)
            .bind(bar.amount)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        debug!("Merged {} bars for {}", bars.len(), symbol);
        Ok(bars.len())
    }

    /// # Summary
    /// 读取最近 `limit` 根日 K 线。
    ///
    /// # Logic
    /// 1. 借助索引按交易日倒序取前 `limit` 行。
    /// 2. 在内存中翻转为升序。
    async fn range_query(&self, symbol: &str, limit: usize) -> Result<Vec<Bar>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let records = sqlx::query_as::<_, BarRow>(
            r#"
            SELECT trade_date, open, high, low, close, amount
            FROM kline_daily
            WHERE symbol = ?
            ORDER BY trade_date DESC
            LIMIT ?
            "#,
        )
        .bind(symbol)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(records
            .into_iter()
            .rev()
            .map(|r| Self::to_bar(symbol, r))
            .collect())
    }

    async fn latest_date(&self, symbol: &str) -> Result<Option<NaiveDate>, StoreError> {
        sqlx::query_scalar::<_, Option<NaiveDate>>(
            "SELECT MAX(trade_date) FROM kline_daily WHERE symbol = ?",
        )
        .bind(symbol)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))
    }

    /// # Summary
    /// 找出数据过期或缺失的股票。
    ///
    /// # Logic
    /// 1. 分组查询库中每只股票的最新交易日。
    /// 2. 最新交易日早于 `today - staleness` 的股票计入结果。
    /// 3. 候选代码中完全没有数据的同样计入结果。
    async fn symbols_needing_refresh(
        &self,
        staleness: chrono::Duration,
        today: NaiveDate,
        candidates: &[String],
    ) -> Result<BTreeSet<String>, StoreError> {
        // 过期线溢出时视为全部过期
        let threshold = today.checked_sub_signed(staleness).unwrap_or(NaiveDate::MAX);
        let latest = sqlx::query_as::<_, (String, NaiveDate)>(
            "SELECT symbol, MAX(trade_date) FROM kline_daily GROUP BY symbol",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        let mut known = BTreeSet::new();
        let mut result = BTreeSet::new();
        for (symbol, date) in latest {
            if date < threshold {
                result.insert(symbol.clone());
            }
            known.insert(symbol);
        }

        for code in candidates {
            if !known.contains(code) {
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
        let records = sqlx::query_as::<_, BarRow>(
            r#"
            SELECT trade_date, open, high, low, close, amount
            FROM kline_daily
            WHERE symbol = ? AND trade_date >= ? AND trade_date <= ?
            ORDER BY trade_date ASC
            "#,
        )
        .bind(symbol)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(records
            .into_iter()
            .map(|r| Self::to_bar(symbol, r))
            .collect())
    }
}
