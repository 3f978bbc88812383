use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::SqlitePool;
use std::str::FromStr;
use tidewatch_core::store::error::StoreError;
use tidewatch_core::store::port::{Holding, PortfolioStore};

type HoldingRow = (String, String, String, i64);

/// PortfolioStore 的 SQLite 实现。
///
/// # Summary
/// 在 `portfolio` 表中维护持仓，成本价以字符串形式保存以保留十进制精度。
pub struct SqlitePortfolioStore {
    pool: SqlitePool,
}

impl SqlitePortfolioStore {
    /// 创建新的 SqlitePortfolioStore 并初始化表结构。
    pub async fn new(pool: SqlitePool) -> Result<Self, StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS portfolio (
                code TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                cost_price TEXT NOT NULL,
                shares INTEGER NOT NULL
            );
            "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| StoreError::InitError(e.to_string()))?;

        Ok(Self { pool })
    }

    fn to_entity(row: HoldingRow) -> Result<Holding, StoreError> {
        let cost_price = Decimal::from_str(&row.2)
            .map_err(|e| StoreError::Corrupted(format!("cost_price of {}: {}", row.0, e)))?;
        Ok(Holding {
            code: row.0,
            name: row.1,
            cost_price,
            shares: row.3,
        })
    }
}

#[async_trait]
impl PortfolioStore for SqlitePortfolioStore {
    async fn list(&self) -> Result<Vec<Holding>, StoreError> {
        sqlx::query_as::<_, HoldingRow>(
            "SELECT code, name, cost_price, shares FROM portfolio ORDER BY code",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?
        .into_iter()
        .map(Self::to_entity)
        .collect()
    }

    async fn get(&self, code: &str) -> Result<Option<Holding>, StoreError> {
        sqlx::query_as::<_, HoldingRow>(
            "SELECT code, name, cost_price, shares FROM portfolio WHERE code = ?",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?
        .map(Self::to_entity)
        .transpose()
    }

    async fn add(&self, holding: &Holding) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO portfolio (code, name, cost_price, shares) VALUES (?, ?, ?, ?)",
        )
        .bind(&holding.code)
        .bind(&holding.name)
        .bind(holding.cost_price.to_string())
        .bind(holding.shares)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(result.rows_affected() == 1)
    }

    async fn update(&self, holding: &Holding) -> Result<bool, StoreError> {
        let result =
            sqlx::query("UPDATE portfolio SET name = ?, cost_price = ?, shares = ? WHERE code = ?")
                .bind(&holding.name)
                .bind(holding.cost_price.to_string())
                .bind(holding.shares)
                .bind(&holding.code)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, code: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM portfolio WHERE code = ?")
            .bind(code)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }
}
