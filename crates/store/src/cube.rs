use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tidewatch_core::store::error::StoreError;
use tidewatch_core::store::port::{CubeStore, XueqiuCube};

type CubeRow = (String, String, bool, DateTime<Utc>, DateTime<Utc>);

const CUBE_COLUMNS: &str = "cube_symbol, cube_name, enabled, created_at, updated_at";

/// CubeStore 的 SQLite 实现，维护 `xueqiu_cubes` 表中的雪球组合配置。
pub struct SqliteCubeStore {
    pool: SqlitePool,
}

impl SqliteCubeStore {
    /// 创建新的 SqliteCubeStore 并初始化表结构。
    pub async fn new(pool: SqlitePool) -> Result<Self, StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS xueqiu_cubes (
                cube_symbol TEXT PRIMARY KEY,
                cube_name TEXT NOT NULL,
                enabled INTEGER NOT NULL DEFAULT 1,
                created_at DATETIME NOT NULL,
                updated_at DATETIME NOT NULL
            );
            "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| StoreError::InitError(e.to_string()))?;

        Ok(Self { pool })
    }

    fn to_entity(row: CubeRow) -> XueqiuCube {
        XueqiuCube {
            cube_symbol: row.0,
            cube_name: row.1,
            enabled: row.2,
            created_at: row.3,
            updated_at: row.4,
        }
    }
}

#[async_trait]
impl CubeStore for SqliteCubeStore {
    async fn list(&self, enabled_only: bool) -> Result<Vec<XueqiuCube>, StoreError> {
        let filter = if enabled_only { "WHERE enabled = 1" } else { "" };
        let sql = format!(
            "SELECT {} FROM xueqiu_cubes {} ORDER BY cube_symbol",
            CUBE_COLUMNS, filter
        );

        let rows = sqlx::query_as::<_, CubeRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(rows.into_iter().map(Self::to_entity).collect())
    }

    async fn get(&self, cube_symbol: &str) -> Result<Option<XueqiuCube>, StoreError> {
        let sql = format!("SELECT {} FROM xueqiu_cubes WHERE cube_symbol = ?", CUBE_COLUMNS);
        let row = sqlx::query_as::<_, CubeRow>(&sql)
            .bind(cube_symbol)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(row.map(Self::to_entity))
    }

    async fn add(
        &self,
        cube_symbol: &str,
        cube_name: &str,
        enabled: bool,
    ) -> Result<bool, StoreError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO xueqiu_cubes
                (cube_symbol, cube_name, enabled, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(cube_symbol)
        .bind(cube_name)
        .bind(enabled)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(result.rows_affected() == 1)
    }

    async fn update(
        &self,
        cube_symbol: &str,
        cube_name: &str,
        enabled: Option<bool>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE xueqiu_cubes
            SET cube_name = ?, enabled = COALESCE(?, enabled), updated_at = ?
            WHERE cube_symbol = ?
            "#,
        )
        .bind(cube_name)
        .bind(enabled)
        .bind(Utc::now())
        .bind(cube_symbol)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_enabled(&self, cube_symbol: &str, enabled: bool) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE xueqiu_cubes SET enabled = ?, updated_at = ? WHERE cube_symbol = ?",
        )
        .bind(enabled)
        .bind(Utc::now())
        .bind(cube_symbol)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, cube_symbol: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM xueqiu_cubes WHERE cube_symbol = ?")
            .bind(cube_symbol)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }
}
