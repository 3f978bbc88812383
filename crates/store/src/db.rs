use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
};
use std::path::Path;
use std::time::Duration;
use tidewatch_core::store::error::StoreError;
use tracing::info;

/// 默认数据库文件名
pub const DEFAULT_DB_FILE: &str = "tidewatch.db";

/// 连接池上限，批量刷新的并发写入不会超过该值
const MAX_CONNECTIONS: u32 = 8;

/// # Summary
/// 打开（必要时创建）数据目录下的 SQLite 数据库并返回连接池。
///
/// # Logic
/// 1. 确保数据目录存在。
/// 2. 开启 `create_if_missing` 与 WAL 日志模式，读写互不阻塞。
/// 3. 设置忙等待超时，避免并发写入时立即返回 `SQLITE_BUSY`。
///
/// # Arguments
/// * `data_dir` - 数据根目录。
///
/// # Returns
/// * `Result<SqlitePool, StoreError>` - 连接池或初始化错误。
pub async fn open_pool(data_dir: &Path) -> Result<SqlitePool, StoreError> {
    std::fs::create_dir_all(data_dir).map_err(|e| StoreError::InitError(e.to_string()))?;
    let db_path = data_dir.join(DEFAULT_DB_FILE);

    let options = SqliteConnectOptions::new()
        .filename(&db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect_with(options)
        .await
        .map_err(|e| StoreError::InitError(e.to_string()))?;

    info!("SQLite database opened at {}", db_path.display());
    Ok(pool)
}
