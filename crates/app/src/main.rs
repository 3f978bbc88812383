use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File, FileFormat};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, info_span, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use tidewatch_api::server::{AppState, start_server};
use tidewatch_core::common::time::RealTimeProvider;
use tidewatch_core::config::{AppConfig, LoggingConfig};
use tidewatch_feed::tencent::TencentProvider;
use tidewatch_kline::service::KlineService;
use tidewatch_store::cube::SqliteCubeStore;
use tidewatch_store::db::open_pool;
use tidewatch_store::kline::SqliteBarStore;
use tidewatch_store::monitor::SqliteMonitorStore;
use tidewatch_store::portfolio::SqlitePortfolioStore;

const CONFIG_PATH: &str = "config/tidewatch.toml";

/// # Summary
/// 加载应用配置。
///
/// # Logic
/// 1. 以 `AppConfig::default()` 作为最底层默认值。
/// 2. 叠加可选的 TOML 配置文件。
/// 3. 叠加 `TIDEWATCH__` 前缀的环境变量，例如 `TIDEWATCH__SERVER__PORT=9000`。
fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    Config::builder()
        .add_source(Config::try_from(&AppConfig::default())?)
        .add_source(File::new(path, FileFormat::Toml).required(false))
        .add_source(
            Environment::with_prefix("TIDEWATCH")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()
}

/// 初始化日志。`RUST_LOG` 优先于配置中的级别；配置了目录时额外按天滚动写文件。
fn init_logging(
    config: &LoggingConfig,
) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error>> {
    let filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer());

    match &config.dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "tidewatch.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            registry
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .try_init()?;
            Ok(Some(guard))
        }
        None => {
            registry.try_init()?;
            Ok(None)
        }
    }
}

/// 后台定时增量刷新。间隔为 0 时不启动。
fn spawn_refresh_loop(service: Arc<KlineService>, interval_secs: u64) -> Option<JoinHandle<()>> {
    if interval_secs == 0 {
        info!("Periodic refresh disabled");
        return None;
    }

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            // 首次 tick 立即触发，启动后先补齐一次数据
            ticker.tick().await;
            match service.refresh_all(false).await {
                Ok(report) => {
                    info!(
                        "Periodic refresh finished: {}/{} succeeded",
                        report.succeeded, report.total
                    );
                    for (symbol, reason) in report.failed() {
                        warn!("Periodic refresh failed for {}: {}", symbol, reason);
                    }
                }
                Err(e) => error!("Periodic refresh aborted: {}", e),
            }
        }
    }))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}

/// # Summary
/// 程序主入口。
///
/// # Logic
/// 1. 加载配置并初始化日志。
/// 2. 打开 SQLite 连接池，构建各存储，按需写入默认监控股票。
/// 3. 构建行情源与 K 线服务。
/// 4. 启动后台定时刷新。
/// 5. 启动 HTTP 服务，收到 Ctrl+C 后优雅退出。
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(CONFIG_PATH)?;
    let _log_guard = init_logging(&config.logging)?;
    let root = info_span!("tidewatch");

    info!("Tidewatch starting...");

    // 1. 存储
    let pool = open_pool(Path::new(&config.database.data_dir)).await?;
    let bar_store = Arc::new(SqliteBarStore::new(pool.clone()).await?);
    let monitor_store = Arc::new(SqliteMonitorStore::new(pool.clone()).await?);
    let portfolio_store = Arc::new(SqlitePortfolioStore::new(pool.clone()).await?);
    let cube_store = Arc::new(SqliteCubeStore::new(pool).await?);
    if config.database.seed_monitor_stocks {
        let seeded = monitor_store.seed_defaults().await?;
        if seeded > 0 {
            info!("Seeded {} default monitor stocks", seeded);
        }
    }

    // 2. 行情源与 K 线服务
    tidewatch_feed::install_crypto_provider();
    let provider = Arc::new(TencentProvider::new(Duration::from_secs(
        config.kline.provider_timeout_secs,
    ))?);
    let kline_service = Arc::new(KlineService::new(
        bar_store.clone(),
        monitor_store.clone(),
        provider,
        Arc::new(RealTimeProvider),
        config.kline.clone(),
        &root,
    ));

    // 3. 后台刷新
    let refresh_task =
        spawn_refresh_loop(kline_service.clone(), config.kline.refresh_interval_secs);

    // 4. HTTP 服务
    let state = AppState {
        kline_service,
        monitor_store,
        portfolio_store,
        bar_store,
        cube_store,
    };
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    start_server(state, &bind_addr, shutdown_signal()).await?;

    if let Some(task) = refresh_task {
        task.abort();
    }
    info!("Tidewatch stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let config = load_config(path.to_str().unwrap()).unwrap();
        assert_eq!(config.kline.concurrency, 3);
        assert_eq!(config.kline.ema_windows.daily, vec![5, 10, 20, 144, 188]);
    }

    #[test]
    fn test_config_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tidewatch.toml");
        std::fs::write(
            &path,
            "[kline]\nconcurrency = 5\nlookback_floor = \"2022-01-01\"\n\n[logging]\nlevel = \"debug\"\n",
        )
        .unwrap();

        let config = load_config(path.to_str().unwrap()).unwrap();
        assert_eq!(config.kline.concurrency, 5);
        assert_eq!(
            config.kline.lookback_floor,
            chrono::NaiveDate::from_ymd_opt(2022, 1, 1).unwrap()
        );
        assert_eq!(config.kline.provider_timeout_secs, 30);
        assert_eq!(config.logging.level, "debug");
    }
}
