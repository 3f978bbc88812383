use crate::common::Timeframe;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 全局应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub kline: KlineConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub data_dir: String,
    // 监控表为空时是否写入默认关注股票
    pub seed_monitor_stocks: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
            seed_monitor_stocks: true,
        }
    }
}

/// # Summary
/// K 线抓取、缓存与指标计算相关配置。
///
/// # Invariants
/// - `concurrency` 至少为 1，构造 worker 池时会向上取整到 1。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KlineConfig {
    // 批量刷新的 worker 数量
    pub concurrency: usize,
    // 单次行情源调用超时 (秒)
    pub provider_timeout_secs: u64,
    // 全量抓取的起始日期
    pub lookback_floor: NaiveDate,
    // 超过多少天未更新视为过期
    pub staleness_days: i64,
    // 读路径从库中读取的日线根数上限
    pub history_limit: usize,
    // 接口未指定 count 时返回的 K 线根数
    pub default_count: usize,
    // 后台增量刷新间隔 (秒)，0 表示关闭
    pub refresh_interval_secs: u64,
    pub ema_windows: EmaWindows,
}

impl Default for KlineConfig {
    fn default() -> Self {
        Self {
            concurrency: 3,
            provider_timeout_secs: 30,
            lookback_floor: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or_default(),
            staleness_days: 1,
            history_limit: 1000,
            default_count: 250,
            refresh_interval_secs: 3600,
            ema_windows: EmaWindows::default(),
        }
    }
}

/// 各周期对应的 EMA 窗口长度集合。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmaWindows {
    pub daily: Vec<u32>,
    pub two_day: Vec<u32>,
    pub three_day: Vec<u32>,
}

impl EmaWindows {
    /// 获取指定周期配置的窗口长度。
    pub fn for_timeframe(&self, timeframe: Timeframe) -> &[u32] {
        match timeframe {
            Timeframe::Daily => &self.daily,
            Timeframe::TwoDay => &self.two_day,
            Timeframe::ThreeDay => &self.three_day,
        }
    }
}

impl Default for EmaWindows {
    fn default() -> Self {
        Self {
            daily: vec![5, 10, 20, 144, 188],
            two_day: vec![10, 30, 60],
            three_day: vec![7, 21, 42],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    // RUST_LOG 未设置时使用的过滤级别
    pub level: String,
    // 滚动日志目录，为空则只输出到控制台
    pub dir: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: None,
        }
    }
}
