use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use std::sync::RwLock;

/// 沪深交易所所在时区 (UTC+8)。
const EXCHANGE_OFFSET_SECS: i32 = 8 * 3600;

/// # Summary
/// 时间供给器接口，用于隔离物理系统时钟。
/// 增量抓取窗口与过期判断都必须通过此接口获取"今天"。
pub trait TimeProvider: Send + Sync {
    /// 获取当前挂载的时间
    fn now(&self) -> DateTime<Utc>;

    /// # Summary
    /// 交易所本地日期。
    ///
    /// # Logic
    /// 将 `now()` 换算到 UTC+8 后取日期部分。
    fn today(&self) -> NaiveDate {
        match FixedOffset::east_opt(EXCHANGE_OFFSET_SECS) {
            Some(tz) => self.now().with_timezone(&tz).date_naive(),
            None => self.now().date_naive(),
        }
    }
}

/// # Summary
/// 生产环境使用的真实时钟，直接返回操作系统当前时间。
pub struct RealTimeProvider;

impl TimeProvider for RealTimeProvider {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// # Summary
/// 测试专用虚拟时钟，允许主动拨动时间。
///
/// # Invariants
/// - 并发安全：内部利用 `RwLock` 保护当前时间。
pub struct FakeClockProvider {
    current_time: RwLock<DateTime<Utc>>,
}

impl FakeClockProvider {
    /// 使用指定的初始时间创建虚拟时钟
    pub fn new(initial_time: DateTime<Utc>) -> Self {
        Self {
            current_time: RwLock::new(initial_time),
        }
    }

    /// 强制修改时钟的当前时间
    pub fn set_time(&self, new_time: DateTime<Utc>) {
        let mut time = self.current_time.write().unwrap_or_else(|e| e.into_inner());
        *time = new_time;
    }
}

impl TimeProvider for FakeClockProvider {
    fn now(&self) -> DateTime<Utc> {
        *self.current_time.read().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_today_uses_exchange_offset() {
        // UTC 17:00 已经是北京时间次日凌晨
        let clock = FakeClockProvider::new(Utc.with_ymd_and_hms(2026, 2, 9, 17, 0, 0).unwrap());
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2026, 2, 10).unwrap());

        clock.set_time(Utc.with_ymd_and_hms(2026, 2, 9, 3, 0, 0).unwrap());
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2026, 2, 9).unwrap());
    }
}
