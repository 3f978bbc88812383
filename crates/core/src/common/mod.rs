pub mod time;

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// # Summary
/// 监控周期枚举，定义 K 线由多少根日线聚合而成。
///
/// # Invariants
/// - `period()` 只可能返回 1、2、3。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Timeframe {
    // 日线
    Daily,
    // 2 日线
    TwoDay,
    // 3 日线
    ThreeDay,
}

impl Timeframe {
    /// 每根合成 K 线包含的交易日数量。
    pub fn period(self) -> usize {
        match self {
            Timeframe::Daily => 1,
            Timeframe::TwoDay => 2,
            Timeframe::ThreeDay => 3,
        }
    }

    /// 持久化及接口中使用的短标签。
    pub fn as_str(self) -> &'static str {
        match self {
            Timeframe::Daily => "1d",
            Timeframe::TwoDay => "2d",
            Timeframe::ThreeDay => "3d",
        }
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1d" | "daily" | "day" => Ok(Timeframe::Daily),
            "2d" | "two_day" => Ok(Timeframe::TwoDay),
            "3d" | "three_day" => Ok(Timeframe::ThreeDay),
            _ => Err(format!("Unknown Timeframe: {}", s)),
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// # Summary
/// 规范化 A 股代码，统一加上交易所前缀。
///
/// # Logic
/// 1. 已带 `sh` / `sz` 前缀的代码原样返回（转小写）。
/// 2. 以 `6` 开头的裸代码归入上交所。
/// 3. 以 `0` 或 `3` 开头的裸代码归入深交所。
/// 4. 其余情况不做处理。
///
/// # Arguments
/// * `code`: 用户输入或配置中的股票代码。
///
/// # Returns
/// 带交易所前缀的代码。
pub fn normalize_symbol(code: &str) -> String {
    let code = code.trim().to_lowercase();
    if code.starts_with("sh") || code.starts_with("sz") {
        return code;
    }
    if code.starts_with('6') {
        format!("sh{}", code)
    } else if code.starts_with('0') || code.starts_with('3') {
        format!("sz{}", code)
    } else {
        code
    }
}
