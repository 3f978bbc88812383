//! EMA 指标计算。
//!
//! 递推公式: EMA[t] = α·close[t] + (1-α)·EMA[t-1]，α = 2 / (w + 1)。
//! 以首根收盘价作为种子，输出与输入逐位对齐。

use std::collections::BTreeMap;
use tidewatch_core::market::entity::Bar;

/// 计算单个窗口长度的 EMA 序列。
pub fn ema_of_closes(closes: &[f64], window: u32) -> Vec<f64> {
    let alpha = 2.0 / (f64::from(window) + 1.0);
    let mut result = Vec::with_capacity(closes.len());
    let mut prev: Option<f64> = None;

    for &close in closes {
        let ema = match prev {
            Some(p) => close * alpha + p * (1.0 - alpha),
            None => close,
        };
        result.push(ema);
        prev = Some(ema);
    }
    result
}

/// # Summary
/// 为一组窗口长度计算 EMA。
///
/// # Logic
/// 1. 抽取收盘价。
/// 2. 对每个非零窗口调用 `ema_of_closes`，窗口 0 跳过。
///
/// # Arguments
/// * `series`: 日线或合成 K 线序列。
/// * `windows`: EMA 窗口长度集合。
///
/// # Returns
/// 以窗口长度为键的 EMA 序列，每条序列与 `series` 等长。
pub fn compute_ema(series: &[Bar], windows: &[u32]) -> BTreeMap<u32, Vec<f64>> {
    let closes: Vec<f64> = series.iter().map(|b| b.close).collect();
    windows
        .iter()
        .filter(|w| **w > 0)
        .map(|&w| (w, ema_of_closes(&closes, w)))
        .collect()
}
