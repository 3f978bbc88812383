use tidewatch_core::market::entity::Bar;

/// # Summary
/// 将日线序列按固定根数聚合为多日 K 线。
///
/// # Logic
/// 1. `period <= 1` 时原样返回。
/// 2. 从第一根开始，每 `period` 根连续日线组成一个窗口，不考虑日历间隔。
/// 3. 窗口内：开盘取首根，收盘取末根，最高/最低取极值，成交额求和，交易日取末根。
/// 4. 末尾不足 `period` 根的窗口丢弃。
///
/// # Arguments
/// * `series`: 按交易日升序排列的日线。
/// * `period`: 每根合成 K 线包含的日线数量。
///
/// # Returns
/// 长度为 `series.len() / period` 的合成序列。
pub fn resample(series: &[Bar], period: usize) -> Vec<Bar> {
    if period <= 1 {
        return series.to_vec();
    }

    series
        .chunks_exact(period)
        .filter_map(|window| {
            let first = window.first()?;
            let last = window.last()?;
            Some(Bar {
                symbol: last.symbol.clone(),
                trade_date: last.trade_date,
                open: first.open,
                high: window.iter().map(|b| b.high).fold(f64::MIN, f64::max),
                low: window.iter().map(|b| b.low).fold(f64::MAX, f64::min),
                close: last.close,
                amount: window.iter().map(|b| b.amount).sum(),
            })
        })
        .collect()
}
