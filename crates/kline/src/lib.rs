//! # `tidewatch-kline` - K 线缓存与计算管线
//!
//! 增量抓取日线写入 Bar Store，读取时按周期重采样并计算 EMA 指标；
//! 持仓估值使用库中最新收盘价。

pub mod batch;
pub mod error;
pub mod fetcher;
pub mod indicator;
pub mod normalize;
pub mod resample;
pub mod service;
pub mod valuation;
