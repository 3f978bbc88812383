pub mod cube;
pub mod kline;
pub mod monitor;
pub mod portfolio;
pub mod tools;
