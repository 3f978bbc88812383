use thiserror::Error;
use tidewatch_core::store::error::StoreError;

/// # Summary
/// K 线管线错误枚举。
///
/// # Invariants
/// - 批量刷新中单只股票的错误只记录在该股票的结果里，不会中断其他股票。
#[derive(Error, Debug)]
pub enum KlineError {
    // 行情源调用失败或超时
    #[error("Provider error: {0}")]
    Provider(String),
    // 存储读写失败
    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),
    // 行情源返回的行缺字段或数值非法
    #[error("Validation error: {0}")]
    Validation(String),
    // 同一股票已有刷新任务在执行
    #[error("Refresh already in progress for {0}")]
    Busy(String),
}
