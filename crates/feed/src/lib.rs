pub mod tencent;

/// # Summary
/// 安装 rustls 使用的 ring 加密后端。
///
/// # Logic
/// 进程内只能安装一次，重复调用时忽略已安装的后端。
pub fn install_crypto_provider() {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        tracing::debug!("rustls crypto provider already installed");
    }
}
