//! # API 服务启动器
//!
//! 组装 axum 路由、挂载 Swagger UI、配置 CORS 并绑定 TCP 端口对外提供服务。
//! 本模块不直接启动 `main()`, 而是由 `crates/app` 组装依赖后调用。

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;
use utoipa_swagger_ui::SwaggerUi;

use tidewatch_core::store::port::{BarStore, CubeStore, MonitorStore, PortfolioStore};
use tidewatch_kline::service::KlineService;

use crate::routes::{cube, kline, monitor, portfolio, tools};

// ============================================================
//  共享应用状态
// ============================================================

/// 全局应用状态，通过 axum 的 `State` 提取器注入到每个 Handler 中。
///
/// # Invariants
/// - 所有依赖在服务启动前注入，生命周期与进程等同。
#[derive(Clone)]
pub struct AppState {
    /// K 线服务 (Facade)
    pub kline_service: Arc<KlineService>,
    /// 监控股票存储
    pub monitor_store: Arc<dyn MonitorStore>,
    /// 持仓存储
    pub portfolio_store: Arc<dyn PortfolioStore>,
    /// 日线存储 (导出工具与持仓估值直接读取)
    pub bar_store: Arc<dyn BarStore>,
    /// 雪球组合配置存储
    pub cube_store: Arc<dyn CubeStore>,
}

// ============================================================
//  OpenAPI 文档定义
// ============================================================

/// 全局 OpenAPI 文档结构
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Tidewatch 股票跟踪 API",
        version = "0.1.0",
        description = "个人股票跟踪后端。提供 K 线查询与刷新、监控股票与持仓管理、雪球组合配置以及导出工具。"
    ),
    tags(
        (name = "K线 (Kline)", description = "多周期 K 线、EMA 指标与增量刷新"),
        (name = "监控 (Monitor)", description = "监控股票的增删改查"),
        (name = "持仓 (Portfolio)", description = "持仓的增删改查与估值汇总"),
        (name = "雪球组合 (Xueqiu)", description = "雪球组合配置的增删改查"),
        (name = "工具 (Tools)", description = "成本价计算与 K 线导出")
    )
)]
pub struct ApiDoc;

// ============================================================
//  服务构建与启动
// ============================================================

/// # Summary
/// 构建完整的 axum 应用路由树。
///
/// # Logic
/// 1. 注册全部业务路由并收集 OpenAPI 文档。
/// 2. 挂载 Swagger UI。
/// 3. 配置 CORS (允许所有来源)。
pub fn build_router(state: AppState) -> Router {
    let api_router = OpenApiRouter::new()
        .routes(routes!(kline::get_kline))
        .routes(routes!(kline::refresh_all))
        .routes(routes!(kline::refresh_one))
        .routes(routes!(monitor::list_monitor_stocks, monitor::create_monitor_stock))
        .routes(routes!(monitor::update_monitor_stock, monitor::delete_monitor_stock))
        .routes(routes!(monitor::set_monitor_enabled))
        .routes(routes!(portfolio::list_holdings, portfolio::create_holding))
        .routes(routes!(portfolio::update_holding, portfolio::delete_holding))
        .routes(routes!(cube::list_cubes, cube::create_cube))
        .routes(routes!(cube::update_cube, cube::delete_cube))
        .routes(routes!(cube::set_cube_enabled))
        .routes(routes!(tools::calculate_cost))
        .routes(routes!(tools::list_export_stocks))
        .routes(routes!(tools::export_kline));

    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .merge(api_router)
        .with_state(state)
        .split_for_parts();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    router
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", api))
        .layer(cors)
}

/// 构建路由并启动 HTTP 监听，`shutdown` 完成后优雅退出。
///
/// # Arguments
/// * `state` - 由外部注入的共享状态
/// * `bind_addr` - 监听的地址与端口，如 `"0.0.0.0:8080"`
/// * `shutdown` - 关闭信号
pub async fn start_server(
    state: AppState,
    bind_addr: &str,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = build_router(state);

    tracing::info!("Tidewatch API listening on {}", bind_addr);
    tracing::info!("Swagger UI: http://{}/swagger-ui/", bind_addr);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
