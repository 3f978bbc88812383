//! # 雪球组合路由控制器
//!
//! 实现 `/api/v1/xueqiu-cubes` 路径下的配置管理接口。

use axum::Json;
use axum::extract::{Path, Query, State};

use crate::error::ApiError;
use crate::server::AppState;
use crate::types::{
    ApiResponse, CreateXueqiuCubeRequest, MonitorListQuery, SetEnabledRequest,
    UpdateXueqiuCubeRequest, XueqiuCubeResponse,
};

/// 组合代码统一去空白并转大写
fn normalize_cube_symbol(raw: &str) -> String {
    raw.trim().to_uppercase()
}

async fn load(state: &AppState, cube_symbol: &str) -> Result<XueqiuCubeResponse, ApiError> {
    state
        .cube_store
        .get(cube_symbol)
        .await?
        .map(XueqiuCubeResponse::from)
        .ok_or_else(|| not_found(cube_symbol))
}

fn not_found(cube_symbol: &str) -> ApiError {
    ApiError::NotFound(format!("雪球组合 {} 不存在", cube_symbol))
}

/// 列出雪球组合
#[utoipa::path(
    get,
    path = "/api/v1/xueqiu-cubes",
    tag = "雪球组合 (Xueqiu)",
    params(
        ("enabled_only" = Option<bool>, Query, description = "只返回启用的组合，默认 false")
    ),
    responses(
        (status = 200, description = "获取成功", body = ApiResponse<Vec<XueqiuCubeResponse>>)
    )
)]
pub async fn list_cubes(
    State(state): State<AppState>,
    Query(query): Query<MonitorListQuery>,
) -> Result<Json<ApiResponse<Vec<XueqiuCubeResponse>>>, ApiError> {
    let cubes = state
        .cube_store
        .list(query.enabled_only.unwrap_or(false))
        .await?;
    Ok(Json(ApiResponse::ok(
        cubes.into_iter().map(XueqiuCubeResponse::from).collect(),
    )))
}

/// 新增雪球组合
#[utoipa::path(
    post,
    path = "/api/v1/xueqiu-cubes",
    tag = "雪球组合 (Xueqiu)",
    request_body = CreateXueqiuCubeRequest,
    responses(
        (status = 200, description = "添加成功", body = ApiResponse<XueqiuCubeResponse>),
        (status = 400, description = "参数为空或组合已存在")
    )
)]
pub async fn create_cube(
    State(state): State<AppState>,
    Json(req): Json<CreateXueqiuCubeRequest>,
) -> Result<Json<ApiResponse<XueqiuCubeResponse>>, ApiError> {
    let cube_symbol = normalize_cube_symbol(&req.cube_symbol);
    let cube_name = req.cube_name.trim();
    if cube_symbol.is_empty() || cube_name.is_empty() {
        return Err(ApiError::BadRequest("组合代码和名称不能为空".to_string()));
    }

    if !state
        .cube_store
        .add(&cube_symbol, cube_name, req.enabled)
        .await?
    {
        return Err(ApiError::BadRequest(format!("组合 {} 已存在", cube_symbol)));
    }
    tracing::info!("Added xueqiu cube {}", cube_symbol);
    Ok(Json(ApiResponse::ok(load(&state, &cube_symbol).await?)))
}

/// 修改雪球组合
#[utoipa::path(
    put,
    path = "/api/v1/xueqiu-cubes/{cube_symbol}",
    tag = "雪球组合 (Xueqiu)",
    params(
        ("cube_symbol" = String, Path, description = "组合代码")
    ),
    request_body = UpdateXueqiuCubeRequest,
    responses(
        (status = 200, description = "修改成功", body = ApiResponse<XueqiuCubeResponse>),
        (status = 400, description = "名称为空"),
        (status = 404, description = "组合不存在")
    )
)]
pub async fn update_cube(
    State(state): State<AppState>,
    Path(cube_symbol): Path<String>,
    Json(req): Json<UpdateXueqiuCubeRequest>,
) -> Result<Json<ApiResponse<XueqiuCubeResponse>>, ApiError> {
    let cube_symbol = normalize_cube_symbol(&cube_symbol);
    let cube_name = req.cube_name.trim();
    if cube_name.is_empty() {
        return Err(ApiError::BadRequest("组合名称不能为空".to_string()));
    }

    if !state
        .cube_store
        .update(&cube_symbol, cube_name, req.enabled)
        .await?
    {
        return Err(not_found(&cube_symbol));
    }
    Ok(Json(ApiResponse::ok(load(&state, &cube_symbol).await?)))
}

/// 删除雪球组合
#[utoipa::path(
    delete,
    path = "/api/v1/xueqiu-cubes/{cube_symbol}",
    tag = "雪球组合 (Xueqiu)",
    params(
        ("cube_symbol" = String, Path, description = "组合代码")
    ),
    responses(
        (status = 200, description = "删除成功", body = ApiResponse<String>),
        (status = 404, description = "组合不存在")
    )
)]
pub async fn delete_cube(
    State(state): State<AppState>,
    Path(cube_symbol): Path<String>,
) -> Result<Json<ApiResponse<String>>, ApiError> {
    let cube_symbol = normalize_cube_symbol(&cube_symbol);
    if !state.cube_store.delete(&cube_symbol).await? {
        return Err(not_found(&cube_symbol));
    }
    Ok(Json(ApiResponse::ok("ok".to_string())))
}

/// 启用或停用雪球组合
#[utoipa::path(
    patch,
    path = "/api/v1/xueqiu-cubes/{cube_symbol}/enabled",
    tag = "雪球组合 (Xueqiu)",
    params(
        ("cube_symbol" = String, Path, description = "组合代码")
    ),
    request_body = SetEnabledRequest,
    responses(
        (status = 200, description = "修改成功", body = ApiResponse<XueqiuCubeResponse>),
        (status = 404, description = "组合不存在")
    )
)]
pub async fn set_cube_enabled(
    State(state): State<AppState>,
    Path(cube_symbol): Path<String>,
    Json(req): Json<SetEnabledRequest>,
) -> Result<Json<ApiResponse<XueqiuCubeResponse>>, ApiError> {
    let cube_symbol = normalize_cube_symbol(&cube_symbol);
    if !state
        .cube_store
        .set_enabled(&cube_symbol, req.enabled)
        .await?
    {
        return Err(not_found(&cube_symbol));
    }
    Ok(Json(ApiResponse::ok(load(&state, &cube_symbol).await?)))
}
