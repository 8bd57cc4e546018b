// 路由构建

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

use crate::config::ServerConfig;
use crate::server::handlers;
use crate::server::state::AppState;

/// 健康检查响应结构
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    service: String,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
    })
}

/// 构建完整应用路由
pub fn build_router(app_state: AppState) -> Router {
    let upload_limit = app_state.config.explorer.max_upload_bytes;

    let api_routes = Router::new()
        .route("/fs/list", get(handlers::list_directory))
        .route("/fs/goto", get(handlers::goto_path))
        .route("/fs/info", get(handlers::entry_info))
        .route(
            "/fs/upload",
            post(handlers::upload_files).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/fs/archive", post(handlers::archive_selection))
        .route("/fs/delete", post(handlers::delete_selection))
        .with_state(app_state.clone());

    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&app_state.config.server));

    let app = Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(health_check));

    // 前端静态资源（可选），找不到的路径回退到 index.html
    let app = match &app_state.config.server.static_dir {
        Some(dir) if dir.join("index.html").is_file() => {
            tracing::info!("✓ 前端资源目录: {:?}", dir);
            let static_service = ServeDir::new(dir).not_found_service(ServeFile::new(dir.join("index.html")));
            app.fallback_service(static_service)
        }
        Some(dir) => {
            tracing::warn!("前端资源目录无效（缺少 index.html），不提供静态页面: {:?}", dir);
            app
        }
        None => app,
    };

    app.layer(middleware)
}

/// 按配置构建 CORS 层，`*` 表示允许任意来源
fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if config.cors_origins.is_empty() || config.cors_origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("忽略无效的 CORS 来源: {}", origin);
                None
            }
        })
        .collect();

    layer.allow_origin(origins)
}
