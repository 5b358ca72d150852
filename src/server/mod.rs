mod api;
mod error;
mod state;
mod types;

use std::sync::Arc;

use axum::Router;
use axum::http::Method;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use self::api::request_origin;
pub use self::state::*;

#[derive(OpenApi)]
#[openapi(
    paths(api::search_handler),
    components(schemas(crate::search::SearchResponse, crate::search::SearchHit))
)]
pub struct ApiDoc;

/// 构建API服务器
pub fn create_app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/search", get(api::search_handler))
        .route("/metrics", get(api::metrics_handler))
        .nest_service("/images", ServeDir::new(&state.images))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors)
        .with_state(state)
}
