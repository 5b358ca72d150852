use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::http::header::HOST;

use super::error::{AppError, Result};
use super::state::AppState;
use super::types::*;
use crate::metrics;
use crate::search::{DEFAULT_LIMIT, SearchError, SearchResponse};

/// 根据请求头确定服务的访问地址
///
/// 位于反向代理之后时优先使用 `X-Forwarded-Proto`。
pub fn request_origin(headers: &HeaderMap, port: u16) -> String {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).filter(|v| !v.is_empty());
    let proto = header("x-forwarded-proto")
        // 可能是逗号分隔的多级代理
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .unwrap_or("http");
    let host = header(HOST.as_str()).map(str::to_owned).unwrap_or_else(|| format!("localhost:{port}"));
    format!("{proto}://{host}")
}

fn parse_limit(limit: Option<&str>) -> Result<usize, SearchError> {
    match limit.map(str::trim) {
        None | Some("") => Ok(DEFAULT_LIMIT),
        Some(s) => s.parse::<usize>().ok().filter(|&n| n > 0).ok_or(SearchError::InvalidLimit),
    }
}

/// 使用文本搜索图片
#[utoipa::path(
    get,
    path = "/search",
    params(SearchQuery),
    responses(
        (status = 200, body = SearchResponse),
        (status = 400, description = "缺少搜索文本或数量无效"),
    )
)]
pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
    headers: HeaderMap,
) -> Result<Json<SearchResponse>> {
    let prompt = query.prompt.as_deref().unwrap_or_default();
    if prompt.trim().is_empty() {
        return Err(AppError::from(SearchError::EmptyPrompt));
    }
    let limit = parse_limit(query.limit.as_deref())?;
    let origin = request_origin(&headers, state.port);
    let result = state.engine.search(prompt, limit, &origin).await?;
    Ok(Json(result))
}

/// 导出 prometheus 指标
pub async fn metrics_handler() -> String {
    metrics::gather_text()
}
