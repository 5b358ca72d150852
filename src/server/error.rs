use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use log::error;
use serde_json::json;

use crate::search::SearchError;

pub type Result<T, E = AppError> = std::result::Result<T, E>;

/// API错误类型
pub enum AppError {
    /// 请求参数错误
    BadRequest(String),
    /// 内部错误，包括索引服务不可用
    Internal(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response()
            }
            Self::Internal(err) => {
                error!("搜索接口出错: {err:#}");
                let body = json!({ "error": "Internal server error during search" });
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
        }
    }
}

impl From<SearchError> for AppError {
    fn from(err: SearchError) -> Self {
        if err.is_client_error() {
            Self::BadRequest(err.to_string())
        } else {
            Self::Internal(err.into())
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}
