use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use futures::future::join_all;
use log::{info, warn};
use serde::{Serialize, Serializer};
use thiserror::Error;
use utoipa::ToSchema;

use crate::metrics;
use crate::store::{RawHit, VectorStore};

/// 默认返回的结果数量
pub const DEFAULT_LIMIT: usize = 10;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Please provide a search prompt as a query parameter: ?prompt=your+search+term")]
    EmptyPrompt,
    #[error("limit must be a positive integer")]
    InvalidLimit,
    #[error("search failed: {0:#}")]
    Store(#[from] anyhow::Error),
}

impl SearchError {
    /// 是否为调用方的参数错误
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::EmptyPrompt | Self::InvalidLimit)
    }
}

/// 展示用的数值，可能不可用
///
/// 序列化为保留 4 位小数的数字，不可用时为字符串 `"N/A"`。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Measure {
    Value(f64),
    Unavailable,
}

impl Measure {
    fn from_option(v: Option<f64>) -> Self {
        match v {
            Some(v) if v.is_finite() => Self::Value(v),
            _ => Self::Unavailable,
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Value(v) => Some(*v),
            Self::Unavailable => None,
        }
    }

    /// 由距离计算相似度 `1 - distance`
    pub fn similarity(distance: Measure) -> Self {
        match distance {
            Self::Value(d) => Self::Value(1.0 - d),
            Self::Unavailable => Self::Unavailable,
        }
    }
}

impl Serialize for Measure {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Value(v) => serializer.serialize_f64((v * 1e4).round() / 1e4),
            Self::Unavailable => serializer.serialize_str("N/A"),
        }
    }
}

impl std::fmt::Display for Measure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{v:.4}"),
            Self::Unavailable => f.write_str("N/A"),
        }
    }
}

/// 一条搜索结果
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub filename: String,
    pub filepath: String,
    /// 相似度 `1 - distance`，不参与排序
    #[schema(value_type = Object)]
    pub similarity: Measure,
    /// 索引给出的距离，越小越相似
    #[schema(value_type = Object)]
    pub distance: Measure,
    pub image_url: String,
    /// data URI 形式的原图，读取失败时为空
    pub image_base64: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
    pub count: usize,
}

/// 根据文件后缀推断 MIME 类型
pub fn mime_type(path: &Path) -> &'static str {
    let ext = path.extension().map(|e| e.to_string_lossy().to_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/jpeg",
    }
}

/// 读取原图并编码为 data URI，失败时返回空字符串
async fn encode_file(filepath: &str) -> String {
    match tokio::fs::read(filepath).await {
        Ok(data) => {
            format!("data:{};base64,{}", mime_type(Path::new(filepath)), STANDARD.encode(data))
        }
        Err(e) => {
            warn!("读取图片失败 {filepath}: {e}");
            String::new()
        }
    }
}

/// 由请求来源与文件名拼出图片地址
pub fn image_url(origin: &str, filename: &str) -> String {
    format!("{}/images/{}", origin.trim_end_matches('/'), filename)
}

/// 文本搜图
pub struct QueryEngine {
    store: Arc<dyn VectorStore>,
    collection: String,
}

impl QueryEngine {
    pub fn new(store: Arc<dyn VectorStore>, collection: &str) -> Self {
        Self { store, collection: collection.to_owned() }
    }

    /// 搜索与 `prompt` 最相近的至多 `limit` 张图片
    ///
    /// 结果顺序由索引决定，不再重新排序。单张图片读取失败只会让该结果的
    /// `image_base64` 为空。`origin` 用于拼接图片地址，如 `https://example.com`。
    pub async fn search(
        &self,
        prompt: &str,
        limit: usize,
        origin: &str,
    ) -> Result<SearchResponse, SearchError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(SearchError::EmptyPrompt);
        }
        if limit == 0 {
            return Err(SearchError::InvalidLimit);
        }

        let start = Instant::now();
        info!("正在搜索: {prompt:?}");
        metrics::inc_search();
        let hits = self.store.near_text(&self.collection, prompt, limit).await?;
        let results = join_all(hits.into_iter().map(|hit| enrich(hit, origin))).await;
        metrics::observe_search(start.elapsed().as_secs_f64());

        Ok(SearchResponse { count: results.len(), results })
    }
}

async fn enrich(hit: RawHit, origin: &str) -> SearchHit {
    let distance = Measure::from_option(hit.distance);
    let image_base64 = encode_file(&hit.filepath).await;
    SearchHit {
        image_url: image_url(origin, &hit.filename),
        similarity: Measure::similarity(distance),
        distance,
        filename: hit.filename,
        filepath: hit.filepath,
        image_base64,
    }
}
