use std::path::PathBuf;
use std::sync::Arc;

use crate::search::QueryEngine;

/// 应用状态
pub struct AppState {
    /// 文本搜图引擎
    pub engine: QueryEngine,
    /// 通过 `/images` 提供访问的图片目录
    pub images: PathBuf,
    /// 监听端口，请求中缺少 Host 时用于拼接图片地址
    pub port: u16,
}

impl AppState {
    /// 创建新的应用状态
    pub fn new(engine: QueryEngine, images: PathBuf, port: u16) -> Arc<Self> {
        Arc::new(AppState { engine, images, port })
    }
}
