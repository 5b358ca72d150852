//! 向量索引服务的抽象
//!
//! 向量化模型和索引本身都在外部服务中，这里只描述编排层需要的六个操作。
//! 引擎通过 [`VectorStore`] 访问索引，测试时可以替换为 [`InMemoryStore`]。

mod memory;
mod weaviate;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

pub use self::memory::*;
pub use self::weaviate::*;

/// 写入索引的一条图片记录
///
/// 记录本身不携带向量，索引会根据 `image` 字段自行计算。
/// `filepath` 是唯一的身份标识，索引不会去重。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    /// 归一化后的图片字节
    pub image: Vec<u8>,
    pub filename: String,
    pub filepath: String,
}

/// 最近邻查询返回的原始结果，按距离升序排列
#[derive(Debug, Clone, PartialEq)]
pub struct RawHit {
    pub filename: String,
    pub filepath: String,
    /// 索引原生的距离，越小越相似；索引未返回时为 `None`
    pub distance: Option<f64>,
}

/// 集合的属性类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Blob,
    String,
}

/// 集合中的一个属性
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub name: &'static str,
    pub data_type: DataType,
    pub description: &'static str,
}

/// 集合的结构定义
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSchema {
    pub name: String,
    pub description: String,
    /// 向量化模块名称
    pub vectorizer: String,
    /// 参与向量化的图片字段，文本字段刻意不参与
    pub image_fields: Vec<&'static str>,
    pub properties: Vec<Property>,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn collection_exists(&self, name: &str) -> Result<bool>;

    async fn delete_collection(&self, name: &str) -> Result<()>;

    async fn create_collection(&self, schema: &CollectionSchema) -> Result<()>;

    /// 批量写入，整个调用要么成功要么失败，没有部分成功的状态
    async fn batch_insert(&self, collection: &str, records: &[ImageRecord]) -> Result<()>;

    async fn insert(&self, collection: &str, record: &ImageRecord) -> Result<()>;

    /// 由索引对 `query` 进行向量化，返回至多 `limit` 条距离升序的结果
    async fn near_text(&self, collection: &str, query: &str, limit: usize) -> Result<Vec<RawHit>>;
}
