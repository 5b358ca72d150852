//! 进程内的 [`VectorStore`] 实现，用于测试
//!
//! 没有真正的向量化模型，`near_text` 按查询词与文件名的重合程度给出距离。
//! 可以指定某几次批量写入或某些文件的单条写入失败，用来模拟索引出错。

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;

use super::*;

#[derive(Default)]
struct Inner {
    collections: HashMap<String, Vec<ImageRecord>>,
    schemas: HashMap<String, CollectionSchema>,
    batch_calls: usize,
    insert_calls: usize,
    batch_sizes: Vec<usize>,
}

/// 测试用的内存索引
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
    failing_batches: HashSet<usize>,
    failing_paths: HashSet<String>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 第 `n` 次（从 1 开始计数）批量写入调用返回错误
    pub fn fail_batch_call(mut self, n: usize) -> Self {
        self.failing_batches.insert(n);
        self
    }

    /// 文件路径为 `path` 的记录无论批量还是单条写入都会失败
    pub fn fail_path(mut self, path: impl Into<String>) -> Self {
        self.failing_paths.insert(path.into());
        self
    }

    pub fn batch_calls(&self) -> usize {
        self.read().batch_calls
    }

    pub fn insert_calls(&self) -> usize {
        self.read().insert_calls
    }

    /// 每次批量写入调用提交的记录数量，包括失败的调用
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.read().batch_sizes.clone()
    }

    /// 集合中的全部记录，按写入顺序排列
    pub fn records(&self, collection: &str) -> Vec<ImageRecord> {
        self.read().collections.get(collection).cloned().unwrap_or_default()
    }

    pub fn schema(&self, collection: &str) -> Option<CollectionSchema> {
        self.read().schemas.get(collection).cloned()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn tokens(s: &str) -> HashSet<String> {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// 查询词中未出现在文件名里的比例，范围 `[0, 1]`
fn lexical_distance(query: &HashSet<String>, filename: &str) -> f64 {
    if query.is_empty() {
        return 1.0;
    }
    let name = tokens(filename);
    let overlap = query.iter().filter(|t| name.contains(*t)).count();
    1.0 - overlap as f64 / query.len() as f64
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn collection_exists(&self, name: &str) -> Result<bool> {
        Ok(self.read().collections.contains_key(name))
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let mut inner = self.write();
        inner.schemas.remove(name);
        inner
            .collections
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| anyhow!("集合不存在: {name}"))
    }

    async fn create_collection(&self, schema: &CollectionSchema) -> Result<()> {
        let mut inner = self.write();
        if inner.collections.contains_key(&schema.name) {
            bail!("集合已存在: {}", schema.name);
        }
        inner.collections.insert(schema.name.clone(), vec![]);
        inner.schemas.insert(schema.name.clone(), schema.clone());
        Ok(())
    }

    async fn batch_insert(&self, collection: &str, records: &[ImageRecord]) -> Result<()> {
        let mut inner = self.write();
        inner.batch_calls += 1;
        inner.batch_sizes.push(records.len());
        if self.failing_batches.contains(&inner.batch_calls) {
            bail!("模拟的批量写入失败 (#{})", inner.batch_calls);
        }
        if let Some(r) = records.iter().find(|r| self.failing_paths.contains(&r.filepath)) {
            bail!("模拟的记录写入失败: {}", r.filepath);
        }
        let target =
            inner.collections.get_mut(collection).ok_or_else(|| anyhow!("集合不存在: {collection}"))?;
        target.extend_from_slice(records);
        Ok(())
    }

    async fn insert(&self, collection: &str, record: &ImageRecord) -> Result<()> {
        let mut inner = self.write();
        inner.insert_calls += 1;
        if self.failing_paths.contains(&record.filepath) {
            bail!("模拟的记录写入失败: {}", record.filepath);
        }
        let target =
            inner.collections.get_mut(collection).ok_or_else(|| anyhow!("集合不存在: {collection}"))?;
        target.push(record.clone());
        Ok(())
    }

    async fn near_text(&self, collection: &str, query: &str, limit: usize) -> Result<Vec<RawHit>> {
        let inner = self.read();
        let records =
            inner.collections.get(collection).ok_or_else(|| anyhow!("集合不存在: {collection}"))?;
        let query = tokens(query);
        let mut hits = records
            .iter()
            .map(|r| RawHit {
                filename: r.filename.clone(),
                filepath: r.filepath.clone(),
                distance: Some(lexical_distance(&query, &r.filename)),
            })
            .collect::<Vec<_>>();
        // 稳定排序，距离相同的按写入顺序
        hits.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }
}
