use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use log::{debug, warn};
use reqwest::{Client, Response, StatusCode, Url};
use serde_json::{Value, json};

use super::*;

/// 基于 Weaviate REST / GraphQL 接口的向量索引
pub struct WeaviateStore {
    client: Client,
    base: Url,
}

impl WeaviateStore {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let base = Url::parse(url).with_context(|| format!("无效的 Weaviate 地址: {url}"))?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base.join(path)?)
    }
}

/// 检查响应状态，失败时带上响应体
async fn check(resp: Response, action: &str) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    bail!("{action}失败 ({status}): {body}")
}

fn object_json(collection: &str, record: &ImageRecord) -> Value {
    json!({
        "class": collection,
        "properties": {
            "image": STANDARD.encode(&record.image),
            "filename": record.filename,
            "filepath": record.filepath,
        }
    })
}

pub(crate) fn schema_json(schema: &CollectionSchema) -> Value {
    let properties = schema
        .properties
        .iter()
        .map(|p| json!({ "name": p.name, "dataType": [p.data_type], "description": p.description }))
        .collect::<Vec<_>>();
    let mut module_config = serde_json::Map::new();
    module_config.insert(schema.vectorizer.clone(), json!({ "imageFields": schema.image_fields }));
    json!({
        "class": schema.name,
        "description": schema.description,
        "vectorizer": schema.vectorizer,
        "moduleConfig": module_config,
        "properties": properties,
    })
}

pub(crate) fn near_text_query(collection: &str, query: &str, limit: usize) -> Value {
    // serde_json 负责字符串转义，避免提示词破坏 GraphQL 语法
    let concepts = serde_json::to_string(query).unwrap_or_else(|_| "\"\"".to_owned());
    json!({
        "query": format!(
            "{{ Get {{ {collection}(nearText: {{ concepts: [{concepts}] }}, limit: {limit}) \
             {{ filename filepath _additional {{ id distance }} }} }} }}"
        )
    })
}

/// 解析 nearText 查询的响应，保持索引给出的顺序
pub(crate) fn parse_near_text(collection: &str, body: &Value) -> Result<Vec<RawHit>> {
    if let Some(errors) = body.get("errors").and_then(Value::as_array) {
        if !errors.is_empty() {
            let messages = errors
                .iter()
                .filter_map(|e| e.get("message").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("; ");
            bail!("查询失败: {messages}");
        }
    }

    let Some(items) = body.pointer(&format!("/data/Get/{collection}")).and_then(Value::as_array)
    else {
        return Ok(vec![]);
    };

    items
        .iter()
        .map(|item| {
            let field = |name: &str| {
                item.get(name)
                    .and_then(Value::as_str)
                    .map(str::to_owned)
                    .ok_or_else(|| anyhow!("查询结果缺少字段 {name}"))
            };
            Ok(RawHit {
                filename: field("filename")?,
                filepath: field("filepath")?,
                distance: item.pointer("/_additional/distance").and_then(Value::as_f64),
            })
        })
        .collect()
}

#[async_trait]
impl VectorStore for WeaviateStore {
    async fn collection_exists(&self, name: &str) -> Result<bool> {
        let resp = self.client.get(self.endpoint(&format!("v1/schema/{name}"))?).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        check(resp, "查询集合").await?;
        Ok(true)
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let resp = self.client.delete(self.endpoint(&format!("v1/schema/{name}"))?).send().await?;
        check(resp, "删除集合").await?;
        Ok(())
    }

    async fn create_collection(&self, schema: &CollectionSchema) -> Result<()> {
        let resp = self
            .client
            .post(self.endpoint("v1/schema")?)
            .json(&schema_json(schema))
            .send()
            .await?;
        check(resp, "创建集合").await?;
        Ok(())
    }

    async fn batch_insert(&self, collection: &str, records: &[ImageRecord]) -> Result<()> {
        let objects = records.iter().map(|r| object_json(collection, r)).collect::<Vec<_>>();
        let resp = self
            .client
            .post(self.endpoint("v1/batch/objects")?)
            .json(&json!({ "objects": objects }))
            .send()
            .await?;
        let resp = check(resp, "批量写入").await?;

        // 批量接口对单个对象的错误仍返回 200，这里只记录不视为失败
        let body: Value = resp.json().await?;
        for item in body.as_array().into_iter().flatten() {
            if let Some(errors) = item.pointer("/result/errors") {
                let path = item.pointer("/properties/filepath").and_then(Value::as_str);
                warn!("对象写入出错 {}: {errors}", path.unwrap_or("?"));
            }
        }
        debug!("批量写入 {} 条记录", records.len());
        Ok(())
    }

    async fn insert(&self, collection: &str, record: &ImageRecord) -> Result<()> {
        let resp = self
            .client
            .post(self.endpoint("v1/objects")?)
            .json(&object_json(collection, record))
            .send()
            .await?;
        check(resp, "写入对象").await?;
        Ok(())
    }

    async fn near_text(&self, collection: &str, query: &str, limit: usize) -> Result<Vec<RawHit>> {
        let resp = self
            .client
            .post(self.endpoint("v1/graphql")?)
            .json(&near_text_query(collection, query, limit))
            .send()
            .await?;
        let body: Value = check(resp, "最近邻查询").await?.json().await?;
        parse_near_text(collection, &body)
    }
}
