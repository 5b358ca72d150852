use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;

use crate::store::{CollectionSchema, DataType, Property, VectorStore};

/// 图片集合的结构：图片、文件名、文件路径三个字段，只有图片参与向量化
pub fn image_schema(name: &str) -> CollectionSchema {
    CollectionSchema {
        name: name.to_owned(),
        description: "A class to store images with vector embeddings".to_owned(),
        vectorizer: "multi2vec-clip".to_owned(),
        image_fields: vec!["image"],
        properties: vec![
            Property {
                name: "image",
                data_type: DataType::Blob,
                description: "The image file as base64 encoded blob",
            },
            Property {
                name: "filename",
                data_type: DataType::String,
                description: "The filename of the image",
            },
            Property {
                name: "filepath",
                data_type: DataType::String,
                description: "The full file path of the image",
            },
        ],
    }
}

/// 管理图片集合的生命周期
pub struct CollectionManager {
    store: Arc<dyn VectorStore>,
    schema: CollectionSchema,
}

impl CollectionManager {
    pub fn new(store: Arc<dyn VectorStore>, name: &str) -> Self {
        Self { store, schema: image_schema(name) }
    }

    pub fn name(&self) -> &str {
        &self.schema.name
    }

    /// 删除已存在的集合并重新创建一个空集合
    ///
    /// 删除和创建之间不是原子的，如果进程在两者之间退出，集合会一直缺失，
    /// 直到下一次 `reset` 成功。
    pub async fn reset(&self) -> Result<()> {
        let name = self.name();
        if self.store.collection_exists(name).await.context("检查集合是否存在失败")? {
            info!("删除已有集合 {name} 及其全部数据");
            self.store.delete_collection(name).await.context("删除集合失败")?;
        } else {
            info!("集合 {name} 不存在，无需删除");
        }
        self.store.create_collection(&self.schema).await.context("创建集合失败")?;
        info!("集合 {name} 创建完成");
        Ok(())
    }
}
