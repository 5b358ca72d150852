use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::cli::*;
use crate::discover::DEFAULT_SUFFIX;
use crate::store::WeaviateStore;

#[derive(Parser, Debug, Clone)]
pub struct StoreOptions {
    /// Weaviate 服务地址
    #[arg(long, global = true, env = "WEAVIATE_URL", default_value = "http://localhost:8080")]
    pub weaviate_url: String,
    /// 存放图片的集合名称
    #[arg(long, global = true, value_name = "NAME", default_value = "Image")]
    pub class: String,
    /// 单次请求超时时间，单位为秒
    #[arg(long, global = true, value_name = "SECONDS", default_value_t = 60)]
    pub timeout: u64,
}

impl StoreOptions {
    pub fn connect(&self) -> anyhow::Result<Arc<WeaviateStore>> {
        Ok(Arc::new(WeaviateStore::new(&self.weaviate_url, Duration::from_secs(self.timeout))?))
    }
}

#[derive(Parser, Debug, Clone)]
pub struct IngestOptions {
    /// 每一轮并发归一化的图片数量
    #[arg(short = 'P', long, value_name = "N", default_value_t = 20, value_parser = clap::value_parser!(u32).range(1..))]
    pub processing_batch_size: u32,
    /// 每次批量写入索引的记录数量
    #[arg(short = 'B', long, value_name = "N", default_value_t = 50, value_parser = clap::value_parser!(u32).range(1..))]
    pub store_batch_size: u32,
    /// 每写入多少张图片输出一次进度
    #[arg(long, value_name = "N", default_value_t = 50, value_parser = clap::value_parser!(u32).range(1..))]
    pub report_every: u32,
    /// 扫描的文件后缀名，多个后缀用逗号分隔
    #[arg(short, long, default_value = DEFAULT_SUFFIX)]
    pub suffix: String,
    /// 归一化后的图片边长
    #[arg(long, value_name = "PIXELS", default_value_t = 224, value_parser = clap::value_parser!(u32).range(1..))]
    pub side: u32,
    /// 归一化后的 JPEG 质量
    #[arg(long, default_value_t = 95, value_parser = clap::value_parser!(u32).range(1..=100))]
    pub quality: u32,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            processing_batch_size: 20,
            store_batch_size: 50,
            report_every: 50,
            suffix: DEFAULT_SUFFIX.to_owned(),
            side: 224,
            quality: 95,
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "clipsearch", version)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
    #[command(flatten)]
    pub store: StoreOptions,
    /// 图片所在目录
    #[arg(long, global = true, env = "IMAGES_FOLDER", default_value = "./images")]
    pub images: PathBuf,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 重置集合并导入目录中的全部图片
    Ingest(IngestCommand),
    /// 删除并重新创建集合
    Reset(ResetCommand),
    /// 使用文本搜索图片
    Search(SearchCommand),
    /// 启动 HTTP 搜索服务
    Server(ServerCommand),
}
