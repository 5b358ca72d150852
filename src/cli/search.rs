use anyhow::Result;
use clap::{Parser, ValueEnum};

use crate::Opts;
use crate::cli::SubCommandExtend;
use crate::search::{DEFAULT_LIMIT, QueryEngine, SearchResponse};

#[derive(Parser, Debug, Clone)]
pub struct SearchCommand {
    /// 搜索的文本
    pub prompt: String,
    /// 显示的结果数量
    #[arg(short, long, value_name = "COUNT", default_value_t = DEFAULT_LIMIT, value_parser = parse_limit)]
    pub limit: usize,
    /// 生成图片地址使用的服务地址
    #[arg(long, value_name = "URL", default_value = "http://localhost:3000")]
    pub origin: String,
    /// 输出格式
    #[arg(long, value_name = "FORMAT", value_enum, default_value_t = OutputFormat::Table)]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for SearchCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let store = opts.store.connect()?;
        let engine = QueryEngine::new(store, &opts.store.class);
        let result = engine.search(&self.prompt, self.limit, &self.origin).await?;
        print_result(&result, self)
    }
}

fn parse_limit(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(format!("无效的数量: {s}")),
    }
}

fn print_result(result: &SearchResponse, opts: &SearchCommand) -> Result<()> {
    match opts.output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(result)?)
        }
        OutputFormat::Table => {
            if result.results.is_empty() {
                println!("No images found matching your prompt.");
                println!("Make sure you have ingested images first using: clipsearch ingest");
                return Ok(());
            }
            println!("Found {} result(s):\n", result.count);
            for (i, hit) in result.results.iter().enumerate() {
                println!("{}. {}", i + 1, hit.filename);
                println!("   Path: {}", hit.filepath);
                println!("   Similarity: {}", hit.similarity);
                println!("   Distance: {}", hit.distance);
                println!();
            }
        }
    }
    Ok(())
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum OutputFormat {
    Json,
    Table,
}
