use std::path::PathBuf;

use clap::Parser;
use log::info;
use tokio::net::TcpListener;

use crate::cli::SubCommandExtend;
use crate::search::QueryEngine;
use crate::{Opts, server};

#[derive(Parser, Debug, Clone)]
pub struct ServerCommand {
    /// 监听地址
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,
    /// 监听端口
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,
}

impl ServerCommand {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl SubCommandExtend for ServerCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let store = opts.store.connect()?;
        let engine = QueryEngine::new(store, &opts.store.class);
        let images: PathBuf = opts.images.clone();

        // 创建应用状态
        let state = server::AppState::new(engine, images, self.port);

        // 创建应用
        let app = server::create_app(state);

        // 启动服务器
        let listener = TcpListener::bind(self.addr()).await?;
        info!("服务器启动：http://{}", listener.local_addr()?);
        info!("示例：http://localhost:{}/search?prompt=your+search+term", self.port);
        axum::serve(listener, app).await?;

        Ok(())
    }
}
