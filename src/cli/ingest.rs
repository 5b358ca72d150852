use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use log::info;

use crate::Opts;
use crate::cli::SubCommandExtend;
use crate::config::IngestOptions;
use crate::ingest::{IngestEngine, IngestPhase};
use crate::normalize::CoverNormalizer;

#[derive(Parser, Debug, Clone)]
pub struct IngestCommand {
    #[command(flatten)]
    pub ingest: IngestOptions,
    /// 图片所在目录，默认使用 --images
    pub path: Option<PathBuf>,
}

impl SubCommandExtend for IngestCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let root = self.path.as_ref().unwrap_or(&opts.images);
        info!("开始导入图片: {}", root.display());

        let store = opts.store.connect()?;
        let normalizer = Arc::new(CoverNormalizer::new(self.ingest.side, self.ingest.quality));
        let engine = IngestEngine::new(store, normalizer, &opts.store.class, self.ingest.clone());

        let report = engine.run(root).await?;
        if report.phase == IngestPhase::Failed {
            println!("No image files found in {}", root.display());
            return Ok(());
        }
        println!(
            "Processed {} out of {} images in {:.1}s ({} failed to normalize, {} failed to insert)",
            report.processed,
            report.discovered,
            report.elapsed.as_secs_f64(),
            report.normalize_failed,
            report.insert_failed,
        );
        Ok(())
    }
}
