//! 图片导入流程
//!
//! 一次完整的导入分为 重置集合 → 扫描目录 → 处理 三个阶段。处理阶段按扫描顺序
//! 把文件切分为大小为 `P` 的若干轮，每一轮内并发归一化（并发度 `P`），失败的图片
//! 直接丢弃；剩余记录再按 `B` 条一组依次批量写入。某一组批量写入失败时，
//! 改为逐条写入，只丢弃真正写入失败的那几条。
//!
//! 每一轮全部完成后才开始下一轮，同一时刻内存中最多保留 `P` 张图片的数据。
//! 同一个集合同时只能有一个导入任务，这里不做加锁，由调用方保证。

mod progress;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use futures::StreamExt;
use log::{debug, error, warn};
use tokio::task::spawn_blocking;

pub use self::progress::*;
use crate::collection::CollectionManager;
use crate::config::IngestOptions;
use crate::discover::{discover_images, suffix_regex};
use crate::metrics;
use crate::normalize::Normalizer;
use crate::store::{ImageRecord, VectorStore};

/// 导入任务所处的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestPhase {
    Resetting,
    Discovering,
    Processing,
    Completed,
    /// 没有找到任何图片
    Failed,
}

impl fmt::Display for IngestPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Resetting => "resetting",
            Self::Discovering => "discovering",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// 一次导入的结果
#[derive(Debug, Clone)]
pub struct IngestReport {
    /// 最终阶段，`Completed` 或 `Failed`
    pub phase: IngestPhase,
    /// 扫描到的图片数量
    pub discovered: usize,
    /// 成功写入索引的数量
    pub processed: usize,
    /// 归一化失败被丢弃的数量
    pub normalize_failed: usize,
    /// 逐条写入仍然失败被丢弃的数量
    pub insert_failed: usize,
    /// 发生过回退的批次数量
    pub fallbacks: usize,
    /// 每一轮的文件数量
    pub waves: Vec<usize>,
    pub elapsed: Duration,
}

impl IngestReport {
    fn empty(phase: IngestPhase) -> Self {
        Self {
            phase,
            discovered: 0,
            processed: 0,
            normalize_failed: 0,
            insert_failed: 0,
            fallbacks: 0,
            waves: vec![],
            elapsed: Duration::ZERO,
        }
    }
}

/// 一轮写入的统计
#[derive(Debug, Default)]
struct UpsertStats {
    insert_failed: usize,
    fallbacks: usize,
}

pub struct IngestEngine {
    store: Arc<dyn VectorStore>,
    normalizer: Arc<dyn Normalizer>,
    collection: CollectionManager,
    opts: IngestOptions,
}

impl IngestEngine {
    pub fn new(
        store: Arc<dyn VectorStore>,
        normalizer: Arc<dyn Normalizer>,
        collection: &str,
        opts: IngestOptions,
    ) -> Self {
        let collection = CollectionManager::new(store.clone(), collection);
        Self { store, normalizer, collection, opts }
    }

    fn enter(&self, phase: IngestPhase) {
        debug!("导入阶段: {phase}");
    }

    /// 重置集合并导入 `root` 下的全部图片
    ///
    /// 单张图片的失败不会中断导入；重置集合或扫描失败时返回错误。
    pub async fn run(&self, root: &Path) -> Result<IngestReport> {
        // 后缀配置有误时在修改集合之前返回
        let re_suf = suffix_regex(&self.opts.suffix)?;

        self.enter(IngestPhase::Resetting);
        self.collection.reset().await?;

        self.enter(IngestPhase::Discovering);
        let root_owned = root.to_path_buf();
        let files = spawn_blocking(move || discover_images(&root_owned, &re_suf))
            .await
            .context("扫描目录失败")?;

        if files.is_empty() {
            warn!("目录 {} 中没有找到图片", root.display());
            self.enter(IngestPhase::Failed);
            return Ok(IngestReport::empty(IngestPhase::Failed));
        }

        self.enter(IngestPhase::Processing);
        let report = self.process(files).await;
        self.enter(report.phase);
        Ok(report)
    }

    /// 按轮处理已扫描到的文件
    pub async fn process(&self, files: Vec<PathBuf>) -> IngestReport {
        let wave_size = self.opts.processing_batch_size.max(1) as usize;
        let mut tracker = Throughput::new(files.len(), self.opts.report_every as usize);
        let mut report = IngestReport::empty(IngestPhase::Completed);
        report.discovered = files.len();

        for wave in files.chunks(wave_size) {
            report.waves.push(wave.len());

            let (records, failed): (Vec<_>, Vec<_>) =
                self.normalize_wave(wave).await.into_iter().partition(Result::is_ok);
            let records = records.into_iter().filter_map(Result::ok).collect::<Vec<_>>();

            if !failed.is_empty() {
                report.normalize_failed += failed.len();
                metrics::inc_dropped("normalize", failed.len());
                tracker.skip(failed.len());
            }

            let stats = self.upsert_wave(&records, &mut tracker).await;
            report.insert_failed += stats.insert_failed;
            report.fallbacks += stats.fallbacks;
        }

        tracker.finish();
        report.processed = tracker.processed();
        report.elapsed = tracker.elapsed();
        report
    }

    /// 并发归一化一轮中的全部文件，每个文件得到一个独立的结果
    async fn normalize_wave(&self, wave: &[PathBuf]) -> Vec<Result<ImageRecord>> {
        let concurrency = self.opts.processing_batch_size.max(1) as usize;
        futures::stream::iter(wave.iter().cloned())
            .map(|path| async move {
                let result = self.normalize_file(&path).await;
                if let Err(e) = &result {
                    warn!("处理图片失败 {}: {e:#}", path.display());
                }
                result
            })
            .buffer_unordered(concurrency)
            .collect()
            .await
    }

    async fn normalize_file(&self, path: &Path) -> Result<ImageRecord> {
        let bytes = tokio::fs::read(path).await.context("读取文件失败")?;
        let normalizer = self.normalizer.clone();
        let image = spawn_blocking(move || normalizer.normalize(&bytes)).await??;
        let filename = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow!("无效的文件名"))?;
        debug!("{} 归一化后 {} 字节", path.display(), image.size);
        Ok(ImageRecord { image: image.data, filename, filepath: path.to_string_lossy().into_owned() })
    }

    /// 按组依次写入一轮的记录，批量失败时回退为逐条写入
    async fn upsert_wave(&self, records: &[ImageRecord], tracker: &mut Throughput) -> UpsertStats {
        let name = self.collection.name();
        let group_size = self.opts.store_batch_size.max(1) as usize;
        let mut stats = UpsertStats::default();

        for (i, group) in records.chunks(group_size).enumerate() {
            match self.store.batch_insert(name, group).await {
                Ok(()) => {
                    metrics::inc_processed(group.len());
                    tracker.add(group.len());
                }
                Err(e) => {
                    error!("第 {} 组批量写入失败，改为逐条写入: {e:#}", i + 1);
                    stats.fallbacks += 1;
                    metrics::inc_fallback();
                    for record in group {
                        match self.store.insert(name, record).await {
                            Ok(()) => {
                                metrics::inc_processed(1);
                                tracker.add(1);
                            }
                            Err(e) => {
                                error!("写入失败 {}: {e:#}", record.filename);
                                stats.insert_failed += 1;
                                metrics::inc_dropped("insert", 1);
                                tracker.skip(1);
                            }
                        }
                    }
                }
            }
            tracker.set_message(format!("已写入 {} 组", i + 1));
        }
        stats
    }
}
