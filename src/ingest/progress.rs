use std::time::{Duration, Instant};

use indicatif::ProgressBar;
use log::info;

use crate::utils::pb_style;

/// 导入过程的吞吐统计
///
/// 每处理 `cadence` 条记录或处理完最后一条时输出一次进度。
pub struct Throughput {
    start: Instant,
    total: usize,
    processed: usize,
    cadence: usize,
    last_bucket: usize,
    pb: ProgressBar,
}

impl Throughput {
    pub fn new(total: usize, cadence: usize) -> Self {
        let pb = ProgressBar::new(total as u64).with_style(pb_style());
        Self { start: Instant::now(), total, processed: 0, cadence: cadence.max(1), last_bucket: 0, pb }
    }

    pub fn processed(&self) -> usize {
        self.processed
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// 记录成功写入的数量，到达输出节点时打印进度
    pub fn add(&mut self, n: usize) {
        self.processed += n;
        self.pb.inc(n as u64);

        let bucket = self.processed / self.cadence;
        if bucket > self.last_bucket || self.processed == self.total {
            self.last_bucket = bucket;
            let elapsed = self.elapsed();
            info!(
                "[{}/{}] 已处理 ({:.1} 张/秒, 已用 {:.1}s)",
                self.processed,
                self.total,
                rate(self.processed, elapsed),
                elapsed.as_secs_f64()
            );
        }
    }

    /// 记录被丢弃的图片，只推进进度条
    pub fn skip(&self, n: usize) {
        self.pb.inc(n as u64);
    }

    pub fn set_message(&self, msg: String) {
        self.pb.set_message(msg);
    }

    pub fn finish(&self) {
        let elapsed = self.elapsed();
        self.pb.finish_with_message("图片导入完成");
        info!(
            "导入完成！共处理 {} / {} 张图片，耗时 {:.1}s（平均 {:.1} 张/秒）",
            self.processed,
            self.total,
            elapsed.as_secs_f64(),
            rate(self.processed, elapsed)
        );
    }
}

/// 每秒处理数量，耗时近似为 0 时返回 0
pub fn rate(processed: usize, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs < 1e-3 { 0.0 } else { processed as f64 / secs }
}
