use std::sync::LazyLock;

use prometheus::*;

static METRIC_INGEST_PROCESSED: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!("clip_ingest_processed", "count of the images written to the index")
        .unwrap()
});

static METRIC_INGEST_DROPPED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "clip_ingest_dropped",
        "count of the images dropped during ingestion",
        &["stage"]
    )
    .unwrap()
});

static METRIC_INGEST_FALLBACK: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        "clip_ingest_fallback",
        "count of the batches retried as individual inserts"
    )
    .unwrap()
});

static METRIC_SEARCH_COUNT: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!("clip_search_count", "count of the text queries").unwrap()
});

static METRIC_SEARCH_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    register_histogram!("clip_search_duration", "duration of the per-query search in seconds")
        .unwrap()
});

pub fn inc_processed(n: usize) {
    METRIC_INGEST_PROCESSED.inc_by(n as u64);
}

/// `stage` 为 `normalize` 或 `insert`
pub fn inc_dropped(stage: &str, n: usize) {
    METRIC_INGEST_DROPPED.with_label_values(&[stage]).inc_by(n as u64);
}

pub fn inc_fallback() {
    METRIC_INGEST_FALLBACK.inc();
}

/// 每次访问索引前计数，失败的查询也包括在内
pub fn inc_search() {
    METRIC_SEARCH_COUNT.inc();
}

pub fn observe_search(duration: f64) {
    METRIC_SEARCH_DURATION.observe(duration);
}

#[cfg(test)]
pub fn search_count() -> u64 {
    METRIC_SEARCH_COUNT.get()
}

/// 以文本格式导出全部指标
pub fn gather_text() -> String {
    let encoder = TextEncoder::new();
    encoder.encode_to_string(&gather()).unwrap_or_default()
}
