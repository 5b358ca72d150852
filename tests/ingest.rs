use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::sleep;
use std::time::Duration;

use anyhow::{Result, bail};
use assert_fs::TempDir;
use clipsearch::config::IngestOptions;
use clipsearch::ingest::{IngestEngine, IngestPhase};
use clipsearch::normalize::{CoverNormalizer, NormalizedImage, Normalizer};
use clipsearch::search::QueryEngine;
use clipsearch::store::{InMemoryStore, VectorStore};
use opencv::core::{CV_8UC3, Mat, Scalar, Vector};
use opencv::imgcodecs;
use rstest::*;

/// 记录同时进行的归一化数量，内容以 `bad` 开头的文件会失败
#[derive(Default)]
struct CountingNormalizer {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

impl Normalizer for CountingNormalizer {
    fn normalize(&self, bytes: &[u8]) -> Result<NormalizedImage> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);
        sleep(Duration::from_millis(20));
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if bytes.starts_with(b"bad") {
            bail!("corrupt image");
        }
        Ok(NormalizedImage { data: bytes.to_vec(), size: bytes.len() })
    }
}

fn options(p: u32, b: u32) -> IngestOptions {
    IngestOptions { processing_batch_size: p, store_batch_size: b, ..Default::default() }
}

fn write_files(dir: &Path, good: usize, bad: usize) {
    for i in 0..good {
        fs::write(dir.join(format!("good_{i}.jpg")), b"ok").unwrap();
    }
    for i in 0..bad {
        fs::write(dir.join(format!("bad_{i}.png")), b"bad").unwrap();
    }
}

fn jpeg(seed: f64) -> Vec<u8> {
    let img = Mat::new_rows_cols_with_default(90, 160, CV_8UC3, Scalar::new(seed, 80., 160., 0.))
        .unwrap();
    let mut out = Vector::<u8>::new();
    imgcodecs::imencode(".jpg", &img, &mut out, &Vector::new()).unwrap();
    out.to_vec()
}

fn engine(
    store: &Arc<InMemoryStore>,
    normalizer: Arc<dyn Normalizer>,
    opts: IngestOptions,
) -> IngestEngine {
    IngestEngine::new(store.clone(), normalizer, "Image", opts)
}

#[tokio::test]
async fn end_to_end_ingest_then_search() {
    let dir = TempDir::new().unwrap();
    for (i, name) in ["red_car.jpg", "blue_dog.jpg", "green_tree.jpg"].iter().enumerate() {
        fs::write(dir.path().join(name), jpeg(i as f64 * 60.)).unwrap();
    }
    fs::write(dir.path().join("notes.txt"), b"not an image").unwrap();

    let store = Arc::new(InMemoryStore::new());
    let report = engine(&store, Arc::new(CoverNormalizer::default()), options(2, 2))
        .run(dir.path())
        .await
        .unwrap();

    assert_eq!(report.phase, IngestPhase::Completed);
    assert_eq!(report.discovered, 3);
    assert_eq!(report.processed, 3);
    assert_eq!(report.waves, vec![2, 1]);
    assert_eq!(report.fallbacks, 0);
    assert_eq!(store.batch_calls(), 2);
    assert_eq!(store.batch_sizes(), vec![2, 1]);
    assert_eq!(store.insert_calls(), 0);

    let stored = store.records("Image");
    assert!(stored.iter().all(|r| r.image.starts_with(&[0xFF, 0xD8])));

    let query = QueryEngine::new(store.clone(), "Image");
    let resp = query.search("a dog", 3, "http://localhost:3000").await.unwrap();
    assert_eq!(resp.count, 3);
    let names = resp.results.iter().map(|h| h.filename.as_str()).collect::<BTreeSet<_>>();
    assert_eq!(names, BTreeSet::from(["blue_dog.jpg", "green_tree.jpg", "red_car.jpg"]));
    assert_eq!(resp.results[0].filename, "blue_dog.jpg");
    assert!(resp.results[0].image_base64.starts_with("data:image/jpeg;base64,"));
}

#[rstest]
#[case(3, 10)]
#[case(1, 4)]
#[case(5, 5)]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn normalization_is_bounded(#[case] p: u32, #[case] files: usize) {
    let dir = TempDir::new().unwrap();
    write_files(dir.path(), files, 0);

    let store = Arc::new(InMemoryStore::new());
    let normalizer = Arc::new(CountingNormalizer::default());
    let report = engine(&store, normalizer.clone(), options(p, 50)).run(dir.path()).await.unwrap();

    assert_eq!(report.processed, files);
    assert_eq!(normalizer.calls.load(Ordering::SeqCst), files);
    let max = normalizer.max_in_flight.load(Ordering::SeqCst);
    assert!(max >= 1 && max <= p as usize, "max in flight {max} exceeds {p}");

    let p = p as usize;
    let expected = (0..files).step_by(p).map(|i| p.min(files - i)).collect::<Vec<_>>();
    assert_eq!(report.waves, expected);
}

#[tokio::test]
async fn failed_batch_falls_back_to_single_inserts() {
    let dir = TempDir::new().unwrap();
    write_files(dir.path(), 6, 1);

    // 6 条有效记录分为 3 组，第 2 组批量写入失败
    let store = Arc::new(InMemoryStore::new().fail_batch_call(2));
    let report = engine(&store, Arc::new(CountingNormalizer::default()), options(7, 2))
        .run(dir.path())
        .await
        .unwrap();

    assert_eq!(report.discovered, 7);
    assert_eq!(report.normalize_failed, 1);
    assert_eq!(report.fallbacks, 1);
    assert_eq!(report.insert_failed, 0);
    assert_eq!(report.processed, 6);
    assert_eq!(store.batch_calls(), 3);
    assert_eq!(store.insert_calls(), 2);
    assert_eq!(store.records("Image").len(), 6);
}

#[tokio::test]
async fn bad_record_is_isolated() {
    let dir = TempDir::new().unwrap();
    write_files(dir.path(), 5, 2);
    let poisoned = dir.path().join("good_3.jpg").to_string_lossy().into_owned();

    let store = Arc::new(InMemoryStore::new().fail_path(poisoned.clone()));
    let report = engine(&store, Arc::new(CountingNormalizer::default()), options(4, 2))
        .run(dir.path())
        .await
        .unwrap();

    assert_eq!(report.discovered, 7);
    assert_eq!(report.normalize_failed, 2);
    assert_eq!(report.insert_failed, 1);
    assert_eq!(report.fallbacks, 1);
    assert_eq!(report.processed, report.discovered - report.normalize_failed - report.insert_failed);

    let stored = store.records("Image");
    assert_eq!(stored.len(), 4);
    assert!(stored.iter().all(|r| r.filepath != poisoned));
}

#[tokio::test]
async fn empty_corpus_is_a_soft_failure() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("readme.txt"), b"x").unwrap();

    let store = Arc::new(InMemoryStore::new());
    let report = engine(&store, Arc::new(CountingNormalizer::default()), options(2, 2))
        .run(dir.path())
        .await
        .unwrap();

    assert_eq!(report.phase, IngestPhase::Failed);
    assert_eq!(report.processed, 0);
    assert!(store.collection_exists("Image").await.unwrap());
    assert_eq!(store.batch_calls(), 0);
}

#[rstest]
#[case("")]
#[case(",,")]
#[tokio::test]
async fn empty_suffix_list_leaves_collection_untouched(#[case] suffix: &str) {
    let dir = TempDir::new().unwrap();
    write_files(dir.path(), 2, 0);

    let store = Arc::new(InMemoryStore::new());
    let opts = IngestOptions { suffix: suffix.to_owned(), ..options(2, 2) };
    let result = engine(&store, Arc::new(CountingNormalizer::default()), opts)
        .run(dir.path())
        .await;

    assert!(result.is_err());
    assert!(!store.collection_exists("Image").await.unwrap());
    assert_eq!(store.batch_calls(), 0);
}

#[tokio::test]
async fn missing_root_is_a_soft_failure() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(InMemoryStore::new());
    let report = engine(&store, Arc::new(CountingNormalizer::default()), options(2, 2))
        .run(&dir.path().join("missing"))
        .await
        .unwrap();
    assert_eq!(report.phase, IngestPhase::Failed);
}

#[tokio::test]
async fn wave_with_only_failures_is_skipped() {
    let dir = TempDir::new().unwrap();
    write_files(dir.path(), 0, 3);

    let store = Arc::new(InMemoryStore::new());
    let report = engine(&store, Arc::new(CountingNormalizer::default()), options(2, 2))
        .run(dir.path())
        .await
        .unwrap();

    assert_eq!(report.phase, IngestPhase::Completed);
    assert_eq!(report.waves, vec![2, 1]);
    assert_eq!(report.normalize_failed, 3);
    assert_eq!(report.processed, 0);
    assert_eq!(store.batch_calls(), 0);
}

#[tokio::test]
async fn reingest_does_not_duplicate() {
    let dir = TempDir::new().unwrap();
    write_files(dir.path(), 4, 0);

    let store = Arc::new(InMemoryStore::new());
    let engine = engine(&store, Arc::new(CountingNormalizer::default()), options(3, 2));
    engine.run(dir.path()).await.unwrap();
    engine.run(dir.path()).await.unwrap();

    assert_eq!(store.records("Image").len(), 4);
}

#[tokio::test]
async fn search_is_repeatable() {
    let dir = TempDir::new().unwrap();
    for name in ["dog_run.jpg", "dog_sleep.jpg", "cat.jpg", "bird.jpg"] {
        fs::write(dir.path().join(name), b"ok").unwrap();
    }
    let store = Arc::new(InMemoryStore::new());
    engine(&store, Arc::new(CountingNormalizer::default()), options(4, 4))
        .run(dir.path())
        .await
        .unwrap();

    let query = QueryEngine::new(store, "Image");
    let first = query.search("dog", 5, "http://h").await.unwrap();
    let second = query.search("dog", 5, "http://h").await.unwrap();

    let key = |r: &clipsearch::SearchResponse| {
        r.results.iter().map(|h| (h.filename.clone(), h.distance.value())).collect::<Vec<_>>()
    };
    assert_eq!(first.count, 4);
    assert_eq!(key(&first), key(&second));
}

#[tokio::test]
async fn search_on_empty_collection() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(InMemoryStore::new());
    engine(&store, Arc::new(CountingNormalizer::default()), options(2, 2))
        .run(dir.path())
        .await
        .unwrap();

    let query = QueryEngine::new(store, "Image");
    let resp = query.search("zzznomatch", 10, "http://h").await.unwrap();
    assert_eq!(resp.count, 0);
    assert!(resp.results.is_empty());
    assert_eq!(serde_json::to_value(&resp).unwrap(), serde_json::json!({ "results": [], "count": 0 }));
}
