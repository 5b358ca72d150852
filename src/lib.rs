pub mod cli;
pub mod collection;
pub mod config;
pub mod discover;
pub mod ingest;
mod metrics;
pub mod normalize;
pub mod search;
pub mod server;
pub mod store;
mod utils;

pub use config::Opts;
pub use ingest::{IngestEngine, IngestReport};
pub use search::{QueryEngine, SearchHit, SearchResponse};
