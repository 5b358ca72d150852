use anyhow::Result;
use clap::Parser;

use crate::Opts;
use crate::cli::SubCommandExtend;
use crate::collection::CollectionManager;

#[derive(Parser, Debug, Clone)]
pub struct ResetCommand {}

impl SubCommandExtend for ResetCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let store = opts.store.connect()?;
        CollectionManager::new(store, &opts.store.class).reset().await
    }
}
