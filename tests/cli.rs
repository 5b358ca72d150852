use std::process::Command;

use anyhow::Result;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::*;

macro_rules! cargo_run {
    ($cmd:expr, $($args:expr),*) => {
        {
            let mut cmd = Command::cargo_bin($cmd)?;
            // 指向一个不可达的地址，确保参数校验发生在访问索引之前
            cmd.env("WEAVIATE_URL", "http://127.0.0.1:9");
            $(cmd.arg($args);)*
            cmd.assert()
        }
    };
}

#[test]
fn help_lists_subcommands() -> Result<()> {
    cargo_run!("clipsearch", "--help")
        .success()
        .stdout(predicate::str::contains("ingest"))
        .stdout(predicate::str::contains("search"))
        .stdout(predicate::str::contains("server"))
        .stdout(predicate::str::contains("reset"));
    Ok(())
}

#[rstest]
#[case::empty("")]
#[case::blank("   ")]
fn search_rejects_empty_prompt(#[case] prompt: &str) -> Result<()> {
    cargo_run!("clipsearch", "search", prompt)
        .failure()
        .stderr(predicate::str::contains("search prompt"));
    Ok(())
}

#[rstest]
#[case::zero("0")]
#[case::negative("-3")]
#[case::text("ten")]
fn search_rejects_bad_limit(#[case] limit: &str) -> Result<()> {
    cargo_run!("clipsearch", "search", "dog", format!("--limit={limit}")).failure();
    Ok(())
}

#[rstest]
#[case::processing("-P=0")]
#[case::store("-B=0")]
#[case::quality("--quality=0")]
fn ingest_rejects_zero_sizes(#[case] arg: &str) -> Result<()> {
    cargo_run!("clipsearch", "ingest", arg).failure();
    Ok(())
}

#[test]
fn unreachable_index_fails_ingest() -> Result<()> {
    let dir = assert_fs::TempDir::new()?;
    cargo_run!("clipsearch", "ingest", dir.path()).failure();
    Ok(())
}
