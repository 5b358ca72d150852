use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use log::{info, warn};
use regex::Regex;
use walkdir::WalkDir;

/// 默认扫描的图片后缀
pub const DEFAULT_SUFFIX: &str = "jpg,jpeg,png,webp,gif";

/// 根据逗号分隔的后缀列表构建大小写不敏感的匹配规则
pub fn suffix_regex(suffix: &str) -> Result<Regex> {
    let alts = suffix
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| regex::escape(s.trim_start_matches('.')))
        .collect::<Vec<_>>()
        .join("|");
    if alts.is_empty() {
        bail!("后缀列表不能为空: {suffix:?}");
    }
    Ok(Regex::new(&format!("(?i)^({alts})$"))?)
}

/// 递归扫描 `root` 下后缀符合要求的文件
///
/// 会跟随符号链接，链接到文件或目录的条目按其目标处理。
/// 目录不存在时只给出警告并返回空列表。返回顺序取决于文件系统，不保证稳定。
pub fn discover_images(root: &Path, re_suf: &Regex) -> Vec<PathBuf> {
    if !root.exists() {
        warn!("目录 {} 不存在", root.display());
        return vec![];
    }

    info!("开始扫描目录: {}", root.display());
    let entries = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("跳过无法访问的路径: {e}");
                None
            }
        })
        .filter(|entry| entry.path().is_file())
        .filter(|entry| {
            entry.path().extension().is_some_and(|ext| re_suf.is_match(&ext.to_string_lossy()))
        })
        .map(|entry| entry.into_path())
        .collect::<Vec<_>>();
    info!("扫描完成，共 {} 张图片", entries.len());
    entries
}
