use indicatif::ProgressStyle;

/// 导入进度条样式
pub fn pb_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {per_sec} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}
