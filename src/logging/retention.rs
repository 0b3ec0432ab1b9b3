//! 历史日志整理: 压缩早于当天的日志, 删除超出保留期的日志.

use super::{LoggingConfig, build_log_path};
use anyhow::{Context, Result};
use chrono::{Duration, Local, NaiveDate};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

/// 一次整理的结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneSummary {
    /// 新压缩的日志数
    pub compressed: usize,
    /// 删除的日志数
    pub removed: usize,
}

/// 按配置整理日志目录, 未配置目录时什么也不做
pub fn prune_history(config: &LoggingConfig) -> Result<PruneSummary> {
    match &config.directory {
        Some(directory) => prune_directory(
            Path::new(directory),
            &config.file_prefix,
            config.retention_days,
            config.compress_history,
            Local::now().date_naive(),
        ),
        None => Ok(PruneSummary::default()),
    }
}

/// 以 `today` 为基准整理 `directory` 下前缀为 `prefix` 的日志
pub(crate) fn prune_directory(
    directory: &Path,
    prefix: &str,
    retention_days: i64,
    compress: bool,
    today: NaiveDate,
) -> Result<PruneSummary> {
    let mut summary = PruneSummary::default();
    if !directory.exists() {
        return Ok(summary);
    }

    let cutoff = today - Duration::days(retention_days);
    let entries = fs::read_dir(directory)
        .with_context(|| format!("读取日志目录失败, path={}", directory.display()))?;

    for entry in entries {
        let entry = entry?;
        let file_name = entry.file_name().to_string_lossy().to_string();
        let Some((date, compressed)) = parse_log_name(&file_name, prefix) else {
            continue;
        };

        let path = entry.path();
        if date < cutoff {
            fs::remove_file(&path)
                .with_context(|| format!("删除过期日志失败, path={}", path.display()))?;
            summary.removed += 1;
        } else if compress && !compressed && date < today {
            compress_to_gz(&path)?;
            summary.compressed += 1;
        }
    }

    Ok(summary)
}

/// 解析 `<prefix>.<YYYY-MM-DD>.log[.gz]`, 返回 (日期, 是否已压缩)
fn parse_log_name(file_name: &str, prefix: &str) -> Option<(NaiveDate, bool)> {
    let rest = file_name.strip_prefix(prefix)?.strip_prefix('.')?;
    let (rest, compressed) = match rest.strip_suffix(".gz") {
        Some(rest) => (rest, true),
        None => (rest, false),
    };
    let date = rest.strip_suffix(".log")?;
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    Some((date, compressed))
}

fn compress_to_gz(path: &Path) -> Result<()> {
    let gz_path = PathBuf::from(format!("{}.gz", path.display()));
    let mut input =
        File::open(path).with_context(|| format!("打开待压缩日志失败, path={}", path.display()))?;
    let output = File::create(&gz_path)
        .with_context(|| format!("创建压缩日志失败, path={}", gz_path.display()))?;

    let mut encoder = GzEncoder::new(output, Compression::default());
    io::copy(&mut input, &mut encoder)?;
    encoder.finish()?;

    fs::remove_file(path)
        .with_context(|| format!("删除已压缩日志失败, path={}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_log_name() {
        assert_eq!(
            parse_log_name("eep.2026-02-06.log", "eep"),
            Some((date(2026, 2, 6), false))
        );
        assert_eq!(
            parse_log_name("eep.2026-02-06.log.gz", "eep"),
            Some((date(2026, 2, 6), true))
        );
        assert_eq!(parse_log_name("other.2026-02-06.log", "eep"), None);
        assert_eq!(parse_log_name("eep.latest.log", "eep"), None);
        assert_eq!(parse_log_name("eep.2026-02-06.txt", "eep"), None);
    }

    #[test]
    fn test_prune_compresses_and_removes() {
        let dir = tempfile::tempdir().unwrap();
        let today = date(2026, 3, 10);
        for day in [10, 9, 1] {
            let path = build_log_path(dir.path(), "eep", date(2026, 3, day));
            fs::write(&path, format!("day {}", day)).unwrap();
        }
        fs::write(dir.path().join("unrelated.txt"), "keep").unwrap();

        let summary = prune_directory(dir.path(), "eep", 7, true, today).unwrap();
        assert_eq!(summary, PruneSummary { compressed: 1, removed: 1 });

        assert!(build_log_path(dir.path(), "eep", today).exists());
        assert!(!build_log_path(dir.path(), "eep", date(2026, 3, 1)).exists());
        assert!(dir.path().join("unrelated.txt").exists());

        let gz_path = dir.path().join("eep.2026-03-09.log.gz");
        let mut text = String::new();
        GzDecoder::new(File::open(&gz_path).unwrap())
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text, "day 9");
    }

    #[test]
    fn test_prune_without_compression() {
        let dir = tempfile::tempdir().unwrap();
        let today = date(2026, 3, 10);
        let yesterday = build_log_path(dir.path(), "eep", date(2026, 3, 9));
        fs::write(&yesterday, "x").unwrap();

        let summary = prune_directory(dir.path(), "eep", 7, false, today).unwrap();
        assert_eq!(summary, PruneSummary::default());
        assert!(yesterday.exists());
    }

    #[test]
    fn test_prune_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        let summary = prune_directory(&missing, "eep", 7, true, date(2026, 1, 1)).unwrap();
        assert_eq!(summary, PruneSummary::default());
    }
}
