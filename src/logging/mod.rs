//! 日志系统.
//!
//! 基于 tracing 的控制台 + 按日滚动文件输出. 编解码 crate 通过 `log` 门面输出,
//! 由 tracing-subscriber 桥接到同一套输出中.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Registry,
    fmt::{self, FormatEvent, FormatFields, format::Writer},
    layer::{Layer, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
};

mod retention;

pub use retention::{PruneSummary, prune_history};

/// 日志配置
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// 过滤指令, 语法同 `RUST_LOG`, 例如 `info` 或 `eep_codec=trace`
    #[serde(default = "default_level")]
    pub level: String,
    /// 日志文件目录, 为空时只输出到控制台
    #[serde(default)]
    pub directory: Option<String>,
    /// 日志文件名前缀, 文件名形如 `<prefix>.<YYYY-MM-DD>.log`
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
    /// 历史日志保留天数
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
    /// 是否 gzip 压缩历史日志
    #[serde(default = "default_true")]
    pub compress_history: bool,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_file_prefix() -> String {
    "eep".to_string()
}

fn default_retention_days() -> i64 {
    30
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            directory: None,
            file_prefix: default_file_prefix(),
            retention_days: default_retention_days(),
            compress_history: true,
        }
    }
}

impl LoggingConfig {
    /// 从 JSON 文本解析配置, 缺省字段取默认值
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("解析日志配置失败")
    }
}

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// 初始化全局日志系统
///
/// 只能成功调用一次; 配置了目录时会先整理历史日志.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let console_filter = EnvFilter::try_new(&config.level)
        .with_context(|| format!("无效的日志过滤指令: {}", config.level))?;
    let console_layer = fmt::Layer::default()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .event_format(ConsoleFormatter)
        .with_filter(console_filter);

    let file_layer = match &config.directory {
        Some(directory) => {
            std::fs::create_dir_all(directory)
                .with_context(|| format!("创建日志目录失败, path={}", directory))?;
            prune_history(config)?;

            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(&config.file_prefix)
                .filename_suffix("log")
                .build(directory)
                .with_context(|| format!("创建日志文件失败, directory={}", directory))?;
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            LOG_GUARD.set(guard).ok();

            let file_filter = EnvFilter::try_new(&config.level)
                .with_context(|| format!("无效的日志过滤指令: {}", config.level))?;
            Some(
                fmt::Layer::default()
                    .with_writer(non_blocking)
                    .with_ansi(false)
                    .event_format(FileFormatter)
                    .with_filter(file_filter),
            )
        }
        None => None,
    };

    Registry::default()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("日志系统已经初始化过")?;

    Ok(())
}

/// 指定日期的日志文件路径
pub(crate) fn build_log_path(directory: &Path, prefix: &str, date: NaiveDate) -> PathBuf {
    directory.join(format!("{}.{}.log", prefix, date.format("%Y-%m-%d")))
}

struct ConsoleFormatter;

impl<S, N> FormatEvent<S, N> for ConsoleFormatter
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &fmt::FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let meta = event.metadata();
        let color = match *meta.level() {
            tracing::Level::ERROR => "\x1b[31m",
            tracing::Level::WARN => "\x1b[33m",
            tracing::Level::INFO => "\x1b[32m",
            _ => "\x1b[34m",
        };
        write!(
            writer,
            "[{}] {}{:5}\x1b[0m {} > ",
            Local::now().format("%H:%M:%S%.3f"),
            color,
            meta.level().to_string(),
            meta.target(),
        )?;
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

struct FileFormatter;

impl<S, N> FormatEvent<S, N> for FileFormatter
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &fmt::FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let meta = event.metadata();
        write!(
            writer,
            "[{}] {:5} {}:{} > ",
            Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            meta.level().to_string(),
            meta.file().unwrap_or("unknown"),
            meta.line().unwrap_or(0),
        )?;
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_log_path() {
        let date = NaiveDate::from_ymd_opt(2026, 2, 6);
        match date {
            Some(date) => {
                let path = build_log_path(Path::new("logs"), "eep", date);
                assert_eq!(path, PathBuf::from("logs/eep.2026-02-06.log"));
            }
            None => panic!("测试日期初始化失败"),
        }
    }

    #[test]
    fn test_config_defaults_from_json() {
        let config = LoggingConfig::from_json(r#"{ "directory": "data/logs" }"#);
        assert!(config.is_ok(), "解析失败: {:?}", config.err());
        let config = match config {
            Ok(config) => config,
            Err(err) => panic!("解析失败: {}", err),
        };
        assert_eq!(config.level, "info");
        assert_eq!(config.directory.as_deref(), Some("data/logs"));
        assert_eq!(config.file_prefix, "eep");
        assert_eq!(config.retention_days, 30);
        assert!(config.compress_history);
    }

    #[test]
    fn test_config_rejects_malformed_json() {
        assert!(LoggingConfig::from_json("{ level: info }").is_err());
    }
}
