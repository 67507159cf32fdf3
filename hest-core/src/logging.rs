//! 日志初始化
//!
//! 配置按层叠加，后者覆盖前者：
//! 1. [`LoggingConfig::default`]：`info`，紧凑格式
//! 2. 进程环境变量 `LOG_LEVEL`、`LOG_FORMAT`、`RUST_LOG`
//! 3. [`Environment`] 中的 `logging.level`、`logging.format`、`logging.filter`
//!
//! 无法识别的级别或格式被忽略，保留上一层的值。

use crate::config::Environment;
use crate::constants::{LOGGING_FILTER, LOGGING_FORMAT, LOGGING_LEVEL};
use crate::error::{ApplicationError, ApplicationResult};
use std::fmt;
use std::str::FromStr;
use tracing::level_filters::LevelFilter;
use tracing::Level;
use tracing_subscriber::{fmt as subscriber, EnvFilter};

/// 输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Json,
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [LogFormat::Compact, LogFormat::Full, LogFormat::Json, LogFormat::Pretty]
            .into_iter()
            .find(|format| s.trim().eq_ignore_ascii_case(format.as_str()))
            .ok_or_else(|| format!("Unknown log format '{}'", s))
    }
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Compact => "compact",
            LogFormat::Full => "full",
            LogFormat::Json => "json",
            LogFormat::Pretty => "pretty",
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 日志配置
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// 未被过滤器覆盖的模块使用的级别
    pub level: Level,
    pub format: LogFormat,
    pub show_target: bool,
    pub show_thread_ids: bool,
    pub show_thread_names: bool,
    /// `EnvFilter` 指令，例如 `hest_web=debug,tower_http=warn`
    pub filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Compact,
            show_target: false,
            show_thread_ids: false,
            show_thread_names: false,
            filter: None,
        }
    }
}

impl LoggingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn show_target(mut self, show: bool) -> Self {
        self.show_target = show;
        self
    }

    /// 同时显示线程 ID 与线程名
    pub fn show_threads(mut self, show: bool) -> Self {
        self.show_thread_ids = show;
        self.show_thread_names = show;
        self
    }

    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// 默认值叠加进程环境变量
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok();
        Self::default().overlay(var("LOG_LEVEL"), var("LOG_FORMAT"), var("RUST_LOG"))
    }

    /// 在 [`LoggingConfig::from_env`] 之上叠加 `logging.*` 配置
    pub fn from_environment(env: &Environment) -> Self {
        Self::from_env().overlay(
            env.get_string(LOGGING_LEVEL),
            env.get_string(LOGGING_FORMAT),
            env.get_string(LOGGING_FILTER),
        )
    }

    fn overlay(
        mut self,
        level: Option<String>,
        format: Option<String>,
        filter: Option<String>,
    ) -> Self {
        if let Some(level) = level.and_then(|s| s.trim().parse().ok()) {
            self.level = level;
        }
        if let Some(format) = format.and_then(|s| s.parse().ok()) {
            self.format = format;
        }
        if let Some(filter) = filter.filter(|f| !f.trim().is_empty()) {
            self.filter = Some(filter);
        }
        self
    }

    /// 以 `level` 为默认指令，再叠加 `filter` 中可解析的指令
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::builder()
            .with_default_directive(LevelFilter::from_level(self.level).into())
            .parse_lossy(self.filter.as_deref().unwrap_or_default())
    }

    /// 安装全局订阅者，重复安装返回 [`ApplicationError::LoggingInitFailed`]
    pub fn init(&self) -> ApplicationResult<()> {
        let builder = subscriber()
            .with_env_filter(self.env_filter())
            .with_target(self.show_target)
            .with_thread_ids(self.show_thread_ids)
            .with_thread_names(self.show_thread_names);

        let installed = match self.format {
            LogFormat::Compact => builder.compact().try_init(),
            LogFormat::Full => builder.try_init(),
            LogFormat::Json => builder.json().try_init(),
            LogFormat::Pretty => builder.pretty().try_init(),
        };
        installed.map_err(|e| ApplicationError::LoggingInitFailed(e.to_string()))?;

        tracing::debug!(level = %self.level, format = %self.format, "Logging initialized");
        Ok(())
    }
}
