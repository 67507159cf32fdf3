//! 配置键常量

/// 环境变量前缀，例如 `HEST_SERVER_PORT` -> `server.port`
pub const ENV_PREFIX: &str = "HEST_";

/// 默认配置文件
pub const DEFAULT_CONFIG_FILE: &str = "application.toml";

/// 激活的 profile 列表（逗号分隔）
pub const PROFILES_ACTIVE: &str = "profiles.active";

/// 日志级别
pub const LOGGING_LEVEL: &str = "logging.level";

/// 日志格式
pub const LOGGING_FORMAT: &str = "logging.format";

/// 自定义日志过滤器
pub const LOGGING_FILTER: &str = "logging.filter";
