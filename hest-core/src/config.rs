//! 配置环境
//!
//! [`Environment`] 聚合多个配置源，按优先级从高到低查询，第一个命中的值生效。
//! 键统一为点分形式，例如 `server.port`、`server.body-limit`。
//!
//! | 配置源 | 优先级 |
//! |---|---|
//! | `HEST_` 前缀的环境变量 | [`ENV_PRIORITY`] |
//! | 内存映射 | [`MAP_PRIORITY`] |
//! | `application-{profile}.toml` | [`PROFILE_PRIORITY`] + 序号 |
//! | `application.toml` | [`FILE_PRIORITY`] |

use crate::constants;
use crate::error::{ApplicationError, ApplicationResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

pub const FILE_PRIORITY: i32 = 0;
pub const PROFILE_PRIORITY: i32 = 10;
pub const MAP_PRIORITY: i32 = 50;
pub const ENV_PRIORITY: i32 = 100;

/// 配置值
///
/// 浮点数与日期时间以文本保存，嵌套在数组中的表被忽略。
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Text(String),
    Integer(i64),
    Boolean(bool),
    List(Vec<ConfigValue>),
}

impl ConfigValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// 整数，文本按十进制解析
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConfigValue::Integer(i) => Some(*i),
            ConfigValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// 布尔值，文本接受 `true/false`、`on/off`、`yes/no`、`1/0`（不区分大小写）
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Boolean(b) => Some(*b),
            ConfigValue::Text(s) => {
                let s = s.trim();
                if ["true", "on", "yes", "1"].iter().any(|t| s.eq_ignore_ascii_case(t)) {
                    Some(true)
                } else if ["false", "off", "no", "0"].iter().any(|t| s.eq_ignore_ascii_case(t)) {
                    Some(false)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// 列表形式：数组逐项转为文本，文本按逗号拆分
    pub fn to_list(&self) -> Vec<String> {
        match self {
            ConfigValue::List(items) => items.iter().map(ToString::to_string).collect(),
            ConfigValue::Text(s) => s
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            other => vec![other.to_string()],
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Text(s) => f.write_str(s),
            ConfigValue::Integer(i) => write!(f, "{}", i),
            ConfigValue::Boolean(b) => write!(f, "{}", b),
            ConfigValue::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::Text(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::Text(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        ConfigValue::Integer(value)
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Boolean(value)
    }
}

/// 配置源
pub trait PropertySource: Send + Sync {
    fn name(&self) -> &str;

    fn get(&self, key: &str) -> Option<ConfigValue>;

    /// 数字越大越优先
    fn priority(&self) -> i32 {
        FILE_PRIORITY
    }
}

/// 配置环境
#[derive(Default)]
pub struct Environment {
    sources: RwLock<Vec<Box<dyn PropertySource>>>,
    profiles: RwLock<Vec<String>>,
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sources = self.sources.read();
        f.debug_struct("Environment")
            .field("sources", &sources.iter().map(|s| s.name()).collect::<Vec<_>>())
            .field("profiles", &*self.profiles.read())
            .finish()
    }
}

impl Environment {
    /// 不含任何配置源的空环境
    pub fn new() -> Self {
        Self::default()
    }

    /// 加入配置源，同优先级时后加入者优先
    pub fn add_property_source(&self, source: Box<dyn PropertySource>) {
        tracing::debug!(
            source = source.name(),
            priority = source.priority(),
            "Adding property source"
        );
        let mut sources = self.sources.write();
        let at = sources
            .iter()
            .position(|s| s.priority() <= source.priority())
            .unwrap_or(sources.len());
        sources.insert(at, source);
    }

    pub fn get(&self, key: &str) -> Option<ConfigValue> {
        self.sources.read().iter().find_map(|source| source.get(key))
    }

    /// 提供该键的配置源名称
    pub fn source_of(&self, key: &str) -> Option<String> {
        self.sources
            .read()
            .iter()
            .find(|source| source.get(key).is_some())
            .map(|source| source.name().to_string())
    }

    /// 任意标量都可按文本读取
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).map(|value| value.to_string())
    }

    pub fn get_string_or(&self, key: &str, default: &str) -> String {
        self.get_string(key).unwrap_or_else(|| default.to_string())
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key)?.as_i64()
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key)?.as_bool()
    }

    pub fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.get_bool(key).unwrap_or(default)
    }

    /// 列表配置，缺失时为空
    pub fn get_list(&self, key: &str) -> Vec<String> {
        self.get(key).map(|value| value.to_list()).unwrap_or_default()
    }

    pub fn active_profiles(&self) -> Vec<String> {
        self.profiles.read().clone()
    }

    pub fn accepts_profile(&self, profile: &str) -> bool {
        self.profiles.read().iter().any(|p| p == profile)
    }

    /// 从当前目录加载，见 [`Environment::load_from_dir`]
    pub fn load_default() -> ApplicationResult<Self> {
        Self::load_from_dir(".")
    }

    /// 加载 `HEST_` 环境变量、`application.toml` 以及每个激活 profile 的
    /// `application-{profile}.toml`
    ///
    /// 激活的 profile 来自 `profiles.active`（`HEST_PROFILES_ACTIVE` 或基础配置文件）。
    /// 不存在的文件被跳过，无法读取或解析的文件返回配置错误。
    pub fn load_from_dir(dir: impl AsRef<Path>) -> ApplicationResult<Self> {
        let dir = dir.as_ref();
        let env = Self::new();
        env.add_property_source(Box::new(EnvironmentPropertySource::new(constants::ENV_PREFIX)));

        let base = dir.join(constants::DEFAULT_CONFIG_FILE);
        if base.is_file() {
            env.add_property_source(Box::new(TomlPropertySource::from_file(&base)?));
        }

        let profiles = env.get_list(constants::PROFILES_ACTIVE);
        for (offset, profile) in (0..).zip(&profiles) {
            let path = dir.join(format!("application-{}.toml", profile));
            if path.is_file() {
                let source =
                    TomlPropertySource::from_file(&path)?.with_priority(PROFILE_PRIORITY + offset);
                env.add_property_source(Box::new(source));
            } else {
                tracing::debug!("No config file for profile '{}'", profile);
            }
        }

        if !profiles.is_empty() {
            tracing::info!("📋 Active profiles: {}", profiles.join(", "));
        }
        *env.profiles.write() = profiles;

        Ok(env)
    }
}

/// 环境变量配置源：`server.body-limit` 读取 `HEST_SERVER_BODY_LIMIT`
pub struct EnvironmentPropertySource {
    prefix: String,
}

impl EnvironmentPropertySource {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    fn variable_name(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key.replace(|c: char| c == '.' || c == '-', "_").to_uppercase())
    }
}

impl PropertySource for EnvironmentPropertySource {
    fn name(&self) -> &str {
        "environment"
    }

    fn get(&self, key: &str) -> Option<ConfigValue> {
        std::env::var(self.variable_name(key)).ok().map(ConfigValue::Text)
    }

    fn priority(&self) -> i32 {
        ENV_PRIORITY
    }
}

/// TOML 配置源，表被展平为点分键
pub struct TomlPropertySource {
    name: String,
    properties: HashMap<String, ConfigValue>,
    priority: i32,
}

impl TomlPropertySource {
    pub fn from_file(path: impl AsRef<Path>) -> ApplicationResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ApplicationError::configuration(format!("Cannot read {}: {}", path.display(), e))
        })?;
        let source = Self::parse(&content, path.display().to_string())?;
        tracing::debug!("Loaded {} properties from {}", source.len(), path.display());
        Ok(source)
    }

    pub fn parse(content: &str, name: impl Into<String>) -> ApplicationResult<Self> {
        let name = name.into();
        let table: toml::Table = content
            .parse()
            .map_err(|e| ApplicationError::configuration(format!("Invalid TOML in {}: {}", name, e)))?;

        let mut properties = HashMap::new();
        flatten("", &table, &mut properties);

        Ok(Self {
            name,
            properties,
            priority: FILE_PRIORITY,
        })
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

fn flatten(prefix: &str, table: &toml::Table, out: &mut HashMap<String, ConfigValue>) {
    for (key, value) in table {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        match value {
            toml::Value::Table(inner) => flatten(&path, inner, out),
            other => {
                if let Some(value) = convert(other) {
                    out.insert(path, value);
                }
            }
        }
    }
}

fn convert(value: &toml::Value) -> Option<ConfigValue> {
    Some(match value {
        toml::Value::String(s) => ConfigValue::Text(s.clone()),
        toml::Value::Integer(i) => ConfigValue::Integer(*i),
        toml::Value::Boolean(b) => ConfigValue::Boolean(*b),
        toml::Value::Float(f) => ConfigValue::Text(f.to_string()),
        toml::Value::Datetime(d) => ConfigValue::Text(d.to_string()),
        toml::Value::Array(items) => ConfigValue::List(items.iter().filter_map(convert).collect()),
        toml::Value::Table(_) => return None,
    })
}

impl PropertySource for TomlPropertySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Option<ConfigValue> {
        self.properties.get(key).cloned()
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

/// 内存配置源，用于测试与运行时覆盖
pub struct MapPropertySource {
    name: String,
    properties: HashMap<String, ConfigValue>,
    priority: i32,
}

impl MapPropertySource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: HashMap::new(),
            priority: MAP_PRIORITY,
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl PropertySource for MapPropertySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Option<ConfigValue> {
        self.properties.get(key).cloned()
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}
