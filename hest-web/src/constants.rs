//! 框架配置常量定义
//!
//! 定义 Web 层使用的配置键名称

// ==================== Server 配置 ====================

/// 服务器监听地址
pub const SERVER_HOST: &str = "server.host";

/// 服务器监听端口
pub const SERVER_PORT: &str = "server.port";

/// 请求体大小上限（字节）
pub const SERVER_BODY_LIMIT: &str = "server.body-limit";

/// 是否启用 CORS
pub const SERVER_ENABLE_CORS: &str = "server.enable-cors";

/// 是否启用请求日志
pub const SERVER_ENABLE_REQUEST_LOGGING: &str = "server.enable-request-logging";

/// 是否启用请求 ID
pub const SERVER_ENABLE_REQUEST_ID: &str = "server.enable-request-id";

// ==================== 默认值 ====================

pub const DEFAULT_HOST: &str = "0.0.0.0";

pub const DEFAULT_PORT: u16 = 3000;

/// 默认请求体上限：2 MiB
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// 请求 ID 头
pub const REQUEST_ID_HEADER: &str = "x-request-id";
