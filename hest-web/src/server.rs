//! Web 服务器模块
//!
//! 基于 Axum 的 Web 服务器实现

use crate::constants::{
    DEFAULT_BODY_LIMIT, DEFAULT_HOST, DEFAULT_PORT, SERVER_BODY_LIMIT, SERVER_ENABLE_CORS,
    SERVER_ENABLE_REQUEST_ID, SERVER_ENABLE_REQUEST_LOGGING, SERVER_HOST, SERVER_PORT,
};
use axum::Router;
use hest_core::{ApplicationError, ApplicationResult, Environment};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

/// Web 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerProperties {
    /// 服务器监听地址
    pub host: String,

    /// 服务器监听端口
    pub port: u16,

    /// 请求体大小上限（字节）
    pub body_limit: usize,

    /// 是否启用 CORS
    pub enable_cors: bool,

    /// 是否启用请求日志
    pub enable_request_logging: bool,

    /// 是否为每个请求生成 X-Request-ID
    pub enable_request_id: bool,
}

impl Default for ServerProperties {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            body_limit: DEFAULT_BODY_LIMIT,
            enable_cors: false,
            enable_request_logging: true,
            enable_request_id: false,
        }
    }
}

impl ServerProperties {
    /// 从 Environment 加载配置
    pub fn from_environment(env: &Environment) -> Self {
        let defaults = Self::default();
        Self {
            host: env.get_string_or(SERVER_HOST, &defaults.host),
            port: env
                .get_i64(SERVER_PORT)
                .and_then(|port| u16::try_from(port).ok())
                .unwrap_or(defaults.port),
            body_limit: env
                .get_i64(SERVER_BODY_LIMIT)
                .and_then(|limit| usize::try_from(limit).ok())
                .unwrap_or(defaults.body_limit),
            enable_cors: env.get_bool_or(SERVER_ENABLE_CORS, defaults.enable_cors),
            enable_request_logging: env
                .get_bool_or(SERVER_ENABLE_REQUEST_LOGGING, defaults.enable_request_logging),
            enable_request_id: env.get_bool_or(SERVER_ENABLE_REQUEST_ID, defaults.enable_request_id),
        }
    }

    /// 获取服务器地址
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Hest Web 服务器
pub struct HestServer;

impl HestServer {
    /// 启动服务器，Ctrl-C 时优雅关闭
    pub async fn run(router: Router, properties: &ServerProperties) -> ApplicationResult<()> {
        let addr = properties.address();

        tracing::info!("🚀 Starting Hest Web Server on {}", addr);

        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ApplicationError::Server(format!("Failed to bind to {}: {}", addr, e)))?;

        tracing::info!("✅ Server listening on http://{}", addr);

        axum::serve(listener, router.into_make_service())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ApplicationError::Server(e.to_string()))?;

        tracing::info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("⚠️ Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use hest_core::MapPropertySource;

    #[test]
    fn test_defaults() {
        let props = ServerProperties::from_environment(&Environment::new());
        assert_eq!(props.address(), "0.0.0.0:3000");
        assert_eq!(props.body_limit, DEFAULT_BODY_LIMIT);
        assert!(props.enable_request_logging);
        assert!(!props.enable_cors);
    }

    #[test]
    fn test_from_environment() {
        let env = Environment::new();
        env.add_property_source(Box::new(
            MapPropertySource::new("test")
                .with("server.host", "127.0.0.1")
                .with("server.port", "8081")
                .with("server.body-limit", "1024")
                .with("server.enable-cors", "true")
                .with("server.enable-request-id", "true"),
        ));

        let props = ServerProperties::from_environment(&env);
        assert_eq!(props.address(), "127.0.0.1:8081");
        assert_eq!(props.body_limit, 1024);
        assert!(props.enable_cors);
        assert!(props.enable_request_id);
    }

    #[test]
    fn test_out_of_range_port_falls_back() {
        let env = Environment::new();
        env.add_property_source(Box::new(
            MapPropertySource::new("test").with("server.port", "70000"),
        ));
        assert_eq!(ServerProperties::from_environment(&env).port, DEFAULT_PORT);
    }
}
