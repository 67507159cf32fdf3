//! 框架错误类型
//!
//! 容器错误与启动错误使用 `thiserror` 定义，用户代码（钩子、工厂函数）
//! 返回 `anyhow::Error`，通过 `Other` 变体透传。

use thiserror::Error;

/// 依赖注入容器错误
#[derive(Error, Debug)]
pub enum ContainerError {
    /// 令牌未注册
    #[error("No provider registered for token '{0}'")]
    NotRegistered(String),

    /// 类型没有可注入的工厂
    #[error("'{0}' is not injectable")]
    NotInjectable(String),

    /// 构造过程中出现循环依赖
    #[error("Circular dependency detected: {}", .0.join(" -> "))]
    CircularDependency(Vec<String>),

    /// 实例类型与请求的类型不一致
    #[error("Provider '{token}' is not of type '{expected}'")]
    TypeMismatch { token: String, expected: String },

    /// 工厂函数失败
    #[error("Failed to create '{token}': {message}")]
    CreationFailed { token: String, message: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// 应用启动错误
#[derive(Error, Debug)]
pub enum ApplicationError {
    /// 元数据缺失、控制器非法、路由冲突等配置错误
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error("Failed to initialize logging: {0}")]
    LoggingInitFailed(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApplicationError {
    pub fn configuration(message: impl Into<String>) -> Self {
        ApplicationError::Configuration(message.into())
    }
}

pub type ContainerResult<T> = std::result::Result<T, ContainerError>;

pub type ApplicationResult<T> = std::result::Result<T, ApplicationError>;

/// 用户代码使用的通用结果类型
pub use anyhow::Result;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circular_dependency_message() {
        let err = ContainerError::CircularDependency(vec![
            "A".to_string(),
            "B".to_string(),
            "A".to_string(),
        ]);
        assert_eq!(err.to_string(), "Circular dependency detected: A -> B -> A");
    }

    #[test]
    fn test_container_error_converts_into_application_error() {
        let err: ApplicationError = ContainerError::NotRegistered("UserService".into()).into();
        assert!(matches!(err, ApplicationError::Container(_)));
        assert_eq!(
            err.to_string(),
            "No provider registered for token 'UserService'"
        );
    }
}
