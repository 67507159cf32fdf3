//! HTTP 异常与请求期错误类型
//!
//! 请求处理期间的所有失败都归入 [`WebError`]：
//! 1. **框架异常** - [`HttpException`]，携带状态码、消息与错误标签
//! 2. **参数绑定错误** - 一次请求中所有参数的解析失败汇总
//! 3. **处理器错误** - 用户代码返回的任意错误或 panic

use crate::params::ParameterBindingError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// 状态码对应的默认错误标签
pub fn default_error_label(status: StatusCode) -> &'static str {
    match status.as_u16() {
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        406 => "Not Acceptable",
        408 => "Request Timeout",
        409 => "Conflict",
        410 => "Gone",
        422 => "Unprocessable Entity",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "Error",
    }
}

/// ISO-8601 时间戳，毫秒精度，UTC
pub fn iso_timestamp(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// 框架识别的 HTTP 异常
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct HttpException {
    status: StatusCode,
    message: String,
    error: Option<String>,
    description: Option<String>,
    timestamp: DateTime<Utc>,
}

impl HttpException {
    /// 字符串消息，错误标签取状态码的默认标签
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            error: Some(default_error_label(status).to_string()),
            description: None,
            timestamp: Utc::now(),
        }
    }

    /// 对象形式的响应：读取其中的 `message` 与 `error` 字段
    pub fn from_response(status: StatusCode, response: &Value) -> Self {
        let message = response
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Http Exception");
        let error = response
            .get("error")
            .and_then(Value::as_str)
            .map(String::from);

        Self {
            status,
            message: message.to_string(),
            error,
            description: None,
            timestamp: Utc::now(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn unprocessable_entity(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// 覆盖错误标签
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// 响应体：状态码、消息、错误标签、异常创建时间与请求路径
    pub fn get_response(&self, path: &str) -> ErrorResponse {
        ErrorResponse {
            status_code: self.status.as_u16(),
            message: self.message.clone(),
            error: self.error.clone(),
            timestamp: iso_timestamp(self.timestamp),
            path: path.to_string(),
            stack: None,
        }
    }
}

/// 请求期错误
#[derive(Error, Debug)]
pub enum WebError {
    #[error(transparent)]
    Http(#[from] HttpException),

    /// 参数绑定失败，与处理器错误一样按 500 处理
    #[error(transparent)]
    ParameterBinding(#[from] ParameterBindingError),

    /// 用户代码的错误，默认按 500 处理
    #[error(transparent)]
    Handler(anyhow::Error),
}

/// 包裹在 `anyhow::Error` 中的 [`HttpException`] 会被还原
impl From<anyhow::Error> for WebError {
    fn from(error: anyhow::Error) -> Self {
        match error.downcast::<HttpException>() {
            Ok(http) => WebError::Http(http),
            Err(error) => WebError::Handler(error),
        }
    }
}

impl From<hest_core::ContainerError> for WebError {
    fn from(error: hest_core::ContainerError) -> Self {
        WebError::Handler(anyhow::Error::new(error))
    }
}

impl WebError {
    /// 将 panic 载荷转换为处理器错误
    pub fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else {
            "Unknown panic occurred".to_string()
        };
        WebError::Handler(anyhow::anyhow!(message))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            WebError::Http(e) => e.status(),
            WebError::ParameterBinding(_) | WebError::Handler(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn as_http(&self) -> Option<&HttpException> {
        match self {
            WebError::Http(e) => Some(e),
            _ => None,
        }
    }
}

/// 标准错误响应
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// HTTP 状态码
    pub status_code: u16,

    /// 错误消息
    pub message: String,

    /// 错误标签
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// ISO-8601 时间戳
    pub timestamp: String,

    /// 请求路径
    pub path: String,

    /// 诊断信息
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}
