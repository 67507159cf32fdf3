//! 处理器返回值
//!
//! 处理器返回任意实现 [`IntoHandlerResult`] 的类型，统一转换为 [`HandlerResult`] 后序列化：
//! 对象与数组输出 JSON，字符串输出纯文本，其它值包装为 `{"data": value}`。

use crate::exception::WebError;
use axum::{
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};

/// 处理器结果
#[derive(Debug)]
pub enum HandlerResult {
    Json(Value),
    Text(String),
    /// 原样返回的响应
    Raw(Response),
}

impl HandlerResult {
    pub fn json<T: Serialize>(value: &T) -> Result<Self, WebError> {
        serde_json::to_value(value)
            .map(HandlerResult::Json)
            .map_err(|e| WebError::Handler(anyhow::Error::new(e).context("Failed to serialize response")))
    }

    /// 可作为 JSON 值查看的结果；`Raw` 返回 `None`
    pub fn as_value(&self) -> Option<Value> {
        match self {
            HandlerResult::Json(value) => Some(value.clone()),
            HandlerResult::Text(text) => Some(Value::String(text.clone())),
            HandlerResult::Raw(_) => None,
        }
    }
}

impl IntoResponse for HandlerResult {
    fn into_response(self) -> Response {
        match self {
            HandlerResult::Json(value @ (Value::Object(_) | Value::Array(_))) => {
                Json(value).into_response()
            }
            HandlerResult::Json(Value::String(text)) | HandlerResult::Text(text) => {
                text.into_response()
            }
            HandlerResult::Json(other) => Json(json!({ "data": other })).into_response(),
            HandlerResult::Raw(response) => response,
        }
    }
}

/// 转换为处理器结果
pub trait IntoHandlerResult {
    fn into_handler_result(self) -> Result<HandlerResult, WebError>;
}

impl IntoHandlerResult for HandlerResult {
    fn into_handler_result(self) -> Result<HandlerResult, WebError> {
        Ok(self)
    }
}

impl IntoHandlerResult for Value {
    fn into_handler_result(self) -> Result<HandlerResult, WebError> {
        Ok(HandlerResult::Json(self))
    }
}

impl IntoHandlerResult for String {
    fn into_handler_result(self) -> Result<HandlerResult, WebError> {
        Ok(HandlerResult::Text(self))
    }
}

impl IntoHandlerResult for &'static str {
    fn into_handler_result(self) -> Result<HandlerResult, WebError> {
        Ok(HandlerResult::Text(self.to_string()))
    }
}

impl IntoHandlerResult for () {
    fn into_handler_result(self) -> Result<HandlerResult, WebError> {
        Ok(HandlerResult::Json(Value::Null))
    }
}

impl IntoHandlerResult for Response {
    fn into_handler_result(self) -> Result<HandlerResult, WebError> {
        Ok(HandlerResult::Raw(self))
    }
}

impl<T: Serialize> IntoHandlerResult for Json<T> {
    fn into_handler_result(self) -> Result<HandlerResult, WebError> {
        HandlerResult::json(&self.0)
    }
}

impl<T: Serialize> IntoHandlerResult for Vec<T> {
    fn into_handler_result(self) -> Result<HandlerResult, WebError> {
        HandlerResult::json(&self)
    }
}

impl<T: IntoHandlerResult> IntoHandlerResult for Option<T> {
    fn into_handler_result(self) -> Result<HandlerResult, WebError> {
        match self {
            Some(value) => value.into_handler_result(),
            None => Ok(HandlerResult::Json(Value::Null)),
        }
    }
}

macro_rules! impl_scalar_result {
    ($($ty:ty),*) => {
        $(
            impl IntoHandlerResult for $ty {
                fn into_handler_result(self) -> Result<HandlerResult, WebError> {
                    Ok(HandlerResult::Json(json!(self)))
                }
            }
        )*
    };
}

impl_scalar_result!(bool, i32, i64, u32, u64, usize, f64);

/// HTTP 响应实体
///
/// 允许完全控制状态码、响应头和响应体
#[derive(Debug)]
pub struct ResponseEntity<T> {
    status: StatusCode,
    headers: HeaderMap,
    body: Option<T>,
}

impl<T> ResponseEntity<T> {
    /// 创建一个新的响应实体
    pub fn new(status: StatusCode, body: T) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Some(body),
        }
    }

    /// 200 OK
    pub fn ok(body: T) -> Self {
        Self::new(StatusCode::OK, body)
    }

    /// 201 Created
    pub fn created(body: T) -> Self {
        Self::new(StatusCode::CREATED, body)
    }

    /// 添加响应头
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// 设置状态码
    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }
}

impl ResponseEntity<()> {
    /// 204 No Content
    pub fn no_content() -> Self {
        Self {
            status: StatusCode::NO_CONTENT,
            headers: HeaderMap::new(),
            body: None,
        }
    }
}

impl<T: Serialize> IntoHandlerResult for ResponseEntity<T> {
    fn into_handler_result(self) -> Result<HandlerResult, WebError> {
        let mut response = match self.body {
            Some(body) => HandlerResult::json(&body)?.into_response(),
            None => Response::default(),
        };
        *response.status_mut() = self.status;
        response.headers_mut().extend(self.headers);
        Ok(HandlerResult::Raw(response))
    }
}
