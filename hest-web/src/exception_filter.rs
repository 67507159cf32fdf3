//! 异常过滤器
//!
//! 请求期的错误按注册顺序交给全局过滤器处理，第一个成功返回响应的过滤器胜出。
//! 过滤器自身失败（返回错误或 panic）时记录日志并尝试下一个；
//! 全部失败或没有注册过滤器时由 [`DefaultExceptionFilter`] 兜底，它不会失败。

use crate::context::ArgumentsHost;
use crate::exception::{iso_timestamp, ErrorResponse, WebError};
use async_trait::async_trait;
use axum::response::{IntoResponse, Response};
use futures_util::FutureExt;
use parking_lot::RwLock;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// 异常过滤器 - 将错误转换为 HTTP 响应
///
/// # 示例
///
/// ```ignore
/// struct NotFoundPage;
///
/// #[async_trait]
/// impl ExceptionFilter for NotFoundPage {
///     fn catches(&self, error: &WebError) -> bool {
///         error.status_code() == StatusCode::NOT_FOUND
///     }
///
///     async fn catch(&self, _error: &WebError, host: &ArgumentsHost) -> anyhow::Result<Response> {
///         Ok((StatusCode::NOT_FOUND, format!("nothing at {}", host.path())).into_response())
///     }
/// }
/// ```
#[async_trait]
pub trait ExceptionFilter: Send + Sync {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// 是否处理该错误，缺省处理所有错误
    fn catches(&self, _error: &WebError) -> bool {
        true
    }

    /// 返回 `Err` 表示放弃处理，交给下一个过滤器
    async fn catch(&self, error: &WebError, host: &ArgumentsHost) -> anyhow::Result<Response>;
}

/// 默认过滤器
#[derive(Debug, Default)]
pub struct DefaultExceptionFilter;

impl DefaultExceptionFilter {
    /// 构造标准错误响应体
    pub fn error_response(&self, error: &WebError, path: &str) -> ErrorResponse {
        match error {
            WebError::Http(exception) => exception.get_response(path),
            WebError::ParameterBinding(binding) => ErrorResponse {
                status_code: error.status_code().as_u16(),
                message: binding.to_string(),
                error: None,
                timestamp: iso_timestamp(chrono::Utc::now()),
                path: path.to_string(),
                stack: Some(format!("{:?}", binding)),
            },
            WebError::Handler(source) => ErrorResponse {
                status_code: error.status_code().as_u16(),
                message: source.to_string(),
                error: None,
                timestamp: iso_timestamp(chrono::Utc::now()),
                path: path.to_string(),
                stack: Some(format!("{:?}", source)),
            },
        }
    }

    pub fn handle(&self, error: &WebError, host: &ArgumentsHost) -> Response {
        let path = host.path();
        match error {
            WebError::Handler(source) => tracing::error!(
                path = path,
                "Unhandled error: {:?}",
                source
            ),
            WebError::ParameterBinding(binding) => tracing::warn!(
                path = path,
                "⚠️ {}",
                binding
            ),
            WebError::Http(_) => tracing::debug!(
                path = path,
                status = error.status_code().as_u16(),
                "Request failed: {}",
                error
            ),
        }
        self.error_response(error, path).into_response()
    }
}

#[async_trait]
impl ExceptionFilter for DefaultExceptionFilter {
    fn name(&self) -> &str {
        "DefaultExceptionFilter"
    }

    async fn catch(&self, error: &WebError, host: &ArgumentsHost) -> anyhow::Result<Response> {
        Ok(self.handle(error, host))
    }
}

/// 只处理 [`HttpException`](crate::exception::HttpException) 的过滤器
#[derive(Debug, Default)]
pub struct HttpExceptionFilter;

#[async_trait]
impl ExceptionFilter for HttpExceptionFilter {
    fn name(&self) -> &str {
        "HttpExceptionFilter"
    }

    fn catches(&self, error: &WebError) -> bool {
        matches!(error, WebError::Http(_))
    }

    async fn catch(&self, error: &WebError, host: &ArgumentsHost) -> anyhow::Result<Response> {
        let exception = error
            .as_http()
            .ok_or_else(|| anyhow::anyhow!("HttpExceptionFilter received a non-HTTP error"))?;
        Ok(exception.get_response(host.path()).into_response())
    }
}

/// 全局异常过滤器注册表
#[derive(Default)]
pub struct ExceptionFilterRegistry {
    filters: RwLock<Vec<Arc<dyn ExceptionFilter>>>,
    fallback: DefaultExceptionFilter,
}

impl ExceptionFilterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, filter: Arc<dyn ExceptionFilter>) {
        tracing::debug!("Registering exception filter: {}", filter.name());
        self.filters.write().push(filter);
    }

    pub fn snapshot(&self) -> Vec<Arc<dyn ExceptionFilter>> {
        self.filters.read().clone()
    }

    /// 处理异常，返回最终响应
    ///
    /// 处理流程：
    /// 1. 依次尝试声明处理该错误的过滤器，第一个成功者胜出
    /// 2. 失败或 panic 的过滤器被跳过
    /// 3. 没有过滤器成功时使用默认过滤器
    pub async fn handle(&self, error: &WebError, host: &ArgumentsHost) -> Response {
        for filter in self.snapshot() {
            if !filter.catches(error) {
                continue;
            }

            match AssertUnwindSafe(filter.catch(error, host)).catch_unwind().await {
                Ok(Ok(response)) => {
                    tracing::debug!(
                        filter = filter.name(),
                        error = %error,
                        "Error handled by exception filter"
                    );
                    return response;
                }
                Ok(Err(e)) => {
                    tracing::warn!("⚠️ Exception filter {} failed: {:#}", filter.name(), e);
                }
                Err(payload) => {
                    let panic = WebError::from_panic(payload);
                    tracing::error!("⚠️ Exception filter {} panicked: {}", filter.name(), panic);
                }
            }
        }

        self.fallback.handle(error, host)
    }

    pub fn clear(&self) {
        self.filters.write().clear();
    }

    pub fn len(&self) -> usize {
        self.filters.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.read().is_empty()
    }
}
