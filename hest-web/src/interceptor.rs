//! 拦截器
//!
//! 拦截器按注册顺序包裹处理器调用（洋葱模型）：前置逻辑按注册顺序执行，后置逻辑逆序执行。
//! 每个拦截器拿到一个只能消费一次的 [`CallHandler`]，可以调用它、跳过它或改写它的结果。

use crate::context::{ArgumentsHost, HttpContext};
use crate::exception::{iso_timestamp, WebError};
use crate::params::{Args, ParamValue};
use crate::response::HandlerResult;
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use hest_core::ClassRef;
use parking_lot::RwLock;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;

/// 处理器链的返回值
pub type HandlerReturn = Result<HandlerResult, WebError>;

/// 拦截器看到的执行上下文
///
/// 参数在拦截器之后才绑定，因此 `get_args` 总是空列表。
#[derive(Debug)]
pub struct ExecutionContext {
    class: ClassRef,
    handler: String,
    args: Args,
    http: Arc<HttpContext>,
}

impl ExecutionContext {
    pub fn new(class: ClassRef, handler: impl Into<String>, http: Arc<HttpContext>) -> Self {
        Self {
            class,
            handler: handler.into(),
            args: Args::default(),
            http,
        }
    }

    /// 控制器类
    pub fn get_class(&self) -> &ClassRef {
        &self.class
    }

    /// 处理器方法名
    pub fn get_handler(&self) -> &str {
        &self.handler
    }

    pub fn get_args(&self) -> &Args {
        &self.args
    }

    pub fn get_arg_by_index(&self, index: usize) -> &ParamValue {
        self.args.get(index)
    }

    pub fn switch_to_http(&self) -> ArgumentsHost {
        ArgumentsHost::new(Arc::clone(&self.http))
    }

    pub fn http(&self) -> &Arc<HttpContext> {
        &self.http
    }
}

/// 拦截器
#[async_trait]
pub trait Interceptor: Send + Sync {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    async fn intercept(&self, context: &ExecutionContext, next: CallHandler<'_>) -> HandlerReturn;
}

/// 链中剩余部分的调用句柄
pub struct CallHandler<'a> {
    chain: Arc<[Arc<dyn Interceptor>]>,
    position: usize,
    context: &'a ExecutionContext,
    terminal: Box<dyn FnOnce() -> BoxFuture<'a, HandlerReturn> + Send + 'a>,
}

impl<'a> CallHandler<'a> {
    /// 调用下一个拦截器，链尾时调用处理器本身
    pub async fn handle(self) -> HandlerReturn {
        match self.chain.get(self.position).cloned() {
            Some(interceptor) => {
                let next = CallHandler {
                    chain: self.chain,
                    position: self.position + 1,
                    context: self.context,
                    terminal: self.terminal,
                };
                interceptor.intercept(self.context, next).await
            }
            None => (self.terminal)().await,
        }
    }
}

/// 全局拦截器注册表
#[derive(Default)]
pub struct InterceptorRegistry {
    interceptors: RwLock<Vec<Arc<dyn Interceptor>>>,
}

impl InterceptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, interceptor: Arc<dyn Interceptor>) {
        tracing::debug!("Registering interceptor: {}", interceptor.name());
        self.interceptors.write().push(interceptor);
    }

    /// 当前注册的拦截器快照
    pub fn snapshot(&self) -> Vec<Arc<dyn Interceptor>> {
        self.interceptors.read().clone()
    }

    /// 以拦截器链包裹一次处理器调用
    pub async fn apply<'a, F>(&self, context: &'a ExecutionContext, terminal: F) -> HandlerReturn
    where
        F: FnOnce() -> BoxFuture<'a, HandlerReturn> + Send + 'a,
    {
        let chain: Arc<[Arc<dyn Interceptor>]> = self.snapshot().into();
        CallHandler {
            chain,
            position: 0,
            context,
            terminal: Box::new(terminal),
        }
        .handle()
        .await
    }

    pub fn clear(&self) {
        self.interceptors.write().clear();
    }

    pub fn len(&self) -> usize {
        self.interceptors.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.read().is_empty()
    }
}

/// 记录请求耗时与失败的拦截器
#[derive(Debug, Default)]
pub struct LoggingInterceptor;

#[async_trait]
impl Interceptor for LoggingInterceptor {
    fn name(&self) -> &str {
        "LoggingInterceptor"
    }

    async fn intercept(&self, context: &ExecutionContext, next: CallHandler<'_>) -> HandlerReturn {
        let request = context.switch_to_http();
        let start = Instant::now();

        let result = next.handle().await;
        let elapsed = start.elapsed().as_millis();

        match &result {
            Ok(_) => tracing::debug!(
                "📝 {} {} - {}ms",
                request.get_request().method(),
                request.path(),
                elapsed
            ),
            Err(e) => tracing::error!(
                "📝 {} {} - {}ms - ERROR: {}",
                request.get_request().method(),
                request.path(),
                elapsed,
                e
            ),
        }
        result
    }
}

/// 将结果包装为 `{success, data, timestamp, duration}` 的拦截器
///
/// 原样响应（`HandlerResult::Raw`）不做包装。
#[derive(Debug, Default)]
pub struct ResponseInterceptor;

#[async_trait]
impl Interceptor for ResponseInterceptor {
    fn name(&self) -> &str {
        "ResponseInterceptor"
    }

    async fn intercept(&self, _context: &ExecutionContext, next: CallHandler<'_>) -> HandlerReturn {
        let start = Instant::now();
        let result = next.handle().await?;

        let Some(data) = result.as_value() else {
            return Ok(result);
        };
        Ok(HandlerResult::Json(json!({
            "success": true,
            "data": data,
            "timestamp": iso_timestamp(chrono::Utc::now()),
            "duration": format!("{}ms", start.elapsed().as_millis()),
        })))
    }
}
