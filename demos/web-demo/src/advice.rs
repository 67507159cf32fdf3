//! 全局拦截器、异常过滤器与启动钩子

use crate::users::UserService;
use hest_web::prelude::*;
use serde_json::json;
use std::time::Instant;

/// 在响应头中写入处理耗时
pub struct TimingInterceptor;

#[async_trait]
impl Interceptor for TimingInterceptor {
    fn name(&self) -> &str {
        "TimingInterceptor"
    }

    async fn intercept(&self, context: &ExecutionContext, next: CallHandler<'_>) -> HandlerReturn {
        let start = Instant::now();
        let result = next.handle().await;

        let elapsed = format!("{}ms", start.elapsed().as_millis());
        if let Ok(value) = axum::http::HeaderValue::from_str(&elapsed) {
            context.http().set_header("x-response-time", value);
        }
        result
    }
}

/// 生产环境下隐藏 500 错误细节
pub struct SanitizingFilter;

#[async_trait]
impl ExceptionFilter for SanitizingFilter {
    fn name(&self) -> &str {
        "SanitizingFilter"
    }

    fn catches(&self, error: &WebError) -> bool {
        matches!(error, WebError::Handler(_))
    }

    async fn catch(&self, error: &WebError, host: &ArgumentsHost) -> anyhow::Result<Response> {
        tracing::error!(path = host.path(), "Internal error: {:#}", error);
        Ok((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "statusCode": 500,
                "message": "Internal server error",
                "path": host.path(),
            })),
        )
            .into_response())
    }
}

/// 启动完成后报告初始数据
pub struct StartupReport;

#[async_trait]
impl ApplicationHook for StartupReport {
    fn name(&self) -> &str {
        "StartupReport"
    }

    async fn on_bootstrap(&self, container: &Container) -> anyhow::Result<()> {
        let users = container.resolve::<UserService>()?;
        tracing::info!("📝 {} users loaded", users.count());
        Ok(())
    }
}
