//! 路由注册与请求分发
//!
//! [`RouterExplorer`] 遍历控制器，读取路径前缀、路由与参数声明，
//! 为每个路由构建一个分发闭包并注册到 axum：
//!
//! 1. 构建请求上下文与执行上下文
//! 2. 在拦截器链内解析参数并调用处理器
//! 3. 序列化结果；任何失败（包括 panic）交给异常过滤器

use crate::context::{ArgumentsHost, HttpContext};
use crate::controller::BoundHandler;
use crate::exception::WebError;
use crate::exception_filter::ExceptionFilterRegistry;
use crate::http::HttpMethod;
use crate::interceptor::{ExecutionContext, InterceptorRegistry};
use crate::metadata::{ControllerScanner, ParameterMetadata, RouteInfo, RouteRegistry};
use crate::params::ParameterResolver;
use axum::extract::rejection::RawPathParamsRejection;
use axum::extract::{RawPathParams, Request};
use axum::response::{IntoResponse, Response};
use axum::routing::on;
use axum::Router;
use futures_util::FutureExt;
use hest_core::{ApplicationError, ApplicationResult, ClassRef, Container, MetadataStore, Token};
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// 拼接控制器前缀与路由子路径，两段之间恰好一个 `/`
pub fn combine_paths(prefix: &str, path: &str) -> String {
    let prefix = prefix.strip_suffix('/').unwrap_or(prefix);
    let path = path.strip_prefix('/').unwrap_or(path);

    match (prefix.is_empty(), path.is_empty()) {
        (true, true) => "/".to_string(),
        (false, true) => prefix.to_string(),
        _ => format!("{}/{}", prefix, path),
    }
}

/// 路由日志使用的图标
fn route_emoji(method: HttpMethod, path: &str) -> &'static str {
    if path.contains("/auth") || path.contains("/login") {
        return "🔐";
    }
    if path.contains("/error") {
        return "⚠️";
    }
    if path.contains(":id") {
        return "🆔";
    }
    match method {
        HttpMethod::Get => "🔍",
        HttpMethod::Post => "📩",
        HttpMethod::Put | HttpMethod::Patch => "✏️",
        HttpMethod::Delete => "🗑️",
        _ => "🚄",
    }
}

/// 单个路由的分发状态，在注册时构建一次
struct RouteHandler {
    class: ClassRef,
    method_name: String,
    parameters: Arc<[ParameterMetadata]>,
    handler: BoundHandler,
    interceptors: Arc<InterceptorRegistry>,
    filters: Arc<ExceptionFilterRegistry>,
    body_limit: usize,
}

impl RouteHandler {
    async fn dispatch(
        &self,
        path_params: Result<RawPathParams, RawPathParamsRejection>,
        request: Request,
    ) -> Response {
        let path_params = match path_params {
            Ok(params) => Ok(params
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect()),
            Err(RawPathParamsRejection::MissingPathParams(_)) => Ok(HashMap::new()),
            Err(rejection) => Err(rejection.body_text()),
        };

        let (parts, body) = request.into_parts();
        let http = Arc::new(HttpContext::new(parts, body, path_params, self.body_limit));
        let context =
            ExecutionContext::new(self.class.clone(), self.method_name.clone(), Arc::clone(&http));

        let terminal = || {
            let http = Arc::clone(&http);
            let parameters = Arc::clone(&self.parameters);
            let handler = Arc::clone(&self.handler);
            async move {
                let args = ParameterResolver::resolve(&http, &parameters)
                    .await
                    .into_result()?;
                handler(args).await
            }
            .boxed()
        };

        let result = match AssertUnwindSafe(self.interceptors.apply(&context, terminal))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(payload) => {
                let error = WebError::from_panic(payload);
                tracing::error!(
                    "Handler {}::{} panicked: {}",
                    self.class.name(),
                    self.method_name,
                    error
                );
                Err(error)
            }
        };

        match result {
            Ok(value) => {
                let mut response = value.into_response();
                http.apply_response_state(&mut response);
                response
            }
            Err(error) => self.filters.handle(&error, &ArgumentsHost::new(http)).await,
        }
    }
}

/// 路由探索器
pub struct RouterExplorer {
    store: Arc<MetadataStore>,
    container: Arc<Container>,
    interceptors: Arc<InterceptorRegistry>,
    filters: Arc<ExceptionFilterRegistry>,
    routes: Arc<RouteRegistry>,
    body_limit: usize,
}

impl RouterExplorer {
    pub fn new(
        store: Arc<MetadataStore>,
        container: Arc<Container>,
        interceptors: Arc<InterceptorRegistry>,
        filters: Arc<ExceptionFilterRegistry>,
        routes: Arc<RouteRegistry>,
        body_limit: usize,
    ) -> Self {
        Self {
            store,
            container,
            interceptors,
            filters,
            routes,
            body_limit,
        }
    }

    /// 注册全部控制器的路由
    pub fn explore(&self, mut router: Router, controllers: &[ClassRef]) -> ApplicationResult<Router> {
        for class in controllers {
            router = self.explore_controller(router, class)?;
        }
        Ok(router)
    }

    fn explore_controller(&self, mut router: Router, class: &ClassRef) -> ApplicationResult<Router> {
        let controller = self.store.scan_controller(class).ok_or_else(|| {
            ApplicationError::configuration(format!(
                "Controller metadata not found for {}",
                class.name()
            ))
        })?;
        let routes = self.store.scan_routes(class);
        let instance = self.container.resolve_token(&Token::from_class(class))?;

        tracing::info!("🎮 {} {{{}}}", class.name(), controller.path);

        for route in routes {
            let path = combine_paths(&controller.path, &route.path);
            if !path.starts_with('/') {
                return Err(ApplicationError::configuration(format!(
                    "Invalid route path '{}' on {}::{}",
                    path,
                    class.name(),
                    route.method_name
                )));
            }
            if self.routes.contains(route.method, &path) {
                return Err(ApplicationError::configuration(format!(
                    "Duplicate route {} {} on {}::{}",
                    route.method,
                    path,
                    class.name(),
                    route.method_name
                )));
            }

            let handler = self
                .store
                .scan_handler(class, &route.method_name)
                .and_then(|binding| binding.bind(Arc::clone(&instance)))
                .ok_or_else(|| {
                    ApplicationError::configuration(format!(
                        "No handler bound for {}::{}",
                        class.name(),
                        route.method_name
                    ))
                })?;

            let route_handler = Arc::new(RouteHandler {
                class: class.clone(),
                method_name: route.method_name.clone(),
                parameters: self.store.scan_parameters(class, &route.method_name).into(),
                handler,
                interceptors: Arc::clone(&self.interceptors),
                filters: Arc::clone(&self.filters),
                body_limit: self.body_limit,
            });

            let method_router = on(
                route.method.method_filter(),
                move |path_params: Result<RawPathParams, RawPathParamsRejection>, request: Request| {
                    let route_handler = Arc::clone(&route_handler);
                    async move { route_handler.dispatch(path_params, request).await }
                },
            );

            // axum 在路径冲突时 panic，这里转换为配置错误
            let candidate = router.clone();
            router = std::panic::catch_unwind(AssertUnwindSafe(|| {
                candidate.route(&path, method_router)
            }))
            .map_err(|payload| {
                ApplicationError::configuration(format!(
                    "Conflicting route {} {}: {}",
                    route.method,
                    path,
                    WebError::from_panic(payload)
                ))
            })?;

            self.routes.add(RouteInfo {
                method: route.method,
                path: path.clone(),
                handler: route.method_name.clone(),
                controller: class.name().to_string(),
            });
            tracing::info!(
                "{} Mapped {{{}, {}}}",
                route_emoji(route.method, &path),
                path,
                route.method
            );
        }

        Ok(router)
    }
}
