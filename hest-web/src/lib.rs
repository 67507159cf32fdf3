//! # Hest Web
//!
//! 模块化的 Rust Web 框架，基于 Axum 构建
//!
//! ## 核心特性
//!
//! - **模块与依赖注入** - 模块声明控制器与提供者，由 Hest Core 的容器构造
//! - **声明式路由** - 控制器在 `declare` 中声明路径、参数来源与处理器
//! - **拦截器** - 洋葱模型包裹处理器调用
//! - **异常过滤器** - 按注册顺序把错误转换为响应，默认过滤器兜底
//! - **中间件支持** - 集成 Tower 中间件生态系统

pub mod application;
pub mod constants;
pub mod context;
pub mod controller;
pub mod exception;
pub mod exception_filter;
pub mod http;
pub mod interceptor;
pub mod metadata;
pub mod middleware;
pub mod params;
pub mod response;
pub mod router;
pub mod server;

pub use application::{HestApplication, HestFactory};
pub use context::{ArgumentsHost, HttpContext};
pub use controller::{controller, Controller, ControllerDef, RouteDef};
pub use exception::{ErrorResponse, HttpException, WebError};
pub use exception_filter::{
    DefaultExceptionFilter, ExceptionFilter, ExceptionFilterRegistry, HttpExceptionFilter,
};
pub use crate::http::HttpMethod;
pub use interceptor::{
    CallHandler, ExecutionContext, HandlerReturn, Interceptor, InterceptorRegistry,
    LoggingInterceptor, ResponseInterceptor,
};
pub use metadata::{
    ControllerMetadata, ControllerScanner, ParamType, ParameterMetadata, RouteInfo, RouteMetadata,
};
pub use params::{Args, ParamValue, ParameterBindingError, ParameterError, ParameterResolver};
pub use response::{HandlerResult, IntoHandlerResult, ResponseEntity};
pub use router::{combine_paths, RouterExplorer};
pub use server::{HestServer, ServerProperties};

pub mod prelude {
    //! 预导入模块

    pub use crate::application::{HestApplication, HestFactory};
    pub use crate::context::{ArgumentsHost, HttpContext};
    pub use crate::controller::{controller, Controller, ControllerDef};
    pub use crate::exception::{HttpException, WebError};
    pub use crate::exception_filter::{ExceptionFilter, HttpExceptionFilter};
    pub use crate::interceptor::{
        CallHandler, ExecutionContext, HandlerReturn, Interceptor, LoggingInterceptor,
        ResponseInterceptor,
    };
    pub use crate::params::Args;
    pub use crate::response::{HandlerResult, ResponseEntity};

    pub use hest_core::prelude::*;
    pub use hest_core::async_trait::async_trait;

    pub use axum;
    pub use axum::http::StatusCode;
    pub use axum::response::{IntoResponse, Response};
    pub use axum::{Json, Router};
}
