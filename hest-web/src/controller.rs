//! 控制器声明
//!
//! 控制器实现 [`Controller`]，在 `declare` 中声明路径前缀、路由、参数来源和处理器：
//!
//! ```rust,ignore
//! impl Controller for UserController {
//!     fn declare(def: &mut ControllerDef<'_, Self>) {
//!         def.path("/users");
//!         def.get("/:id", "find_one")
//!             .param(0, "id")
//!             .handler(|this, args| async move {
//!                 let id = args.parse::<u64>(0)?;
//!                 Ok(Json(this.service.find(id)?))
//!             });
//!     }
//! }
//! ```
//!
//! 处理器以 `(控制器类型, 方法名)` 为键保存，注册路由时与控制器实例绑定一次。

use crate::exception::WebError;
use crate::http::HttpMethod;
use crate::metadata::{normalize_path, ControllerMetadata, ParamType, ParameterMetadata, RouteMetadata};
use crate::params::Args;
use crate::response::{HandlerResult, IntoHandlerResult};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use hest_core::{ClassRef, Injectable, InjectableMetadata, MetadataKey, MetadataStore};
use std::any::{Any, TypeId};
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

/// 处理器调用结果
pub type HandlerFuture = BoxFuture<'static, Result<HandlerResult, WebError>>;

/// 已绑定到控制器实例的处理器
pub type BoundHandler = Arc<dyn Fn(Args) -> HandlerFuture + Send + Sync>;

type BindFn = dyn Fn(Arc<dyn Any + Send + Sync>) -> Option<BoundHandler> + Send + Sync;

/// 未绑定实例的处理器
pub struct HandlerBinding {
    bind: Box<BindFn>,
}

impl HandlerBinding {
    /// 绑定到控制器实例；实例类型不符时返回 `None`
    pub fn bind(&self, instance: Arc<dyn Any + Send + Sync>) -> Option<BoundHandler> {
        (self.bind)(instance)
    }
}

/// 控制器
pub trait Controller: Injectable {
    fn declare(def: &mut ControllerDef<'_, Self>);
}

/// 控制器的类引用
pub fn controller<C: Controller>() -> ClassRef {
    ClassRef::injectable::<C>().with_declare(declare_controller::<C>)
}

fn declare_controller<C: Controller>(store: &MetadataStore) {
    if store.has(MetadataKey::Controller, TypeId::of::<C>(), None) {
        return;
    }
    store.define_class::<C, _>(
        MetadataKey::Injectable,
        InjectableMetadata { scope: C::scope() },
    );

    let mut def = ControllerDef::<C> {
        store,
        path: "/".to_string(),
        _controller: PhantomData,
    };
    C::declare(&mut def);

    let ControllerDef { path, .. } = def;
    store.define_class::<C, _>(MetadataKey::Controller, ControllerMetadata { path });
}

/// 控制器声明构建器
pub struct ControllerDef<'a, C> {
    store: &'a MetadataStore,
    path: String,
    _controller: PhantomData<fn() -> C>,
}

impl<'a, C: Controller> ControllerDef<'a, C> {
    /// 路径前缀，缺省为 `/`
    pub fn path(&mut self, path: &str) -> &mut Self {
        self.path = normalize_path(path);
        self
    }

    pub fn route(&mut self, method: HttpMethod, path: &str, method_name: &str) -> RouteDef<'a, C> {
        self.store.push(
            MetadataKey::Route,
            TypeId::of::<C>(),
            None,
            RouteMetadata {
                method,
                path: normalize_path(path),
                method_name: method_name.to_string(),
            },
        );
        RouteDef {
            store: self.store,
            method_name: method_name.to_string(),
            _controller: PhantomData,
        }
    }

    pub fn get(&mut self, path: &str, method_name: &str) -> RouteDef<'a, C> {
        self.route(HttpMethod::Get, path, method_name)
    }

    pub fn post(&mut self, path: &str, method_name: &str) -> RouteDef<'a, C> {
        self.route(HttpMethod::Post, path, method_name)
    }

    pub fn put(&mut self, path: &str, method_name: &str) -> RouteDef<'a, C> {
        self.route(HttpMethod::Put, path, method_name)
    }

    pub fn delete(&mut self, path: &str, method_name: &str) -> RouteDef<'a, C> {
        self.route(HttpMethod::Delete, path, method_name)
    }

    pub fn patch(&mut self, path: &str, method_name: &str) -> RouteDef<'a, C> {
        self.route(HttpMethod::Patch, path, method_name)
    }

    pub fn options(&mut self, path: &str, method_name: &str) -> RouteDef<'a, C> {
        self.route(HttpMethod::Options, path, method_name)
    }

    pub fn head(&mut self, path: &str, method_name: &str) -> RouteDef<'a, C> {
        self.route(HttpMethod::Head, path, method_name)
    }
}

/// 单个路由的参数与处理器声明
pub struct RouteDef<'a, C> {
    store: &'a MetadataStore,
    method_name: String,
    _controller: PhantomData<fn() -> C>,
}

impl<'a, C: Controller> RouteDef<'a, C> {
    fn parameter(self, index: usize, param_type: ParamType, key: Option<&str>) -> Self {
        self.store.push(
            MetadataKey::Param,
            TypeId::of::<C>(),
            Some(&self.method_name),
            ParameterMetadata {
                index,
                param_type,
                key: key.map(String::from),
            },
        );
        self
    }

    /// 请求体：JSON，解析失败时为原始文本
    pub fn body(self, index: usize) -> Self {
        self.parameter(index, ParamType::Body, None)
    }

    /// 单个路径参数
    pub fn param(self, index: usize, key: &str) -> Self {
        self.parameter(index, ParamType::Param, Some(key))
    }

    /// 全部路径参数
    pub fn params(self, index: usize) -> Self {
        self.parameter(index, ParamType::Param, None)
    }

    pub fn query(self, index: usize, key: &str) -> Self {
        self.parameter(index, ParamType::Query, Some(key))
    }

    pub fn queries(self, index: usize) -> Self {
        self.parameter(index, ParamType::Query, None)
    }

    pub fn header(self, index: usize, key: &str) -> Self {
        self.parameter(index, ParamType::Header, Some(key))
    }

    pub fn headers(self, index: usize) -> Self {
        self.parameter(index, ParamType::Header, None)
    }

    pub fn req(self, index: usize) -> Self {
        self.parameter(index, ParamType::Request, None)
    }

    pub fn res(self, index: usize) -> Self {
        self.parameter(index, ParamType::Response, None)
    }

    pub fn context(self, index: usize) -> Self {
        self.parameter(index, ParamType::Context, None)
    }

    /// 声明处理器
    pub fn handler<F, Fut, R>(self, handler: F)
    where
        F: Fn(Arc<C>, Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, WebError>> + Send + 'static,
        R: IntoHandlerResult + Send + 'static,
    {
        let handler = Arc::new(handler);
        let binding = HandlerBinding {
            bind: Box::new(move |instance: Arc<dyn Any + Send + Sync>| -> Option<BoundHandler> {
                let instance = instance.downcast::<C>().ok()?;
                let handler = Arc::clone(&handler);
                let bound: BoundHandler = Arc::new(move |args: Args| {
                    let call = handler(Arc::clone(&instance), args);
                    async move { call.await?.into_handler_result() }.boxed()
                });
                Some(bound)
            }),
        };
        self.store.define(
            MetadataKey::Handler,
            TypeId::of::<C>(),
            Some(&self.method_name),
            binding,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::ControllerScanner;
    use hest_core::{Container, ContainerResult, MetadataScanner};
    use serde_json::json;

    struct PingController;

    impl Injectable for PingController {
        fn create(_: &Container) -> ContainerResult<Self> {
            Ok(PingController)
        }
    }

    impl Controller for PingController {
        fn declare(def: &mut ControllerDef<'_, Self>) {
            def.path("ping");
            def.get("", "ping").handler(|_, _| async { Ok("pong") });
            def.post("echo", "echo")
                .body(1)
                .query(0, "tag")
                .handler(|_, args| async move { Ok(json!({"tag": args.string(0)?})) });
        }
    }

    #[test]
    fn test_declaration_is_recorded() {
        let store = MetadataStore::new();
        let class = controller::<PingController>();

        assert!(store.is_controller(&class));
        assert!(store.is_injectable(&class));
        assert_eq!(store.scan_controller(&class).unwrap().path, "/ping");

        let routes = store.scan_routes(&class);
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].path, "/");
        assert_eq!(routes[1].method, HttpMethod::Post);
        assert_eq!(routes[1].path, "/echo");

        let params = store.scan_parameters(&class, "echo");
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].param_type, ParamType::Body);
        assert_eq!(params[1].key.as_deref(), Some("tag"));
        assert!(store.scan_parameters(&class, "ping").is_empty());
    }

    #[tokio::test]
    async fn test_handler_binds_to_instance() {
        let store = MetadataStore::new();
        let class = controller::<PingController>();
        let binding = store.scan_handler(&class, "ping").unwrap();

        let handler = binding.bind(Arc::new(PingController)).unwrap();
        let result = handler(Args::default()).await.unwrap();
        assert!(matches!(result, HandlerResult::Text(text) if text == "pong"));

        assert!(binding.bind(Arc::new(42u8)).is_none());
        assert!(store.scan_handler(&class, "missing").is_none());
    }
}
