//! 应用启动
//!
//! [`HestFactory`] 从根模块出发遍历模块图，把模块、提供者与控制器注册到容器，
//! 再由 [`RouterExplorer`] 注册全部路由，得到可运行的 [`HestApplication`]。

use crate::exception_filter::{ExceptionFilter, ExceptionFilterRegistry};
use crate::interceptor::{Interceptor, InterceptorRegistry};
use crate::metadata::{RouteInfo, RouteRegistry};
use crate::middleware;
use crate::router::RouterExplorer;
use crate::server::{HestServer, ServerProperties};
use axum::Router;
use hest_core::{
    ApplicationError, ApplicationHooks, ApplicationResult, ClassRef, Container, Environment,
    LoggingConfig, MetadataScanner, MetadataStore, ProviderKind, Token,
};
use std::any::TypeId;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

/// 应用工厂
#[derive(Default)]
pub struct HestFactory {
    container: Option<Arc<Container>>,
    environment: Option<Arc<Environment>>,
    store: Option<Arc<MetadataStore>>,
    hooks: Option<Arc<ApplicationHooks>>,
    logging: Option<LoggingConfig>,
}

impl HestFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用外部构造的容器
    pub fn with_container(mut self, container: Arc<Container>) -> Self {
        self.container = Some(container);
        self
    }

    /// 使用指定的配置环境，缺省加载当前目录的 `application.toml` 与 `HEST_` 环境变量
    pub fn with_environment(mut self, environment: Arc<Environment>) -> Self {
        self.environment = Some(environment);
        self
    }

    pub fn with_metadata_store(mut self, store: Arc<MetadataStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// 路由注册完成后执行的钩子
    pub fn with_hooks(mut self, hooks: Arc<ApplicationHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// 在创建应用前初始化日志
    pub fn with_logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = Some(logging);
        self
    }

    /// 从根模块创建应用
    pub async fn create(self, router: Router, module: ClassRef) -> ApplicationResult<HestApplication> {
        if let Some(logging) = self.logging {
            logging.init()?;
        }

        let start = Instant::now();
        let environment = match self.environment {
            Some(environment) => environment,
            None => Arc::new(Environment::load_default()?),
        };
        let properties = ServerProperties::from_environment(&environment);
        let container = self.container.unwrap_or_default();
        let store = self.store.unwrap_or_default();
        let hooks = self.hooks.unwrap_or_default();

        tracing::info!("🚀 Starting Hest application with {}", module.name());

        container.register_instance(Token::of::<Environment>(), Arc::clone(&environment));
        container.register_instance(Token::of::<ServerProperties>(), Arc::new(properties.clone()));

        let mut scan = ModuleScan::default();
        scan.initialize_module(&store, &container, &module)?;

        let interceptors = Arc::new(InterceptorRegistry::new());
        let filters = Arc::new(ExceptionFilterRegistry::new());
        let routes = Arc::new(RouteRegistry::new());
        let explorer = RouterExplorer::new(
            Arc::clone(&store),
            Arc::clone(&container),
            Arc::clone(&interceptors),
            Arc::clone(&filters),
            Arc::clone(&routes),
            properties.body_limit,
        );
        let router = explorer.explore(router, &scan.controllers)?;

        hooks.execute(&container).await;

        tracing::info!(
            "✅ Hest application created in {}ms: {} modules, {} controllers, {} routes",
            start.elapsed().as_millis(),
            scan.modules.len(),
            scan.controllers.len(),
            routes.len()
        );

        Ok(HestApplication {
            router,
            container,
            environment,
            store,
            properties,
            interceptors,
            filters,
            routes,
        })
    }
}

/// 模块图遍历状态
#[derive(Default)]
struct ModuleScan {
    modules: HashSet<TypeId>,
    controller_ids: HashSet<TypeId>,
    controllers: Vec<ClassRef>,
}

impl ModuleScan {
    /// 注册模块及其导入；已访问过的模块直接跳过，循环导入因此终止
    fn initialize_module(
        &mut self,
        store: &MetadataStore,
        container: &Container,
        module: &ClassRef,
    ) -> ApplicationResult<()> {
        if !self.modules.insert(module.type_id()) {
            return Ok(());
        }

        let metadata = store.scan_module(module).ok_or_else(|| {
            ApplicationError::configuration(format!("Module metadata not found for {}", module.name()))
        })?;
        container.register(module, module, ProviderKind::Module)?;

        for provider in &metadata.providers {
            if !store.is_injectable(provider) {
                tracing::warn!(
                    "⚠️ Provider {} in {} is not injectable, skipping",
                    provider.name(),
                    module.name()
                );
                continue;
            }
            container.register(provider, provider, ProviderKind::Provider)?;
            container.register(Token::name(provider.name()), provider, ProviderKind::Provider)?;
        }

        for controller in &metadata.controllers {
            if !store.is_controller(controller) {
                return Err(ApplicationError::configuration(format!(
                    "Invalid controller: {}",
                    controller.name()
                )));
            }
            container.register(controller, controller, ProviderKind::Controller)?;
            if self.controller_ids.insert(controller.type_id()) {
                self.controllers.push(controller.clone());
            }
        }

        for import in &metadata.imports {
            self.initialize_module(store, container, import)?;
        }

        tracing::info!("✅ Module {} initialized", module.name());
        Ok(())
    }
}

/// 已完成路由注册的应用
pub struct HestApplication {
    router: Router,
    container: Arc<Container>,
    environment: Arc<Environment>,
    store: Arc<MetadataStore>,
    properties: ServerProperties,
    interceptors: Arc<InterceptorRegistry>,
    filters: Arc<ExceptionFilterRegistry>,
    routes: Arc<RouteRegistry>,
}

impl HestApplication {
    /// 已注册路由的 Router，不含中间件
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// 按服务器配置装配中间件后的 Router
    pub fn into_router(self) -> Router {
        let mut router = self.router;
        if self.properties.enable_request_logging {
            router = router.layer(axum::middleware::from_fn(middleware::request_logging));
        }
        if self.properties.enable_request_id {
            router = router.layer(axum::middleware::from_fn(middleware::request_id));
        }
        if self.properties.enable_cors {
            router = router.layer(middleware::cors_layer());
        }
        router
    }

    pub fn container(&self) -> &Arc<Container> {
        &self.container
    }

    pub fn environment(&self) -> &Arc<Environment> {
        &self.environment
    }

    pub fn metadata(&self) -> &Arc<MetadataStore> {
        &self.store
    }

    pub fn properties(&self) -> &ServerProperties {
        &self.properties
    }

    /// 注册全局异常过滤器，按注册顺序尝试
    pub fn use_global_filter(&self, filter: Arc<dyn ExceptionFilter>) -> &Self {
        self.filters.register(filter);
        self
    }

    pub fn use_global_filters(&self, filters: impl IntoIterator<Item = Arc<dyn ExceptionFilter>>) -> &Self {
        for filter in filters {
            self.filters.register(filter);
        }
        self
    }

    /// 注册全局拦截器，按注册顺序包裹处理器
    pub fn use_global_interceptor(&self, interceptor: Arc<dyn Interceptor>) -> &Self {
        self.interceptors.register(interceptor);
        self
    }

    pub fn use_global_interceptors(
        &self,
        interceptors: impl IntoIterator<Item = Arc<dyn Interceptor>>,
    ) -> &Self {
        for interceptor in interceptors {
            self.interceptors.register(interceptor);
        }
        self
    }

    pub fn global_filters(&self) -> &Arc<ExceptionFilterRegistry> {
        &self.filters
    }

    pub fn global_interceptors(&self) -> &Arc<InterceptorRegistry> {
        &self.interceptors
    }

    /// 已映射的路由
    pub fn routes(&self) -> Vec<RouteInfo> {
        self.routes.all()
    }

    /// 清空容器、元数据与全局注册表
    pub fn reset(&self) {
        self.container.reset();
        self.store.clear();
        self.interceptors.clear();
        self.filters.clear();
        self.routes.clear();
        tracing::debug!("Application state reset");
    }

    /// 启动 HTTP 服务器
    pub async fn listen(self) -> ApplicationResult<()> {
        let properties = self.properties.clone();
        HestServer::run(self.into_router(), &properties).await
    }
}
