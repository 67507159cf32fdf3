//! 应用级集成测试：模块初始化、路由注册与请求分发

use axum::body::{to_bytes, Body};
use axum::http::Request;
use hest_web::prelude::*;
use hest_web::metadata::RouteRegistry;
use hest_web::{ExceptionFilterRegistry, HttpMethod, InterceptorRegistry, RouterExplorer};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

// ==================== 测试用的服务与控制器 ====================

struct UserService {
    users: Vec<(u64, &'static str)>,
}

impl Injectable for UserService {
    fn create(_: &Container) -> ContainerResult<Self> {
        Ok(UserService {
            users: vec![(1, "alice"), (2, "bob")],
        })
    }
}

impl UserService {
    fn all(&self) -> Vec<Value> {
        self.users
            .iter()
            .map(|(id, name)| json!({"id": id, "name": name}))
            .collect()
    }

    fn find(&self, id: u64) -> Result<Value, HttpException> {
        self.users
            .iter()
            .find(|(user_id, _)| *user_id == id)
            .map(|(id, name)| json!({"id": id, "name": name}))
            .ok_or_else(|| HttpException::not_found(format!("User {} not found", id)))
    }
}

struct UserController {
    service: Arc<UserService>,
}

impl Injectable for UserController {
    fn create(container: &Container) -> ContainerResult<Self> {
        Ok(UserController {
            service: container.resolve::<UserService>()?,
        })
    }
}

impl Controller for UserController {
    fn declare(def: &mut ControllerDef<'_, Self>) {
        def.path("/users/");
        def.get("/", "find_all")
            .handler(|this, _| async move { Ok(this.service.all()) });
        def.get(":id", "find_one")
            .param(0, "id")
            .handler(|this, args| async move {
                let id = args.parse::<u64>(0)?;
                Ok(this.service.find(id)?)
            });
        def.post("/", "create")
            .res(1)
            .body(0)
            .handler(|_, args| async move {
                let user: Value = args.json(0)?;
                let res = args.context(1)?;
                res.set_status(StatusCode::CREATED);
                res.set_header("x-created", axum::http::HeaderValue::from_static("1"));
                Ok(user)
            });
    }
}

#[derive(Default)]
struct DebugController;

impl Injectable for DebugController {
    fn create(_: &Container) -> ContainerResult<Self> {
        Ok(DebugController)
    }
}

impl Controller for DebugController {
    fn declare(def: &mut ControllerDef<'_, Self>) {
        def.path("debug");
        def.post("echo", "echo")
            .body(0)
            .handler(|_, args| async move { Ok(json!({"body": args.json::<Value>(0)?})) });
        def.get("order", "order")
            .query(1, "b")
            .query(0, "a")
            .handler(|_, args| async move { Ok(json!([args.string(0)?, args.string(1)?])) });
        def.get("header", "header")
            .header(0, "x-name")
            .handler(|_, args| async move { Ok(args.optional_string(0)) });
        def.get("boom", "boom").handler(|_, _| async move {
            Err::<(), _>(anyhow::anyhow!("boom").into())
        });
        def.get("panic", "panic").handler(|_, _| async move {
            if true {
                panic!("kaboom");
            }
            Ok("unreachable")
        });
        def.get("count", "count").handler(|_, _| async move { Ok(42u64) });
    }
}

#[derive(Default)]
struct HealthController;

impl Injectable for HealthController {
    fn create(_: &Container) -> ContainerResult<Self> {
        Ok(HealthController)
    }
}

impl Controller for HealthController {
    fn declare(def: &mut ControllerDef<'_, Self>) {
        def.get("health", "health").handler(|_, _| async move { Ok("ok") });
    }
}

// ==================== 模块 ====================

#[derive(Default)]
struct UsersModule;

impl Module for UsersModule {
    fn metadata() -> ModuleMetadata {
        ModuleMetadata::new()
            .controller(controller::<UserController>())
            .controller(controller::<HealthController>())
            .provider(ClassRef::injectable::<UserService>())
            .import(ClassRef::module::<AppModule>())
    }
}

#[derive(Default)]
struct AppModule;

impl Module for AppModule {
    fn metadata() -> ModuleMetadata {
        ModuleMetadata::new()
            .controller(controller::<HealthController>())
            .controller(controller::<DebugController>())
            .import(ClassRef::module::<UsersModule>())
    }
}

async fn create_app() -> HestApplication {
    HestFactory::new()
        .with_environment(Arc::new(Environment::new()))
        .create(Router::new(), ClassRef::module::<AppModule>())
        .await
        .unwrap()
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Option<String>, Vec<u8>) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, content_type, body.to_vec())
}

async fn get(router: &Router, uri: &str) -> (StatusCode, Value) {
    let (status, _, body) = send(router, Request::get(uri).body(Body::empty()).unwrap()).await;
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

// ==================== 测试 ====================

#[tokio::test]
async fn test_circular_imports_register_each_controller_once() {
    let app = create_app().await;

    let routes = app.routes();
    let health: Vec<_> = routes.iter().filter(|r| r.controller == "HealthController").collect();
    assert_eq!(health.len(), 1);
    assert_eq!(health[0].path, "/health");

    let paths: Vec<_> = routes.iter().map(|r| (r.method, r.path.as_str())).collect();
    assert!(paths.contains(&(HttpMethod::Get, "/users")));
    assert!(paths.contains(&(HttpMethod::Get, "/users/:id")));
    assert!(paths.contains(&(HttpMethod::Post, "/debug/echo")));
}

#[tokio::test]
async fn test_providers_registered_by_class_and_name() {
    let app = create_app().await;
    let container = app.container();

    let by_type = container.resolve::<UserService>().unwrap();
    let by_name = container.resolve_named::<UserService>("UserService").unwrap();
    assert!(Arc::ptr_eq(&by_type, &by_name));
    assert_eq!(
        container.kind_of(&Token::of::<UserController>()),
        Some(ProviderKind::Controller)
    );
}

#[tokio::test]
async fn test_path_param_binding() {
    let router = create_app().await.router();

    let (status, body) = get(&router, "/users/2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"id": 2, "name": "bob"}));

    let (status, body) = get(&router, "/users").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn test_http_exception_is_copied_into_response() {
    let router = create_app().await.router();

    let (status, body) = get(&router, "/users/99").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["statusCode"], 404);
    assert_eq!(body["message"], "User 99 not found");
    assert_eq!(body["error"], "Not Found");
    assert_eq!(body["path"], "/users/99");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_conversion_failure_is_bad_request() {
    let router = create_app().await.router();

    let (status, body) = get(&router, "/users/abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Bad Request");
}

#[tokio::test]
async fn test_body_binding_json_and_text() {
    let router = create_app().await.router();

    let request = Request::post("/debug/echo")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"a":1}"#))
        .unwrap();
    let (status, _, body) = send(&router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_slice::<Value>(&body).unwrap(), json!({"body": {"a": 1}}));

    let request = Request::post("/debug/echo").body(Body::from("plain")).unwrap();
    let (status, _, body) = send(&router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_slice::<Value>(&body).unwrap(), json!({"body": "plain"}));
}

#[tokio::test]
async fn test_arguments_follow_declared_indices() {
    let router = create_app().await.router();

    let (status, body) = get(&router, "/debug/order?b=second&a=first").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!(["first", "second"]));
}

#[tokio::test]
async fn test_result_serialization() {
    let router = create_app().await.router();

    let (status, content_type, body) =
        send(&router, Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(content_type.unwrap().starts_with("text/plain"));
    assert_eq!(body, b"ok");

    let (_, body) = get(&router, "/debug/count").await;
    assert_eq!(body, json!({"data": 42}));

    let (_, body) = get(&router, "/debug/header").await;
    assert_eq!(body, json!({"data": null}));
}

#[tokio::test]
async fn test_non_ascii_header_is_decoded() {
    let router = create_app().await.router();

    let request = Request::get("/debug/header")
        .header("x-name", axum::http::HeaderValue::from_bytes(b"caf\xc3\xa9").unwrap())
        .header("x-other", axum::http::HeaderValue::from_bytes(b"\xff").unwrap())
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&router, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(String::from_utf8(body).unwrap(), "café");
}

#[tokio::test]
async fn test_body_over_limit_is_binding_error() {
    let environment = Environment::new();
    environment.add_property_source(Box::new(
        MapPropertySource::new("test").with("server.body-limit", "8"),
    ));
    let router = HestFactory::new()
        .with_environment(Arc::new(environment))
        .create(Router::new(), ClassRef::module::<AppModule>())
        .await
        .unwrap()
        .router();

    let request = Request::post("/debug/echo")
        .body(Body::from(r#"{"name":"a long enough body"}"#))
        .unwrap();
    let (status, _, body) = send(&router, request).await;
    let body: Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["statusCode"], 500);
    assert!(body.get("error").is_none());
    assert!(body["message"]
        .as_str()
        .unwrap()
        .starts_with("Parameter resolution failed: parameter 0 (body)"));
    assert!(body["stack"].is_string());
}

#[tokio::test]
async fn test_response_state_is_applied() {
    let router = create_app().await.router();

    let request = Request::post("/users")
        .body(Body::from(r#"{"name":"carol"}"#))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(response.headers()["x-created"], "1");
}

#[tokio::test]
async fn test_unrecognized_error_yields_500() {
    let router = create_app().await.router();

    let (status, body) = get(&router, "/debug/boom").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["statusCode"], 500);
    assert_eq!(body["message"], "boom");
    assert_eq!(body["path"], "/debug/boom");
    assert!(body["stack"].is_string());
    let timestamp = body["timestamp"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());
}

#[tokio::test]
async fn test_panic_is_converted_to_500() {
    let router = create_app().await.router();

    let (status, body) = get(&router, "/debug/panic").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "kaboom");
}

struct Recorder {
    name: &'static str,
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Interceptor for Recorder {
    async fn intercept(&self, context: &ExecutionContext, next: CallHandler<'_>) -> HandlerReturn {
        self.log
            .lock()
            .push(format!("{}-before:{}", self.name, context.get_handler()));
        let result = next.handle().await;
        self.log.lock().push(format!("{}-after", self.name));
        result
    }
}

#[tokio::test]
async fn test_interceptors_wrap_in_onion_order() {
    let app = create_app().await;
    let log = Arc::new(Mutex::new(Vec::new()));
    for name in ["A", "B"] {
        app.use_global_interceptor(Arc::new(Recorder {
            name,
            log: Arc::clone(&log),
        }));
    }

    let (status, _) = get(&app.router(), "/users/1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        *log.lock(),
        vec!["A-before:find_one", "B-before:find_one", "B-after", "A-after"]
    );
}

#[tokio::test]
async fn test_response_interceptor_envelope() {
    let app = create_app().await;
    app.use_global_interceptor(Arc::new(ResponseInterceptor));

    let (_, body) = get(&app.router(), "/users/1").await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"], json!({"id": 1, "name": "alice"}));
}

struct FailingFilter;

#[async_trait]
impl ExceptionFilter for FailingFilter {
    async fn catch(&self, _: &WebError, _: &ArgumentsHost) -> anyhow::Result<Response> {
        anyhow::bail!("filter failed")
    }
}

struct TeapotFilter;

#[async_trait]
impl ExceptionFilter for TeapotFilter {
    async fn catch(&self, error: &WebError, _: &ArgumentsHost) -> anyhow::Result<Response> {
        Ok((StatusCode::IM_A_TEAPOT, error.to_string()).into_response())
    }
}

#[tokio::test]
async fn test_failing_filter_falls_through_to_next() {
    let app = create_app().await;
    app.use_global_filters([
        Arc::new(FailingFilter) as Arc<dyn ExceptionFilter>,
        Arc::new(TeapotFilter) as Arc<dyn ExceptionFilter>,
    ]);

    let (status, _, body) = send(
        &app.router(),
        Request::get("/debug/boom").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::IM_A_TEAPOT);
    assert_eq!(body, b"boom");
}

// ==================== 配置错误 ====================

#[derive(Default)]
struct NotAModule;

#[tokio::test]
async fn test_missing_module_metadata_is_configuration_error() {
    let result = HestFactory::new()
        .with_environment(Arc::new(Environment::new()))
        .create(Router::new(), ClassRef::of::<NotAModule>())
        .await;

    let Err(ApplicationError::Configuration(message)) = result else {
        panic!("expected configuration error");
    };
    assert_eq!(message, "Module metadata not found for NotAModule");
}

#[derive(Default)]
struct InvalidControllerModule;

impl Module for InvalidControllerModule {
    fn metadata() -> ModuleMetadata {
        ModuleMetadata::new().controller(ClassRef::injectable::<UserService>())
    }
}

#[tokio::test]
async fn test_invalid_controller_is_configuration_error() {
    let result = HestFactory::new()
        .with_environment(Arc::new(Environment::new()))
        .create(Router::new(), ClassRef::module::<InvalidControllerModule>())
        .await;

    let Err(ApplicationError::Configuration(message)) = result else {
        panic!("expected configuration error");
    };
    assert_eq!(message, "Invalid controller: UserService");
}

#[test]
fn test_missing_controller_metadata_is_configuration_error() {
    let explorer = RouterExplorer::new(
        Arc::new(MetadataStore::new()),
        Arc::new(Container::new()),
        Arc::new(InterceptorRegistry::new()),
        Arc::new(ExceptionFilterRegistry::new()),
        Arc::new(RouteRegistry::new()),
        1024,
    );

    let Err(ApplicationError::Configuration(message)) =
        explorer.explore(Router::new(), &[ClassRef::injectable::<UserService>()])
    else {
        panic!("expected configuration error");
    };
    assert_eq!(message, "Controller metadata not found for UserService");
}

#[derive(Default)]
struct ShadowController;

impl Injectable for ShadowController {
    fn create(_: &Container) -> ContainerResult<Self> {
        Ok(ShadowController)
    }
}

#[derive(Default)]
struct ProvidedControllerModule;

impl Module for ProvidedControllerModule {
    fn metadata() -> ModuleMetadata {
        ModuleMetadata::new()
            .provider(ClassRef::injectable::<HealthController>())
            .controller(controller::<HealthController>())
    }
}

#[tokio::test]
async fn test_controller_also_listed_as_provider() {
    let app = HestFactory::new()
        .with_environment(Arc::new(Environment::new()))
        .create(Router::new(), ClassRef::module::<ProvidedControllerModule>())
        .await
        .unwrap();

    assert_eq!(app.routes().len(), 1);
    let (status, _, body) = send(
        &app.router(),
        Request::get("/health").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"ok");
}

impl Controller for ShadowController {
    fn declare(def: &mut ControllerDef<'_, Self>) {
        def.get("/health", "health").handler(|_, _| async move { Ok("shadow") });
    }
}

#[derive(Default)]
struct DuplicateRouteModule;

impl Module for DuplicateRouteModule {
    fn metadata() -> ModuleMetadata {
        ModuleMetadata::new()
            .controller(controller::<HealthController>())
            .controller(controller::<ShadowController>())
    }
}

#[tokio::test]
async fn test_duplicate_route_is_configuration_error() {
    let result = HestFactory::new()
        .with_environment(Arc::new(Environment::new()))
        .create(Router::new(), ClassRef::module::<DuplicateRouteModule>())
        .await;

    let Err(ApplicationError::Configuration(message)) = result else {
        panic!("expected configuration error");
    };
    assert!(message.starts_with("Duplicate route GET /health"));
}

#[tokio::test]
async fn test_reset_clears_registries() {
    let app = create_app().await;
    app.use_global_interceptor(Arc::new(LoggingInterceptor));
    app.use_global_filter(Arc::new(HttpExceptionFilter));

    app.reset();
    assert!(app.routes().is_empty());
    assert!(app.global_interceptors().is_empty());
    assert!(app.global_filters().is_empty());
    assert!(!app.container().is_registered(&Token::of::<UserService>()));
}
