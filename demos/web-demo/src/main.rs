//! Hest Web 示例应用
//!
//! 运行：`cargo run -p web-demo`，然后访问 `http://127.0.0.1:3000/api/users`

mod advice;
mod system;
mod users;

use advice::{SanitizingFilter, StartupReport, TimingInterceptor};
use hest_web::prelude::*;
use std::sync::Arc;
use system::SystemController;
use users::UsersModule;

#[derive(Default)]
struct AppModule;

impl Module for AppModule {
    fn metadata() -> ModuleMetadata {
        ModuleMetadata::new()
            .controller(controller::<SystemController>())
            .import(ClassRef::module::<UsersModule>())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let environment = Arc::new(Environment::load_default()?);

    let hooks = Arc::new(ApplicationHooks::new());
    hooks.register(Arc::new(StartupReport));

    let app = HestFactory::new()
        .with_logging(LoggingConfig::from_environment(&environment))
        .with_environment(environment)
        .with_hooks(hooks)
        .create(Router::new(), ClassRef::module::<AppModule>())
        .await?;

    app.use_global_interceptors([
        Arc::new(LoggingInterceptor) as Arc<dyn Interceptor>,
        Arc::new(TimingInterceptor) as Arc<dyn Interceptor>,
    ]);
    app.use_global_filter(Arc::new(SanitizingFilter));

    app.listen().await?;
    Ok(())
}
