//! 系统信息与健康检查

use crate::users::UserService;
use hest_web::prelude::*;
use serde_json::json;
use std::sync::Arc;

pub struct SystemController {
    environment: Arc<Environment>,
    users: Arc<UserService>,
}

impl Injectable for SystemController {
    fn create(container: &Container) -> ContainerResult<Self> {
        Ok(SystemController {
            environment: container.resolve::<Environment>()?,
            users: container.resolve::<UserService>()?,
        })
    }
}

impl Controller for SystemController {
    fn declare(def: &mut ControllerDef<'_, Self>) {
        def.get("/health", "health")
            .handler(|_, _| async move { Ok("ok") });

        def.get("/api/info", "info")
            .header(0, "user-agent")
            .handler(|this, args| async move {
                Ok(json!({
                    "name": this.environment.get_string_or("app.name", "hest-web-demo"),
                    "profiles": this.environment.active_profiles(),
                    "users": this.users.count(),
                    "userAgent": args.optional_string(0),
                }))
            });

        def.get("/api/error", "error")
            .handler(|_, _| async move {
                Err::<(), _>(anyhow::anyhow!("simulated failure").into())
            });
    }
}
