//! 用户模块：模型、服务与控制器

use hest_web::prelude::*;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use thiserror::Error;

// ==================== 数据模型 ====================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: u32,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

// ==================== 业务错误 ====================

#[derive(Error, Debug)]
pub enum UserError {
    #[error("User {0} not found")]
    NotFound(u32),

    #[error("Email {0} is already registered")]
    EmailTaken(String),
}

impl From<UserError> for WebError {
    fn from(error: UserError) -> Self {
        let exception = match &error {
            UserError::NotFound(_) => HttpException::not_found(error.to_string()),
            UserError::EmailTaken(_) => {
                HttpException::conflict(error.to_string()).with_error("Duplicate Email")
            }
        };
        WebError::Http(exception)
    }
}

// ==================== 服务层 ====================

pub struct UserService {
    users: RwLock<Vec<User>>,
    next_id: AtomicU32,
}

impl Injectable for UserService {
    fn create(_: &Container) -> ContainerResult<Self> {
        Ok(UserService {
            users: RwLock::new(vec![
                User {
                    id: 1,
                    name: "Alice".to_string(),
                    email: "alice@example.com".to_string(),
                },
                User {
                    id: 2,
                    name: "Bob".to_string(),
                    email: "bob@example.com".to_string(),
                },
            ]),
            next_id: AtomicU32::new(3),
        })
    }
}

impl UserService {
    pub fn list(&self, name: Option<&str>) -> Vec<User> {
        self.users
            .read()
            .iter()
            .filter(|u| name.map_or(true, |name| u.name.contains(name)))
            .cloned()
            .collect()
    }

    pub fn find(&self, id: u32) -> Result<User, UserError> {
        self.users
            .read()
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .ok_or(UserError::NotFound(id))
    }

    pub fn create(&self, request: CreateUserRequest) -> Result<User, UserError> {
        let mut users = self.users.write();
        if users.iter().any(|u| u.email == request.email) {
            return Err(UserError::EmailTaken(request.email));
        }
        let user = User {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            name: request.name,
            email: request.email,
        };
        users.push(user.clone());
        Ok(user)
    }

    pub fn update(&self, id: u32, request: UpdateUserRequest) -> Result<User, UserError> {
        let mut users = self.users.write();
        let user = users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(UserError::NotFound(id))?;
        if let Some(name) = request.name {
            user.name = name;
        }
        if let Some(email) = request.email {
            user.email = email;
        }
        Ok(user.clone())
    }

    pub fn delete(&self, id: u32) -> Result<(), UserError> {
        let mut users = self.users.write();
        let before = users.len();
        users.retain(|u| u.id != id);
        if users.len() == before {
            return Err(UserError::NotFound(id));
        }
        Ok(())
    }

    pub fn count(&self) -> usize {
        self.users.read().len()
    }
}

// ==================== 控制器 ====================

pub struct UserController {
    users: Arc<UserService>,
}

impl Injectable for UserController {
    fn create(container: &Container) -> ContainerResult<Self> {
        Ok(UserController {
            users: container.resolve::<UserService>()?,
        })
    }
}

impl Controller for UserController {
    fn declare(def: &mut ControllerDef<'_, Self>) {
        def.path("/api/users");

        def.get("/", "find_all")
            .query(0, "name")
            .handler(|this, args| async move {
                Ok(this.users.list(args.optional_string(0).as_deref()))
            });

        def.get("/:id", "find_one")
            .param(0, "id")
            .handler(|this, args| async move {
                let id = args.parse::<u32>(0)?;
                Ok(Json(this.users.find(id)?))
            });

        def.post("/", "create")
            .body(0)
            .handler(|this, args| async move {
                let request: CreateUserRequest = args.json(0)?;
                Ok(ResponseEntity::created(this.users.create(request)?))
            });

        def.put("/:id", "update")
            .param(0, "id")
            .body(1)
            .handler(|this, args| async move {
                let id = args.parse::<u32>(0)?;
                let request: UpdateUserRequest = args.json(1)?;
                Ok(Json(this.users.update(id, request)?))
            });

        def.delete("/:id", "remove")
            .param(0, "id")
            .handler(|this, args| async move {
                this.users.delete(args.parse::<u32>(0)?)?;
                Ok(ResponseEntity::no_content())
            });
    }
}

#[derive(Default)]
pub struct UsersModule;

impl Module for UsersModule {
    fn metadata() -> ModuleMetadata {
        ModuleMetadata::new()
            .controller(controller::<UserController>())
            .provider(ClassRef::injectable::<UserService>())
            .export(ClassRef::injectable::<UserService>())
    }
}
