//! 依赖注入容器
//!
//! 按 [`Token`] 注册提供者，解析时按作用域返回单例或新实例。
//! 工厂函数执行期间不持有任何锁；构造链上的循环依赖通过线程本地的解析栈检测。

use crate::error::{ContainerError, ContainerResult};
use crate::metadata::ClassRef;
use crate::Scope;
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// 可由容器构造的类型
///
/// `create` 通过容器解析自身的依赖（构造函数注入）。
pub trait Injectable: Any + Send + Sync + Sized {
    fn scope() -> Scope {
        Scope::Singleton
    }

    fn create(container: &Container) -> ContainerResult<Self>;
}

/// 注入令牌：类型标识或字符串名称
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Token {
    Class(TypeId, &'static str),
    Name(String),
}

impl Token {
    pub fn of<T: Any>() -> Self {
        Token::Class(TypeId::of::<T>(), std::any::type_name::<T>())
    }

    pub fn name(name: impl Into<String>) -> Self {
        Token::Name(name.into())
    }

    pub fn from_class(class: &ClassRef) -> Self {
        Token::Class(class.type_id(), class.type_name())
    }
}

impl From<&ClassRef> for Token {
    fn from(class: &ClassRef) -> Self {
        Token::from_class(class)
    }
}

impl From<&str> for Token {
    fn from(name: &str) -> Self {
        Token::Name(name.to_string())
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Class(_, type_name) => f.write_str(type_name),
            Token::Name(name) => f.write_str(name),
        }
    }
}

/// 提供者的角色
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Module,
    Provider,
    Controller,
}

type Instance = Arc<dyn Any + Send + Sync>;

type Factory = Arc<dyn Fn(&Container) -> ContainerResult<Instance> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum InstanceKey {
    Type(TypeId),
    Token(Token),
}

enum ProviderSource {
    Factory(Factory),
    Instance(Instance),
}

struct Provider {
    name: String,
    scope: Scope,
    kind: ProviderKind,
    key: InstanceKey,
    source: ProviderSource,
}

thread_local! {
    static RESOLUTION_STACK: RefCell<Vec<InstanceKey>> = const { RefCell::new(Vec::new()) };
    static RESOLUTION_NAMES: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

/// 解析栈守卫，离开作用域时出栈
struct ResolutionGuard;

impl ResolutionGuard {
    fn enter(key: &InstanceKey, name: &str) -> ContainerResult<Self> {
        let on_stack = RESOLUTION_STACK.with(|stack| stack.borrow().contains(key));
        if on_stack {
            let mut chain = RESOLUTION_NAMES.with(|names| names.borrow().clone());
            chain.push(name.to_string());
            return Err(ContainerError::CircularDependency(chain));
        }
        RESOLUTION_STACK.with(|stack| stack.borrow_mut().push(key.clone()));
        RESOLUTION_NAMES.with(|names| names.borrow_mut().push(name.to_string()));
        Ok(ResolutionGuard)
    }
}

impl Drop for ResolutionGuard {
    fn drop(&mut self) {
        RESOLUTION_STACK.with(|stack| stack.borrow_mut().pop());
        RESOLUTION_NAMES.with(|names| names.borrow_mut().pop());
    }
}

/// 依赖注入容器
#[derive(Default)]
pub struct Container {
    providers: RwLock<HashMap<Token, Arc<Provider>>>,
    instances: RwLock<HashMap<InstanceKey, Instance>>,
    parent: Option<Arc<Container>>,
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("providers", &self.providers.read().len())
            .field("instances", &self.instances.read().len())
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册类提供者，作用域取自类的声明
    ///
    /// 同一令牌重复注册时覆盖旧的提供者。类令牌与名称令牌指向同一个类时共享单例。
    pub fn register(
        &self,
        token: impl Into<Token>,
        class: &ClassRef,
        kind: ProviderKind,
    ) -> ContainerResult<()> {
        let factory = class
            .factory()
            .ok_or_else(|| ContainerError::NotInjectable(class.name().to_string()))?;

        self.insert_provider(
            token.into(),
            Provider {
                name: class.name().to_string(),
                scope: class.scope(),
                kind,
                key: InstanceKey::Type(class.type_id()),
                source: ProviderSource::Factory(Arc::new(factory)),
            },
        );
        Ok(())
    }

    /// 注册工厂闭包
    pub fn register_factory<T, F>(&self, token: impl Into<Token>, scope: Scope, factory: F)
    where
        T: Any + Send + Sync,
        F: Fn(&Container) -> ContainerResult<T> + Send + Sync + 'static,
    {
        let token = token.into();
        let factory: Factory = Arc::new(move |container: &Container| {
            let instance: Instance = Arc::new(factory(container)?);
            Ok(instance)
        });
        self.insert_provider(
            token.clone(),
            Provider {
                name: token.to_string(),
                scope,
                kind: ProviderKind::Provider,
                key: InstanceKey::Token(token),
                source: ProviderSource::Factory(factory),
            },
        );
    }

    /// 注册现成的实例
    pub fn register_instance<T: Any + Send + Sync>(&self, token: impl Into<Token>, instance: Arc<T>) {
        let token = token.into();
        self.insert_provider(
            token.clone(),
            Provider {
                name: token.to_string(),
                scope: Scope::Singleton,
                kind: ProviderKind::Provider,
                key: InstanceKey::Token(token),
                source: ProviderSource::Instance(instance),
            },
        );
    }

    fn insert_provider(&self, token: Token, provider: Provider) {
        tracing::debug!(
            "Registering {:?} '{}' ({})",
            provider.kind,
            provider.name,
            provider.scope
        );
        if let Some(previous) = self.providers.write().insert(token, Arc::new(provider)) {
            tracing::debug!("Provider '{}' was overridden", previous.name);
        }
    }

    fn lookup(&self, token: &Token) -> Option<Arc<Provider>> {
        if let Some(provider) = self.providers.read().get(token).cloned() {
            return Some(provider);
        }
        self.parent.as_ref().and_then(|parent| parent.lookup(token))
    }

    /// 按令牌解析实例
    ///
    /// 父容器中注册的提供者由父容器构造并缓存。
    pub fn resolve_token(&self, token: &Token) -> ContainerResult<Instance> {
        let local = self.providers.read().get(token).cloned();
        let provider = match (local, &self.parent) {
            (Some(provider), _) => provider,
            (None, Some(parent)) => return parent.resolve_token(token),
            (None, None) => return Err(ContainerError::NotRegistered(token.to_string())),
        };

        let factory = match &provider.source {
            ProviderSource::Instance(instance) => return Ok(Arc::clone(instance)),
            ProviderSource::Factory(factory) => Arc::clone(factory),
        };

        if provider.scope == Scope::Singleton {
            if let Some(instance) = self.instances.read().get(&provider.key) {
                return Ok(Arc::clone(instance));
            }
        }

        let instance = {
            let _guard = ResolutionGuard::enter(&provider.key, &provider.name)?;
            factory(self)?
        };

        match provider.scope {
            Scope::Singleton => {
                // 并发构造时保留先写入的实例
                let mut instances = self.instances.write();
                let stored = instances
                    .entry(provider.key.clone())
                    .or_insert(instance);
                Ok(Arc::clone(stored))
            }
            Scope::Transient => Ok(instance),
        }
    }

    /// 按类型解析
    pub fn resolve<T: Any + Send + Sync>(&self) -> ContainerResult<Arc<T>> {
        self.resolve_as(&Token::of::<T>())
    }

    /// 按名称解析
    pub fn resolve_named<T: Any + Send + Sync>(&self, name: &str) -> ContainerResult<Arc<T>> {
        self.resolve_as(&Token::name(name))
    }

    /// 按令牌解析并转换为具体类型
    pub fn resolve_as<T: Any + Send + Sync>(&self, token: &Token) -> ContainerResult<Arc<T>> {
        self.resolve_token(token)?
            .downcast::<T>()
            .map_err(|_| ContainerError::TypeMismatch {
                token: token.to_string(),
                expected: std::any::type_name::<T>().to_string(),
            })
    }

    pub fn is_registered(&self, token: &Token) -> bool {
        self.lookup(token).is_some()
    }

    pub fn kind_of(&self, token: &Token) -> Option<ProviderKind> {
        self.lookup(token).map(|provider| provider.kind)
    }

    /// 当前容器（不含父容器）中的令牌
    pub fn tokens(&self) -> Vec<Token> {
        self.providers.read().keys().cloned().collect()
    }

    /// 清空已缓存的单例，保留注册信息
    pub fn clear(&self) {
        self.instances.write().clear();
    }

    /// 清空注册信息与实例
    pub fn reset(&self) {
        self.providers.write().clear();
        self.instances.write().clear();
    }

    /// 创建子容器：查找不到的令牌委托给父容器
    pub fn create_child(self: &Arc<Self>) -> Container {
        Container {
            providers: RwLock::new(HashMap::new()),
            instances: RwLock::new(HashMap::new()),
            parent: Some(Arc::clone(self)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static CONFIG_CREATED: AtomicUsize = AtomicUsize::new(0);

    struct AppConfig;

    impl Injectable for AppConfig {
        fn create(_: &Container) -> ContainerResult<Self> {
            CONFIG_CREATED.fetch_add(1, Ordering::SeqCst);
            Ok(AppConfig)
        }
    }

    struct UserRepository;

    impl Injectable for UserRepository {
        fn create(_: &Container) -> ContainerResult<Self> {
            Ok(UserRepository)
        }
    }

    struct UserService {
        repository: Arc<UserRepository>,
    }

    impl Injectable for UserService {
        fn create(container: &Container) -> ContainerResult<Self> {
            Ok(UserService {
                repository: container.resolve()?,
            })
        }
    }

    struct RequestCounter;

    impl Injectable for RequestCounter {
        fn scope() -> Scope {
            Scope::Transient
        }

        fn create(_: &Container) -> ContainerResult<Self> {
            Ok(RequestCounter)
        }
    }

    struct Chicken;
    struct Egg;

    impl Injectable for Chicken {
        fn create(container: &Container) -> ContainerResult<Self> {
            container.resolve::<Egg>()?;
            Ok(Chicken)
        }
    }

    impl Injectable for Egg {
        fn create(container: &Container) -> ContainerResult<Self> {
            container.resolve::<Chicken>()?;
            Ok(Egg)
        }
    }

    #[test]
    fn test_singleton_shared_between_class_and_name_tokens() {
        let container = Container::new();
        let class = ClassRef::injectable::<AppConfig>();

        container
            .register(&class, &class, ProviderKind::Provider)
            .unwrap();
        container
            .register("AppConfig", &class, ProviderKind::Provider)
            .unwrap();

        let a = container.resolve::<AppConfig>().unwrap();
        let b = container.resolve_named::<AppConfig>("AppConfig").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(CONFIG_CREATED.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_constructor_injection() {
        let container = Container::new();
        for class in [
            ClassRef::injectable::<UserRepository>(),
            ClassRef::injectable::<UserService>(),
        ] {
            container
                .register(&class, &class, ProviderKind::Provider)
                .unwrap();
        }

        let service = container.resolve::<UserService>().unwrap();
        let repository = container.resolve::<UserRepository>().unwrap();
        assert!(Arc::ptr_eq(&service.repository, &repository));
    }

    #[test]
    fn test_transient_creates_new_instances() {
        let container = Container::new();
        let class = ClassRef::injectable::<RequestCounter>();
        container
            .register(&class, &class, ProviderKind::Provider)
            .unwrap();

        let a = container.resolve::<RequestCounter>().unwrap();
        let b = container.resolve::<RequestCounter>().unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_circular_dependency_detected() {
        let container = Container::new();
        for class in [ClassRef::injectable::<Chicken>(), ClassRef::injectable::<Egg>()] {
            container
                .register(&class, &class, ProviderKind::Provider)
                .unwrap();
        }

        match container.resolve::<Chicken>() {
            Err(ContainerError::CircularDependency(chain)) => {
                assert_eq!(chain, vec!["Chicken", "Egg", "Chicken"]);
            }
            other => panic!("expected circular dependency, got {:?}", other.err()),
        }
        // 失败后解析栈已清空
        assert!(matches!(
            container.resolve::<Egg>(),
            Err(ContainerError::CircularDependency(_))
        ));
    }

    #[test]
    fn test_not_registered_and_not_injectable() {
        let container = Container::new();
        assert!(matches!(
            container.resolve::<UserService>(),
            Err(ContainerError::NotRegistered(_))
        ));

        let plain = ClassRef::of::<String>();
        assert!(matches!(
            container.register(&plain, &plain, ProviderKind::Provider),
            Err(ContainerError::NotInjectable(_))
        ));
    }

    #[test]
    fn test_register_instance_and_type_mismatch() {
        let container = Container::new();
        container.register_instance("greeting", Arc::new("hello".to_string()));

        let greeting = container.resolve_named::<String>("greeting").unwrap();
        assert_eq!(greeting.as_str(), "hello");
        assert!(matches!(
            container.resolve_named::<u32>("greeting"),
            Err(ContainerError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_register_factory_with_scope() {
        let container = Container::new();
        container.register_factory("port", Scope::Singleton, |_| Ok(8080u16));

        assert_eq!(*container.resolve_named::<u16>("port").unwrap(), 8080);
        assert!(container.is_registered(&Token::name("port")));
        assert_eq!(
            container.kind_of(&Token::name("port")),
            Some(ProviderKind::Provider)
        );
    }

    #[test]
    fn test_clear_and_reset() {
        let container = Container::new();
        let class = ClassRef::injectable::<UserRepository>();
        container
            .register(&class, &class, ProviderKind::Provider)
            .unwrap();

        let first = container.resolve::<UserRepository>().unwrap();
        container.clear();
        let second = container.resolve::<UserRepository>().unwrap();
        assert!(!Arc::ptr_eq(&first, &second));

        container.reset();
        assert!(!container.is_registered(&Token::of::<UserRepository>()));
    }

    #[test]
    fn test_child_container_delegates_to_parent() {
        let parent = Arc::new(Container::new());
        let class = ClassRef::injectable::<UserRepository>();
        parent
            .register(&class, &class, ProviderKind::Provider)
            .unwrap();

        let child = parent.create_child();
        assert!(child.is_registered(&Token::of::<UserRepository>()));
        assert!(child.tokens().is_empty());

        let from_child = child.resolve::<UserRepository>().unwrap();
        let from_parent = parent.resolve::<UserRepository>().unwrap();
        assert!(Arc::ptr_eq(&from_child, &from_parent));
    }
}
