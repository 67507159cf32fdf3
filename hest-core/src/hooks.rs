//! 应用启动钩子
//!
//! 路由注册完成后按注册顺序执行，可访问容器。钩子失败只记录警告，不影响启动。

use crate::container::Container;
use async_trait::async_trait;
use futures::future::BoxFuture;
use parking_lot::RwLock;
use std::sync::Arc;

/// 启动钩子
#[async_trait]
pub trait ApplicationHook: Send + Sync {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    async fn on_bootstrap(&self, container: &Container) -> anyhow::Result<()>;
}

struct FnHook<F> {
    name: String,
    hook: F,
}

#[async_trait]
impl<F> ApplicationHook for FnHook<F>
where
    F: for<'a> Fn(&'a Container) -> BoxFuture<'a, anyhow::Result<()>> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn on_bootstrap(&self, container: &Container) -> anyhow::Result<()> {
        (self.hook)(container).await
    }
}

/// 钩子注册表
#[derive(Default)]
pub struct ApplicationHooks {
    hooks: RwLock<Vec<Arc<dyn ApplicationHook>>>,
}

impl ApplicationHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, hook: Arc<dyn ApplicationHook>) {
        tracing::debug!("Registering application hook: {}", hook.name());
        self.hooks.write().push(hook);
    }

    /// 以闭包注册钩子
    pub fn register_fn<F>(&self, name: impl Into<String>, hook: F)
    where
        F: for<'a> Fn(&'a Container) -> BoxFuture<'a, anyhow::Result<()>> + Send + Sync + 'static,
    {
        self.register(Arc::new(FnHook {
            name: name.into(),
            hook,
        }));
    }

    /// 依次执行全部钩子，失败的钩子被跳过
    pub async fn execute(&self, container: &Container) {
        let hooks: Vec<_> = self.hooks.read().clone();
        for hook in hooks {
            if let Err(e) = hook.on_bootstrap(container).await {
                tracing::warn!("⚠️ Failed to execute application hook {}: {:#}", hook.name(), e);
            }
        }
    }

    pub fn clear(&self) {
        self.hooks.write().clear();
    }

    pub fn len(&self) -> usize {
        self.hooks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.read().is_empty()
    }
}
