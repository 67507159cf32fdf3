// hest-core: 依赖注入容器与模块元数据
//
// 提供：
// - 单例与瞬态作用域的依赖注入容器
// - 以类型为目标的元数据存储（控制器、路由、参数、模块声明）
// - 基于 TOML 与环境变量的配置
// - 日志初始化与应用启动钩子

pub mod config;
pub mod constants;
pub mod container;
pub mod error;
pub mod hooks;
pub mod logging;
pub mod metadata;
pub mod scope;
pub mod utils;

// 重新导出常用类型
pub use config::{
    ConfigValue, Environment, EnvironmentPropertySource, MapPropertySource, PropertySource,
    TomlPropertySource,
};
pub use container::{Container, Injectable, ProviderKind, Token};
pub use error::{ApplicationError, ApplicationResult, ContainerError, ContainerResult, Result};
pub use hooks::{ApplicationHook, ApplicationHooks};
pub use logging::{LogFormat, LoggingConfig};
pub use metadata::{
    ClassRef, DeclareFn, FactoryFn, InjectableMetadata, MetadataKey, MetadataScanner,
    MetadataStore, Module, ModuleMetadata,
};
pub use scope::Scope;

// 导出 async_trait，供实现钩子时使用
pub use async_trait;

/// Prelude 模块，包含常用的 traits 和类型
pub mod prelude {
    pub use crate::config::{ConfigValue, Environment, MapPropertySource, PropertySource};
    pub use crate::container::{Container, Injectable, ProviderKind, Token};
    pub use crate::error::{ApplicationError, ApplicationResult, ContainerError, ContainerResult};
    pub use crate::hooks::{ApplicationHook, ApplicationHooks};
    pub use crate::logging::{LogFormat, LoggingConfig};
    pub use crate::metadata::{ClassRef, MetadataScanner, MetadataStore, Module, ModuleMetadata};
    pub use crate::scope::Scope;
    pub use anyhow::{anyhow, Context};
}
