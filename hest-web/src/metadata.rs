//! 控制器、路由与参数元数据
//!
//! 声明阶段写入 [`MetadataStore`]，由 [`ControllerScanner`] 读取。
//! 已映射的路由记录在 [`RouteRegistry`] 中。

use crate::controller::HandlerBinding;
use crate::http::HttpMethod;
use hest_core::{ClassRef, MetadataKey, MetadataStore};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// 控制器元数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerMetadata {
    /// 路径前缀，总以 `/` 开头
    pub path: String,
}

/// 路由声明
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMetadata {
    pub method: HttpMethod,
    /// 子路径，总以 `/` 开头
    pub path: String,
    pub method_name: String,
}

/// 参数来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamType {
    Body,
    Param,
    Query,
    Header,
    Request,
    Response,
    Context,
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamType::Body => "body",
            ParamType::Param => "param",
            ParamType::Query => "query",
            ParamType::Header => "header",
            ParamType::Request => "request",
            ParamType::Response => "response",
            ParamType::Context => "context",
        };
        f.write_str(name)
    }
}

/// 参数声明
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterMetadata {
    pub index: usize,
    pub param_type: ParamType,
    pub key: Option<String>,
}

/// 路径规范化：保证以 `/` 开头
pub fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

/// 控制器相关元数据的查询
pub trait ControllerScanner {
    fn scan_controller(&self, class: &ClassRef) -> Option<ControllerMetadata>;

    /// 声明顺序的路由列表
    fn scan_routes(&self, class: &ClassRef) -> Vec<RouteMetadata>;

    fn scan_parameters(&self, class: &ClassRef, method_name: &str) -> Vec<ParameterMetadata>;

    fn scan_handler(&self, class: &ClassRef, method_name: &str) -> Option<Arc<HandlerBinding>>;
}

impl ControllerScanner for MetadataStore {
    fn scan_controller(&self, class: &ClassRef) -> Option<ControllerMetadata> {
        self.declare(class);
        self.get::<ControllerMetadata>(MetadataKey::Controller, class.type_id(), None)
            .map(|meta| meta.as_ref().clone())
    }

    fn scan_routes(&self, class: &ClassRef) -> Vec<RouteMetadata> {
        self.declare(class);
        self.get_list(MetadataKey::Route, class.type_id(), None)
    }

    fn scan_parameters(&self, class: &ClassRef, method_name: &str) -> Vec<ParameterMetadata> {
        self.declare(class);
        self.get_list(MetadataKey::Param, class.type_id(), Some(method_name))
    }

    fn scan_handler(&self, class: &ClassRef, method_name: &str) -> Option<Arc<HandlerBinding>> {
        self.declare(class);
        self.get(MetadataKey::Handler, class.type_id(), Some(method_name))
    }
}

/// 已映射的路由
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteInfo {
    pub method: HttpMethod,
    /// 完整路径
    pub path: String,
    /// 处理器方法名
    pub handler: String,
    /// 控制器短名
    pub controller: String,
}

/// 路由记录表
#[derive(Debug, Default)]
pub struct RouteRegistry {
    routes: RwLock<Vec<RouteInfo>>,
}

impl RouteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, route: RouteInfo) {
        self.routes.write().push(route);
    }

    pub fn all(&self) -> Vec<RouteInfo> {
        self.routes.read().clone()
    }

    pub fn by_controller(&self, controller: &str) -> Vec<RouteInfo> {
        self.routes
            .read()
            .iter()
            .filter(|r| r.controller == controller)
            .cloned()
            .collect()
    }

    pub fn by_method(&self, method: HttpMethod) -> Vec<RouteInfo> {
        self.routes
            .read()
            .iter()
            .filter(|r| r.method == method)
            .cloned()
            .collect()
    }

    pub fn contains(&self, method: HttpMethod, path: &str) -> bool {
        self.routes
            .read()
            .iter()
            .any(|r| r.method == method && r.path == path)
    }

    pub fn clear(&self) {
        self.routes.write().clear();
    }

    pub fn len(&self) -> usize {
        self.routes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.read().is_empty()
    }
}
