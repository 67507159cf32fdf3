//! 元数据存储
//!
//! 以 `(键, 目标类型, 成员名)` 为索引保存声明期写入的元数据。
//! 类通过 [`ClassRef`] 引用：它携带类型标识、显示名称、
//! 可选的声明函数（首次扫描时写入元数据）以及可选的工厂函数（供容器构造实例）。

use crate::container::{Container, Injectable};
use crate::error::ContainerResult;
use crate::utils::naming::short_type_name;
use crate::Scope;
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// 元数据键
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataKey {
    Controller,
    Injectable,
    Module,
    Route,
    Param,
    Handler,
}

/// 声明函数：把一个类的元数据写入存储
pub type DeclareFn = fn(&MetadataStore);

/// 工厂函数：由容器调用以构造实例
pub type FactoryFn = fn(&Container) -> ContainerResult<Arc<dyn Any + Send + Sync>>;

type EntryKey = (MetadataKey, TypeId, Option<String>);

/// 对类的引用
#[derive(Clone)]
pub struct ClassRef {
    type_id: TypeId,
    type_name: &'static str,
    name: String,
    scope: Scope,
    declare: Option<DeclareFn>,
    factory: Option<FactoryFn>,
}

impl ClassRef {
    /// 不带任何声明的普通类型引用
    pub fn of<T: Any>() -> Self {
        let type_name = std::any::type_name::<T>();
        Self {
            type_id: TypeId::of::<T>(),
            type_name,
            name: short_type_name(type_name),
            scope: Scope::default(),
            declare: None,
            factory: None,
        }
    }

    /// 可注入类型：声明 injectable 元数据并携带工厂函数
    pub fn injectable<T: Injectable>() -> Self {
        let mut class = Self::of::<T>();
        class.scope = T::scope();
        class.declare = Some(declare_injectable::<T>);
        class.factory = Some(create_injectable::<T>);
        class
    }

    /// 模块类型
    pub fn module<M: Module>() -> Self {
        let mut class = Self::of::<M>();
        class.declare = Some(declare_module::<M>);
        class.factory = Some(create_module::<M>);
        class
    }

    /// 替换声明函数
    pub fn with_declare(mut self, declare: DeclareFn) -> Self {
        self.declare = Some(declare);
        self
    }

    /// 替换工厂函数
    pub fn with_factory(mut self, factory: FactoryFn) -> Self {
        self.factory = Some(factory);
        self
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// 类型短名，例如 `UserService`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 完整类型路径
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn factory(&self) -> Option<FactoryFn> {
        self.factory
    }

    pub fn is<T: Any>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }
}

impl PartialEq for ClassRef {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ClassRef {}

impl std::hash::Hash for ClassRef {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for ClassRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassRef")
            .field("name", &self.name)
            .field("scope", &self.scope)
            .finish()
    }
}

impl fmt::Display for ClassRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// 可注入元数据
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InjectableMetadata {
    pub scope: Scope,
}

/// 模块元数据
#[derive(Debug, Clone, Default)]
pub struct ModuleMetadata {
    pub controllers: Vec<ClassRef>,
    pub providers: Vec<ClassRef>,
    pub imports: Vec<ClassRef>,
    pub exports: Vec<ClassRef>,
}

impl ModuleMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn controller(mut self, class: ClassRef) -> Self {
        self.controllers.push(class);
        self
    }

    pub fn provider(mut self, class: ClassRef) -> Self {
        self.providers.push(class);
        self
    }

    pub fn import(mut self, class: ClassRef) -> Self {
        self.imports.push(class);
        self
    }

    pub fn export(mut self, class: ClassRef) -> Self {
        self.exports.push(class);
        self
    }
}

/// 模块：描述控制器、提供者与导入关系
pub trait Module: Default + Send + Sync + 'static {
    fn metadata() -> ModuleMetadata;
}

fn declare_injectable<T: Injectable>(store: &MetadataStore) {
    store.define_class::<T, _>(
        MetadataKey::Injectable,
        InjectableMetadata { scope: T::scope() },
    );
}

fn create_injectable<T: Injectable>(
    container: &Container,
) -> ContainerResult<Arc<dyn Any + Send + Sync>> {
    let instance = T::create(container)?;
    Ok(Arc::new(instance))
}

fn declare_module<M: Module>(store: &MetadataStore) {
    store.define_class::<M, _>(MetadataKey::Module, M::metadata());
}

fn create_module<M: Module>(_: &Container) -> ContainerResult<Arc<dyn Any + Send + Sync>> {
    Ok(Arc::new(M::default()))
}

/// 元数据存储（Reflector）
#[derive(Default)]
pub struct MetadataStore {
    entries: RwLock<HashMap<EntryKey, Arc<dyn Any + Send + Sync>>>,
    declared: RwLock<HashSet<(TypeId, usize)>>,
}

impl fmt::Debug for MetadataStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataStore")
            .field("entries", &self.entries.read().len())
            .field("declared", &self.declared.read().len())
            .finish()
    }
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 运行类的声明函数，同一类型的同一声明函数只运行一次
    ///
    /// 同一类型可能先以提供者、再以控制器的身份被扫描，两者的声明函数不同，各自运行。
    pub fn declare(&self, class: &ClassRef) {
        let Some(declare) = class.declare else {
            return;
        };
        if !self.declared.write().insert((class.type_id, declare as usize)) {
            return;
        }
        tracing::trace!("Declaring metadata for {}", class.name);
        declare(self);
    }

    pub fn is_declared(&self, class: &ClassRef) -> bool {
        class
            .declare
            .is_some_and(|declare| self.declared.read().contains(&(class.type_id, declare as usize)))
    }

    /// 写入元数据，覆盖已有值
    pub fn define<V: Any + Send + Sync>(
        &self,
        key: MetadataKey,
        target: TypeId,
        member: Option<&str>,
        value: V,
    ) {
        self.entries
            .write()
            .insert((key, target, member.map(String::from)), Arc::new(value));
    }

    /// 写入类级别元数据
    pub fn define_class<T: Any, V: Any + Send + Sync>(&self, key: MetadataKey, value: V) {
        self.define(key, TypeId::of::<T>(), None, value);
    }

    pub fn get<V: Any + Send + Sync>(
        &self,
        key: MetadataKey,
        target: TypeId,
        member: Option<&str>,
    ) -> Option<Arc<V>> {
        let entry = self
            .entries
            .read()
            .get(&(key, target, member.map(String::from)))
            .cloned()?;
        entry.downcast::<V>().ok()
    }

    pub fn has(&self, key: MetadataKey, target: TypeId, member: Option<&str>) -> bool {
        self.entries
            .read()
            .contains_key(&(key, target, member.map(String::from)))
    }

    pub fn delete(&self, key: MetadataKey, target: TypeId, member: Option<&str>) -> bool {
        self.entries
            .write()
            .remove(&(key, target, member.map(String::from)))
            .is_some()
    }

    /// 向列表型元数据追加一项，保持声明顺序
    pub fn push<V: Any + Send + Sync + Clone>(
        &self,
        key: MetadataKey,
        target: TypeId,
        member: Option<&str>,
        value: V,
    ) {
        let entry_key = (key, target, member.map(String::from));
        let mut entries = self.entries.write();
        let mut list = entries
            .get(&entry_key)
            .and_then(|existing| existing.downcast_ref::<Vec<V>>())
            .cloned()
            .unwrap_or_default();
        list.push(value);
        entries.insert(entry_key, Arc::new(list));
    }

    /// 读取列表型元数据，不存在时返回空列表
    pub fn get_list<V: Any + Send + Sync + Clone>(
        &self,
        key: MetadataKey,
        target: TypeId,
        member: Option<&str>,
    ) -> Vec<V> {
        self.get::<Vec<V>>(key, target, member)
            .map(|list| list.as_ref().clone())
            .unwrap_or_default()
    }

    /// 目标类型上的全部元数据键
    pub fn keys(&self, target: TypeId) -> Vec<(MetadataKey, Option<String>)> {
        self.entries
            .read()
            .keys()
            .filter(|(_, t, _)| *t == target)
            .map(|(key, _, member)| (*key, member.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
        self.declared.write().clear();
    }
}

/// 类级别元数据的查询
pub trait MetadataScanner {
    fn scan_module(&self, class: &ClassRef) -> Option<Arc<ModuleMetadata>>;

    fn scan_injectable(&self, class: &ClassRef) -> Option<InjectableMetadata>;

    fn is_module(&self, class: &ClassRef) -> bool {
        self.scan_module(class).is_some()
    }

    fn is_injectable(&self, class: &ClassRef) -> bool {
        self.scan_injectable(class).is_some()
    }

    /// 是否带有控制器元数据
    fn is_controller(&self, class: &ClassRef) -> bool;
}

impl MetadataScanner for MetadataStore {
    fn scan_module(&self, class: &ClassRef) -> Option<Arc<ModuleMetadata>> {
        self.declare(class);
        self.get(MetadataKey::Module, class.type_id(), None)
    }

    fn scan_injectable(&self, class: &ClassRef) -> Option<InjectableMetadata> {
        self.declare(class);
        self.get::<InjectableMetadata>(MetadataKey::Injectable, class.type_id(), None)
            .map(|meta| *meta)
    }

    fn is_controller(&self, class: &ClassRef) -> bool {
        self.declare(class);
        self.has(MetadataKey::Controller, class.type_id(), None)
    }
}
