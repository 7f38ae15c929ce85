//! 工厂与动态值提供者
//!
//! 两者都以容器为参数，区别在于动态值只计算一次并缓存，工厂每次解析都会重新调用。

use crate::container::DiContainer;
use infrastructure_common::{DependencyResult, Instance, ObjectFactory};
use std::sync::Arc;

type FactoryFn = dyn Fn(&dyn DiContainer) -> DependencyResult<ObjectFactory> + Send + Sync;
type DynamicFn = dyn Fn(&dyn DiContainer) -> DependencyResult<Instance> + Send + Sync;

/// 工厂提供者
#[derive(Clone)]
pub struct FactoryProvider(Arc<FactoryFn>);

impl FactoryProvider {
    /// 创建工厂提供者
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&dyn DiContainer) -> DependencyResult<ObjectFactory> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// 产生对象工厂
    pub fn provide(&self, container: &dyn DiContainer) -> DependencyResult<ObjectFactory> {
        (self.0)(container)
    }
}

/// 动态值提供者
#[derive(Clone)]
pub struct DynamicProvider(Arc<DynamicFn>);

impl DynamicProvider {
    /// 创建动态值提供者
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&dyn DiContainer) -> DependencyResult<Instance> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// 计算值
    pub fn provide(&self, container: &dyn DiContainer) -> DependencyResult<Instance> {
        (self.0)(container)
    }
}
