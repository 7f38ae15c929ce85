//! 依赖注入容器抽象接口
//!
//! 提供依赖注入容器的核心抽象

use infrastructure_common::{DependencyResult, Instance, Token};

/// 依赖注入容器 trait
///
/// 工厂和动态值提供者通过该接口回调容器。
pub trait DiContainer: Send + Sync {
    /// 解析令牌最后注册的描述符
    fn resolve(&self, token: &Token) -> DependencyResult<Instance>;

    /// 按注册顺序解析令牌的全部描述符
    fn resolve_all(&self, token: &Token) -> DependencyResult<Vec<Instance>>;

    /// 检查是否已注册，`recursive` 为真时同时检查父容器
    fn is_registered(&self, token: &Token, recursive: bool) -> bool;
}

/// 关闭循环检测时的默认解析深度上限
pub const DEFAULT_MAX_RESOLUTION_DEPTH: usize = 100;

/// 容器配置
#[derive(Debug, Clone)]
pub struct ContainerConfig {
    /// 是否在构造前执行构造函数循环依赖检测
    pub enable_circular_dependency_detection: bool,
    /// 最大解析深度，未设置时仅在关闭循环检测后启用默认上限
    pub max_resolution_depth: Option<usize>,
    /// 是否启用切面包装
    pub enable_advice: bool,
}

impl ContainerConfig {
    /// 设置循环依赖检测
    pub fn with_circular_dependency_detection(mut self, enabled: bool) -> Self {
        self.enable_circular_dependency_detection = enabled;
        self
    }

    /// 设置最大解析深度
    pub fn with_max_resolution_depth(mut self, depth: usize) -> Self {
        self.max_resolution_depth = Some(depth);
        self
    }

    /// 实际生效的解析深度上限
    ///
    /// 开启循环检测时不限制深度，关闭后以默认上限兜底构造函数环。
    pub fn effective_max_depth(&self) -> Option<usize> {
        match self.max_resolution_depth {
            Some(depth) => Some(depth),
            None if self.enable_circular_dependency_detection => None,
            None => Some(DEFAULT_MAX_RESOLUTION_DEPTH),
        }
    }

    /// 设置是否启用切面
    pub fn with_advice(mut self, enabled: bool) -> Self {
        self.enable_advice = enabled;
        self
    }
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            enable_circular_dependency_detection: true,
            max_resolution_depth: None,
            enable_advice: true,
        }
    }
}

/// 容器统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerStats {
    /// 已注册描述符数量（含切面）
    pub registered_descriptors: usize,
    /// 已注册切面数量
    pub registered_advisors: usize,
    /// 已缓存单例数量
    pub active_singletons: usize,
    /// 已缓存动态值数量
    pub cached_dynamics: usize,
    /// 存活的切面包装实例数量
    pub live_proxies: usize,
}
