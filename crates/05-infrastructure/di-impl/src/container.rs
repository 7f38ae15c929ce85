//! 依赖注入容器
//!
//! 负责按描述符构造实例、按作用域缓存，并在本地未注册时委托给父容器。

use crate::advisor::AdvisorManager;
use crate::registry::{DescriptorId, Registration, Registry};
use dashmap::DashMap;
use di_abstractions::{
    AdvisorDescriptor, ClassDescriptor, ContainerConfig, ContainerStats, DiContainer,
    DynamicProvider, FactoryProvider, ParamBinding, ResolutionContext, ServiceDescriptor,
};
use infrastructure_common::{
    Arguments, ConfigHolder, ConfigHolderRef, DependencyError, DependencyResult, Instance,
    ObjectFactory, Scope, Token, ADVISORS_TOKEN, CONFIG_HOLDER_TOKEN, CONTAINER_TOKEN,
};
use std::sync::Arc;
use tracing::{debug, info, trace};

/// 依赖注入容器
///
/// 克隆得到的是同一个容器的句柄。需要独立副本时使用 [`Container::duplicate`]。
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

pub(crate) struct ContainerInner {
    config: ContainerConfig,
    registry: Registry,
    parent: Option<Container>,
    singletons: DashMap<DescriptorId, Instance>,
    dynamics: DashMap<DescriptorId, Instance>,
    advisors: AdvisorManager,
}

impl Container {
    /// 使用默认配置创建容器
    pub fn new() -> Self {
        Self::with_config(ContainerConfig::default())
    }

    /// 使用指定配置创建容器
    pub fn with_config(config: ContainerConfig) -> Self {
        Self::build(config, Registry::new(), None)
    }

    fn build(config: ContainerConfig, registry: Registry, parent: Option<Container>) -> Self {
        Self {
            inner: Arc::new(ContainerInner {
                config,
                registry,
                parent,
                singletons: DashMap::new(),
                dynamics: DashMap::new(),
                advisors: AdvisorManager::new(),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<ContainerInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn inner(&self) -> &Arc<ContainerInner> {
        &self.inner
    }

    pub(crate) fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub(crate) fn advice_enabled(&self) -> bool {
        self.inner.config.enable_advice
    }

    /// 容器配置
    pub fn config(&self) -> &ContainerConfig {
        &self.inner.config
    }

    /// 父容器
    pub fn parent(&self) -> Option<&Container> {
        self.inner.parent.as_ref()
    }

    /// 注册类，作用域取描述符中声明的值
    pub fn register_class(
        &self,
        token: impl Into<Token>,
        descriptor: ClassDescriptor,
    ) -> DependencyResult<()> {
        let token = token.into();
        info!("注册类: {} -> {} ({})", token, descriptor.class.short_name(), descriptor.scope);
        self.inner.registry.register_class(token, descriptor)?;
        Ok(())
    }

    /// 以指定作用域注册类
    pub fn register_class_in_scope(
        &self,
        token: impl Into<Token>,
        descriptor: ClassDescriptor,
        scope: Scope,
    ) -> DependencyResult<()> {
        self.register_class(token, descriptor.with_scope(scope))
    }

    /// 注册工厂，每次解析都会重新调用
    pub fn register_factory<F>(&self, token: impl Into<Token>, factory: F) -> DependencyResult<()>
    where
        F: Fn(&dyn DiContainer) -> DependencyResult<ObjectFactory> + Send + Sync + 'static,
    {
        let token = token.into();
        info!("注册工厂: {}", token);
        self.inner
            .registry
            .register_factory(token, FactoryProvider::new(factory))?;
        Ok(())
    }

    /// 注册常量
    pub fn register_constant(
        &self,
        token: impl Into<Token>,
        value: impl Into<Instance>,
    ) -> DependencyResult<()> {
        let token = token.into();
        info!("注册常量: {}", token);
        self.inner.registry.register_constant(token, value.into())?;
        Ok(())
    }

    /// 注册动态值，首次解析时计算并缓存
    pub fn register_dynamic<F>(&self, token: impl Into<Token>, provider: F) -> DependencyResult<()>
    where
        F: Fn(&dyn DiContainer) -> DependencyResult<Instance> + Send + Sync + 'static,
    {
        let token = token.into();
        info!("注册动态值: {}", token);
        self.inner
            .registry
            .register_dynamic(token, DynamicProvider::new(provider))?;
        Ok(())
    }

    /// 注册切面
    pub fn register_advisor(&self, descriptor: AdvisorDescriptor) -> DependencyResult<()> {
        info!(
            "注册切面: {} (order = {})",
            descriptor.class.class.short_name(),
            descriptor.order
        );
        self.inner.registry.register_advisor(descriptor);
        Ok(())
    }

    /// 注册配置持有者
    pub fn register_config_holder<H>(&self, holder: H) -> DependencyResult<()>
    where
        H: ConfigHolder + 'static,
    {
        self.register_constant(
            CONFIG_HOLDER_TOKEN,
            Instance::value(ConfigHolderRef(Arc::new(holder))),
        )
    }

    /// 解析令牌最后注册的描述符
    pub fn resolve(&self, token: &Token) -> DependencyResult<Instance> {
        let mut ctx = ResolutionContext::new();
        self.resolve_in(token, false, &mut ctx)
    }

    /// 解析可选令牌，未注册时得到空值
    pub fn resolve_optional(&self, token: &Token) -> DependencyResult<Instance> {
        let mut ctx = ResolutionContext::new();
        self.resolve_in(token, true, &mut ctx)
    }

    /// 按注册顺序解析令牌的全部描述符
    pub fn resolve_all(&self, token: &Token) -> DependencyResult<Vec<Instance>> {
        let mut ctx = ResolutionContext::new();
        self.resolve_all_in(token, &mut ctx)
    }

    /// 检查是否已注册
    pub fn is_registered(&self, token: &Token, recursive: bool) -> bool {
        if *token == CONTAINER_TOKEN || self.inner.registry.contains(token) {
            return true;
        }
        recursive
            && self
                .inner
                .parent
                .as_ref()
                .is_some_and(|parent| parent.is_registered(token, true))
    }

    /// 清空全部描述符和缓存
    pub fn reset(&self) {
        info!("重置容器");
        self.inner.registry.clear();
        self.inner.singletons.clear();
        self.inner.dynamics.clear();
        self.inner.advisors.clear();
    }

    /// 复制描述符到新容器，缓存不复制
    pub fn duplicate(&self) -> Container {
        debug!("复制容器: {} 个描述符", self.inner.registry.len());
        Self::build(
            self.inner.config.clone(),
            self.inner.registry.snapshot(),
            self.inner.parent.clone(),
        )
    }

    /// 创建子容器，本地未注册的令牌委托给当前容器
    pub fn create_child_container(&self) -> Container {
        debug!("创建子容器");
        Self::build(self.inner.config.clone(), Registry::new(), Some(self.clone()))
    }

    /// 检测全部类描述符的构造参数循环依赖
    pub fn validate(&self) -> DependencyResult<()> {
        self.inner.registry.validate()
    }

    /// 已注册的令牌
    pub fn registered_tokens(&self) -> Vec<Token> {
        self.inner.registry.tokens()
    }

    /// 统计信息
    pub fn stats(&self) -> ContainerStats {
        ContainerStats {
            registered_descriptors: self.inner.registry.len(),
            registered_advisors: self.inner.registry.get_all(&ADVISORS_TOKEN).len(),
            active_singletons: self.inner.singletons.len(),
            cached_dynamics: self.inner.dynamics.len(),
            live_proxies: self.inner.advisors.live_proxies(),
        }
    }

    fn resolve_in(
        &self,
        token: &Token,
        optional: bool,
        ctx: &mut ResolutionContext,
    ) -> DependencyResult<Instance> {
        if *token == CONTAINER_TOKEN {
            return Ok(Instance::value(self.clone()));
        }
        if let Some(registration) = self.inner.registry.get(token) {
            return self.resolve_registration(&registration, ctx);
        }
        if *token != ADVISORS_TOKEN {
            if let Some(parent) = &self.inner.parent {
                if parent.is_registered(token, true) {
                    trace!("委托父容器解析: {}", token);
                    return parent.resolve_in(token, optional, ctx);
                }
            }
        }
        if optional {
            trace!("可选依赖缺失: {}", token);
            return Ok(Instance::Absent);
        }
        Err(DependencyError::NotRegistered {
            token: token.clone(),
        })
    }

    fn resolve_all_in(
        &self,
        token: &Token,
        ctx: &mut ResolutionContext,
    ) -> DependencyResult<Vec<Instance>> {
        if *token == CONTAINER_TOKEN {
            return Ok(vec![Instance::value(self.clone())]);
        }
        let registrations = self.inner.registry.get_all(token);
        if registrations.is_empty() && *token != ADVISORS_TOKEN {
            if let Some(parent) = &self.inner.parent {
                return parent.resolve_all_in(token, ctx);
            }
        }
        registrations
            .iter()
            .map(|registration| self.resolve_registration(registration, ctx))
            .collect()
    }

    pub(crate) fn resolve_registration(
        &self,
        registration: &Registration,
        ctx: &mut ResolutionContext,
    ) -> DependencyResult<Instance> {
        ctx.enter(&registration.token, self.inner.config.effective_max_depth())?;
        let result = match &registration.descriptor {
            ServiceDescriptor::Constant(value) => Ok(value.clone()),
            ServiceDescriptor::Dynamic(provider) => self.resolve_dynamic(registration, provider),
            ServiceDescriptor::Factory(provider) => provider.provide(self).map(|factory| {
                Instance::Factory(self.inner.advisors.wrap_factory(
                    self,
                    &registration.token,
                    factory,
                ))
            }),
            ServiceDescriptor::Class(class) => self.resolve_class(registration, class, false, ctx),
            ServiceDescriptor::Advisor(advisor) => {
                self.resolve_class(registration, &advisor.class, true, ctx)
            }
        };
        ctx.leave();
        result
    }

    fn resolve_dynamic(
        &self,
        registration: &Registration,
        provider: &DynamicProvider,
    ) -> DependencyResult<Instance> {
        if let Some(cached) = self.inner.dynamics.get(&registration.id) {
            return Ok(cached.value().clone());
        }
        let value = provider.provide(self)?;
        let cached = self
            .inner
            .dynamics
            .entry(registration.id)
            .or_insert(value)
            .value()
            .clone();
        debug!("动态值已缓存: {}", registration.token);
        Ok(cached)
    }

    fn resolve_class(
        &self,
        registration: &Registration,
        class: &ClassDescriptor,
        is_advisor: bool,
        ctx: &mut ResolutionContext,
    ) -> DependencyResult<Instance> {
        if class.scope.is_singleton() {
            if let Some(cached) = self.inner.singletons.get(&registration.id) {
                return Ok(cached.value().clone());
            }
        }
        self.construct(registration, class, is_advisor, ctx)
    }

    fn construct(
        &self,
        registration: &Registration,
        class: &ClassDescriptor,
        is_advisor: bool,
        ctx: &mut ResolutionContext,
    ) -> DependencyResult<Instance> {
        if let Some(existing) = ctx.get(class.id()) {
            trace!("复用本次解析中的实例: {}", class.class.short_name());
            return Ok(existing.clone());
        }
        if self.inner.config.enable_circular_dependency_detection {
            self.inner
                .registry
                .check_circular_for(&registration.token, class)?;
        }

        let mut args = Vec::with_capacity(class.constructor_params.len());
        for binding in &class.constructor_params {
            let value = match binding {
                Some(binding) => self.resolve_binding(binding, ctx)?,
                None => Instance::Absent,
            };
            args.push(value);
        }

        debug!("创建实例: {} ({})", registration.token, class.class.short_name());
        let raw = class.instantiate(Arguments::new(args))?;
        let component = if is_advisor {
            raw.clone()
        } else {
            self.inner
                .advisors
                .wrap_instance(self, &registration.token, &class.class, raw.clone())
        };
        let instance = Instance::Component(component);

        ctx.insert(class.id(), instance.clone());
        if class.scope.is_singleton() {
            self.inner.singletons.insert(registration.id, instance.clone());
        }

        for (name, binding) in &class.properties {
            let value = self.resolve_binding(binding, ctx)?;
            trace!("注入属性: {}.{}", class.class.short_name(), name);
            raw.inject_property(name, value)?;
        }
        class.run_post_construct(&raw)?;
        Ok(instance)
    }

    fn resolve_binding(
        &self,
        binding: &ParamBinding,
        ctx: &mut ResolutionContext,
    ) -> DependencyResult<Instance> {
        match binding {
            ParamBinding::Autowired {
                token,
                optional,
                is_array,
            } => {
                let token = token.resolve();
                if !*is_array {
                    return self.resolve_in(&token, *optional, ctx);
                }
                if !self.is_registered(&token, true) {
                    if *optional {
                        return Ok(Instance::List(Vec::new()));
                    }
                    return Err(DependencyError::NotRegistered { token });
                }
                self.resolve_all_in(&token, ctx).map(Instance::List)
            }
            ParamBinding::ConfigValue { path, default } => {
                self.resolve_config(path, default.as_ref(), ctx)
            }
        }
    }

    fn resolve_config(
        &self,
        path: &str,
        default: Option<&serde_json::Value>,
        ctx: &mut ResolutionContext,
    ) -> DependencyResult<Instance> {
        let holder = self.resolve_in(&CONFIG_HOLDER_TOKEN, true, ctx)?;
        let value = if holder.is_absent() {
            default.cloned()
        } else {
            let holder = holder.downcast::<ConfigHolderRef>().ok_or_else(|| {
                DependencyError::TypeMismatch {
                    token: CONFIG_HOLDER_TOKEN,
                    expected: "ConfigHolderRef".to_string(),
                }
            })?;
            holder.get(path, default)
        };
        trace!("读取配置: {} = {:?}", path, value);
        Ok(value.map(Instance::Config).unwrap_or_default())
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl DiContainer for Container {
    fn resolve(&self, token: &Token) -> DependencyResult<Instance> {
        Container::resolve(self, token)
    }

    fn resolve_all(&self, token: &Token) -> DependencyResult<Vec<Instance>> {
        Container::resolve_all(self, token)
    }

    fn is_registered(&self, token: &Token, recursive: bool) -> bool {
        Container::is_registered(self, token, recursive)
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("config", &self.inner.config)
            .field("stats", &self.stats())
            .field("has_parent", &self.inner.parent.is_some())
            .finish()
    }
}
