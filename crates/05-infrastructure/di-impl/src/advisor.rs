//! 切面管理器
//!
//! 为解析得到的实例和对象工厂生成包装器，在调用前后执行匹配的切面回调。
//! 切面在每次调用时重新解析，包装之后注册的切面同样生效。

use crate::container::{Container, ContainerInner};
use dashmap::DashMap;
use di_abstractions::{
    AdvisorDescriptor, Aspect, AspectSet, JoinPoint, ResolutionContext, ServiceDescriptor,
};
use infrastructure_common::{
    Arguments, Component, DependencyResult, Instance, InvocationContext, MethodError,
    MethodOutcome, MethodResult, ObjectFactory, Token, TypeInfo, ADVISORS_TOKEN,
};
use std::sync::{Arc, Weak};
use tracing::{debug, trace, warn};

struct ProxyEntry {
    source: Weak<dyn Component>,
    proxy: Weak<dyn Component>,
}

/// 切面管理器
#[derive(Default)]
pub struct AdvisorManager {
    proxies: DashMap<usize, ProxyEntry>,
}

fn address(component: &Arc<dyn Component>) -> usize {
    Arc::as_ptr(component) as *const () as usize
}

impl AdvisorManager {
    /// 创建切面管理器
    pub fn new() -> Self {
        Self::default()
    }

    /// 包装实例
    ///
    /// 容器没有注册切面时原样返回；同一实例只包装一次。
    pub(crate) fn wrap_instance(
        &self,
        container: &Container,
        token: &Token,
        class: &TypeInfo,
        instance: Arc<dyn Component>,
    ) -> Arc<dyn Component> {
        if !container.advice_enabled()
            || !container.registry().contains(&ADVISORS_TOKEN)
            || (*instance).as_any().is::<AdvisedComponent>()
        {
            return instance;
        }

        let key = address(&instance);
        if let Some(entry) = self.proxies.get(&key) {
            let same_source = entry
                .source
                .upgrade()
                .is_some_and(|source| address(&source) == key);
            if let (true, Some(proxy)) = (same_source, entry.proxy.upgrade()) {
                return proxy;
            }
        }

        trace!("包装实例: {} ({})", token, class.short_name());
        let proxy: Arc<dyn Component> = Arc::new(AdvisedComponent {
            target: instance.clone(),
            token: token.clone(),
            class: class.clone(),
            container: Arc::downgrade(container.inner()),
        });
        self.proxies
            .retain(|_, entry| entry.source.strong_count() > 0 && entry.proxy.strong_count() > 0);
        self.proxies.insert(
            key,
            ProxyEntry {
                source: Arc::downgrade(&instance),
                proxy: Arc::downgrade(&proxy),
            },
        );
        proxy
    }

    /// 包装对象工厂
    pub(crate) fn wrap_factory(
        &self,
        container: &Container,
        token: &Token,
        factory: ObjectFactory,
    ) -> ObjectFactory {
        if !container.advice_enabled() || !container.registry().contains(&ADVISORS_TOKEN) {
            return factory;
        }

        trace!("包装工厂: {}", token);
        let token = token.clone();
        let weak = Arc::downgrade(container.inner());
        ObjectFactory::new(move |args| {
            let Some(inner) = weak.upgrade() else {
                return factory.call(args);
            };
            let container = Container::from_inner(inner);
            let ctx = InvocationContext::for_factory(token.clone(), args.clone());
            let hooks = match Hooks::collect(&container, AspectSet::FACTORY, &ctx) {
                Ok(hooks) => hooks,
                Err(error) => return MethodOutcome::failed(error.into()),
            };
            if hooks.is_empty() {
                return factory.call(args);
            }
            let factory = factory.clone();
            intercept(hooks, ctx, move |args| factory.call(args))
        })
    }

    /// 存活的包装实例数量
    pub fn live_proxies(&self) -> usize {
        self.proxies
            .iter()
            .filter(|entry| entry.proxy.strong_count() > 0)
            .count()
    }

    /// 清空包装缓存
    pub fn clear(&self) {
        self.proxies.clear();
    }
}

impl std::fmt::Debug for AdvisorManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdvisorManager")
            .field("live_proxies", &self.live_proxies())
            .finish()
    }
}

/// 一个已解析的切面
struct ActiveAdvisor {
    descriptor: Arc<AdvisorDescriptor>,
    instance: Arc<dyn Component>,
}

/// 解析容器中的全部切面，按排序值稳定排序
fn active_advisors(container: &Container) -> DependencyResult<Vec<ActiveAdvisor>> {
    let mut ctx = ResolutionContext::new();
    let mut active = Vec::new();
    for registration in container.registry().get_all(&ADVISORS_TOKEN) {
        let ServiceDescriptor::Advisor(descriptor) = &registration.descriptor else {
            continue;
        };
        let instance = container.resolve_registration(&registration, &mut ctx)?;
        if let Instance::Component(component) = instance {
            active.push(ActiveAdvisor {
                descriptor: descriptor.clone(),
                instance: component,
            });
        }
    }
    active.sort_by_key(|advisor| advisor.descriptor.order);
    Ok(active)
}

struct Hook {
    advisor: Arc<dyn Component>,
    advice: String,
}

impl Hook {
    fn call(&self, ctx: &InvocationContext) -> MethodOutcome {
        trace!("执行切面回调: {} -> {}", self.advisor.name(), self.advice);
        self.advisor.advise(&self.advice, ctx)
    }

    /// 同步执行，异步结果不等待
    fn call_sync(&self, ctx: &InvocationContext) -> MethodResult<()> {
        match self.call(ctx) {
            MethodOutcome::Ready(result) => result.map(|_| ()),
            MethodOutcome::Pending(_) => {
                warn!("同步切入点的回调返回了异步结果，已忽略: {}", self.advice);
                Ok(())
            }
        }
    }
}

/// 一次调用匹配到的全部回调
#[derive(Default)]
struct Hooks {
    before: Vec<Hook>,
    sync_returning: Vec<Hook>,
    sync_throws: Vec<Hook>,
    async_returning: Vec<Hook>,
    async_throws: Vec<Hook>,
}

impl Hooks {
    fn collect(
        container: &Container,
        aspects: AspectSet,
        ctx: &InvocationContext,
    ) -> DependencyResult<Self> {
        if !container.registry().contains(&ADVISORS_TOKEN) {
            return Ok(Self::default());
        }
        let active = active_advisors(container)?;
        let point = JoinPoint::from_context(ctx);
        let select = |aspect: Aspect| {
            let mut hooks = Vec::new();
            for advisor in &active {
                for binding in advisor.descriptor.bindings(aspect) {
                    if binding.selectors.iter().any(|selector| selector.test(&point)) {
                        hooks.push(Hook {
                            advisor: advisor.instance.clone(),
                            advice: binding.advice.clone(),
                        });
                    }
                }
            }
            hooks
        };

        Ok(Self {
            before: select(aspects.before),
            sync_returning: select(aspects.sync_returning),
            sync_throws: select(aspects.sync_throws),
            async_returning: select(aspects.async_returning),
            async_throws: select(aspects.async_throws),
        })
    }

    fn is_empty(&self) -> bool {
        self.before.is_empty()
            && self.sync_returning.is_empty()
            && self.sync_throws.is_empty()
            && self.async_returning.is_empty()
            && self.async_throws.is_empty()
    }
}

/// 执行拦截流程
///
/// 前置回调失败时目标不会被调用。抛出路径上回调的错误只记录日志，
/// 始终重新抛出目标的原始错误；返回路径上回调的错误替换返回值。
fn intercept<F>(hooks: Hooks, ctx: InvocationContext, call: F) -> MethodOutcome
where
    F: FnOnce(Arguments) -> MethodOutcome,
{
    for hook in &hooks.before {
        if let Err(error) = hook.call_sync(&ctx) {
            return MethodOutcome::failed(error);
        }
    }

    match call(ctx.args().clone()) {
        MethodOutcome::Ready(Err(error)) => {
            ctx.set_exception(error.clone());
            for hook in &hooks.sync_throws {
                if let Err(hook_error) = hook.call_sync(&ctx) {
                    warn!("异常回调执行失败: {}: {}", hook.advice, hook_error);
                }
            }
            MethodOutcome::failed(error)
        }
        MethodOutcome::Ready(Ok(value)) => {
            ctx.set_result(value);
            for hook in &hooks.sync_returning {
                if let Err(error) = hook.call_sync(&ctx) {
                    return MethodOutcome::failed(error);
                }
            }
            MethodOutcome::ok(ctx.result())
        }
        MethodOutcome::Pending(future) => {
            let Hooks {
                async_returning,
                async_throws,
                ..
            } = hooks;
            MethodOutcome::pending(async move {
                match future.await {
                    Ok(value) => {
                        ctx.set_result(value);
                        for hook in &async_returning {
                            hook.call(&ctx).settle().await?;
                        }
                        Ok(ctx.result())
                    }
                    Err(error) => {
                        ctx.set_exception(error.clone());
                        for hook in &async_throws {
                            if let Err(hook_error) = hook.call(&ctx).settle().await {
                                warn!("异步异常回调执行失败: {}: {}", hook.advice, hook_error);
                            }
                        }
                        Err(error)
                    }
                }
            })
        }
    }
}

/// 被切面增强的组件
///
/// 持有原始实例，方法调用经过拦截流程后转发给原始实例。
/// 对容器只保留弱引用，容器释放后退化为直接转发。
pub struct AdvisedComponent {
    target: Arc<dyn Component>,
    token: Token,
    class: TypeInfo,
    container: Weak<ContainerInner>,
}

impl AdvisedComponent {
    /// 被包装服务的令牌
    pub fn token(&self) -> &Token {
        &self.token
    }

    /// 原始实例的类型
    pub fn class(&self) -> &TypeInfo {
        &self.class
    }
}

impl Component for AdvisedComponent {
    fn name(&self) -> &'static str {
        self.target.name()
    }

    fn invoke(&self, method: &str, args: Arguments) -> MethodOutcome {
        let Some(inner) = self.container.upgrade() else {
            return self.target.invoke(method, args);
        };
        let container = Container::from_inner(inner);
        let ctx = InvocationContext::for_method(
            self.token.clone(),
            self.class.clone(),
            method,
            args.clone(),
            self.target.clone(),
        );
        let hooks = match Hooks::collect(&container, AspectSet::METHOD, &ctx) {
            Ok(hooks) => hooks,
            Err(error) => return MethodOutcome::failed(MethodError::from(error)),
        };
        if hooks.is_empty() {
            return self.target.invoke(method, args);
        }

        debug!("拦截方法调用: {}::{}", self.class.short_name(), method);
        let target = self.target.clone();
        let method = method.to_string();
        intercept(hooks, ctx, move |args| target.invoke(&method, args))
    }

    fn advise(&self, advice: &str, ctx: &InvocationContext) -> MethodOutcome {
        self.target.advise(advice, ctx)
    }

    fn inject_property(&self, property: &str, value: Instance) -> DependencyResult<()> {
        self.target.inject_property(property, value)
    }

    fn target_component(&self) -> Option<&Arc<dyn Component>> {
        Some(&self.target)
    }
}

impl std::fmt::Debug for AdvisedComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdvisedComponent")
            .field("token", &self.token)
            .field("class", &self.class.name)
            .finish()
    }
}
