//! 描述符注册表
//!
//! 按令牌保存有序的描述符列表，并对构造参数图做静态循环依赖检测。

use di_abstractions::{
    AdvisorDescriptor, ClassDescriptor, DynamicProvider, FactoryProvider, ParamBinding,
    ServiceDescriptor,
};
use infrastructure_common::{DependencyError, DependencyResult, Instance, Token, ADVISORS_TOKEN};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// 描述符标识
///
/// 单例与动态值缓存以描述符标识为键，同一令牌下的多个描述符各自缓存。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorId(u64);

/// 一条注册记录
#[derive(Debug)]
pub struct Registration {
    /// 描述符标识
    pub id: DescriptorId,
    /// 注册令牌
    pub token: Token,
    /// 描述符
    pub descriptor: ServiceDescriptor,
}

#[derive(Default, Clone)]
struct RegistryState {
    entries: HashMap<Token, Vec<Arc<Registration>>>,
    order: Vec<Token>,
}

/// 描述符注册表
#[derive(Default)]
pub struct Registry {
    state: RwLock<RegistryState>,
    next_id: AtomicU64,
}

impl Registry {
    /// 创建空注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册类描述符
    pub fn register_class(
        &self,
        token: Token,
        descriptor: ClassDescriptor,
    ) -> DependencyResult<DescriptorId> {
        self.register_user(token, ServiceDescriptor::Class(Arc::new(descriptor)))
    }

    /// 注册工厂
    pub fn register_factory(
        &self,
        token: Token,
        provider: FactoryProvider,
    ) -> DependencyResult<DescriptorId> {
        self.register_user(token, ServiceDescriptor::Factory(provider))
    }

    /// 注册常量
    pub fn register_constant(&self, token: Token, value: Instance) -> DependencyResult<DescriptorId> {
        self.register_user(token, ServiceDescriptor::Constant(value))
    }

    /// 注册动态值
    pub fn register_dynamic(
        &self,
        token: Token,
        provider: DynamicProvider,
    ) -> DependencyResult<DescriptorId> {
        self.register_user(token, ServiceDescriptor::Dynamic(provider))
    }

    /// 注册切面，统一归入切面分组令牌
    pub fn register_advisor(&self, descriptor: AdvisorDescriptor) -> DescriptorId {
        self.push(ADVISORS_TOKEN, ServiceDescriptor::Advisor(Arc::new(descriptor)))
    }

    fn register_user(
        &self,
        token: Token,
        descriptor: ServiceDescriptor,
    ) -> DependencyResult<DescriptorId> {
        if token.is_reserved() {
            return Err(DependencyError::ReservedTokenRegistration { token });
        }
        Ok(self.push(token, descriptor))
    }

    fn push(&self, token: Token, descriptor: ServiceDescriptor) -> DescriptorId {
        let id = DescriptorId(self.next_id.fetch_add(1, Ordering::Relaxed));
        debug!("注册描述符: {} ({}) #{}", token, descriptor.kind(), id.0);

        let registration = Arc::new(Registration {
            id,
            token: token.clone(),
            descriptor,
        });
        let mut state = self.state.write();
        match state.entries.get_mut(&token) {
            Some(list) => list.push(registration),
            None => {
                state.order.push(token.clone());
                state.entries.insert(token, vec![registration]);
            }
        }
        id
    }

    /// 令牌最后注册的描述符
    pub fn get(&self, token: &Token) -> Option<Arc<Registration>> {
        self.state
            .read()
            .entries
            .get(token)
            .and_then(|list| list.last().cloned())
    }

    /// 令牌的全部描述符，按注册顺序
    pub fn get_all(&self, token: &Token) -> Vec<Arc<Registration>> {
        self.state
            .read()
            .entries
            .get(token)
            .cloned()
            .unwrap_or_default()
    }

    /// 是否存在该令牌的描述符
    pub fn contains(&self, token: &Token) -> bool {
        self.state.read().entries.contains_key(token)
    }

    /// 已注册的令牌，按首次注册顺序
    pub fn tokens(&self) -> Vec<Token> {
        self.state.read().order.clone()
    }

    /// 描述符总数
    pub fn len(&self) -> usize {
        self.state.read().entries.values().map(Vec::len).sum()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.state.read().entries.is_empty()
    }

    /// 清空全部描述符
    pub fn clear(&self) {
        let mut state = self.state.write();
        state.entries.clear();
        state.order.clear();
    }

    /// 复制一份注册表，描述符共享，标识保持不变
    pub fn snapshot(&self) -> Registry {
        Registry {
            state: RwLock::new(self.state.read().clone()),
            next_id: AtomicU64::new(self.next_id.load(Ordering::Relaxed)),
        }
    }

    /// 检测令牌下所有类描述符的构造参数循环依赖
    pub fn check_circular(&self, token: &Token) -> DependencyResult<()> {
        for registration in self.get_all(token) {
            if let Some(class) = registration.descriptor.class() {
                self.check_circular_for(token, class)?;
            }
        }
        Ok(())
    }

    /// 从指定类描述符出发检测循环依赖
    pub fn check_circular_for(&self, token: &Token, class: &ClassDescriptor) -> DependencyResult<()> {
        let mut path = Vec::new();
        let mut visited = HashSet::new();
        self.visit_class(token, class, &mut path, &mut visited)
    }

    /// 检测所有已注册令牌
    pub fn validate(&self) -> DependencyResult<()> {
        for token in self.tokens() {
            self.check_circular(&token)?;
        }
        Ok(())
    }

    fn visit_class(
        &self,
        token: &Token,
        class: &ClassDescriptor,
        path: &mut Vec<(Token, usize)>,
        visited: &mut HashSet<(Token, bool)>,
    ) -> DependencyResult<()> {
        for (index, binding) in class.constructor_params.iter().enumerate() {
            let Some(ParamBinding::Autowired {
                token: dependency,
                is_array,
                ..
            }) = binding
            else {
                continue;
            };

            // 延迟令牌在这里求值，锁已释放
            let dependency = dependency.resolve();
            path.push((token.clone(), index));
            if path.iter().any(|(seen, _)| *seen == dependency) {
                return Err(DependencyError::CircularDependency {
                    chain: path.clone(),
                    token: dependency,
                });
            }
            // 已完整遍历的依赖不再重复展开
            if visited.contains(&(dependency.clone(), *is_array)) {
                path.pop();
                continue;
            }
            trace!("循环检测: {} 第 {} 个参数 -> {}", token, index, dependency);

            let targets = if *is_array {
                self.get_all(&dependency)
            } else {
                self.get(&dependency).into_iter().collect()
            };
            for target in targets {
                if let Some(next) = target.descriptor.class() {
                    self.visit_class(&dependency, next, path, visited)?;
                }
            }
            visited.insert((dependency, *is_array));
            path.pop();
        }
        Ok(())
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("tokens", &self.tokens())
            .field("descriptors", &self.len())
            .finish()
    }
}
