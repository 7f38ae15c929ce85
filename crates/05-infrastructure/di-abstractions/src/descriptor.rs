//! 服务描述符
//!
//! 描述符记录了如何为某个令牌产生实例。类与切面描述符由构建器生成，
//! 构建时校验构造参数绑定。

use crate::advice::{AdviceSelector, Aspect};
use crate::factory::{DynamicProvider, FactoryProvider};
use infrastructure_common::{
    Arguments, Component, DependencyError, DependencyResult, Instance, Scope, TokenRef, TypeInfo,
};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// 参数绑定
#[derive(Debug, Clone)]
pub enum ParamBinding {
    /// 从容器自动装配
    Autowired {
        token: TokenRef,
        optional: bool,
        is_array: bool,
    },
    /// 从配置持有者读取
    ConfigValue {
        path: String,
        default: Option<serde_json::Value>,
    },
}

impl ParamBinding {
    /// 必需的单值依赖
    pub fn autowired(token: impl Into<TokenRef>) -> Self {
        ParamBinding::Autowired {
            token: token.into(),
            optional: false,
            is_array: false,
        }
    }

    /// 可选依赖，缺失时注入空值
    pub fn optional(token: impl Into<TokenRef>) -> Self {
        ParamBinding::Autowired {
            token: token.into(),
            optional: true,
            is_array: false,
        }
    }

    /// 多绑定依赖，按注册顺序注入全部实例
    pub fn all(token: impl Into<TokenRef>) -> Self {
        ParamBinding::Autowired {
            token: token.into(),
            optional: false,
            is_array: true,
        }
    }

    /// 配置值
    pub fn config(path: impl Into<String>) -> Self {
        ParamBinding::ConfigValue {
            path: path.into(),
            default: None,
        }
    }

    /// 带默认值的配置值
    pub fn config_or(path: impl Into<String>, default: serde_json::Value) -> Self {
        ParamBinding::ConfigValue {
            path: path.into(),
            default: Some(default),
        }
    }
}

/// 类标识
///
/// 由构造函数决定，同一构造函数复制出的描述符共享标识。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassId(usize);

type Constructor = dyn Fn(Arguments) -> DependencyResult<Arc<dyn Component>> + Send + Sync;
type PostConstructHook = dyn Fn(&Arc<dyn Component>) -> DependencyResult<()> + Send + Sync;

/// 类描述符
#[derive(Clone)]
pub struct ClassDescriptor {
    /// 实现类型
    pub class: TypeInfo,
    /// 作用域
    pub scope: Scope,
    /// 构造参数绑定，未声明的位置为 `None`
    pub constructor_params: Vec<Option<ParamBinding>>,
    /// 属性绑定，按声明顺序
    pub properties: Vec<(String, ParamBinding)>,
    constructor: Arc<Constructor>,
    post_construct: Option<Arc<PostConstructHook>>,
}

impl ClassDescriptor {
    /// 创建类描述符构建器
    pub fn builder<T, F>(constructor: F) -> ClassDescriptorBuilder
    where
        T: Component,
        F: Fn(Arguments) -> DependencyResult<T> + Send + Sync + 'static,
    {
        ClassDescriptorBuilder {
            class: TypeInfo::of::<T>(),
            scope: Scope::default(),
            params: Vec::new(),
            properties: Vec::new(),
            constructor: Arc::new(move |args| {
                let instance = constructor(args)?;
                Ok(Arc::new(instance) as Arc<dyn Component>)
            }),
            post_construct: None,
        }
    }

    /// 类标识
    pub fn id(&self) -> ClassId {
        ClassId(Arc::as_ptr(&self.constructor) as *const () as usize)
    }

    /// 使用已解析的参数创建实例
    pub fn instantiate(&self, args: Arguments) -> DependencyResult<Arc<dyn Component>> {
        (self.constructor)(args)
    }

    /// 执行初始化回调
    pub fn run_post_construct(&self, instance: &Arc<dyn Component>) -> DependencyResult<()> {
        match &self.post_construct {
            Some(hook) => hook(instance),
            None => Ok(()),
        }
    }

    /// 是否声明了初始化回调
    pub fn has_post_construct(&self) -> bool {
        self.post_construct.is_some()
    }

    /// 以新的作用域复制描述符
    pub fn with_scope(&self, scope: Scope) -> Self {
        Self {
            scope,
            ..self.clone()
        }
    }
}

impl fmt::Debug for ClassDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDescriptor")
            .field("class", &self.class.name)
            .field("scope", &self.scope)
            .field("constructor_params", &self.constructor_params)
            .field("properties", &self.properties)
            .field("post_construct", &self.post_construct.is_some())
            .finish()
    }
}

/// 类描述符构建器
pub struct ClassDescriptorBuilder {
    class: TypeInfo,
    scope: Scope,
    params: Vec<(usize, ParamBinding)>,
    properties: Vec<(String, ParamBinding)>,
    constructor: Arc<Constructor>,
    post_construct: Option<Arc<PostConstructHook>>,
}

impl ClassDescriptorBuilder {
    /// 设置作用域
    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// 声明构造参数绑定
    pub fn param(mut self, index: usize, binding: ParamBinding) -> Self {
        self.params.push((index, binding));
        self
    }

    /// 声明属性绑定，同名属性以后声明的为准
    pub fn property(mut self, name: impl Into<String>, binding: ParamBinding) -> Self {
        let name = name.into();
        self.properties.retain(|(existing, _)| *existing != name);
        self.properties.push((name, binding));
        self
    }

    /// 声明初始化回调，在属性注入完成后执行一次
    pub fn post_construct<T, F>(mut self, hook: F) -> Self
    where
        T: Component,
        F: Fn(&T) -> DependencyResult<()> + Send + Sync + 'static,
    {
        let class_name = self.class.name.clone();
        self.post_construct = Some(Arc::new(move |instance: &Arc<dyn Component>| {
            let typed = Instance::Component(instance.clone());
            match typed.component_ref::<T>() {
                Some(this) => hook(this),
                None => Err(DependencyError::PostConstructFailed {
                    type_name: class_name.clone(),
                    message: "实例类型与回调不匹配".to_string(),
                }),
            }
        }));
        self
    }

    /// 构建描述符
    ///
    /// 同一构造参数位置存在两个绑定时返回错误。
    pub fn build(self) -> DependencyResult<ClassDescriptor> {
        let len = self.params.iter().map(|(index, _)| index + 1).max().unwrap_or(0);
        let mut constructor_params: Vec<Option<ParamBinding>> = vec![None; len];
        for (index, binding) in self.params {
            let slot = &mut constructor_params[index];
            if slot.is_some() {
                return Err(DependencyError::DuplicateParameterBinding {
                    class_name: self.class.name.clone(),
                    index,
                });
            }
            *slot = Some(binding);
        }

        Ok(ClassDescriptor {
            class: self.class,
            scope: self.scope,
            constructor_params,
            properties: self.properties,
            constructor: self.constructor,
            post_construct: self.post_construct,
        })
    }
}

/// 切面回调绑定
#[derive(Debug, Clone)]
pub struct AdviceBinding {
    /// 切面组件上的回调名称
    pub advice: String,
    /// 任一选择器匹配即触发，为空时不触发
    pub selectors: Vec<AdviceSelector>,
}

/// 切面描述符
#[derive(Debug, Clone)]
pub struct AdvisorDescriptor {
    /// 切面组件自身的类描述符
    pub class: ClassDescriptor,
    /// 排序值，升序执行
    pub order: i32,
    /// 各切入点的回调表
    pub aspects: BTreeMap<Aspect, Vec<AdviceBinding>>,
}

impl AdvisorDescriptor {
    /// 创建切面描述符构建器
    pub fn builder(class: ClassDescriptor) -> AdvisorDescriptorBuilder {
        AdvisorDescriptorBuilder {
            descriptor: AdvisorDescriptor {
                class,
                order: 0,
                aspects: BTreeMap::new(),
            },
        }
    }

    /// 指定切入点的回调绑定
    pub fn bindings(&self, aspect: Aspect) -> &[AdviceBinding] {
        self.aspects.get(&aspect).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// 切面描述符构建器
pub struct AdvisorDescriptorBuilder {
    descriptor: AdvisorDescriptor,
}

impl AdvisorDescriptorBuilder {
    /// 设置排序值
    pub fn order(mut self, order: i32) -> Self {
        self.descriptor.order = order;
        self
    }

    /// 绑定回调，同一回调可多次调用以追加选择器
    pub fn advice(mut self, aspect: Aspect, advice: impl Into<String>, selector: AdviceSelector) -> Self {
        let advice = advice.into();
        let bindings = self.descriptor.aspects.entry(aspect).or_default();
        match bindings.iter_mut().find(|binding| binding.advice == advice) {
            Some(binding) => binding.selectors.push(selector),
            None => bindings.push(AdviceBinding {
                advice,
                selectors: vec![selector],
            }),
        }
        self
    }

    /// 构建描述符
    pub fn build(self) -> AdvisorDescriptor {
        self.descriptor
    }
}

/// 服务描述符
#[derive(Clone)]
pub enum ServiceDescriptor {
    /// 按类构造
    Class(Arc<ClassDescriptor>),
    /// 切面类
    Advisor(Arc<AdvisorDescriptor>),
    /// 工厂提供者，每次解析返回新的工厂
    Factory(FactoryProvider),
    /// 常量值
    Constant(Instance),
    /// 首次解析时计算一次的值
    Dynamic(DynamicProvider),
}

impl ServiceDescriptor {
    /// 类或切面描述符中的类信息
    pub fn class(&self) -> Option<&ClassDescriptor> {
        match self {
            ServiceDescriptor::Class(class) => Some(class),
            ServiceDescriptor::Advisor(advisor) => Some(&advisor.class),
            _ => None,
        }
    }

    /// 描述符种类
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceDescriptor::Class(_) => "class",
            ServiceDescriptor::Advisor(_) => "advisor",
            ServiceDescriptor::Factory(_) => "factory",
            ServiceDescriptor::Constant(_) => "constant",
            ServiceDescriptor::Dynamic(_) => "dynamic",
        }
    }
}

impl fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceDescriptor::Class(class) => f.debug_tuple("Class").field(class).finish(),
            ServiceDescriptor::Advisor(advisor) => f.debug_tuple("Advisor").field(advisor).finish(),
            ServiceDescriptor::Constant(value) => f.debug_tuple("Constant").field(value).finish(),
            other => write!(f, "{}(<function>)", other.kind()),
        }
    }
}
