//! 组件基础接口定义
//!
//! 提供所有受容器管理的组件必须实现的基础 trait，以及容器在组件之间传递的实例值。

use crate::errors::{DependencyError, DependencyResult, MethodError};
use crate::invocation::{InvocationContext, MethodOutcome, ObjectFactory};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// 向 `Any` 的转换
///
/// 为所有满足约束的类型自动实现，使 `dyn Component` 可以向下转型。
pub trait AsAny: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// 组件基础 trait
///
/// 容器构造的类实例都以 `Arc<dyn Component>` 的形式存在。方法调用通过
/// [`Component::invoke`] 按名称分派，切面包装器实现同一个 trait，
/// 因此调用方无法区分原始实例与被增强的实例。
pub trait Component: AsAny {
    /// 组件名称
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// 调用组件方法
    fn invoke(&self, method: &str, _args: Arguments) -> MethodOutcome {
        MethodOutcome::failed(MethodError::method_not_found(self.name(), method))
    }

    /// 执行切面回调
    ///
    /// 只有注册为切面的组件需要实现。
    fn advise(&self, advice: &str, _ctx: &InvocationContext) -> MethodOutcome {
        MethodOutcome::failed(MethodError::method_not_found(self.name(), advice))
    }

    /// 注入属性
    ///
    /// 属性在实例构造之后赋值，组件需要使用内部可变性保存注入的值。
    fn inject_property(&self, property: &str, _value: Instance) -> DependencyResult<()> {
        Err(DependencyError::property_failed(
            self.name(),
            property,
            "组件未声明该属性",
        ))
    }

    /// 被包装的原始组件
    fn target_component(&self) -> Option<&Arc<dyn Component>> {
        None
    }
}

impl fmt::Debug for dyn Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Component({})", self.name())
    }
}

/// 容器解析得到的实例
#[derive(Clone, Default)]
pub enum Instance {
    /// 可选依赖缺失时的显式空值
    #[default]
    Absent,
    /// 常量、动态值或工厂产物
    Value(Arc<dyn Any + Send + Sync>),
    /// 配置值
    Config(serde_json::Value),
    /// 类实例（可能已被切面包装）
    Component(Arc<dyn Component>),
    /// 对象工厂
    Factory(ObjectFactory),
    /// 多绑定解析结果
    List(Vec<Instance>),
}

impl Instance {
    /// 包装任意值
    pub fn value<T: Any + Send + Sync>(value: T) -> Self {
        Instance::Value(Arc::new(value))
    }

    /// 包装组件
    pub fn component<T: Component>(component: T) -> Self {
        Instance::Component(Arc::new(component))
    }

    /// 是否为空值
    pub fn is_absent(&self) -> bool {
        matches!(self, Instance::Absent)
    }

    /// 取出指定类型的值
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        match self {
            Instance::Value(value) => value.clone().downcast::<T>().ok(),
            _ => None,
        }
    }

    /// 取出组件
    pub fn as_component(&self) -> Option<&Arc<dyn Component>> {
        match self {
            Instance::Component(component) => Some(component),
            _ => None,
        }
    }

    /// 以具体类型借用组件，穿透切面包装
    pub fn component_ref<T: Component>(&self) -> Option<&T> {
        let component = self.as_component()?;
        if let Some(typed) = (**component).as_any().downcast_ref::<T>() {
            return Some(typed);
        }
        let target = component.target_component()?;
        (**target).as_any().downcast_ref::<T>()
    }

    /// 取出工厂
    pub fn as_factory(&self) -> Option<&ObjectFactory> {
        match self {
            Instance::Factory(factory) => Some(factory),
            _ => None,
        }
    }

    /// 取出配置值
    pub fn as_config(&self) -> Option<&serde_json::Value> {
        match self {
            Instance::Config(value) => Some(value),
            _ => None,
        }
    }

    /// 取出多绑定结果
    pub fn as_list(&self) -> Option<&[Instance]> {
        match self {
            Instance::List(items) => Some(items),
            _ => None,
        }
    }

    /// 判断两个实例是否为同一对象
    pub fn same_as(&self, other: &Instance) -> bool {
        match (self, other) {
            (Instance::Absent, Instance::Absent) => true,
            (Instance::Value(a), Instance::Value(b)) => Arc::ptr_eq(a, b),
            (Instance::Component(a), Instance::Component(b)) => Arc::ptr_eq(a, b),
            (Instance::Factory(a), Instance::Factory(b)) => a.ptr_eq(b),
            (Instance::Config(a), Instance::Config(b)) => a == b,
            (Instance::List(a), Instance::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_as(y))
            }
            _ => false,
        }
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instance::Absent => f.write_str("Absent"),
            Instance::Value(_) => f.write_str("Value(..)"),
            Instance::Config(value) => f.debug_tuple("Config").field(value).finish(),
            Instance::Component(component) => f.debug_tuple("Component").field(component).finish(),
            Instance::Factory(_) => f.write_str("Factory(..)"),
            Instance::List(items) => f.debug_list().entries(items).finish(),
        }
    }
}

impl From<Arc<dyn Component>> for Instance {
    fn from(component: Arc<dyn Component>) -> Self {
        Instance::Component(component)
    }
}

impl From<serde_json::Value> for Instance {
    fn from(value: serde_json::Value) -> Self {
        Instance::Config(value)
    }
}

impl From<ObjectFactory> for Instance {
    fn from(factory: ObjectFactory) -> Self {
        Instance::Factory(factory)
    }
}

static ABSENT: Instance = Instance::Absent;

/// 调用参数
///
/// 构造函数参数与方法参数共用此类型，越界访问得到 [`Instance::Absent`]。
#[derive(Clone, Default, Debug)]
pub struct Arguments(Vec<Instance>);

impl Arguments {
    /// 创建参数列表
    pub fn new(values: Vec<Instance>) -> Self {
        Self(values)
    }

    /// 空参数
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// 按位置获取参数
    pub fn get(&self, index: usize) -> &Instance {
        self.0.get(index).unwrap_or(&ABSENT)
    }

    /// 参数个数
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// 是否没有参数
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 迭代所有参数
    pub fn iter(&self) -> std::slice::Iter<'_, Instance> {
        self.0.iter()
    }

    /// 获取组件参数
    pub fn component(&self, index: usize) -> Option<Arc<dyn Component>> {
        self.get(index).as_component().cloned()
    }

    /// 获取值参数
    pub fn value<T: Any + Send + Sync>(&self, index: usize) -> Option<Arc<T>> {
        self.get(index).downcast::<T>()
    }

    /// 获取配置参数
    pub fn config(&self, index: usize) -> Option<&serde_json::Value> {
        self.get(index).as_config()
    }

    /// 获取多绑定参数，缺失时为空
    pub fn list(&self, index: usize) -> &[Instance] {
        self.get(index).as_list().unwrap_or(&[])
    }

    /// 转换为参数向量
    pub fn into_vec(self) -> Vec<Instance> {
        self.0
    }
}

impl From<Vec<Instance>> for Arguments {
    fn from(values: Vec<Instance>) -> Self {
        Self(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Plain {
        id: u32,
    }

    impl Component for Plain {}

    #[test]
    fn test_component_ref_downcast() {
        let instance = Instance::component(Plain { id: 7 });
        assert_eq!(instance.component_ref::<Plain>().map(|p| p.id), Some(7));
        assert!(instance.downcast::<Plain>().is_none());
    }

    #[test]
    fn test_default_invoke_reports_missing_method() {
        let plain = Plain { id: 1 };
        let outcome = plain.invoke("missing", Arguments::empty());
        match outcome {
            MethodOutcome::Ready(Err(error)) => assert!(error.to_string().contains("missing")),
            _ => panic!("应当返回同步错误"),
        }
    }

    #[test]
    fn test_arguments_out_of_range_is_absent() {
        let args = Arguments::new(vec![Instance::value(1u8)]);
        assert_eq!(args.value::<u8>(0).as_deref(), Some(&1));
        assert!(args.get(3).is_absent());
        assert!(args.list(3).is_empty());
    }

    #[test]
    fn test_same_as_identity() {
        let a = Instance::value(String::from("x"));
        let b = Instance::value(String::from("x"));
        assert!(a.same_as(&a.clone()));
        assert!(!a.same_as(&b));
    }
}
