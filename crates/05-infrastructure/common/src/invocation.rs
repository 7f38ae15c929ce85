//! 方法调用相关类型
//!
//! 同步与异步的方法结果统一表示为 [`MethodOutcome`]，切面通过共享的
//! [`InvocationContext`] 观察和修改调用结果。

use crate::component::{Arguments, Component, Instance};
use crate::errors::{MethodError, MethodResult};
use crate::metadata::TypeInfo;
use crate::token::Token;
use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;

/// 方法调用结果
pub enum MethodOutcome {
    /// 同步完成
    Ready(MethodResult<Instance>),
    /// 尚未完成的异步结果
    Pending(BoxFuture<'static, MethodResult<Instance>>),
}

impl MethodOutcome {
    /// 同步返回值
    pub fn ok(value: Instance) -> Self {
        MethodOutcome::Ready(Ok(value))
    }

    /// 同步抛出错误
    pub fn failed(error: MethodError) -> Self {
        MethodOutcome::Ready(Err(error))
    }

    /// 异步结果
    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = MethodResult<Instance>> + Send + 'static,
    {
        MethodOutcome::Pending(future.boxed())
    }

    /// 是否为异步结果
    pub fn is_pending(&self) -> bool {
        matches!(self, MethodOutcome::Pending(_))
    }

    /// 等待结果完成
    pub async fn settle(self) -> MethodResult<Instance> {
        match self {
            MethodOutcome::Ready(result) => result,
            MethodOutcome::Pending(future) => future.await,
        }
    }
}

impl From<MethodResult<Instance>> for MethodOutcome {
    fn from(result: MethodResult<Instance>) -> Self {
        MethodOutcome::Ready(result)
    }
}

type FactoryFn = dyn Fn(Arguments) -> MethodOutcome + Send + Sync;

/// 对象工厂
///
/// 工厂描述符解析得到的可调用对象，克隆只复制句柄。
#[derive(Clone)]
pub struct ObjectFactory {
    call: Arc<FactoryFn>,
}

impl ObjectFactory {
    /// 创建对象工厂
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Arguments) -> MethodOutcome + Send + Sync + 'static,
    {
        Self { call: Arc::new(f) }
    }

    /// 调用工厂
    pub fn call(&self, args: Arguments) -> MethodOutcome {
        (self.call)(args)
    }

    /// 判断是否为同一个工厂
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.call, &other.call)
    }
}

/// 调用上下文
///
/// 一次被拦截调用的共享状态，所有切面回调看到同一份上下文，
/// 返回类回调可以通过 [`InvocationContext::set_result`] 替换返回值。
#[derive(Clone)]
pub struct InvocationContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    token: Token,
    class: Option<TypeInfo>,
    method: Option<String>,
    args: Arguments,
    target: Option<Arc<dyn Component>>,
    result: Mutex<Instance>,
    exception: Mutex<Option<MethodError>>,
}

impl InvocationContext {
    /// 方法调用上下文
    pub fn for_method(
        token: Token,
        class: TypeInfo,
        method: impl Into<String>,
        args: Arguments,
        target: Arc<dyn Component>,
    ) -> Self {
        Self::build(token, Some(class), Some(method.into()), args, Some(target))
    }

    /// 工厂调用上下文
    pub fn for_factory(token: Token, args: Arguments) -> Self {
        Self::build(token, None, None, args, None)
    }

    fn build(
        token: Token,
        class: Option<TypeInfo>,
        method: Option<String>,
        args: Arguments,
        target: Option<Arc<dyn Component>>,
    ) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                token,
                class,
                method,
                args,
                target,
                result: Mutex::new(Instance::Absent),
                exception: Mutex::new(None),
            }),
        }
    }

    /// 被调用服务的令牌
    pub fn token(&self) -> &Token {
        &self.inner.token
    }

    /// 被调用实例的类型
    pub fn class(&self) -> Option<&TypeInfo> {
        self.inner.class.as_ref()
    }

    /// 方法名，工厂调用时为 `None`
    pub fn method(&self) -> Option<&str> {
        self.inner.method.as_deref()
    }

    /// 调用参数
    pub fn args(&self) -> &Arguments {
        &self.inner.args
    }

    /// 原始目标实例
    pub fn target(&self) -> Option<&Arc<dyn Component>> {
        self.inner.target.as_ref()
    }

    /// 是否为工厂调用
    pub fn is_factory(&self) -> bool {
        self.inner.method.is_none()
    }

    /// 当前返回值
    pub fn result(&self) -> Instance {
        self.inner.result.lock().clone()
    }

    /// 替换返回值
    pub fn set_result(&self, value: Instance) {
        *self.inner.result.lock() = value;
    }

    /// 目标抛出的错误
    pub fn exception(&self) -> Option<MethodError> {
        self.inner.exception.lock().clone()
    }

    /// 记录目标抛出的错误
    pub fn set_exception(&self, error: MethodError) {
        *self.inner.exception.lock() = Some(error);
    }
}

impl std::fmt::Debug for InvocationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvocationContext")
            .field("token", &self.inner.token)
            .field("method", &self.inner.method)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_settle_pending() {
        let outcome = MethodOutcome::pending(async { Ok(Instance::value(5u32)) });
        assert!(outcome.is_pending());
        let value = outcome.settle().await.unwrap();
        assert_eq!(value.downcast::<u32>().as_deref(), Some(&5));
    }

    #[test]
    fn test_context_result_is_shared() {
        let ctx = InvocationContext::for_factory(Token::name("f"), Arguments::empty());
        let observer = ctx.clone();
        ctx.set_result(Instance::value("bar"));
        assert_eq!(observer.result().downcast::<&str>().as_deref(), Some(&"bar"));
        assert!(observer.is_factory());
        assert!(observer.exception().is_none());
    }
}
