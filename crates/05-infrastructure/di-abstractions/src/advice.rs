//! 切面切入点与选择器

use infrastructure_common::{InvocationContext, MethodRef, Token, TypeInfo};
use regex::Regex;

/// 切入点
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Aspect {
    /// 方法调用之前
    BeforeMethod,
    /// 同步方法正常返回之后
    AfterSyncMethodReturning,
    /// 同步方法抛出错误之后
    AfterSyncMethodThrows,
    /// 异步方法完成之后
    AfterAsyncMethodReturning,
    /// 异步方法失败之后
    AfterAsyncMethodThrows,
    /// 工厂调用之前
    BeforeFactory,
    /// 同步工厂正常返回之后
    AfterSyncFactoryReturning,
    /// 同步工厂抛出错误之后
    AfterSyncFactoryThrows,
    /// 异步工厂完成之后
    AfterAsyncFactoryReturning,
    /// 异步工厂失败之后
    AfterAsyncFactoryThrows,
}

/// 一组对应的切入点
///
/// 方法调用与工厂调用的分派流程相同，只是使用的切入点不同。
#[derive(Debug, Clone, Copy)]
pub struct AspectSet {
    /// 调用之前
    pub before: Aspect,
    /// 同步返回之后
    pub sync_returning: Aspect,
    /// 同步抛错之后
    pub sync_throws: Aspect,
    /// 异步完成之后
    pub async_returning: Aspect,
    /// 异步失败之后
    pub async_throws: Aspect,
}

impl AspectSet {
    /// 方法调用切入点
    pub const METHOD: AspectSet = AspectSet {
        before: Aspect::BeforeMethod,
        sync_returning: Aspect::AfterSyncMethodReturning,
        sync_throws: Aspect::AfterSyncMethodThrows,
        async_returning: Aspect::AfterAsyncMethodReturning,
        async_throws: Aspect::AfterAsyncMethodThrows,
    };

    /// 工厂调用切入点
    pub const FACTORY: AspectSet = AspectSet {
        before: Aspect::BeforeFactory,
        sync_returning: Aspect::AfterSyncFactoryReturning,
        sync_throws: Aspect::AfterSyncFactoryThrows,
        async_returning: Aspect::AfterAsyncFactoryReturning,
        async_throws: Aspect::AfterAsyncFactoryThrows,
    };
}

/// 连接点
///
/// 选择器匹配时看到的调用信息，工厂调用没有类型和方法名。
#[derive(Debug, Clone, Copy)]
pub struct JoinPoint<'a> {
    /// 被调用实例的令牌
    pub token: &'a Token,
    /// 被调用实例的类型
    pub class: Option<&'a TypeInfo>,
    /// 方法名
    pub method: Option<&'a str>,
}

impl<'a> JoinPoint<'a> {
    /// 从调用上下文构造连接点
    pub fn from_context(ctx: &'a InvocationContext) -> Self {
        Self {
            token: ctx.token(),
            class: ctx.class(),
            method: ctx.method(),
        }
    }
}

/// 切面选择器
///
/// 各条件相互独立：只要没有任何已设置的条件判定失败即视为匹配，
/// 未设置的条件不参与判定。
#[derive(Debug, Clone, Default)]
pub struct AdviceSelector {
    /// 精确令牌
    pub token: Option<Token>,
    /// 令牌标签的正则
    pub token_pattern: Option<Regex>,
    /// 精确类型
    pub class: Option<TypeInfo>,
    /// 精确方法
    pub method: Option<MethodRef>,
    /// 类型名的正则
    pub class_name_pattern: Option<Regex>,
    /// 方法名的正则
    pub method_name_pattern: Option<Regex>,
}

impl AdviceSelector {
    /// 匹配所有调用
    pub fn any() -> Self {
        Self::default()
    }

    /// 按令牌匹配
    pub fn with_token(mut self, token: impl Into<Token>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// 按令牌文本模式匹配
    pub fn with_token_pattern(mut self, pattern: Regex) -> Self {
        self.token_pattern = Some(pattern);
        self
    }

    /// 按实现类型匹配
    pub fn with_class<T: 'static>(mut self) -> Self {
        self.class = Some(TypeInfo::of::<T>());
        self
    }

    /// 按方法标识匹配
    pub fn with_method(mut self, method: MethodRef) -> Self {
        self.method = Some(method);
        self
    }

    /// 按类型名模式匹配
    pub fn with_class_name_pattern(mut self, pattern: Regex) -> Self {
        self.class_name_pattern = Some(pattern);
        self
    }

    /// 按方法名模式匹配
    pub fn with_method_name_pattern(mut self, pattern: Regex) -> Self {
        self.method_name_pattern = Some(pattern);
        self
    }

    /// 判断选择器是否匹配连接点
    pub fn test(&self, point: &JoinPoint<'_>) -> bool {
        let checks = [
            self.token.as_ref().map(|token| token == point.token),
            self.token_pattern
                .as_ref()
                .map(|pattern| pattern.is_match(point.token.label())),
            self.class.as_ref().map(|class| point.class == Some(class)),
            self.method.as_ref().map(|method| {
                point.class == Some(&method.class) && point.method == Some(method.name.as_str())
            }),
            self.class_name_pattern.as_ref().map(|pattern| {
                point
                    .class
                    .is_some_and(|class| pattern.is_match(class.short_name()))
            }),
            self.method_name_pattern
                .as_ref()
                .map(|pattern| point.method.is_some_and(|method| pattern.is_match(method))),
        ];
        !checks.contains(&Some(false))
    }
}
