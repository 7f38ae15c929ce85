//! 错误类型定义

use crate::token::Token;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// 依赖注入错误类型
#[derive(Error, Debug)]
pub enum DependencyError {
    /// 令牌未注册
    #[error("组件未注册: {token}")]
    NotRegistered { token: Token },

    /// 构造参数形成环
    #[error("检测到构造函数循环依赖: {} -> {token}", format_chain(.chain))]
    CircularDependency {
        chain: Vec<(Token, usize)>,
        token: Token,
    },

    /// 同一构造参数位置绑定了两次
    #[error("重复的构造参数绑定: {class_name} 第 {index} 个参数")]
    DuplicateParameterBinding { class_name: String, index: usize },

    /// 尝试注册保留令牌
    #[error("保留令牌不允许注册: {token}")]
    ReservedTokenRegistration { token: Token },

    /// 构造函数返回错误
    #[error("组件创建失败: {type_name}, 原因: {source}")]
    ComponentCreationFailed {
        type_name: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// 属性解析或注入失败
    #[error("属性注入失败: {type_name}.{property}, 原因: {message}")]
    PropertyInjectionFailed {
        type_name: String,
        property: String,
        message: String,
    },

    /// 初始化回调返回错误
    #[error("组件初始化回调失败: {type_name}, 原因: {message}")]
    PostConstructFailed { type_name: String, message: String },

    /// 实例类型与预期不符
    #[error("类型转换失败: {token} 期望 {expected}")]
    TypeMismatch { token: Token, expected: String },

    /// 解析嵌套层数超过上限
    #[error("解析深度超过上限 {max_depth}: {token}")]
    ResolutionDepthExceeded { token: Token, max_depth: usize },
}

impl DependencyError {
    /// 创建组件创建失败错误
    pub fn creation_failed(
        type_name: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::ComponentCreationFailed {
            type_name: type_name.into(),
            source: source.into(),
        }
    }

    /// 创建属性注入失败错误
    pub fn property_failed(
        type_name: impl Into<String>,
        property: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::PropertyInjectionFailed {
            type_name: type_name.into(),
            property: property.into(),
            message: message.into(),
        }
    }
}

fn format_chain(chain: &[(Token, usize)]) -> String {
    chain
        .iter()
        .map(|(token, index)| format!("{token}[{index}]"))
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// 方法调用错误
///
/// 被拦截方法与切面回调共享同一个错误对象，因此需要可以廉价克隆。
#[derive(Clone)]
pub struct MethodError {
    inner: Arc<anyhow::Error>,
}

impl MethodError {
    /// 从任意消息创建错误
    pub fn msg(message: impl fmt::Display + fmt::Debug + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(anyhow::Error::msg(message)),
        }
    }

    /// 方法不存在
    pub fn method_not_found(type_name: &str, method: &str) -> Self {
        Self::msg(format!("方法不存在: {type_name}::{method}"))
    }

    /// 获取底层错误
    pub fn inner(&self) -> &anyhow::Error {
        &self.inner
    }

    /// 判断两个句柄是否指向同一个错误
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl From<anyhow::Error> for MethodError {
    fn from(error: anyhow::Error) -> Self {
        Self {
            inner: Arc::new(error),
        }
    }
}

impl From<DependencyError> for MethodError {
    fn from(error: DependencyError) -> Self {
        Self::from(anyhow::Error::new(error))
    }
}

impl fmt::Display for MethodError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.inner, f)
    }
}

impl fmt::Debug for MethodError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.inner, f)
    }
}

impl std::error::Error for MethodError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        (**self.inner).source()
    }
}

/// 结果类型别名
pub type DependencyResult<T> = Result<T, DependencyError>;
/// 方法调用结果类型别名
pub type MethodResult<T> = Result<T, MethodError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circular_chain_message() {
        let error = DependencyError::CircularDependency {
            chain: vec![(Token::name("a"), 0), (Token::name("b"), 1)],
            token: Token::name("a"),
        };
        assert_eq!(error.to_string(), "检测到构造函数循环依赖: a[0] -> b[1] -> a");
    }

    #[test]
    fn test_method_error_shares_identity() {
        let error = MethodError::msg("reject");
        let cloned = error.clone();
        assert!(error.ptr_eq(&cloned));
        assert_eq!(cloned.to_string(), "reject");
    }
}
