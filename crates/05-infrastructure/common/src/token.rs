//! 服务令牌
//!
//! 令牌用于标识容器中的可绑定服务，可以是名称、唯一符号或类型标识。

use crate::metadata::TypeInfo;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// 容器内置令牌
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    /// 容器自身，始终可解析且不允许注册
    Container,
    /// 配置持有者
    ConfigHolder,
    /// 所有切面描述符共用的多绑定令牌
    Advisors,
}

impl Builtin {
    fn as_str(self) -> &'static str {
        match self {
            Builtin::Container => "@container",
            Builtin::ConfigHolder => "@config-holder",
            Builtin::Advisors => "@advisors",
        }
    }
}

/// 唯一符号
///
/// 同描述的两个符号互不相等。
#[derive(Debug, Clone)]
pub struct Symbol {
    id: uuid::Uuid,
    description: Arc<str>,
}

impl Symbol {
    /// 创建新的唯一符号
    pub fn new(description: impl Into<Arc<str>>) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            description: description.into(),
        }
    }

    /// 符号描述
    pub fn description(&self) -> &str {
        &self.description
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// 服务令牌
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Token {
    /// 字符串名称
    Name(Arc<str>),
    /// 唯一符号，描述相同也互不相等
    Symbol(Symbol),
    /// Rust 类型
    Type(TypeInfo),
    /// 容器内置的保留令牌
    Builtin(Builtin),
}

/// 容器自身的保留令牌
pub const CONTAINER_TOKEN: Token = Token::Builtin(Builtin::Container);

/// 配置持有者令牌
pub const CONFIG_HOLDER_TOKEN: Token = Token::Builtin(Builtin::ConfigHolder);

/// 切面描述符分组令牌
pub const ADVISORS_TOKEN: Token = Token::Builtin(Builtin::Advisors);

impl Token {
    /// 名称令牌
    pub fn name(name: impl Into<Arc<str>>) -> Self {
        Token::Name(name.into())
    }

    /// 唯一符号令牌
    pub fn symbol(description: impl Into<Arc<str>>) -> Self {
        Token::Symbol(Symbol::new(description))
    }

    /// 类型令牌
    pub fn of<T: ?Sized + 'static>() -> Self {
        Token::Type(TypeInfo::of::<T>())
    }

    /// 用于模式匹配的文本形式
    pub fn label(&self) -> &str {
        match self {
            Token::Name(name) => name,
            Token::Symbol(symbol) => symbol.description(),
            Token::Type(info) => &info.name,
            Token::Builtin(builtin) => builtin.as_str(),
        }
    }

    /// 是否为用户不可直接注册的保留令牌
    pub fn is_reserved(&self) -> bool {
        matches!(
            self,
            Token::Builtin(Builtin::Container) | Token::Builtin(Builtin::Advisors)
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Symbol(symbol) => write!(f, "Symbol({})", symbol.description()),
            _ => f.write_str(self.label()),
        }
    }
}

impl From<&str> for Token {
    fn from(name: &str) -> Self {
        Token::name(name)
    }
}

impl From<String> for Token {
    fn from(name: String) -> Self {
        Token::name(name)
    }
}

impl From<Symbol> for Token {
    fn from(symbol: Symbol) -> Self {
        Token::Symbol(symbol)
    }
}

/// 令牌引用
///
/// 延迟令牌用于引用在声明时尚不可用的令牌，在解析和循环检测时才求值。
#[derive(Clone)]
pub enum TokenRef {
    /// 立即可用的令牌
    Eager(Token),
    /// 使用时才求值的令牌
    Lazy(Arc<dyn Fn() -> Token + Send + Sync>),
}

impl TokenRef {
    /// 创建延迟令牌
    pub fn lazy<F>(f: F) -> Self
    where
        F: Fn() -> Token + Send + Sync + 'static,
    {
        TokenRef::Lazy(Arc::new(f))
    }

    /// 求值得到实际令牌
    pub fn resolve(&self) -> Token {
        match self {
            TokenRef::Eager(token) => token.clone(),
            TokenRef::Lazy(f) => f(),
        }
    }
}

impl fmt::Debug for TokenRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenRef::Eager(token) => f.debug_tuple("Eager").field(token).finish(),
            TokenRef::Lazy(_) => f.write_str("Lazy(<function>)"),
        }
    }
}

impl From<Token> for TokenRef {
    fn from(token: Token) -> Self {
        TokenRef::Eager(token)
    }
}

impl From<&str> for TokenRef {
    fn from(name: &str) -> Self {
        TokenRef::Eager(Token::name(name))
    }
}

impl From<Symbol> for TokenRef {
    fn from(symbol: Symbol) -> Self {
        TokenRef::Eager(Token::Symbol(symbol))
    }
}
