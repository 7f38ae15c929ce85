//! 组件生命周期管理

/// 组件作用域
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Scope {
    /// 单例模式 - 每个容器只创建一个实例
    #[default]
    Singleton,
    /// 解析模式 - 同一次顶层解析调用内共享实例
    Resolution,
}

impl Scope {
    /// 是否缓存在容器级别
    pub fn is_singleton(self) -> bool {
        matches!(self, Scope::Singleton)
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::Singleton => f.write_str("singleton"),
            Scope::Resolution => f.write_str("resolution"),
        }
    }
}
