//! 解析上下文
//!
//! 每次顶层解析调用创建一个上下文，调用结束即丢弃。

use crate::descriptor::ClassId;
use infrastructure_common::{DependencyError, DependencyResult, Instance, Token};
use std::collections::HashMap;

/// 解析上下文
///
/// 记录本次调用中已经开始构造的实例。实例在属性注入之前登记，
/// 因此属性之间的相互引用可以拿到尚未完成注入的同一个实例。
#[derive(Debug, Default)]
pub struct ResolutionContext {
    instances: HashMap<ClassId, Instance>,
    depth: usize,
}

impl ResolutionContext {
    /// 创建新的解析上下文
    pub fn new() -> Self {
        Self::default()
    }

    /// 查找本次调用中已构造的实例
    pub fn get(&self, class: ClassId) -> Option<&Instance> {
        self.instances.get(&class)
    }

    /// 登记实例
    pub fn insert(&mut self, class: ClassId, instance: Instance) {
        self.instances.insert(class, instance);
    }

    /// 进入下一层解析，`max_depth` 为空时不限制深度
    pub fn enter(&mut self, token: &Token, max_depth: Option<usize>) -> DependencyResult<()> {
        if let Some(max_depth) = max_depth.filter(|max| self.depth >= *max) {
            return Err(DependencyError::ResolutionDepthExceeded {
                token: token.clone(),
                max_depth,
            });
        }
        self.depth += 1;
        Ok(())
    }

    /// 退出当前层
    pub fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// 当前解析深度
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// 已登记的实例数量
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// 是否尚未登记实例
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::ClassDescriptor;
    use infrastructure_common::Component;

    #[derive(Debug)]
    struct Node;

    impl Component for Node {}

    #[test]
    fn test_depth_guard() {
        let mut ctx = ResolutionContext::new();
        let token = Token::name("deep");
        ctx.enter(&token, Some(2)).unwrap();
        ctx.enter(&token, Some(2)).unwrap();
        assert!(matches!(
            ctx.enter(&token, Some(2)),
            Err(DependencyError::ResolutionDepthExceeded { max_depth: 2, .. })
        ));
        ctx.leave();
        assert_eq!(ctx.depth(), 1);
    }

    #[test]
    fn test_unbounded_depth() {
        let mut ctx = ResolutionContext::new();
        let token = Token::name("deep");
        for _ in 0..500 {
            ctx.enter(&token, None).unwrap();
        }
        assert_eq!(ctx.depth(), 500);
    }

    #[test]
    fn test_instances_keyed_by_class() {
        let mut ctx = ResolutionContext::new();
        let class = ClassDescriptor::builder(|_| Ok(Node)).build().unwrap().id();
        assert!(ctx.get(class).is_none());
        ctx.insert(class, Instance::value(1u8));
        assert_eq!(ctx.len(), 1);
        assert!(ctx.get(class).is_some());
    }
}
