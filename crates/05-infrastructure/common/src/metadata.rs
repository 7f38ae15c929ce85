//! 元数据定义
//!
//! 提供组件和类型的元数据信息

use std::any::TypeId;
use std::hash::{Hash, Hasher};

/// 类型信息
///
/// 相等性只由类型ID决定，名称仅用于诊断和模式匹配。
#[derive(Debug, Clone)]
pub struct TypeInfo {
    /// 类型名称
    pub name: String,
    /// 类型ID
    pub id: TypeId,
    /// 完整类型路径
    pub module_path: String,
}

impl TypeInfo {
    /// 从类型获取类型信息
    pub fn of<T: ?Sized + 'static>() -> Self {
        let full = std::any::type_name::<T>();
        Self {
            name: short_type_name(full).to_string(),
            id: TypeId::of::<T>(),
            module_path: full.to_string(),
        }
    }

    /// 获取简短的类型名称（不包含模块路径）
    pub fn short_name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeInfo {}

impl Hash for TypeInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

fn short_type_name(full: &str) -> &str {
    // 泛型参数中也可能含有路径，只截取最外层类型
    let outer = full.split('<').next().unwrap_or(full);
    let start = outer.rfind("::").map(|i| i + 2).unwrap_or(0);
    &full[start..]
}

/// 方法标识
///
/// 由所属类型与方法名共同确定，用于按方法引用匹配切面。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodRef {
    /// 所属类型
    pub class: TypeInfo,
    /// 方法名
    pub name: String,
}

impl MethodRef {
    /// 创建方法标识
    pub fn of<T: 'static>(name: impl Into<String>) -> Self {
        Self {
            class: TypeInfo::of::<T>(),
            name: name.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Sample;

    #[test]
    fn test_short_name() {
        assert_eq!(TypeInfo::of::<Sample>().short_name(), "Sample");
        assert!(TypeInfo::of::<Vec<Sample>>().short_name().starts_with("Vec<"));
    }

    #[test]
    fn test_method_ref_equality() {
        assert_eq!(MethodRef::of::<Sample>("run"), MethodRef::of::<Sample>("run"));
        assert_ne!(MethodRef::of::<Sample>("run"), MethodRef::of::<Sample>("stop"));
    }
}
