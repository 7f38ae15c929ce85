//! 配置相关的基础接口定义

use serde_json::Value;
use std::sync::Arc;

/// 配置持有者 trait
///
/// 容器在解析配置值绑定时，通过保留令牌查找该服务。
pub trait ConfigHolder: Send + Sync {
    /// 按路径获取配置值，不存在时返回默认值
    fn get(&self, path: &str, default: Option<&Value>) -> Option<Value>;
}

/// 注册到容器中的配置持有者句柄
#[derive(Clone)]
pub struct ConfigHolderRef(pub Arc<dyn ConfigHolder>);

impl ConfigHolderRef {
    /// 获取配置值
    pub fn get(&self, path: &str, default: Option<&Value>) -> Option<Value> {
        self.0.get(path, default)
    }
}

/// 基于 JSON 文档的配置持有者
///
/// 路径使用 `.` 分隔，例如 `server.port`。
#[derive(Debug, Clone, Default)]
pub struct JsonConfigHolder {
    root: Value,
}

impl JsonConfigHolder {
    /// 创建新的配置持有者
    pub fn new(root: Value) -> Self {
        Self { root }
    }

    /// 按路径查找配置
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        if path.is_empty() {
            return Some(&self.root);
        }
        path.split('.').try_fold(&self.root, |node, segment| match node {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
    }
}

impl ConfigHolder for JsonConfigHolder {
    fn get(&self, path: &str, default: Option<&Value>) -> Option<Value> {
        match self.lookup(path) {
            Some(Value::Null) | None => default.cloned(),
            Some(value) => Some(value.clone()),
        }
    }
}
