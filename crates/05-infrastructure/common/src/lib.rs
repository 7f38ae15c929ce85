//! # Infrastructure Common
//!
//! 这个 crate 提供了依赖注入运行时共用的基础类型。
//!
//! ## 核心组件
//!
//! - [`Component`] - 受容器管理的组件 trait
//! - [`Instance`] - 容器解析得到的实例值
//! - [`Token`] - 服务令牌
//! - [`MethodOutcome`] / [`InvocationContext`] - 方法拦截使用的调用模型
//! - [`ConfigHolder`] - 配置值注入的外部协作者
//!
//! ## 设计原则
//!
//! - 描述符显式构建，运行时不依赖反射
//! - 同步与异步调用路径使用同一套结果类型

pub mod component;
pub mod configuration;
pub mod errors;
pub mod invocation;
pub mod lifecycle;
pub mod metadata;
pub mod token;

pub use component::*;
pub use configuration::*;
pub use errors::*;
pub use invocation::*;
pub use lifecycle::*;
pub use metadata::*;
pub use token::*;
