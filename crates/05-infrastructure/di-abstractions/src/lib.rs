//! # Dependency Injection Abstractions
//!
//! 依赖注入抽象层，定义服务描述符、切面选择器和容器接口。
//!
//! ## 核心接口
//!
//! - [`ServiceDescriptor`] - 服务描述符
//! - [`ClassDescriptor`] / [`AdvisorDescriptor`] - 类与切面描述符及其构建器
//! - [`AdviceSelector`] - 切面选择器
//! - [`DiContainer`] - 容器接口
//! - [`ResolutionContext`] - 单次解析的上下文

pub mod advice;
pub mod container;
pub mod descriptor;
pub mod factory;
pub mod resolver;

pub use advice::*;
pub use container::*;
pub use descriptor::*;
pub use factory::*;
pub use resolver::*;

pub use regex::Regex;
