//! # 依赖注入具体实现
//!
//! 提供依赖注入容器、描述符注册表和切面管理器的实现。
//!
//! ## 核心组件
//!
//! - [`Container`] - 依赖注入容器，支持单例与解析作用域、父子容器
//! - [`Registry`] - 描述符注册表，负责构造参数循环依赖检测
//! - [`AdvisorManager`] / [`AdvisedComponent`] - 方法与工厂调用的切面拦截
//! - [`global_container`] - 进程级全局容器
//!
//! ## 使用示例
//!
//! ```rust
//! use di_impl::Container;
//! use infrastructure_common::{Instance, Token};
//!
//! let container = Container::new();
//! container.register_constant("greeting", Instance::value("hello")).unwrap();
//! let value = container.resolve(&Token::name("greeting")).unwrap();
//! assert_eq!(value.downcast::<&str>().as_deref(), Some(&"hello"));
//! ```

pub mod advisor;
pub mod container;
pub mod global;
pub mod registry;

pub use advisor::{AdvisedComponent, AdvisorManager};
pub use container::Container;
pub use global::{global_container, init_global_container, reset_global_container};
pub use registry::{DescriptorId, Registration, Registry};
