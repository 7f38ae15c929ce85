//! 全局容器
//!
//! 进程级的容器句柄，只能通过显式调用初始化或重置。

use crate::container::Container;
use di_abstractions::ContainerConfig;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::info;

static GLOBAL_CONTAINER: Lazy<RwLock<Option<Container>>> = Lazy::new(|| RwLock::new(None));

/// 使用指定配置初始化全局容器，替换已有的容器
pub fn init_global_container(config: ContainerConfig) -> Container {
    let container = Container::with_config(config);
    *GLOBAL_CONTAINER.write() = Some(container.clone());
    info!("全局容器已初始化");
    container
}

/// 获取全局容器，尚未初始化时以默认配置创建
pub fn global_container() -> Container {
    if let Some(container) = GLOBAL_CONTAINER.read().as_ref() {
        return container.clone();
    }
    GLOBAL_CONTAINER
        .write()
        .get_or_insert_with(Container::new)
        .clone()
}

/// 重置并移除全局容器
pub fn reset_global_container() {
    let previous = GLOBAL_CONTAINER.write().take();
    if let Some(container) = previous {
        container.reset();
        info!("全局容器已重置");
    }
}
