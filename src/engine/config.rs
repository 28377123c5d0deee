//! ### English
//! Per-instance engine configuration.
//!
//! ### 中文
//! 每个引擎实例独立的配置。

use std::time::Duration;

use dpi::PhysicalSize;

/// ### English
/// Default upper bound of GPU textures one display may hold at once.
///
/// ### 中文
/// 单个显示实例同时持有 GPU 纹理数量的默认上限。
pub const DEFAULT_POOL_CAPACITY: usize = 32;

/// ### English
/// Configuration consumed by `Display::new`.
///
/// ### 中文
/// `Display::new` 使用的配置。
#[derive(Clone, Debug)]
pub struct DisplayConfig {
    /// ### English
    /// Maximum number of textures the pool allocates before allocation blocks.
    ///
    /// ### 中文
    /// 纹理池在阻塞分配前最多创建的纹理数。
    pub pool_capacity: usize,
    /// ### English
    /// Name given to the render thread.
    ///
    /// ### 中文
    /// 渲染线程名称。
    pub thread_name: String,
    /// ### English
    /// Surface size requested when the device creates its window.
    ///
    /// ### 中文
    /// 设备创建窗口时请求的初始 surface 尺寸。
    pub initial_surface_size: PhysicalSize<u32>,
    /// ### English
    /// Whether `allocate_frame` rejects formats/geometries the platform cannot accept.
    ///
    /// ### 中文
    /// `allocate_frame` 是否拒绝平台不接受的格式/尺寸。
    pub check_capabilities: bool,
    /// ### English
    /// Upper bound on how long the idle render thread waits before polling window events.
    /// `None` lets the device decide.
    ///
    /// ### 中文
    /// 空闲渲染线程轮询窗口事件前的最长等待时间；`None` 表示由设备决定。
    pub event_poll_interval: Option<Duration>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            pool_capacity: DEFAULT_POOL_CAPACITY,
            thread_name: "gl-display-render".to_string(),
            initial_surface_size: PhysicalSize::new(640, 480),
            check_capabilities: true,
            event_poll_interval: None,
        }
    }
}

impl DisplayConfig {
    pub fn with_pool_capacity(mut self, capacity: usize) -> Self {
        self.pool_capacity = capacity.max(1);
        self
    }

    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    pub fn with_initial_surface_size(mut self, size: PhysicalSize<u32>) -> Self {
        self.initial_surface_size = PhysicalSize::new(size.width.max(1), size.height.max(1));
        self
    }

    pub fn with_capability_check(mut self, enabled: bool) -> Self {
        self.check_capabilities = enabled;
        self
    }

    pub fn with_event_poll_interval(mut self, interval: Option<Duration>) -> Self {
        self.event_poll_interval = interval;
        self
    }
}
