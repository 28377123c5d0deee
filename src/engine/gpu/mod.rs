//! ### English
//! GPU device abstraction driven exclusively by the render thread.
//!
//! A `GpuBackend` is moved onto the render thread and turned into a `GpuDevice` there; the
//! device never leaves that thread.
//!
//! ### 中文
//! 只由渲染线程驱动的 GPU 设备抽象。
//!
//! `GpuBackend` 被移动到渲染线程并在那里生成 `GpuDevice`；设备永远不会离开该线程。

pub mod glfw;
mod glow_device;

pub use glfw::{EmbedderGlfwApi, GlfwBackend};
pub use glow_device::GlowDevice;

use std::time::Duration;

use dpi::PhysicalSize;

use super::error::GpuError;
use super::format::{TextureTarget, VideoFormat};
use super::texture::{PlatformImage, TextureSpec};

/// ### English
/// Viewport rectangle in surface pixels (origin bottom-left, GL convention).
///
/// ### 中文
/// surface 像素坐标下的视口矩形（原点在左下角，GL 约定）。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// ### English
/// Normalized texture-coordinate bounds the quad samples (crop applied).
///
/// ### 中文
/// 四边形采样的归一化纹理坐标范围（已应用裁剪）。
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SamplerRect {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

impl Default for SamplerRect {
    fn default() -> Self {
        Self {
            left: 0.0,
            right: 1.0,
            top: 1.0,
            bottom: 0.0,
        }
    }
}

/// ### English
/// Window-system notification forwarded to the render loop.
///
/// ### 中文
/// 转发给渲染循环的窗口系统通知。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowEvent {
    Resized(PhysicalSize<u32>),
    CloseRequested,
}

/// ### English
/// Strings identifying the context, logged once after creation.
///
/// ### 中文
/// 标识上下文的字符串，创建后记录一次日志。
#[derive(Clone, Debug, Default)]
pub struct ContextInfo {
    pub vendor: String,
    pub renderer: String,
    pub version: String,
}

/// ### English
/// Factory moved onto the render thread to create the device there.
///
/// ### 中文
/// 被移动到渲染线程、并在该线程上创建设备的工厂。
pub trait GpuBackend: Send + 'static {
    type Device: GpuDevice;

    /// ### English
    /// Creates the native context and its surface on the calling (render) thread.
    ///
    /// #### Parameters
    /// - `external_context`: Optional native context to share objects with.
    /// - `initial_size`: Requested surface size.
    ///
    /// ### 中文
    /// 在调用线程（渲染线程）上创建原生上下文及其 surface。
    ///
    /// #### 参数
    /// - `external_context`：可选的、需要共享对象的原生上下文。
    /// - `initial_size`：请求的 surface 尺寸。
    fn create_device(
        self,
        external_context: Option<u64>,
        initial_size: PhysicalSize<u32>,
    ) -> Result<Self::Device, GpuError>;
}

/// ### English
/// Every GPU-touching operation the engine performs. Render thread only.
///
/// ### 中文
/// 引擎执行的全部 GPU 操作。仅限渲染线程调用。
pub trait GpuDevice {
    type Program;

    fn info(&self) -> ContextInfo;

    /// ### English
    /// Native handle of the context, handed out to embedders (0 if none).
    ///
    /// ### 中文
    /// 提供给宿主的原生上下文句柄（没有则为 0）。
    fn native_context_handle(&self) -> u64;

    /// ### English
    /// Creates a texture bound to `image`, returning its native name.
    ///
    /// ### 中文
    /// 创建绑定到 `image` 的纹理，返回其原生纹理名。
    fn create_texture(&mut self, spec: &TextureSpec, image: &PlatformImage)
    -> Result<u32, GpuError>;

    fn delete_texture(&mut self, texture: u32);

    fn compile_program(&mut self, vertex: &str, fragment: &str)
    -> Result<Self::Program, GpuError>;

    fn delete_program(&mut self, program: Self::Program);

    fn set_viewport(&mut self, viewport: Viewport);

    /// ### English
    /// Clears the surface and draws the full-screen quad sampling `texture`.
    ///
    /// ### 中文
    /// 清空 surface 并绘制采样 `texture` 的全屏四边形。
    fn draw(
        &mut self,
        program: &Self::Program,
        texture: u32,
        target: TextureTarget,
        sampler: SamplerRect,
    ) -> Result<(), GpuError>;

    fn swap_buffers(&mut self);

    /// ### English
    /// Whether `upload_sub_image` can take payloads of `format` as-is.
    ///
    /// ### 中文
    /// `upload_sub_image` 能否直接接收 `format` 格式的载荷。
    fn supports_direct_upload(&self, format: VideoFormat) -> bool;

    /// ### English
    /// Copies a tightly packed payload straight into the texture.
    ///
    /// ### 中文
    /// 将紧凑载荷直接复制进纹理。
    fn upload_sub_image(
        &mut self,
        texture: u32,
        spec: &TextureSpec,
        data: &[u8],
    ) -> Result<(), GpuError>;

    /// ### English
    /// Makes CPU writes to `image.memory` visible to the texture.
    ///
    /// ### 中文
    /// 让对 `image.memory` 的 CPU 写入对纹理可见。
    fn commit_image(
        &mut self,
        texture: u32,
        spec: &TextureSpec,
        image: &PlatformImage,
    ) -> Result<(), GpuError>;

    fn resize_surface(&mut self, size: PhysicalSize<u32>);

    fn poll_event(&mut self) -> Option<WindowEvent>;

    /// ### English
    /// How often the idle loop should wake up to poll window events; `None` to only wake on
    /// messages.
    ///
    /// ### 中文
    /// 空闲循环为轮询窗口事件而唤醒的间隔；`None` 表示只在收到消息时唤醒。
    fn event_poll_interval(&self) -> Option<Duration> {
        None
    }

    fn set_window_handle(&mut self, handle: u64);

    /// ### English
    /// Makes the context current (or releases it) on the render thread.
    ///
    /// ### 中文
    /// 在渲染线程上使上下文成为 current（或释放）。
    fn make_current(&mut self, current: bool) -> bool;
}
