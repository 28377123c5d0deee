/// ### English
/// Engine internal modules (render thread, texture pool, frames, platform and GPU seams).
///
/// ### 中文
/// 引擎内部模块（渲染线程、纹理池、帧、平台与 GPU 接口层等）。
pub mod config;
pub mod display;
pub mod error;
pub mod flags;
pub mod format;
pub mod frame;
pub mod gpu;
pub mod platform;
pub mod pool;
pub mod texture;

pub use config::{DEFAULT_POOL_CAPACITY, DisplayConfig};
pub use display::{Display, DisplayState, FrameRequest};
pub use error::{ConvertError, DisplayError, GpuError, PlatformError};
pub use format::{CropRect, TextureTarget, VideoFormat};
pub use frame::{Frame, TextureHooks};
pub use gpu::{EmbedderGlfwApi, GlfwBackend, GpuBackend, GpuDevice};
pub use platform::{
    CapabilityQuery, ImageAllocator, PixelConverter, Platform, ShaderSource, SoftwarePlatform,
};
pub use texture::{PlatformImage, TextureDescriptor, TextureSpec};
