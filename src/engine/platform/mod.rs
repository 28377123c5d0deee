//! ### English
//! Platform collaborators: image allocation, pixel conversion, capability queries and
//! shader sources. The engine only talks to them through these traits.
//!
//! ### 中文
//! 平台协作者：图像分配、像素转换、能力查询与着色器源码。引擎只通过这些 trait 与其交互。

pub mod convert;
mod software;

pub use software::SoftwarePlatform;

use super::error::{ConvertError, PlatformError};
use super::format::VideoFormat;
use super::texture::{PlatformImage, TextureSpec};

/// ### English
/// Creates and destroys the native images textures are bound to.
///
/// ### 中文
/// 创建并销毁纹理所绑定的原生图像。
pub trait ImageAllocator: Send + Sync {
    /// ### English
    /// Allocates an image for `spec`, reporting the real format, stride and target it chose.
    ///
    /// ### 中文
    /// 为 `spec` 分配图像，并给出实际采用的格式、行宽与纹理目标。
    fn alloc_image(&self, spec: &TextureSpec) -> Result<PlatformImage, PlatformError>;

    fn free_image(&self, image: PlatformImage);
}

/// ### English
/// Reformats a payload into image memory. See `convert::convert_color_space`.
///
/// ### 中文
/// 把载荷重新排布写入图像内存，参见 `convert::convert_color_space`。
pub trait PixelConverter: Send + Sync {
    #[allow(clippy::too_many_arguments)]
    fn convert(
        &self,
        src: &[u8],
        src_format: VideoFormat,
        dst: &mut [u8],
        dst_format: VideoFormat,
        width: u32,
        height: u32,
        stride: usize,
    ) -> Result<(), ConvertError>;
}

/// ### English
/// Answers whether frames can be allocated directly in a format/geometry.
///
/// ### 中文
/// 判断某格式/尺寸能否直接分配帧。
pub trait CapabilityQuery: Send + Sync {
    fn accepts(&self, format: VideoFormat, width: u32, height: u32) -> bool;

    /// ### English
    /// `(horizontal, vertical)` pixel alignment the allocator honors for `format`.
    ///
    /// ### 中文
    /// 分配器对 `format` 遵循的 `(水平, 垂直)` 像素对齐。
    fn alignment(&self, _format: VideoFormat) -> (u32, u32) {
        (1, 1)
    }
}

/// ### English
/// GLSL sources of the redisplay program; `None` means the format cannot be drawn.
///
/// ### 中文
/// 重显示程序的 GLSL 源码；`None` 表示该格式无法绘制。
pub trait ShaderSource: Send + Sync {
    fn vertex_source(&self, format: VideoFormat) -> Option<String>;
    fn fragment_source(&self, format: VideoFormat) -> Option<String>;
}

/// ### English
/// Everything the engine needs from a platform, usable as `Arc<dyn Platform>`.
///
/// ### 中文
/// 引擎对平台的全部需求，可作为 `Arc<dyn Platform>` 使用。
pub trait Platform: ImageAllocator + PixelConverter + CapabilityQuery + ShaderSource {}

impl<T> Platform for T where T: ImageAllocator + PixelConverter + CapabilityQuery + ShaderSource {}
