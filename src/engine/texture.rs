//! ### English
//! Shared texture descriptor: the GPU texture plus the platform image backing it.
//!
//! ### 中文
//! 共享纹理描述符：GPU 纹理及其背后的平台图像。

use bytes::BytesMut;

use super::format::{TextureTarget, VideoFormat};

/// ### English
/// Key the pool matches descriptors by.
///
/// ### 中文
/// 纹理池匹配描述符所用的键。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureSpec {
    pub format: VideoFormat,
    pub width: u32,
    pub height: u32,
}

impl TextureSpec {
    pub fn new(format: VideoFormat, width: u32, height: u32) -> Self {
        Self {
            format,
            width,
            height,
        }
    }
}

/// ### English
/// Native image produced by the platform allocator.
///
/// ### 中文
/// 平台分配器产出的原生图像。
#[derive(Debug)]
pub struct PlatformImage {
    /// ### English
    /// Format the image is actually stored in (may differ from the requested one,
    /// e.g. RGBx is stored as RGBA).
    ///
    /// ### 中文
    /// 图像实际存储的格式（可能与请求的不同，例如 RGBx 以 RGBA 存储）。
    pub real_format: VideoFormat,
    /// ### English
    /// Bytes per row of the first plane.
    ///
    /// ### 中文
    /// 第一平面的每行字节数。
    pub stride: usize,
    pub target: TextureTarget,
    /// ### English
    /// Opaque native image handle (`EGLImageKHR` or equivalent), 0 for CPU-only images.
    ///
    /// ### 中文
    /// 不透明原生图像句柄（`EGLImageKHR` 等），纯 CPU 图像为 0。
    pub native_image: u64,
    /// ### English
    /// CPU-visible backing memory the converter writes into.
    ///
    /// ### 中文
    /// 供转换器写入的 CPU 可见内存。
    pub memory: BytesMut,
    pub hw_metadata: u64,
}

/// ### English
/// One pooled texture. Owned by the pool while free, by exactly one `Frame` while in use.
///
/// ### 中文
/// 一个池化纹理。空闲时归纹理池所有，使用中时只归一个 `Frame` 所有。
#[derive(Debug)]
pub struct TextureDescriptor {
    spec: TextureSpec,
    texture: u32,
    image: PlatformImage,
}

impl TextureDescriptor {
    pub fn new(spec: TextureSpec, texture: u32, image: PlatformImage) -> Self {
        Self {
            spec,
            texture,
            image,
        }
    }

    #[inline]
    pub fn spec(&self) -> TextureSpec {
        self.spec
    }

    #[inline]
    pub fn matches(&self, spec: &TextureSpec) -> bool {
        self.spec == *spec
    }

    #[inline]
    pub fn format(&self) -> VideoFormat {
        self.spec.format
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.spec.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.spec.height
    }

    #[inline]
    pub fn real_format(&self) -> VideoFormat {
        self.image.real_format
    }

    #[inline]
    pub fn stride(&self) -> usize {
        self.image.stride
    }

    #[inline]
    pub fn target(&self) -> TextureTarget {
        self.image.target
    }

    /// ### English
    /// Native GPU texture name.
    ///
    /// ### 中文
    /// 原生 GPU 纹理名。
    #[inline]
    pub fn texture_id(&self) -> u32 {
        self.texture
    }

    #[inline]
    pub fn image(&self) -> &PlatformImage {
        &self.image
    }

    #[inline]
    pub fn image_mut(&mut self) -> &mut PlatformImage {
        &mut self.image
    }

    /// ### English
    /// Splits the descriptor for deletion: the texture name and the platform image.
    ///
    /// ### 中文
    /// 拆分描述符以便删除：纹理名与平台图像。
    pub fn into_parts(self) -> (u32, PlatformImage) {
        (self.texture, self.image)
    }
}
