//! ### English
//! Default platform backed by CPU memory.
//!
//! Formats, targets and alignments follow the i.MX-style EGL image tables: 32-bit RGB is
//! sampled through `GL_TEXTURE_2D`, YUV through `GL_TEXTURE_EXTERNAL_OES`.
//!
//! ### 中文
//! 基于 CPU 内存的默认平台实现。
//!
//! 格式、纹理目标与对齐沿用 i.MX 风格的 EGL image 表：32 位 RGB 通过 `GL_TEXTURE_2D` 采样，
//! YUV 通过 `GL_TEXTURE_EXTERNAL_OES` 采样。

use bytes::BytesMut;

use crate::engine::error::{ConvertError, PlatformError};
use crate::engine::format::{TextureTarget, VideoFormat, round_up};
use crate::engine::texture::{PlatformImage, TextureSpec};

use super::convert::{PlanarLayout, convert_color_space};
use super::{CapabilityQuery, ImageAllocator, PixelConverter, ShaderSource};

const VERTEX_SOURCE: &str = "\
attribute vec4 a_position;
attribute vec2 a_texCoord;
varying vec2 v_texCoord;
void main()
{
   gl_Position = a_position;
   v_texCoord = a_texCoord;
}
";

/// ### English
/// CPU-memory platform. Stateless; one instance may serve any number of displays.
///
/// ### 中文
/// CPU 内存平台。无状态，一个实例可服务任意多个显示实例。
#[derive(Clone, Copy, Debug, Default)]
pub struct SoftwarePlatform;

impl SoftwarePlatform {
    /// ### English
    /// Format the image is stored in for a requested format; `None` if it cannot be stored.
    ///
    /// ### 中文
    /// 请求格式对应的实际存储格式；无法存储时返回 `None`。
    pub fn real_format(format: VideoFormat) -> Option<VideoFormat> {
        use VideoFormat::*;

        match format {
            Rgbx | Rgba => Some(Rgba),
            Bgrx | Bgra => Some(Bgra),
            I420 | Yv12 => Some(Yv12),
            Nv12 => Some(Nv12),
            Uyvy => Some(Uyvy),
            Nv21 | Yuy2 | Yvyu => None,
        }
    }

    pub fn target(format: VideoFormat) -> Option<TextureTarget> {
        use VideoFormat::*;

        match format {
            Rgba | Rgbx | Bgra | Bgrx => Some(TextureTarget::Texture2D),
            I420 | Yv12 | Nv12 | Uyvy => Some(TextureTarget::External),
            Nv21 | Yuy2 | Yvyu => None,
        }
    }

    fn stride(real_format: VideoFormat, width: u32) -> usize {
        let aligned = round_up(width as usize, 32);
        match real_format {
            VideoFormat::Uyvy => aligned * 2,
            f if f.is_rgb32() => aligned * 4,
            _ => aligned,
        }
    }

    fn memory_size(real_format: VideoFormat, stride: usize, height: u32) -> Option<usize> {
        let rows = height as usize;
        match real_format {
            VideoFormat::Yv12 => Some(PlanarLayout::new(stride, height).total_size),
            VideoFormat::Nv12 => {
                let luma = stride.checked_mul(round_up(rows, 32))?;
                let chroma = stride.checked_mul(round_up(round_up(rows, 2) / 2, 32))?;
                Some(round_up(luma, 4096) + chroma)
            }
            _ => stride.checked_mul(rows),
        }
    }
}

impl ImageAllocator for SoftwarePlatform {
    fn alloc_image(&self, spec: &TextureSpec) -> Result<PlatformImage, PlatformError> {
        let (Some(real_format), Some(target)) =
            (Self::real_format(spec.format), Self::target(spec.format))
        else {
            return Err(PlatformError::UnsupportedFormat(spec.format));
        };

        let out_of_memory = || PlatformError::OutOfMemory {
            format: spec.format,
            width: spec.width,
            height: spec.height,
        };
        if spec.width == 0 || spec.height == 0 {
            return Err(out_of_memory());
        }

        let stride = Self::stride(real_format, spec.width);
        let size = Self::memory_size(real_format, stride, spec.height).ok_or_else(out_of_memory)?;

        tracing::trace!(?real_format, stride, size, "allocating software image");
        Ok(PlatformImage {
            real_format,
            stride,
            target,
            native_image: 0,
            memory: BytesMut::zeroed(size),
            hw_metadata: 0,
        })
    }

    fn free_image(&self, image: PlatformImage) {
        drop(image);
    }
}

impl PixelConverter for SoftwarePlatform {
    fn convert(
        &self,
        src: &[u8],
        src_format: VideoFormat,
        dst: &mut [u8],
        dst_format: VideoFormat,
        width: u32,
        height: u32,
        stride: usize,
    ) -> Result<(), ConvertError> {
        convert_color_space(src, src_format, dst, dst_format, width, height, stride)
    }
}

impl CapabilityQuery for SoftwarePlatform {
    /// ### English
    /// Only formats stored as-is qualify, and only at their native alignment.
    ///
    /// ### 中文
    /// 只有无需转换即可存储的格式才满足条件，且必须满足其原生对齐。
    fn accepts(&self, format: VideoFormat, width: u32, height: u32) -> bool {
        if Self::real_format(format) != Some(format) {
            return false;
        }
        let (horizontal, vertical) = self.alignment(format);
        width % horizontal == 0 && height % vertical == 0
    }

    fn alignment(&self, format: VideoFormat) -> (u32, u32) {
        use VideoFormat::*;

        match format {
            Rgba | Rgbx | Bgra | Bgrx => (32, 1),
            I420 | Yv12 | Nv12 => (64, 64),
            Uyvy => (32, 1),
            Nv21 | Yuy2 | Yvyu => (1, 1),
        }
    }
}

impl ShaderSource for SoftwarePlatform {
    fn vertex_source(&self, _format: VideoFormat) -> Option<String> {
        Some(VERTEX_SOURCE.to_string())
    }

    fn fragment_source(&self, format: VideoFormat) -> Option<String> {
        let (header, sampler) = match Self::target(format)? {
            TextureTarget::Texture2D => ("", "sampler2D"),
            TextureTarget::External => (
                "#extension GL_OES_EGL_image_external : require\n",
                "samplerExternalOES",
            ),
        };
        Some(format!(
            "{header}#ifdef GL_ES
precision mediump float;
#endif
varying vec2 v_texCoord;
uniform {sampler} s_texture;
void main()
{{
  gl_FragColor = texture2D(s_texture, v_texCoord);
}}
"
        ))
    }
}
