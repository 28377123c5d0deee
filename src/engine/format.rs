//! ### English
//! Pixel formats understood by the display engine, their packed payload sizes and the
//! row/height rounding the texture allocator expects.
//!
//! ### 中文
//! 显示引擎支持的像素格式、打包载荷大小，以及纹理分配器要求的行宽/行数对齐规则。

/// ### English
/// Raw video pixel format of a payload or texture.
///
/// The discriminants are the stable codes used by the C ABI.
///
/// ### 中文
/// 载荷或纹理的原始视频像素格式。
///
/// 判别值即 C ABI 使用的稳定编码。
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VideoFormat {
    I420 = 1,
    Yv12 = 2,
    Nv12 = 3,
    Nv21 = 4,
    Yuy2 = 5,
    Yvyu = 6,
    Uyvy = 7,
    Rgba = 8,
    Bgra = 9,
    Rgbx = 10,
    Bgrx = 11,
}

impl VideoFormat {
    /// ### English
    /// Decodes a C ABI format code; unknown codes yield `None`.
    ///
    /// ### 中文
    /// 解码 C ABI 格式编码；未知编码返回 `None`。
    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            1 => Self::I420,
            2 => Self::Yv12,
            3 => Self::Nv12,
            4 => Self::Nv21,
            5 => Self::Yuy2,
            6 => Self::Yvyu,
            7 => Self::Uyvy,
            8 => Self::Rgba,
            9 => Self::Bgra,
            10 => Self::Rgbx,
            11 => Self::Bgrx,
            _ => return None,
        })
    }

    #[inline]
    pub fn code(self) -> u32 {
        self as u32
    }

    /// ### English
    /// 32-bit packed RGB variants (with or without a meaningful alpha byte).
    ///
    /// ### 中文
    /// 32 位打包 RGB 变体（alpha 字节可能有效也可能无效）。
    #[inline]
    pub fn is_rgb32(self) -> bool {
        matches!(self, Self::Rgba | Self::Bgra | Self::Rgbx | Self::Bgrx)
    }

    /// ### English
    /// 4:2:0 layouts with a full-resolution luma plane followed by chroma data.
    ///
    /// ### 中文
    /// 4:2:0 布局：全分辨率亮度平面后接色度数据。
    #[inline]
    pub fn is_yuv420(self) -> bool {
        matches!(self, Self::I420 | Self::Yv12 | Self::Nv12 | Self::Nv21)
    }

    /// ### English
    /// Fully planar 4:2:0 (three planes).
    ///
    /// ### 中文
    /// 完全平面的 4:2:0（三个平面）。
    #[inline]
    pub fn is_planar_yuv420(self) -> bool {
        matches!(self, Self::I420 | Self::Yv12)
    }

    #[inline]
    pub fn is_packed_yuv422(self) -> bool {
        matches!(self, Self::Yuy2 | Self::Yvyu | Self::Uyvy)
    }

    /// ### English
    /// Size in bytes of one tightly packed payload of this format.
    ///
    /// Rows are rounded the same way decoders lay them out, so a payload whose length
    /// differs from this value does not describe a `width`x`height` frame.
    ///
    /// #### Parameters
    /// - `width`: Frame width in pixels.
    /// - `height`: Frame height in pixels.
    ///
    /// ### 中文
    /// 该格式下一帧紧凑载荷的字节大小。
    ///
    /// 行宽的取整方式与解码器一致；长度不等于该值的载荷不能描述 `width`x`height` 的帧。
    ///
    /// #### 参数
    /// - `width`：帧宽（像素）。
    /// - `height`：帧高（像素）。
    pub fn frame_size(self, width: u32, height: u32) -> usize {
        let width = width as usize;
        let height = height as usize;
        match self {
            Self::I420 | Self::Yv12 => {
                let luma = round_up(width, 4) * round_up(height, 2);
                let chroma_stride = round_up(round_up(width, 2) / 2, 4);
                luma + 2 * chroma_stride * (round_up(height, 2) / 2)
            }
            Self::Nv12 | Self::Nv21 => {
                let stride = round_up(width, 4);
                let rows = round_up(height, 2);
                stride * rows + stride * rows / 2
            }
            Self::Yuy2 | Self::Yvyu | Self::Uyvy => round_up(width * 2, 4) * height,
            Self::Rgba | Self::Bgra | Self::Rgbx | Self::Bgrx => width * 4 * height,
        }
    }
}

#[inline]
pub(crate) fn round_up(value: usize, align: usize) -> usize {
    value.div_ceil(align) * align
}

/// ### English
/// Pixels cropped away from each edge of a frame.
///
/// ### 中文
/// 帧四周被裁掉的像素数。
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CropRect {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

/// ### English
/// Texture geometry after alignment, with the padding folded into the crop.
///
/// ### 中文
/// 对齐后的纹理几何尺寸；新增的填充会计入裁剪区域。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AlignedGeometry {
    pub width: u32,
    pub height: u32,
    pub crop: CropRect,
}

/// ### English
/// Rounds `width`/`height` up to what the texture allocator requires for `format`.
///
/// 4:2:0 formats need an even height and a width that is a multiple of 4; packed 4:2:2
/// needs an even width. The extra columns/rows are hidden again through `crop`.
///
/// ### 中文
/// 按 `format` 的要求把 `width`/`height` 向上取整。
///
/// 4:2:0 格式要求高度为偶数、宽度为 4 的倍数；打包 4:2:2 要求宽度为偶数。
/// 多出来的列/行通过 `crop` 再隐藏掉。
pub fn align_buffer_size(
    format: VideoFormat,
    width: u32,
    height: u32,
    crop: CropRect,
) -> AlignedGeometry {
    let (aligned_width, aligned_height) = if format.is_yuv420() {
        (width.next_multiple_of(4), height.next_multiple_of(2))
    } else if format.is_packed_yuv422() {
        (width.next_multiple_of(2), height)
    } else {
        (width, height)
    };

    AlignedGeometry {
        width: aligned_width,
        height: aligned_height,
        crop: CropRect {
            right: crop.right + (aligned_width - width),
            bottom: crop.bottom + (aligned_height - height),
            ..crop
        },
    }
}

/// ### English
/// Texture binding point a format is sampled through.
///
/// ### 中文
/// 采样某格式时使用的纹理绑定目标。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureTarget {
    /// ### English
    /// `GL_TEXTURE_2D`.
    ///
    /// ### 中文
    /// `GL_TEXTURE_2D`。
    Texture2D,
    /// ### English
    /// `GL_TEXTURE_EXTERNAL_OES`, for platform images with driver-side color conversion.
    ///
    /// ### 中文
    /// `GL_TEXTURE_EXTERNAL_OES`，用于由驱动完成颜色转换的平台图像。
    External,
}

impl TextureTarget {
    pub const GL_TEXTURE_EXTERNAL_OES: u32 = 0x8D65;

    #[inline]
    pub fn gl_enum(self) -> u32 {
        match self {
            Self::Texture2D => glow::TEXTURE_2D,
            Self::External => Self::GL_TEXTURE_EXTERNAL_OES,
        }
    }
}
