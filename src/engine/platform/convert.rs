//! ### English
//! CPU pixel-format converters writing decoder payloads into platform image memory.
//!
//! Only a closed set of pairs is supported; everything else is reported as
//! `ConvertError::UnsupportedPair`.
//!
//! ### 中文
//! 将解码器载荷写入平台图像内存的 CPU 像素格式转换器。
//!
//! 只支持固定的格式组合；其余组合一律返回 `ConvertError::UnsupportedPair`。

use crate::engine::error::ConvertError;
use crate::engine::format::{VideoFormat, round_up};

const PAGE_SIZE: usize = 4096;

/// ### English
/// Plane offsets of a planar 4:2:0 image in platform memory.
///
/// Rows are padded to 32 and each chroma plane starts on a page boundary.
///
/// ### 中文
/// 平台内存中平面 4:2:0 图像的各平面偏移。
///
/// 行数按 32 对齐，每个色度平面从页边界开始。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlanarLayout {
    pub stride: usize,
    pub chroma_stride: usize,
    pub chroma_rows: usize,
    pub first_chroma_offset: usize,
    pub second_chroma_offset: usize,
    pub total_size: usize,
}

impl PlanarLayout {
    pub fn new(stride: usize, height: u32) -> Self {
        let height = height as usize;
        let luma_size = stride * round_up(height, 32);
        let chroma_stride = round_up(stride / 2, 32);
        let chroma_rows = round_up(round_up(height, 2) / 2, 32);
        let chroma_size = chroma_stride * chroma_rows;
        let first_chroma_offset = round_up(luma_size, PAGE_SIZE);
        let second_chroma_offset = round_up(first_chroma_offset + chroma_size, PAGE_SIZE);
        Self {
            stride,
            chroma_stride,
            chroma_rows,
            first_chroma_offset,
            second_chroma_offset,
            total_size: second_chroma_offset + chroma_size,
        }
    }
}

/// ### English
/// Plane offsets of a tightly packed planar 4:2:0 payload as decoders emit it.
///
/// ### 中文
/// 解码器输出的紧凑平面 4:2:0 载荷的各平面偏移。
#[derive(Clone, Copy, Debug)]
struct PackedPlanar {
    stride: usize,
    chroma_stride: usize,
    chroma_rows: usize,
    first_chroma_offset: usize,
    second_chroma_offset: usize,
}

impl PackedPlanar {
    fn new(width: u32, height: u32) -> Self {
        let width = width as usize;
        let rows = round_up(height as usize, 2);
        let stride = round_up(width, 4);
        let chroma_stride = round_up(width, 8) / 2;
        let chroma_rows = rows / 2;
        let first_chroma_offset = stride * rows;
        Self {
            stride,
            chroma_stride,
            chroma_rows,
            first_chroma_offset,
            second_chroma_offset: first_chroma_offset + chroma_stride * chroma_rows,
        }
    }
}

struct RowCopy {
    src_offset: usize,
    src_stride: usize,
    dst_offset: usize,
    dst_stride: usize,
    row_bytes: usize,
    rows: usize,
}

fn copy_rows(src: &[u8], dst: &mut [u8], copy: RowCopy) -> Result<(), ConvertError> {
    if copy.rows == 0 || copy.row_bytes == 0 {
        return Ok(());
    }
    let last = copy.rows - 1;

    let src_end = copy.src_offset + last * copy.src_stride + copy.row_bytes;
    if src.len() < src_end {
        return Err(ConvertError::SourceTooSmall {
            required: src_end,
            actual: src.len(),
        });
    }
    let dst_end = copy.dst_offset + last * copy.dst_stride.max(copy.row_bytes) + copy.row_bytes;
    if copy.dst_stride < copy.row_bytes || dst.len() < dst_end {
        return Err(ConvertError::DestinationTooSmall {
            required: dst_end,
            actual: dst.len(),
        });
    }

    for row in 0..copy.rows {
        let s = copy.src_offset + row * copy.src_stride;
        let d = copy.dst_offset + row * copy.dst_stride;
        dst[d..d + copy.row_bytes].copy_from_slice(&src[s..s + copy.row_bytes]);
    }
    Ok(())
}

fn copy_planar_yuv420(
    src: &[u8],
    dst: &mut [u8],
    width: u32,
    height: u32,
    stride: usize,
    swap_chroma: bool,
) -> Result<(), ConvertError> {
    let from = PackedPlanar::new(width, height);
    let to = PlanarLayout::new(stride, height);
    if dst.len() < to.total_size {
        return Err(ConvertError::DestinationTooSmall {
            required: to.total_size,
            actual: dst.len(),
        });
    }

    copy_rows(
        src,
        dst,
        RowCopy {
            src_offset: 0,
            src_stride: from.stride,
            dst_offset: 0,
            dst_stride: to.stride,
            row_bytes: from.stride,
            rows: height as usize,
        },
    )?;

    let (first, second) = if swap_chroma {
        (from.second_chroma_offset, from.first_chroma_offset)
    } else {
        (from.first_chroma_offset, from.second_chroma_offset)
    };
    for (src_offset, dst_offset) in [
        (first, to.first_chroma_offset),
        (second, to.second_chroma_offset),
    ] {
        copy_rows(
            src,
            dst,
            RowCopy {
                src_offset,
                src_stride: from.chroma_stride,
                dst_offset,
                dst_stride: to.chroma_stride,
                row_bytes: from.chroma_stride,
                rows: from.chroma_rows,
            },
        )?;
    }
    Ok(())
}

fn copy_rgb32(
    src: &[u8],
    dst: &mut [u8],
    width: u32,
    height: u32,
    stride: usize,
    force_opaque: bool,
) -> Result<(), ConvertError> {
    let row_bytes = width as usize * 4;
    copy_rows(
        src,
        dst,
        RowCopy {
            src_offset: 0,
            src_stride: row_bytes,
            dst_offset: 0,
            dst_stride: stride,
            row_bytes,
            rows: height as usize,
        },
    )?;

    if force_opaque {
        for row in 0..height as usize {
            let line = &mut dst[row * stride..row * stride + row_bytes];
            line.chunks_exact_mut(4).for_each(|pixel| pixel[3] = 0xFF);
        }
    }
    Ok(())
}

/// ### English
/// Converts one payload into platform image memory.
///
/// Supported pairs:
/// - I420 <-> YV12 (chroma planes swapped);
/// - identical planar 4:2:0 or 32-bit RGB formats (restrided copy);
/// - RGBx -> RGBA and BGRx -> BGRA (alpha forced opaque).
///
/// #### Parameters
/// - `src`/`src_format`: Tightly packed source payload.
/// - `dst`/`dst_format`: Platform image memory and its real format.
/// - `width`/`height`: Frame geometry in pixels.
/// - `stride`: Destination bytes per row of the first plane.
///
/// ### 中文
/// 将一帧载荷转换写入平台图像内存。
///
/// 支持的组合：
/// - I420 <-> YV12（交换色度平面）；
/// - 相同的平面 4:2:0 或 32 位 RGB 格式（按目标行宽复制）；
/// - RGBx -> RGBA、BGRx -> BGRA（alpha 置为不透明）。
///
/// #### 参数
/// - `src`/`src_format`：紧凑的源载荷。
/// - `dst`/`dst_format`：平台图像内存及其实际格式。
/// - `width`/`height`：帧尺寸（像素）。
/// - `stride`：目标第一平面的每行字节数。
pub fn convert_color_space(
    src: &[u8],
    src_format: VideoFormat,
    dst: &mut [u8],
    dst_format: VideoFormat,
    width: u32,
    height: u32,
    stride: usize,
) -> Result<(), ConvertError> {
    use VideoFormat::*;

    match (src_format, dst_format) {
        (I420, Yv12) | (Yv12, I420) => copy_planar_yuv420(src, dst, width, height, stride, true),
        (s, d) if s == d && s.is_planar_yuv420() => {
            copy_planar_yuv420(src, dst, width, height, stride, false)
        }
        (s, d) if s == d && s.is_rgb32() => copy_rgb32(src, dst, width, height, stride, false),
        (Rgbx, Rgba) | (Bgrx, Bgra) => copy_rgb32(src, dst, width, height, stride, true),
        (src, dst) => Err(ConvertError::UnsupportedPair { src, dst }),
    }
}
