//! ### English
//! Viewport and sampler-rectangle math for the redisplay quad.
//!
//! ### 中文
//! 重显示四边形的视口与采样矩形计算。

use dpi::PhysicalSize;

use crate::engine::format::CropRect;
use crate::engine::gpu::{SamplerRect, Viewport};

/// ### English
/// Scales `src` into `dst` preserving its aspect ratio, centered. A zero-sized source fills
/// `dst`.
///
/// ### 中文
/// 保持宽高比将 `src` 缩放进 `dst` 并居中。源尺寸为 0 时铺满 `dst`。
pub fn center_rect(src: PhysicalSize<u32>, dst: PhysicalSize<u32>) -> Viewport {
    let fill = Viewport {
        x: 0,
        y: 0,
        width: dst.width as i32,
        height: dst.height as i32,
    };
    if src.width == 0 || src.height == 0 || dst.width == 0 || dst.height == 0 {
        return fill;
    }

    let src_ratio = src.width as f64 / src.height as f64;
    let dst_ratio = dst.width as f64 / dst.height as f64;

    let (width, height) = if src_ratio > dst_ratio {
        (dst.width, (dst.width as f64 / src_ratio) as u32)
    } else if src_ratio < dst_ratio {
        ((dst.height as f64 * src_ratio) as u32, dst.height)
    } else {
        return fill;
    };

    Viewport {
        x: ((dst.width - width) / 2) as i32,
        y: ((dst.height - height) / 2) as i32,
        width: width as i32,
        height: height as i32,
    }
}

/// ### English
/// Normalized texture-coordinate bounds that hide `crop` on a `width`x`height` texture.
///
/// ### 中文
/// 在 `width`x`height` 纹理上隐藏 `crop` 区域的归一化纹理坐标范围。
pub fn sampler_rect(width: u32, height: u32, crop: CropRect) -> SamplerRect {
    if width == 0 || height == 0 {
        return SamplerRect::default();
    }
    let w = width as f32;
    let h = height as f32;
    SamplerRect {
        left: crop.left as f32 / w,
        right: (w - crop.right as f32) / w,
        top: (h - crop.bottom as f32) / h,
        bottom: crop.top as f32 / h,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wider_source_is_letterboxed() {
        let viewport = center_rect(PhysicalSize::new(1920, 1080), PhysicalSize::new(800, 800));
        assert_eq!(
            viewport,
            Viewport {
                x: 0,
                y: 175,
                width: 800,
                height: 450,
            }
        );
    }

    #[test]
    fn taller_source_is_pillarboxed() {
        let viewport = center_rect(PhysicalSize::new(480, 640), PhysicalSize::new(1000, 640));
        assert_eq!(
            viewport,
            Viewport {
                x: 260,
                y: 0,
                width: 480,
                height: 640,
            }
        );
    }

    #[test]
    fn degenerate_source_fills_destination() {
        let dst = PhysicalSize::new(320, 240);
        let full = Viewport {
            x: 0,
            y: 0,
            width: 320,
            height: 240,
        };
        assert_eq!(center_rect(PhysicalSize::new(0, 0), dst), full);
        assert_eq!(center_rect(PhysicalSize::new(640, 480), dst), full);
    }

    #[test]
    fn crop_padding_is_excluded_from_sampling() {
        let crop = CropRect {
            left: 0,
            top: 0,
            right: 3,
            bottom: 1,
        };
        let rect = sampler_rect(64, 32, crop);
        assert_eq!(rect.left, 0.0);
        assert_eq!(rect.right, 61.0 / 64.0);
        assert_eq!(rect.top, 31.0 / 32.0);
        assert_eq!(rect.bottom, 0.0);

        assert_eq!(sampler_rect(64, 32, CropRect::default()), SamplerRect::default());
    }
}
