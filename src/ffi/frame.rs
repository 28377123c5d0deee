//! ### English
//! C ABI bindings for frame allocation, upload and release.
//!
//! ### 中文
//! 帧分配、上传与释放相关的 C ABI 绑定。

use bytes::Bytes;

use crate::engine::{CropRect, FrameRequest, VideoFormat};

use super::{GlDisplay, GlDisplayFrame, display_ref, frame_ref};

#[unsafe(no_mangle)]
/// ### English
/// Allocates a frame with a pooled texture. Blocks while the pool is exhausted.
///
/// Returns NULL when the display is not alive, `format` is unknown, `payload_size` (if not
/// `usize::MAX`) disagrees with the format, the platform rejects the geometry, or texture
/// allocation failed.
///
/// #### Parameters
/// - `format`: `VideoFormat` code.
/// - `width`/`height`: Frame size in pixels.
/// - `crop`: Optional crop rectangle (NULL = none).
/// - `payload_size`: Size of the payload that will be uploaded, or `usize::MAX` to skip the check.
///
/// ### 中文
/// 分配一个带池化纹理的帧。纹理池耗尽时阻塞。
///
/// 以下情况返回 NULL：显示实例未存活、`format` 未知、`payload_size`（非 `usize::MAX` 时）与
/// 格式不符、平台拒绝该尺寸、纹理分配失败。
///
/// #### 参数
/// - `format`：`VideoFormat` 编码。
/// - `width`/`height`：帧像素尺寸。
/// - `crop`：可选的裁剪矩形（NULL 表示无）。
/// - `payload_size`：将要上传的载荷大小；传 `usize::MAX` 跳过检查。
pub unsafe extern "C" fn gl_display_allocate_frame(
    display: *const GlDisplay,
    format: u32,
    width: u32,
    height: u32,
    crop: *const CropRect,
    payload_size: usize,
) -> *mut GlDisplayFrame {
    let Some(display) = (unsafe { display_ref(display) }) else {
        return std::ptr::null_mut();
    };
    let Some(format) = VideoFormat::from_code(format) else {
        tracing::warn!(format, "unknown video format code");
        return std::ptr::null_mut();
    };

    let crop = unsafe { crop.as_ref() }.copied().unwrap_or_default();
    let mut request = FrameRequest::new(format, width, height).with_crop(crop);
    if payload_size != usize::MAX {
        request = request.with_expected_size(payload_size);
    }

    match display.allocate_frame_with(&request) {
        Ok(frame) => Box::into_raw(Box::new(GlDisplayFrame { frame })),
        Err(err) => {
            tracing::debug!(%err, "gl_display_allocate_frame failed");
            std::ptr::null_mut()
        }
    }
}

#[unsafe(no_mangle)]
/// ### English
/// Returns the GL texture name of a frame, or 0.
///
/// ### 中文
/// 返回帧的 GL 纹理名，没有则为 0。
pub unsafe extern "C" fn gl_display_frame_texture_id(frame: *const GlDisplayFrame) -> u32 {
    unsafe { frame_ref(frame) }
        .and_then(|frame| frame.texture_id())
        .unwrap_or(0)
}

#[unsafe(no_mangle)]
/// ### English
/// Releases one frame handle. The texture returns to the pool once no display slot holds the
/// frame either.
///
/// ### 中文
/// 释放一个帧句柄。当显示槽位也不再持有该帧时，纹理回到纹理池。
pub unsafe extern "C" fn gl_display_frame_release(frame: *mut GlDisplayFrame) {
    if frame.is_null() {
        return;
    }
    unsafe {
        drop(Box::from_raw(frame));
    }
}

#[unsafe(no_mangle)]
/// ### English
/// Copies `len` bytes at `data` into the frame's texture. Blocks until the render thread is
/// done with the data; returns `true` on success.
///
/// ### 中文
/// 把 `data` 处的 `len` 字节写入帧的纹理。阻塞直到渲染线程用完数据；成功返回 `true`。
pub unsafe extern "C" fn gl_display_upload(
    display: *const GlDisplay,
    frame: *const GlDisplayFrame,
    data: *const u8,
    len: usize,
) -> bool {
    let (Some(display), Some(frame)) = (unsafe { display_ref(display) }, unsafe { frame_ref(frame) })
    else {
        return false;
    };
    if data.is_null() || len == 0 {
        return false;
    }

    let payload = Bytes::copy_from_slice(unsafe { std::slice::from_raw_parts(data, len) });
    match display.upload(frame, payload) {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(%err, "gl_display_upload failed");
            false
        }
    }
}
