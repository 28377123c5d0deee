//! ### English
//! C ABI surface for `gl_display`.
//!
//! All exported symbols are `extern "C"` functions prefixed `gl_display_`; handles are opaque
//! `#[repr(C)]` structs owned by Rust. Every function accepts NULL handles and fails softly.
//!
//! ### 中文
//! `gl_display` 的 C ABI 接口层。
//!
//! 所有导出符号均为带 `gl_display_` 前缀的 `extern "C"` 函数；句柄是由 Rust 持有的不透明
//! `#[repr(C)]` 结构体。所有函数都接受 NULL 句柄并以失败值返回。
mod abi;
mod display;
mod frame;

use crate::engine::{Display, Frame, GlfwBackend};

/// ### English
/// Version of the exported C ABI; bumped on any incompatible signature change.
///
/// ### 中文
/// 导出 C ABI 的版本号；任何不兼容的签名变更都会递增。
pub const GL_DISPLAY_ABI_VERSION: u32 = 1;

#[repr(C)]
/// ### English
/// Opaque display handle owning the render thread.
///
/// ### 中文
/// 不透明显示句柄，持有渲染线程。
pub struct GlDisplay {
    /// ### English
    /// Display façade driving a GLFW-backed render thread.
    ///
    /// ### 中文
    /// 驱动 GLFW 渲染线程的显示门面。
    display: Display<GlfwBackend>,
}

#[repr(C)]
/// ### English
/// Opaque frame handle. One handle is one reference; release it with
/// `gl_display_frame_release`.
///
/// ### 中文
/// 不透明帧句柄。一个句柄即一个引用；使用 `gl_display_frame_release` 释放。
pub struct GlDisplayFrame {
    frame: Frame,
}

/// ### English
/// Borrows the display behind a handle.
///
/// # Safety
/// `display` must be NULL or a live pointer returned by `gl_display_new`.
///
/// ### 中文
/// 借用句柄背后的显示实例。
///
/// # Safety
/// `display` 必须为 NULL，或是 `gl_display_new` 返回的存活指针。
unsafe fn display_ref<'a>(display: *const GlDisplay) -> Option<&'a Display<GlfwBackend>> {
    unsafe { display.as_ref() }.map(|handle| &handle.display)
}

/// ### English
/// Borrows the frame behind a handle.
///
/// # Safety
/// `frame` must be NULL or a live pointer returned by `gl_display_allocate_frame`.
///
/// ### 中文
/// 借用句柄背后的帧。
///
/// # Safety
/// `frame` 必须为 NULL，或是 `gl_display_allocate_frame` 返回的存活指针。
unsafe fn frame_ref<'a>(frame: *const GlDisplayFrame) -> Option<&'a Frame> {
    unsafe { frame.as_ref() }.map(|handle| &handle.frame)
}
