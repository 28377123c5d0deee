//! ### English
//! C ABI bindings for the display lifecycle and presentation.
//!
//! ### 中文
//! 显示实例生命周期与呈现相关的 C ABI 绑定。

use std::sync::Arc;

use crate::engine::{
    DEFAULT_POOL_CAPACITY, Display, DisplayConfig, EmbedderGlfwApi, GlfwBackend, SoftwarePlatform,
    flags,
};

use super::{GlDisplay, GlDisplayFrame, display_ref, frame_ref};

#[unsafe(no_mangle)]
/// ### English
/// Creates a display bound to an embedder-provided GLFW function table.
///
/// No thread is started yet; call `gl_display_create_context` next. Returns NULL when `glfw_api`
/// is NULL or incomplete.
///
/// #### Parameters
/// - `flags`: `GL_DISPLAY_FLAG_*` bitmask.
/// - `pool_capacity`: Maximum textures held at once (`0` = default of 32).
/// - `glfw_api`: GLFW entry points from the same library instance as the embedder's windows.
///
/// ### 中文
/// 基于宿主提供的 GLFW 函数表创建显示实例。
///
/// 此时尚未启动线程；接下来请调用 `gl_display_create_context`。`glfw_api` 为 NULL 或不完整时
/// 返回 NULL。
///
/// #### 参数
/// - `flags`：`GL_DISPLAY_FLAG_*` 位掩码。
/// - `pool_capacity`：同时持有纹理数上限（`0` 表示默认值 32）。
/// - `glfw_api`：与宿主窗口来自同一 GLFW 库实例的入口函数。
pub unsafe extern "C" fn gl_display_new(
    flags: u32,
    pool_capacity: u32,
    glfw_api: *const EmbedderGlfwApi,
) -> *mut GlDisplay {
    let Some(api) = (unsafe { glfw_api.as_ref() }) else {
        return std::ptr::null_mut();
    };
    let backend = match unsafe { GlfwBackend::new(api) } {
        Ok(backend) => backend,
        Err(err) => {
            tracing::error!(%err, "rejecting GLFW function table");
            return std::ptr::null_mut();
        }
    };

    let capacity = match pool_capacity {
        0 => DEFAULT_POOL_CAPACITY,
        n => n as usize,
    };
    let config = flags::apply(DisplayConfig::default().with_pool_capacity(capacity), flags);
    let display = Display::new(config, Arc::new(SoftwarePlatform), backend);

    Box::into_raw(Box::new(GlDisplay { display }))
}

#[unsafe(no_mangle)]
/// ### English
/// Starts the render thread and creates the GL context, sharing objects with
/// `shared_window` (a `GLFWwindow*`, or NULL). Blocks until done; returns `true` on success.
///
/// ### 中文
/// 启动渲染线程并创建 GL 上下文，与 `shared_window`（`GLFWwindow*`，可为 NULL）共享对象。
/// 阻塞直到完成；成功返回 `true`。
pub unsafe extern "C" fn gl_display_create_context(
    display: *const GlDisplay,
    shared_window: usize,
) -> bool {
    let Some(display) = (unsafe { display_ref(display) }) else {
        return false;
    };
    let external = (shared_window != 0).then_some(shared_window as u64);
    match display.create_context(external) {
        Ok(()) => true,
        Err(err) => {
            tracing::error!(%err, "gl_display_create_context failed");
            false
        }
    }
}

#[unsafe(no_mangle)]
/// ### English
/// Destroys the GL context and joins the render thread. Safe to call more than once.
///
/// ### 中文
/// 销毁 GL 上下文并 join 渲染线程。可多次调用。
pub unsafe extern "C" fn gl_display_destroy_context(display: *const GlDisplay) {
    if let Some(display) = unsafe { display_ref(display) } {
        display.destroy_context();
    }
}

#[unsafe(no_mangle)]
/// ### English
/// Frees a display created by `gl_display_new`, destroying its context first.
///
/// Frame handles may outlive the display; release them as usual.
///
/// ### 中文
/// 释放由 `gl_display_new` 创建的显示实例（会先销毁其上下文）。
///
/// 帧句柄可以比显示实例活得更久；照常释放即可。
pub unsafe extern "C" fn gl_display_free(display: *mut GlDisplay) {
    if display.is_null() {
        return;
    }
    unsafe {
        drop(Box::from_raw(display));
    }
}

#[unsafe(no_mangle)]
/// ### English
/// Queues `frame` for presentation (NULL redraws the last frame). Blocks while another frame
/// is still waiting. Returns whether the display is alive.
///
/// ### 中文
/// 把 `frame` 排入呈现队列（NULL 表示重绘上一帧）。已有帧在等待时阻塞。
/// 返回显示实例是否仍存活。
pub unsafe extern "C" fn gl_display_present(
    display: *const GlDisplay,
    frame: *const GlDisplayFrame,
    window_width: u32,
    window_height: u32,
    keep_aspect_ratio: bool,
) -> bool {
    let Some(display) = (unsafe { display_ref(display) }) else {
        return false;
    };
    let frame = unsafe { frame_ref(frame) };
    display.present(frame, window_width, window_height, keep_aspect_ratio)
}

#[unsafe(no_mangle)]
/// ### English
/// Presents into the embedder's `GLFWwindow*` from now on (0 = back to the display's own
/// window).
///
/// ### 中文
/// 此后呈现到宿主的 `GLFWwindow*`（0 表示切回显示实例自己的窗口）。
pub unsafe extern "C" fn gl_display_set_window_handle(display: *const GlDisplay, window: usize) {
    if let Some(display) = unsafe { display_ref(display) } {
        let _ = display.set_window_handle(window as u64);
    }
}

#[unsafe(no_mangle)]
/// ### English
/// Returns the display's own `GLFWwindow*` (its context handle), or 0.
///
/// ### 中文
/// 返回显示实例自身的 `GLFWwindow*`（即其上下文句柄），没有则为 0。
pub unsafe extern "C" fn gl_display_get_internal_context_handle(display: *const GlDisplay) -> usize {
    unsafe { display_ref(display) }.map_or(0, |display| display.internal_context_handle() as usize)
}

#[unsafe(no_mangle)]
/// ### English
/// Makes the context current (`true`) or releases it (`false`) on the render thread.
///
/// ### 中文
/// 在渲染线程上使上下文成为 current（`true`）或释放（`false`）。
pub unsafe extern "C" fn gl_display_activate_context(
    display: *const GlDisplay,
    activate: bool,
) -> bool {
    unsafe { display_ref(display) }.is_some_and(|display| display.activate_context(activate))
}
