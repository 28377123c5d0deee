//! ### English
//! Minimal GLFW binding driven by an embedder-provided function table.
//!
//! The table is owned by each backend instance, so several displays may run against
//! different GLFW builds in one process. Only thread-safe-per-context entry points are used
//! on the render thread; event pumping (`glfwPollEvents`) stays with the embedder.
//!
//! ### 中文
//! 由宿主提供函数表驱动的最小 GLFW 绑定。
//!
//! 函数表由每个 backend 实例各自持有，因此同一进程内多个显示实例可以使用不同的 GLFW 构建。
//! 渲染线程只调用按上下文线程安全的入口；事件泵（`glfwPollEvents`）仍由宿主负责。

use std::ffi::{CStr, c_char, c_int, c_void};
use std::time::Duration;

use dpi::PhysicalSize;

use crate::engine::error::GpuError;

use super::GpuBackend;
use super::glow_device::GlowDevice;

/// ### English
/// Opaque GLFW window type (`GLFWwindow`).
///
/// ### 中文
/// 不透明 GLFW window 类型（`GLFWwindow`）。
#[repr(C)]
pub struct GLFWwindow {
    _private: [u8; 0],
}

/// ### English
/// Opaque GLFW monitor type (`GLFWmonitor`).
///
/// ### 中文
/// 不透明 GLFW monitor 类型（`GLFWmonitor`）。
#[repr(C)]
pub struct GLFWmonitor {
    _private: [u8; 0],
}

pub type GlfwWindowPtr = *mut GLFWwindow;

type GlfwGetProcAddress = unsafe extern "C" fn(*const c_char) -> *const c_void;
type GlfwMakeContextCurrent = unsafe extern "C" fn(*mut GLFWwindow);
type GlfwDefaultWindowHints = unsafe extern "C" fn();
type GlfwWindowHint = unsafe extern "C" fn(c_int, c_int);
type GlfwGetWindowAttrib = unsafe extern "C" fn(*mut GLFWwindow, c_int) -> c_int;
type GlfwCreateWindow = unsafe extern "C" fn(
    c_int,
    c_int,
    *const c_char,
    *mut GLFWmonitor,
    *mut GLFWwindow,
) -> *mut GLFWwindow;
type GlfwDestroyWindow = unsafe extern "C" fn(*mut GLFWwindow);
type GlfwSwapBuffers = unsafe extern "C" fn(*mut GLFWwindow);
type GlfwWindowShouldClose = unsafe extern "C" fn(*mut GLFWwindow) -> c_int;
type GlfwGetFramebufferSize = unsafe extern "C" fn(*mut GLFWwindow, *mut c_int, *mut c_int);
type GlfwSetWindowSize = unsafe extern "C" fn(*mut GLFWwindow, c_int, c_int);

/// ### English
/// Function pointer table for GLFW symbols provided by the embedder.
///
/// All fields are raw addresses (`usize`) and must be non-zero.
///
/// ### 中文
/// 由宿主提供的 GLFW 符号函数指针表。
///
/// 所有字段都是原始地址（`usize`），必须全部为非 0。
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct EmbedderGlfwApi {
    pub glfw_get_proc_address: usize,
    pub glfw_make_context_current: usize,
    pub glfw_default_window_hints: usize,
    pub glfw_window_hint: usize,
    pub glfw_get_window_attrib: usize,
    pub glfw_create_window: usize,
    pub glfw_destroy_window: usize,
    pub glfw_swap_buffers: usize,
    pub glfw_window_should_close: usize,
    pub glfw_get_framebuffer_size: usize,
    pub glfw_set_window_size: usize,
}

/// ### English
/// Validated, typed GLFW entry points.
///
/// ### 中文
/// 已校验、带类型的 GLFW 入口函数。
#[derive(Clone, Copy)]
pub struct GlfwApi {
    get_proc_address: GlfwGetProcAddress,
    make_context_current: GlfwMakeContextCurrent,
    default_window_hints: GlfwDefaultWindowHints,
    window_hint: GlfwWindowHint,
    get_window_attrib: GlfwGetWindowAttrib,
    create_window: GlfwCreateWindow,
    destroy_window: GlfwDestroyWindow,
    swap_buffers: GlfwSwapBuffers,
    window_should_close: GlfwWindowShouldClose,
    get_framebuffer_size: GlfwGetFramebufferSize,
    set_window_size: GlfwSetWindowSize,
}

macro_rules! load_entry {
    ($api:expr, $field:ident, $ty:ty) => {{
        if $api.$field == 0 {
            return Err(GpuError::Context(format!(
                "EmbedderGlfwApi.{} is NULL",
                stringify!($field)
            )));
        }
        // SAFETY: the embedder guarantees the address points at the named GLFW function.
        unsafe { std::mem::transmute::<usize, $ty>($api.$field) }
    }};
}

impl GlfwApi {
    /// ### English
    /// Validates `api` and converts its addresses into typed function pointers.
    ///
    /// # Safety
    /// Every non-zero field must be the address of the GLFW function it is named after,
    /// all from the same GLFW library instance.
    ///
    /// ### 中文
    /// 校验 `api` 并把其中的地址转换为带类型的函数指针。
    ///
    /// # Safety
    /// 每个非 0 字段都必须是同名 GLFW 函数的地址，且全部来自同一个 GLFW 库实例。
    pub unsafe fn from_embedder(api: &EmbedderGlfwApi) -> Result<Self, GpuError> {
        Ok(Self {
            get_proc_address: load_entry!(api, glfw_get_proc_address, GlfwGetProcAddress),
            make_context_current: load_entry!(
                api,
                glfw_make_context_current,
                GlfwMakeContextCurrent
            ),
            default_window_hints: load_entry!(
                api,
                glfw_default_window_hints,
                GlfwDefaultWindowHints
            ),
            window_hint: load_entry!(api, glfw_window_hint, GlfwWindowHint),
            get_window_attrib: load_entry!(api, glfw_get_window_attrib, GlfwGetWindowAttrib),
            create_window: load_entry!(api, glfw_create_window, GlfwCreateWindow),
            destroy_window: load_entry!(api, glfw_destroy_window, GlfwDestroyWindow),
            swap_buffers: load_entry!(api, glfw_swap_buffers, GlfwSwapBuffers),
            window_should_close: load_entry!(
                api,
                glfw_window_should_close,
                GlfwWindowShouldClose
            ),
            get_framebuffer_size: load_entry!(
                api,
                glfw_get_framebuffer_size,
                GlfwGetFramebufferSize
            ),
            set_window_size: load_entry!(api, glfw_set_window_size, GlfwSetWindowSize),
        })
    }

    #[inline]
    pub unsafe fn make_current(&self, window: GlfwWindowPtr) {
        unsafe { (self.make_context_current)(window) };
    }

    #[inline]
    pub unsafe fn get_proc_address(&self, name: &CStr) -> *const c_void {
        unsafe { (self.get_proc_address)(name.as_ptr()) }
    }

    #[inline]
    pub unsafe fn destroy_window(&self, window: GlfwWindowPtr) {
        unsafe { (self.destroy_window)(window) };
    }

    #[inline]
    pub unsafe fn swap_buffers(&self, window: GlfwWindowPtr) {
        unsafe { (self.swap_buffers)(window) };
    }

    #[inline]
    pub unsafe fn should_close(&self, window: GlfwWindowPtr) -> bool {
        unsafe { (self.window_should_close)(window) != 0 }
    }

    pub unsafe fn framebuffer_size(&self, window: GlfwWindowPtr) -> PhysicalSize<u32> {
        let mut width: c_int = 0;
        let mut height: c_int = 0;
        unsafe { (self.get_framebuffer_size)(window, &mut width, &mut height) };
        PhysicalSize::new(width.max(0) as u32, height.max(0) as u32)
    }

    #[inline]
    pub unsafe fn set_window_size(&self, window: GlfwWindowPtr, size: PhysicalSize<u32>) {
        unsafe { (self.set_window_size)(window, size.width as c_int, size.height as c_int) };
    }

    /// ### English
    /// Creates the display window. When `share` is non-null the new context copies its
    /// client API/version/profile and shares objects with it.
    ///
    /// #### Parameters
    /// - `share`: Window whose context objects are shared, or null.
    /// - `size`: Initial window size.
    ///
    /// ### 中文
    /// 创建显示窗口。`share` 非空时，新上下文沿用其 client API/版本/profile 并与其共享对象。
    ///
    /// #### 参数
    /// - `share`：需要共享对象的窗口，或 null。
    /// - `size`：初始窗口尺寸。
    pub unsafe fn create_display_window(
        &self,
        share: GlfwWindowPtr,
        size: PhysicalSize<u32>,
    ) -> Result<GlfwWindowPtr, GpuError> {
        const GLFW_TRUE: c_int = 1;
        const GLFW_VISIBLE: c_int = 0x0002_0004;
        const GLFW_RESIZABLE: c_int = 0x0002_0003;

        const GLFW_CLIENT_API: c_int = 0x0002_2001;
        const GLFW_CONTEXT_VERSION_MAJOR: c_int = 0x0002_2002;
        const GLFW_CONTEXT_VERSION_MINOR: c_int = 0x0002_2003;
        const GLFW_OPENGL_FORWARD_COMPAT: c_int = 0x0002_2006;
        const GLFW_OPENGL_PROFILE: c_int = 0x0002_2008;
        const GLFW_CONTEXT_CREATION_API: c_int = 0x0002_200B;

        unsafe { (self.default_window_hints)() };
        unsafe { (self.window_hint)(GLFW_VISIBLE, GLFW_TRUE) };
        unsafe { (self.window_hint)(GLFW_RESIZABLE, GLFW_TRUE) };

        if !share.is_null() {
            for hint in [
                GLFW_CLIENT_API,
                GLFW_CONTEXT_VERSION_MAJOR,
                GLFW_CONTEXT_VERSION_MINOR,
                GLFW_OPENGL_PROFILE,
                GLFW_CONTEXT_CREATION_API,
            ] {
                let value = unsafe { (self.get_window_attrib)(share, hint) };
                if value > 0 {
                    unsafe { (self.window_hint)(hint, value) };
                }
            }
            let forward = unsafe { (self.get_window_attrib)(share, GLFW_OPENGL_FORWARD_COMPAT) };
            unsafe { (self.window_hint)(GLFW_OPENGL_FORWARD_COMPAT, forward) };
        }

        let title = c"gl-display";
        let window = unsafe {
            (self.create_window)(
                size.width.max(1) as c_int,
                size.height.max(1) as c_int,
                title.as_ptr(),
                std::ptr::null_mut(),
                share,
            )
        };
        unsafe { (self.default_window_hints)() };

        if window.is_null() {
            return Err(GpuError::Context(
                "glfwCreateWindow failed; ensure GLFW is initialized and the shared context is valid"
                    .to_string(),
            ));
        }
        Ok(window)
    }
}

/// ### English
/// `GpuBackend` that renders into a GLFW window through `glow`.
///
/// ### 中文
/// 通过 `glow` 渲染到 GLFW 窗口的 `GpuBackend`。
pub struct GlfwBackend {
    api: GlfwApi,
    poll_interval: Duration,
}

impl GlfwBackend {
    /// ### English
    /// Default interval at which the idle render thread checks window size/close state.
    ///
    /// ### 中文
    /// 空闲渲染线程检查窗口尺寸/关闭状态的默认间隔。
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(16);

    /// ### English
    /// Builds a backend from an embedder function table.
    ///
    /// # Safety
    /// See `GlfwApi::from_embedder`.
    ///
    /// ### 中文
    /// 基于宿主函数表构建 backend。
    ///
    /// # Safety
    /// 参见 `GlfwApi::from_embedder`。
    pub unsafe fn new(api: &EmbedderGlfwApi) -> Result<Self, GpuError> {
        Ok(Self {
            api: unsafe { GlfwApi::from_embedder(api)? },
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
        })
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

impl GpuBackend for GlfwBackend {
    type Device = GlowDevice;

    fn create_device(
        self,
        external_context: Option<u64>,
        initial_size: PhysicalSize<u32>,
    ) -> Result<GlowDevice, GpuError> {
        let share = external_context.unwrap_or(0) as usize as GlfwWindowPtr;
        let window = unsafe { self.api.create_display_window(share, initial_size)? };
        unsafe { GlowDevice::new(self.api, window, self.poll_interval) }
    }
}
