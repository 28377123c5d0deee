//! ### English
//! `glow`-backed GPU device bound to a GLFW window.
//!
//! ### 中文
//! 基于 `glow`、绑定到 GLFW 窗口的 GPU 设备。

use std::ffi::c_void;
use std::num::NonZeroU32;
use std::time::Duration;

use dpi::PhysicalSize;
use glow::HasContext as _;

use crate::engine::error::GpuError;
use crate::engine::format::{TextureTarget, VideoFormat};
use crate::engine::texture::{PlatformImage, TextureSpec};

use super::glfw::{GlfwApi, GlfwWindowPtr};
use super::{ContextInfo, GpuDevice, SamplerRect, Viewport, WindowEvent};

type EglImageTargetTexture2D = unsafe extern "C" fn(u32, *mut c_void);

const QUAD_INDICES: [u8; 6] = [0, 1, 2, 0, 2, 3];

fn parse_gl_version(version: &str) -> (u32, u32) {
    // "4.6.0 NVIDIA ..." or "OpenGL ES 3.2 ..."
    let Some(token) = version
        .split_whitespace()
        .find(|t| t.starts_with(|c: char| c.is_ascii_digit()))
    else {
        return (0, 0);
    };
    let mut parts = token.split('.').map(|p| p.parse::<u32>().unwrap_or(0));
    (parts.next().unwrap_or(0), parts.next().unwrap_or(0))
}

/// ### English
/// Linked redisplay program and the locations it is driven through.
///
/// ### 中文
/// 已链接的重显示程序及其驱动所需的 location。
pub struct GlowProgram {
    program: glow::NativeProgram,
    position: u32,
    tex_coord: u32,
    sampler: Option<glow::NativeUniformLocation>,
}

/// ### English
/// GL context current on the render thread plus the quad buffers used for redisplay.
///
/// ### 中文
/// 在渲染线程上 current 的 GL 上下文，以及重显示用的四边形缓冲。
pub struct GlowDevice {
    api: GlfwApi,
    gl: glow::Context,
    /// ### English
    /// Window created (and destroyed) by this device.
    ///
    /// ### 中文
    /// 本设备创建（并负责销毁）的窗口。
    own_window: GlfwWindowPtr,
    /// ### English
    /// Window currently presented to; an embedder window after `set_window_handle`.
    ///
    /// ### 中文
    /// 当前呈现的目标窗口；调用 `set_window_handle` 后为宿主窗口。
    surface: GlfwWindowPtr,
    is_gles: bool,
    has_vertex_arrays: bool,
    vertex_array: Option<glow::NativeVertexArray>,
    vertex_buffer: glow::NativeBuffer,
    index_buffer: glow::NativeBuffer,
    egl_image_target: Option<EglImageTargetTexture2D>,
    surface_size: PhysicalSize<u32>,
    close_reported: bool,
    poll_interval: Duration,
}

impl GlowDevice {
    /// ### English
    /// Makes `window` current and loads GL through GLFW.
    ///
    /// # Safety
    /// `window` must be a live GLFW window created through `api`, on the calling thread.
    ///
    /// ### 中文
    /// 使 `window` 成为 current，并通过 GLFW 加载 GL。
    ///
    /// # Safety
    /// `window` 必须是通过 `api` 创建的、在调用线程上存活的 GLFW window。
    pub(super) unsafe fn new(
        api: GlfwApi,
        window: GlfwWindowPtr,
        poll_interval: Duration,
    ) -> Result<Self, GpuError> {
        unsafe { api.make_current(window) };

        let gl = unsafe {
            glow::Context::from_loader_function_cstr(|name| api.get_proc_address(name))
        };

        let version = unsafe { gl.get_parameter_string(glow::VERSION) };
        let is_gles = version.starts_with("OpenGL ES");
        let (major, _minor) = parse_gl_version(&version);
        if major < 2 {
            unsafe {
                api.make_current(std::ptr::null_mut());
                api.destroy_window(window);
            }
            return Err(GpuError::Context(format!(
                "OpenGL (ES) 2.0 or newer is required, got {version:?}"
            )));
        }
        let has_vertex_arrays = major >= 3;

        let buffers = unsafe {
            gl.create_buffer()
                .and_then(|vbo| gl.create_buffer().map(|ebo| (vbo, ebo)))
        };
        let (vertex_buffer, index_buffer) = match buffers {
            Ok(buffers) => buffers,
            Err(err) => {
                unsafe {
                    api.make_current(std::ptr::null_mut());
                    api.destroy_window(window);
                }
                return Err(GpuError::Context(format!("quad buffer creation failed: {err}")));
            }
        };

        unsafe {
            gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(index_buffer));
            gl.buffer_data_u8_slice(glow::ELEMENT_ARRAY_BUFFER, &QUAD_INDICES, glow::STATIC_DRAW);
            gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, None);
        }

        let egl_image_target = unsafe {
            let address = api.get_proc_address(c"glEGLImageTargetTexture2DOES");
            (!address.is_null())
                .then(|| std::mem::transmute::<*const c_void, EglImageTargetTexture2D>(address))
        };

        let surface_size = unsafe { api.framebuffer_size(window) };

        let mut device = Self {
            api,
            gl,
            own_window: window,
            surface: window,
            is_gles,
            has_vertex_arrays,
            vertex_array: None,
            vertex_buffer,
            index_buffer,
            egl_image_target,
            surface_size,
            close_reported: false,
            poll_interval,
        };
        device.bind_vertex_array();
        Ok(device)
    }

    /// ### English
    /// Vertex array objects are per context: (re)create one for the current surface.
    ///
    /// ### 中文
    /// VAO 不在上下文间共享：为当前 surface 重新创建一个。
    fn bind_vertex_array(&mut self) {
        if !self.has_vertex_arrays {
            return;
        }
        unsafe {
            if let Some(old) = self.vertex_array.take() {
                self.gl.delete_vertex_array(old);
            }
            match self.gl.create_vertex_array() {
                Ok(vao) => {
                    self.gl.bind_vertex_array(Some(vao));
                    self.vertex_array = Some(vao);
                }
                Err(err) => tracing::warn!(%err, "vertex array creation failed"),
            }
        }
    }

    fn native_texture(texture: u32) -> Option<glow::NativeTexture> {
        NonZeroU32::new(texture).map(glow::NativeTexture)
    }

    /// ### English
    /// `(internal format, pixel format)` for payloads the device can take directly.
    ///
    /// ### 中文
    /// 设备可直接接收的载荷对应的 `(内部格式, 像素格式)`。
    fn transfer_format(&self, format: VideoFormat) -> Option<(u32, u32)> {
        match format {
            VideoFormat::Rgba | VideoFormat::Rgbx => Some((glow::RGBA, glow::RGBA)),
            VideoFormat::Bgra | VideoFormat::Bgrx if self.is_gles => {
                Some((glow::BGRA, glow::BGRA))
            }
            VideoFormat::Bgra | VideoFormat::Bgrx => Some((glow::RGBA, glow::BGRA)),
            _ => None,
        }
    }

    unsafe fn compile_shader(&self, kind: u32, source: &str) -> Result<glow::NativeShader, GpuError> {
        let gl = &self.gl;
        unsafe {
            let shader = gl.create_shader(kind).map_err(GpuError::Shader)?;
            gl.shader_source(shader, source);
            gl.compile_shader(shader);
            if !gl.get_shader_compile_status(shader) {
                let log = gl.get_shader_info_log(shader);
                gl.delete_shader(shader);
                return Err(GpuError::Shader(log));
            }
            Ok(shader)
        }
    }
}

impl GpuDevice for GlowDevice {
    type Program = GlowProgram;

    fn info(&self) -> ContextInfo {
        unsafe {
            ContextInfo {
                vendor: self.gl.get_parameter_string(glow::VENDOR),
                renderer: self.gl.get_parameter_string(glow::RENDERER),
                version: self.gl.get_parameter_string(glow::VERSION),
            }
        }
    }

    fn native_context_handle(&self) -> u64 {
        self.own_window as usize as u64
    }

    fn create_texture(
        &mut self,
        spec: &TextureSpec,
        image: &PlatformImage,
    ) -> Result<u32, GpuError> {
        let gl = &self.gl;
        let target = image.target.gl_enum();
        unsafe {
            let texture = gl.create_texture().map_err(GpuError::Texture)?;
            gl.bind_texture(target, Some(texture));
            gl.tex_parameter_i32(target, glow::TEXTURE_MIN_FILTER, glow::NEAREST as i32);
            gl.tex_parameter_i32(target, glow::TEXTURE_MAG_FILTER, glow::NEAREST as i32);
            gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_S, glow::CLAMP_TO_EDGE as i32);
            gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_T, glow::CLAMP_TO_EDGE as i32);

            let bound = match image.target {
                TextureTarget::Texture2D => match self.transfer_format(image.real_format) {
                    Some((internal, format)) => {
                        gl.tex_image_2d(
                            target,
                            0,
                            internal as i32,
                            spec.width as i32,
                            spec.height as i32,
                            0,
                            format,
                            glow::UNSIGNED_BYTE,
                            glow::PixelUnpackData::Slice(None),
                        );
                        Ok(())
                    }
                    None => Err(GpuError::Unsupported(format!(
                        "2D texture storage for {:?}",
                        image.real_format
                    ))),
                },
                TextureTarget::External => match self.egl_image_target {
                    Some(bind_image) if image.native_image != 0 => {
                        bind_image(target, image.native_image as usize as *mut c_void);
                        Ok(())
                    }
                    _ => Err(GpuError::Unsupported(
                        "external texture without an EGL image".to_string(),
                    )),
                },
            };
            gl.bind_texture(target, None);

            match bound {
                Ok(()) => Ok(texture.0.get()),
                Err(err) => {
                    gl.delete_texture(texture);
                    Err(err)
                }
            }
        }
    }

    fn delete_texture(&mut self, texture: u32) {
        if let Some(texture) = Self::native_texture(texture) {
            unsafe { self.gl.delete_texture(texture) };
        }
    }

    fn compile_program(&mut self, vertex: &str, fragment: &str) -> Result<GlowProgram, GpuError> {
        unsafe {
            let vs = self.compile_shader(glow::VERTEX_SHADER, vertex)?;
            let fs = match self.compile_shader(glow::FRAGMENT_SHADER, fragment) {
                Ok(fs) => fs,
                Err(err) => {
                    self.gl.delete_shader(vs);
                    return Err(err);
                }
            };

            let gl = &self.gl;
            let program = match gl.create_program() {
                Ok(program) => program,
                Err(err) => {
                    gl.delete_shader(vs);
                    gl.delete_shader(fs);
                    return Err(GpuError::Shader(err));
                }
            };
            gl.attach_shader(program, vs);
            gl.attach_shader(program, fs);
            gl.link_program(program);
            gl.detach_shader(program, vs);
            gl.detach_shader(program, fs);
            gl.delete_shader(vs);
            gl.delete_shader(fs);

            if !gl.get_program_link_status(program) {
                let log = gl.get_program_info_log(program);
                gl.delete_program(program);
                return Err(GpuError::Shader(log));
            }

            let position = gl.get_attrib_location(program, "a_position");
            let tex_coord = gl.get_attrib_location(program, "a_texCoord");
            let (Some(position), Some(tex_coord)) = (position, tex_coord) else {
                gl.delete_program(program);
                return Err(GpuError::Shader(
                    "redisplay program lacks a_position/a_texCoord".to_string(),
                ));
            };

            Ok(GlowProgram {
                program,
                position,
                tex_coord,
                sampler: gl.get_uniform_location(program, "s_texture"),
            })
        }
    }

    fn delete_program(&mut self, program: GlowProgram) {
        unsafe { self.gl.delete_program(program.program) };
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        unsafe {
            self.gl
                .viewport(viewport.x, viewport.y, viewport.width, viewport.height)
        };
    }

    fn draw(
        &mut self,
        program: &GlowProgram,
        texture: u32,
        target: TextureTarget,
        sampler: SamplerRect,
    ) -> Result<(), GpuError> {
        let Some(texture) = Self::native_texture(texture) else {
            return Err(GpuError::Texture("texture name 0".to_string()));
        };
        let SamplerRect {
            left,
            right,
            top,
            bottom,
        } = sampler;
        #[rustfmt::skip]
        let vertices: [f32; 16] = [
             1.0,  1.0, right, bottom,
            -1.0,  1.0, left,  bottom,
            -1.0, -1.0, left,  top,
             1.0, -1.0, right, top,
        ];
        let stride = 4 * std::mem::size_of::<f32>() as i32;
        let target = target.gl_enum();

        let gl = &self.gl;
        unsafe {
            gl.clear_color(0.0, 0.0, 0.0, 1.0);
            gl.clear(glow::COLOR_BUFFER_BIT);
            gl.use_program(Some(program.program));

            gl.bind_buffer(glow::ARRAY_BUFFER, Some(self.vertex_buffer));
            gl.buffer_data_u8_slice(
                glow::ARRAY_BUFFER,
                bytemuck::cast_slice(&vertices),
                glow::STREAM_DRAW,
            );
            gl.vertex_attrib_pointer_f32(program.position, 2, glow::FLOAT, false, stride, 0);
            gl.enable_vertex_attrib_array(program.position);
            gl.vertex_attrib_pointer_f32(program.tex_coord, 2, glow::FLOAT, false, stride, 8);
            gl.enable_vertex_attrib_array(program.tex_coord);

            gl.active_texture(glow::TEXTURE0);
            gl.bind_texture(target, Some(texture));
            gl.uniform_1_i32(program.sampler.as_ref(), 0);

            gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(self.index_buffer));
            gl.draw_elements(glow::TRIANGLES, QUAD_INDICES.len() as i32, glow::UNSIGNED_BYTE, 0);

            gl.bind_texture(target, None);
            gl.disable_vertex_attrib_array(program.position);
            gl.disable_vertex_attrib_array(program.tex_coord);
            gl.bind_buffer(glow::ARRAY_BUFFER, None);
        }
        Ok(())
    }

    fn swap_buffers(&mut self) {
        unsafe { self.api.swap_buffers(self.surface) };
    }

    fn supports_direct_upload(&self, format: VideoFormat) -> bool {
        matches!(format, VideoFormat::Rgba | VideoFormat::Bgra)
    }

    fn upload_sub_image(
        &mut self,
        texture: u32,
        spec: &TextureSpec,
        data: &[u8],
    ) -> Result<(), GpuError> {
        let Some(texture) = Self::native_texture(texture) else {
            return Err(GpuError::Texture("texture name 0".to_string()));
        };
        let Some((_, format)) = self
            .transfer_format(spec.format)
            .filter(|_| self.supports_direct_upload(spec.format))
        else {
            return Err(GpuError::Unsupported(format!("direct upload of {:?}", spec.format)));
        };
        let required = spec.width as usize * spec.height as usize * 4;
        if data.len() < required {
            return Err(GpuError::Texture(format!(
                "sub-image upload needs {required} bytes, got {}",
                data.len()
            )));
        }

        let gl = &self.gl;
        unsafe {
            gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 4);
            gl.tex_sub_image_2d(
                glow::TEXTURE_2D,
                0,
                0,
                0,
                spec.width as i32,
                spec.height as i32,
                format,
                glow::UNSIGNED_BYTE,
                glow::PixelUnpackData::Slice(Some(data)),
            );
            gl.bind_texture(glow::TEXTURE_2D, None);
        }
        Ok(())
    }

    fn commit_image(
        &mut self,
        texture: u32,
        spec: &TextureSpec,
        image: &PlatformImage,
    ) -> Result<(), GpuError> {
        // EGL images alias the texture storage; only CPU-side 2D textures need a copy.
        if image.target != TextureTarget::Texture2D {
            return Ok(());
        }
        let Some(texture) = Self::native_texture(texture) else {
            return Err(GpuError::Texture("texture name 0".to_string()));
        };
        let Some((_, format)) = self.transfer_format(image.real_format) else {
            return Err(GpuError::Unsupported(format!(
                "committing {:?} memory",
                image.real_format
            )));
        };
        let required = image.stride * (spec.height as usize).saturating_sub(1)
            + spec.width as usize * 4;
        if spec.height > 0 && image.memory.len() < required {
            return Err(GpuError::Texture(format!(
                "image memory holds {} bytes, {required} required",
                image.memory.len()
            )));
        }

        let gl = &self.gl;
        unsafe {
            gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            gl.pixel_store_i32(glow::UNPACK_ROW_LENGTH, (image.stride / 4) as i32);
            gl.tex_sub_image_2d(
                glow::TEXTURE_2D,
                0,
                0,
                0,
                spec.width as i32,
                spec.height as i32,
                format,
                glow::UNSIGNED_BYTE,
                glow::PixelUnpackData::Slice(Some(&image.memory[..])),
            );
            gl.pixel_store_i32(glow::UNPACK_ROW_LENGTH, 0);
            gl.bind_texture(glow::TEXTURE_2D, None);
        }
        Ok(())
    }

    fn resize_surface(&mut self, size: PhysicalSize<u32>) {
        if size.width == 0 || size.height == 0 || size == self.surface_size {
            return;
        }
        unsafe { self.api.set_window_size(self.surface, size) };
        self.surface_size = size;
    }

    fn poll_event(&mut self) -> Option<WindowEvent> {
        if !self.close_reported && unsafe { self.api.should_close(self.surface) } {
            self.close_reported = true;
            return Some(WindowEvent::CloseRequested);
        }
        let size = unsafe { self.api.framebuffer_size(self.surface) };
        if size != self.surface_size && size.width > 0 && size.height > 0 {
            self.surface_size = size;
            return Some(WindowEvent::Resized(size));
        }
        None
    }

    fn event_poll_interval(&self) -> Option<Duration> {
        Some(self.poll_interval)
    }

    fn set_window_handle(&mut self, handle: u64) {
        let window = if handle == 0 {
            self.own_window
        } else {
            handle as usize as GlfwWindowPtr
        };
        if window == self.surface {
            return;
        }
        tracing::info!(window = handle, "retargeting display surface");
        unsafe { self.api.make_current(window) };
        self.surface = window;
        self.surface_size = unsafe { self.api.framebuffer_size(window) };
        self.close_reported = false;
        self.bind_vertex_array();
    }

    fn make_current(&mut self, current: bool) -> bool {
        let window = if current {
            self.surface
        } else {
            std::ptr::null_mut()
        };
        unsafe { self.api.make_current(window) };
        true
    }
}

impl Drop for GlowDevice {
    fn drop(&mut self) {
        unsafe {
            if self.surface != self.own_window {
                self.api.make_current(self.own_window);
            }
            if let Some(vao) = self.vertex_array.take() {
                self.gl.delete_vertex_array(vao);
            }
            self.gl.delete_buffer(self.vertex_buffer);
            self.gl.delete_buffer(self.index_buffer);
            self.api.make_current(std::ptr::null_mut());
            self.api.destroy_window(self.own_window);
        }
    }
}
