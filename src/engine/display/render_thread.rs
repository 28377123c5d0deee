//! ### English
//! Render thread: the only thread that owns the GPU device and issues GPU calls.
//!
//! ### 中文
//! 渲染线程：唯一持有 GPU 设备并发出 GPU 调用的线程。

use std::cell::RefCell;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel as channel;
use dpi::PhysicalSize;

use crate::engine::error::{DisplayError, GpuError, PlatformError};
use crate::engine::frame::Frame;
use crate::engine::gpu::{GpuBackend, GpuDevice, Viewport, WindowEvent};
use crate::engine::platform::Platform;
use crate::engine::pool::TexturePool;
use crate::engine::texture::{TextureDescriptor, TextureSpec};

use super::message::Message;
use super::shared::{DisplayState, Shared};
use super::viewport::center_rect;

#[derive(Debug, thiserror::Error)]
enum TextureCreateError {
    #[error(transparent)]
    Platform(#[from] PlatformError),
    #[error(transparent)]
    Gpu(#[from] GpuError),
}

/// ### English
/// Publishes `Terminated` however the thread exits, unwinding included.
///
/// ### 中文
/// 无论线程以何种方式退出（包括 unwind），都会发布 `Terminated` 状态。
struct TerminateOnExit(Arc<Shared>);

impl Drop for TerminateOnExit {
    fn drop(&mut self) {
        let slots = {
            let mut state = self.0.lock();
            state.alive = false;
            state.state = DisplayState::Terminated;
            state.shader_ready = false;
            state.take_slots()
        };
        self.0.notify_progress();
        self.0.notify_context_change();
        drop(slots);
    }
}

/// ### English
/// Collaborators handed to the render thread at spawn time.
///
/// ### 中文
/// 创建渲染线程时交给它的协作者。
pub(crate) struct RenderThreadInit {
    pub platform: Arc<dyn Platform>,
    pub shared: Arc<Shared>,
    pub pool: Arc<TexturePool>,
    pub poll_interval: Option<Duration>,
}

/// ### English
/// Render thread entry function. Returns after `Quit`, a disconnected queue or a failed
/// context creation.
///
/// ### 中文
/// 渲染线程入口函数。收到 `Quit`、队列断开或上下文创建失败后返回。
pub(crate) fn run_render_thread<B: GpuBackend>(
    backend: B,
    init: RenderThreadInit,
    receiver: channel::Receiver<Message>,
) {
    let _terminate = TerminateOnExit(init.shared.clone());

    let (external_context, initial_size) = match receiver.recv() {
        Ok(Message::CreateContext {
            external_context,
            initial_size,
        }) => (external_context, initial_size),
        Ok(other) => {
            tracing::error!(message = other.name(), "render thread started without CreateContext");
            return;
        }
        Err(_) => return,
    };

    let device = match backend.create_device(external_context, initial_size) {
        Ok(device) => device,
        Err(err) => {
            tracing::error!(%err, "display context creation failed");
            init.shared.lock().creation_error = Some(err);
            return;
        }
    };

    let info = device.info();
    tracing::info!(
        vendor = %info.vendor,
        renderer = %info.renderer,
        version = %info.version,
        "display context created"
    );

    {
        let mut state = init.shared.lock();
        state.context_handle = device.native_context_handle();
        /* ### English
         * A concurrent `destroy_context` already moved on; its `Quit` is queued.
         * ### 中文
         * 并发的 `destroy_context` 已推进状态；其 `Quit` 已在队列中。
         */
        if state.state == DisplayState::ContextCreating {
            state.state = DisplayState::Running;
            state.alive = true;
        }
    }
    init.shared.notify_context_change();

    let poll_interval = init.poll_interval.or(device.event_poll_interval());
    let mut render = RenderLoop {
        device,
        program: None,
        platform: init.platform,
        shared: init.shared,
        pool: init.pool,
        surface_size: initial_size,
    };
    render.on_resize(initial_size);
    render.run(&receiver, poll_interval);
    render.teardown();
    tracing::info!("display context destroyed");
}

struct RenderLoop<D: GpuDevice> {
    device: D,
    program: Option<D::Program>,
    platform: Arc<dyn Platform>,
    shared: Arc<Shared>,
    pool: Arc<TexturePool>,
    surface_size: PhysicalSize<u32>,
}

impl<D: GpuDevice> RenderLoop<D> {
    fn run(&mut self, receiver: &channel::Receiver<Message>, poll_interval: Option<Duration>) {
        loop {
            let message = match poll_interval {
                Some(interval) => match receiver.recv_timeout(interval) {
                    Ok(message) => Some(message),
                    Err(channel::RecvTimeoutError::Timeout) => None,
                    Err(channel::RecvTimeoutError::Disconnected) => break,
                },
                None => match receiver.recv() {
                    Ok(message) => Some(message),
                    Err(_) => break,
                },
            };

            if let Some(message) = message {
                tracing::debug!(message = message.name(), "dispatching");
                if self.dispatch(message).is_break() {
                    break;
                }
            }
            self.pump_events();
        }
    }

    fn dispatch(&mut self, message: Message) -> ControlFlow<()> {
        match message {
            Message::CreateContext { .. } => {
                tracing::warn!("ignoring CreateContext on a running display");
            }
            Message::Draw { size } => {
                if size != self.surface_size && size.width > 0 && size.height > 0 {
                    self.device.resize_surface(size);
                    self.surface_size = size;
                    self.on_resize(size);
                }
                let drawn = self.on_draw();
                return self.dispatch(Message::DrawFinished { drawn });
            }
            Message::DrawFinished { drawn } => self.on_draw_finished(drawn),
            Message::Resize { reply } => {
                let size = self.shared.lock().window_size;
                self.on_resize(size);
                let _ = reply.send(());
            }
            Message::Upload { frame, reply } => {
                let result = self.upload(&frame);
                frame.detach_payload();
                drop(frame);
                let _ = reply.send(result);
            }
            Message::GenTexture { frame, reply } => {
                let assigned = self.gen_texture(&frame);
                drop(frame);
                let _ = reply.send(assigned);
            }
            Message::DelTextures { keep } => {
                let (device, platform) = (&mut self.device, self.platform.as_ref());
                self.pool.reclaim(keep.as_ref(), |descriptor| {
                    destroy_texture(&mut *device, platform, descriptor)
                });
            }
            Message::BuildShader { reply } => {
                let result = self.build_shader();
                if let Err(err) = &result {
                    tracing::error!(%err, "redisplay shader build failed");
                    self.shared.mark_dead();
                }
                let _ = reply.send(result);
            }
            Message::SetWindowHandle { handle } => self.device.set_window_handle(handle),
            Message::Activate { current, reply } => {
                let _ = reply.send(self.device.make_current(current));
            }
            Message::Quit => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    fn pump_events(&mut self) {
        while let Some(event) = self.device.poll_event() {
            match event {
                WindowEvent::Resized(size) => {
                    self.surface_size = size;
                    self.on_resize(size);
                }
                WindowEvent::CloseRequested => {
                    tracing::info!("display window close requested");
                    self.shared.mark_dead();
                }
            }
        }
    }

    /// ### English
    /// Centers the frame on the surface when the aspect policy asks for it, else fills it.
    ///
    /// ### 中文
    /// 宽高比策略开启时把帧居中到 surface 上，否则铺满 surface。
    fn on_resize(&mut self, size: PhysicalSize<u32>) {
        let viewport = {
            let state = self.shared.lock();
            if state.keep_aspect_ratio {
                let source = state
                    .current_frame()
                    .map_or(PhysicalSize::new(0, 0), |frame| {
                        PhysicalSize::new(frame.width(), frame.height())
                    });
                center_rect(source, size)
            } else {
                Viewport {
                    x: 0,
                    y: 0,
                    width: size.width as i32,
                    height: size.height as i32,
                }
            }
        };
        tracing::debug!(?viewport, "viewport updated");
        self.device.set_viewport(viewport);
    }

    /// ### English
    /// Draws the current frame and returns the frame it sampled, drawn or not.
    ///
    /// ### 中文
    /// 绘制当前帧，并返回本次采样的帧（无论是否绘制成功）。
    fn on_draw(&mut self) -> Option<Frame> {
        let (frame, sampler) = {
            let state = self.shared.lock();
            (state.current_frame().cloned(), state.sampler)
        };
        let frame = frame?;
        let Some(program) = self.program.as_ref() else {
            tracing::trace!("no redisplay program, skipping draw");
            return Some(frame);
        };
        let Some((texture, target)) =
            frame.with_texture(|descriptor| (descriptor.texture_id(), descriptor.target()))
        else {
            return Some(frame);
        };

        match self.device.draw(program, texture, target, sampler) {
            Ok(()) => self.device.swap_buffers(),
            Err(err) => tracing::warn!(%err, texture, "draw failed"),
        }
        Some(frame)
    }

    /// ### English
    /// A frame queued while another one was being drawn stays in `to_draw` for its own `Draw`.
    ///
    /// ### 中文
    /// 在另一帧绘制期间排入的帧留在 `to_draw` 中，等待它自己的 `Draw`。
    fn on_draw_finished(&mut self, drawn: Option<Frame>) {
        let previous = {
            let mut state = self.shared.lock();
            let promote = match (&state.to_draw, &drawn) {
                (Some(queued), Some(drawn)) => queued.ptr_eq(drawn),
                _ => false,
            };
            if promote {
                let next = state.to_draw.take();
                std::mem::replace(&mut state.drawing, next)
            } else {
                None
            }
        };
        self.shared.notify_progress();
        drop(previous);
        drop(drawn);
    }

    fn gen_texture(&mut self, frame: &Frame) -> bool {
        if frame.has_texture() {
            return true;
        }
        let spec = frame.spec();
        let descriptor = {
            let platform = self.platform.as_ref();
            /* ### English
             * `create` and `destroy` never run at the same time; both borrow the device in turn.
             * ### 中文
             * `create` 与 `destroy` 不会同时执行；二者轮流借用设备。
             */
            let device = RefCell::new(&mut self.device);
            self.pool.acquire(
                &spec,
                |spec| create_texture(&mut **device.borrow_mut(), platform, spec),
                |descriptor| destroy_texture(&mut **device.borrow_mut(), platform, descriptor),
            )
        };

        match descriptor {
            Some(descriptor) => {
                if let Some(replaced) = frame.assign_texture(descriptor) {
                    destroy_texture(&mut self.device, self.platform.as_ref(), replaced);
                }
                true
            }
            None => false,
        }
    }

    fn upload(&mut self, frame: &Frame) -> Result<(), DisplayError> {
        let Some(payload) = frame.payload() else {
            return Ok(());
        };
        let spec = frame.spec();
        let (device, platform) = (&mut self.device, self.platform.as_ref());

        let result = frame
            .with_texture(|descriptor| -> Result<(), DisplayError> {
                let texture = descriptor.texture_id();
                let real_format = descriptor.real_format();
                if spec.format == real_format && device.supports_direct_upload(spec.format) {
                    device.upload_sub_image(texture, &spec, &payload)?;
                    return Ok(());
                }

                let stride = descriptor.stride();
                platform.convert(
                    &payload,
                    spec.format,
                    &mut descriptor.image_mut().memory,
                    real_format,
                    spec.width,
                    spec.height,
                    stride,
                )?;
                device.commit_image(texture, &spec, descriptor.image())?;
                Ok(())
            })
            .unwrap_or(Err(DisplayError::NoTexture));

        if let Err(err) = &result {
            tracing::warn!(%err, format = ?spec.format, "upload failed");
        }
        result
    }

    fn build_shader(&mut self) -> Result<(), GpuError> {
        let Some(format) = self.shared.lock().params.map(|params| params.format) else {
            return Err(GpuError::Shader("no frame format negotiated".to_string()));
        };

        if let Some(old) = self.program.take() {
            self.device.delete_program(old);
        }
        let vertex = self
            .platform
            .vertex_source(format)
            .ok_or_else(|| GpuError::Shader(format!("no vertex shader for {format:?}")))?;
        let fragment = self
            .platform
            .fragment_source(format)
            .ok_or_else(|| GpuError::Shader(format!("no fragment shader for {format:?}")))?;
        self.program = Some(self.device.compile_program(&vertex, &fragment)?);
        tracing::debug!(?format, "redisplay shader built");

        let mut state = self.shared.lock();
        if state.params.map(|params| params.format) == Some(format) {
            state.shader_ready = true;
        }
        Ok(())
    }

    /// ### English
    /// Frees every GPU object while the context still exists, then drops the device.
    ///
    /// ### 中文
    /// 在上下文仍存在时释放所有 GPU 对象，然后 drop 设备。
    fn teardown(self) {
        let Self {
            mut device,
            program,
            platform,
            pool,
            ..
        } = self;

        pool.close();
        if let Some(program) = program {
            device.delete_program(program);
        }
        pool.drain(|descriptor| destroy_texture(&mut device, platform.as_ref(), descriptor));
        drop(device);
    }
}

fn create_texture<D: GpuDevice>(
    device: &mut D,
    platform: &dyn Platform,
    spec: &TextureSpec,
) -> Result<TextureDescriptor, TextureCreateError> {
    let image = platform.alloc_image(spec)?;
    match device.create_texture(spec, &image) {
        Ok(texture) => Ok(TextureDescriptor::new(*spec, texture, image)),
        Err(err) => {
            platform.free_image(image);
            Err(err.into())
        }
    }
}

fn destroy_texture<D: GpuDevice>(
    device: &mut D,
    platform: &dyn Platform,
    descriptor: TextureDescriptor,
) {
    let (texture, image) = descriptor.into_parts();
    device.delete_texture(texture);
    platform.free_image(image);
}
