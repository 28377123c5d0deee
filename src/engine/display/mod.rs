//! ### English
//! Display façade: producer-side API over one render thread, its texture pool and the
//! single-slot-ahead presentation queue.
//!
//! ### 中文
//! 显示门面：面向生产者的 API，背后是一个渲染线程、其纹理池以及“只超前一帧”的呈现队列。

mod message;
mod render_thread;
mod shared;
pub mod viewport;

pub use shared::DisplayState;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use bytes::Bytes;
use crossbeam_channel as channel;
use dpi::PhysicalSize;

use super::config::DisplayConfig;
use super::error::DisplayError;
use super::format::{CropRect, VideoFormat, align_buffer_size};
use super::frame::Frame;
use super::gpu::GpuBackend;
use super::platform::Platform;
use super::pool::TexturePool;
use super::texture::TextureSpec;

use message::Message;
use render_thread::{RenderThreadInit, run_render_thread};
use shared::{RedisplayParams, Shared};

#[inline]
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// ### English
/// Extended frame allocation request.
///
/// ### 中文
/// 扩展形式的帧分配请求。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameRequest {
    pub format: VideoFormat,
    pub width: u32,
    pub height: u32,
    pub crop: CropRect,
    /// ### English
    /// Payload size the caller will upload; rejected early when it disagrees with the format.
    ///
    /// ### 中文
    /// 调用方将要上传的载荷大小；与格式不符时提前拒绝。
    pub expected_size: Option<usize>,
    /// ### English
    /// Overrides `DisplayConfig::check_capabilities` for this request.
    ///
    /// ### 中文
    /// 针对本次请求覆盖 `DisplayConfig::check_capabilities`。
    pub check_capabilities: Option<bool>,
}

impl FrameRequest {
    pub fn new(format: VideoFormat, width: u32, height: u32) -> Self {
        Self {
            format,
            width,
            height,
            crop: CropRect::default(),
            expected_size: None,
            check_capabilities: None,
        }
    }

    pub fn with_crop(mut self, crop: CropRect) -> Self {
        self.crop = crop;
        self
    }

    pub fn with_expected_size(mut self, size: usize) -> Self {
        self.expected_size = Some(size);
        self
    }

    pub fn with_capability_check(mut self, enabled: bool) -> Self {
        self.check_capabilities = Some(enabled);
        self
    }
}

/// ### English
/// One display: a GPU context living on its own render thread plus the state producers
/// share with it. `Display` is `Sync`; wrap it in an `Arc` to feed it from several threads.
///
/// ### 中文
/// 一个显示实例：运行在独立渲染线程上的 GPU 上下文，以及生产者与之共享的状态。
/// `Display` 是 `Sync` 的；可包进 `Arc` 从多个线程使用。
pub struct Display<B: GpuBackend> {
    config: DisplayConfig,
    platform: Arc<dyn Platform>,
    shared: Arc<Shared>,
    pool: Arc<TexturePool>,
    /// ### English
    /// Consumed by `create_context`.
    ///
    /// ### 中文
    /// 由 `create_context` 取走。
    backend: Mutex<Option<B>>,
    sender: Mutex<Option<channel::Sender<Message>>>,
    thread: Mutex<Option<thread::JoinHandle<()>>>,
}

impl<B: GpuBackend> Display<B> {
    /// ### English
    /// Builds an `Uninitialized` display. No thread is started until `create_context`.
    ///
    /// #### Parameters
    /// - `config`: Pool capacity, thread name, initial surface size, capability policy.
    /// - `platform`: Image allocator, converter, capability query and shader sources.
    /// - `backend`: Factory for the GPU device, moved onto the render thread later.
    ///
    /// ### 中文
    /// 构建一个处于 `Uninitialized` 状态的显示实例。`create_context` 之前不会启动线程。
    ///
    /// #### 参数
    /// - `config`：纹理池容量、线程名、初始 surface 尺寸、能力检查策略。
    /// - `platform`：图像分配器、转换器、能力查询与着色器源码。
    /// - `backend`：GPU 设备工厂，稍后会被移动到渲染线程。
    pub fn new(config: DisplayConfig, platform: Arc<dyn Platform>, backend: B) -> Self {
        Self {
            shared: Arc::new(Shared::new(config.initial_surface_size)),
            pool: Arc::new(TexturePool::new(config.pool_capacity)),
            config,
            platform,
            backend: Mutex::new(Some(backend)),
            sender: Mutex::new(None),
            thread: Mutex::new(None),
        }
    }

    #[inline]
    pub fn config(&self) -> &DisplayConfig {
        &self.config
    }

    pub fn is_alive(&self) -> bool {
        self.shared.is_alive()
    }

    pub fn state(&self) -> DisplayState {
        self.shared.lock().state
    }

    /// ### English
    /// Textures currently allocated by the pool, free or held by frames.
    ///
    /// ### 中文
    /// 纹理池当前已分配的纹理数（空闲或被帧持有）。
    pub fn allocated_textures(&self) -> usize {
        self.pool.allocated()
    }

    pub fn free_textures(&self) -> usize {
        self.pool.free_count()
    }

    fn post(&self, message: Message) -> Result<(), DisplayError> {
        let sender = lock(&self.sender).clone().ok_or(DisplayError::NotAlive)?;
        sender.send(message).map_err(|_| DisplayError::Disconnected)
    }

    /// ### English
    /// Posts a message carrying a one-shot reply channel and waits for the answer.
    ///
    /// ### 中文
    /// 投递携带一次性应答 channel 的消息并等待应答。
    fn request<T>(
        &self,
        message: impl FnOnce(channel::Sender<T>) -> Message,
    ) -> Result<T, DisplayError> {
        let (reply, response) = channel::bounded(1);
        self.post(message(reply))?;
        response.recv().map_err(|_| DisplayError::Disconnected)
    }

    /// ### English
    /// Spawns the render thread and blocks until its context is running or failed.
    ///
    /// #### Parameters
    /// - `external_context`: Native context the new one shares objects with.
    ///
    /// ### 中文
    /// 启动渲染线程，并阻塞直到其上下文进入运行状态或创建失败。
    ///
    /// #### 参数
    /// - `external_context`：新上下文需要与之共享对象的原生上下文。
    pub fn create_context(&self, external_context: Option<u64>) -> Result<(), DisplayError> {
        let (sender, receiver) = channel::unbounded();
        let _ = sender.send(Message::CreateContext {
            external_context,
            initial_size: self.config.initial_surface_size,
        });

        let backend = {
            let mut state = self.shared.lock();
            if state.state != DisplayState::Uninitialized {
                return Err(DisplayError::AlreadyCreated);
            }
            let backend = lock(&self.backend)
                .take()
                .ok_or(DisplayError::AlreadyCreated)?;
            /* ### English
             * The sender is published together with `ContextCreating`: a `destroy_context`
             * that observes the new state always finds a queue to post `Quit` to.
             * ### 中文
             * 发送端与 `ContextCreating` 状态一同发布：观察到新状态的 `destroy_context`
             * 总能找到可投递 `Quit` 的队列。
             */
            *lock(&self.sender) = Some(sender);
            state.state = DisplayState::ContextCreating;
            backend
        };

        let init = RenderThreadInit {
            platform: self.platform.clone(),
            shared: self.shared.clone(),
            pool: self.pool.clone(),
            poll_interval: self.config.event_poll_interval,
        };
        let spawned = thread::Builder::new()
            .name(self.config.thread_name.clone())
            .spawn(move || run_render_thread(backend, init, receiver));
        let handle = match spawned {
            Ok(handle) => handle,
            Err(err) => {
                tracing::error!(%err, "failed to spawn render thread");
                lock(&self.sender).take();
                self.shared.lock().state = DisplayState::Terminated;
                self.shared.notify_context_change();
                return Err(DisplayError::Spawn(err));
            }
        };
        *lock(&self.thread) = Some(handle);

        /* ### English
         * A concurrent `destroy_context` may have run before the handle above was stored;
         * wait for the thread to finish so it is joined here.
         * ### 中文
         * 并发的 `destroy_context` 可能在上面保存句柄之前就已执行；
         * 此处等待线程结束并在这里 join。
         */
        let mut state = self.shared.lock();
        while matches!(
            state.state,
            DisplayState::ContextCreating | DisplayState::ContextDestroying
        ) {
            state = self.shared.wait_context_change(state);
        }
        match state.state {
            DisplayState::Running => Ok(()),
            _ => {
                let err = state.creation_error.take();
                drop(state);
                lock(&self.sender).take();
                self.join_render_thread();
                Err(err.map_or(DisplayError::NotAlive, DisplayError::ContextCreation))
            }
        }
    }

    fn join_render_thread(&self) {
        let handle = lock(&self.thread).take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::error!("render thread panicked");
            }
        }
    }

    /// ### English
    /// Tears the context down and joins the render thread. Idempotent.
    ///
    /// Producers blocked in `present` or `allocate_frame` are released with a failure; frames
    /// still held by producers free only their CPU-side memory when dropped afterwards.
    ///
    /// ### 中文
    /// 拆除上下文并 join 渲染线程。可重复调用。
    ///
    /// 阻塞在 `present` 或 `allocate_frame` 中的生产者会以失败返回；之后才被 drop 的、
    /// 仍由生产者持有的帧只会释放其 CPU 侧内存。
    pub fn destroy_context(&self) {
        let slots = {
            let mut state = self.shared.lock();
            state.alive = false;
            match state.state {
                DisplayState::ContextCreating | DisplayState::Running => {
                    state.state = DisplayState::ContextDestroying;
                }
                DisplayState::Uninitialized => state.state = DisplayState::Terminated,
                DisplayState::ContextDestroying | DisplayState::Terminated => {}
            }
            state.take_slots()
        };
        self.shared.notify_progress();
        self.shared.notify_context_change();
        drop(slots);
        self.pool.close();

        if let Some(sender) = lock(&self.sender).take() {
            tracing::info!("destroying display context");
            let _ = sender.send(Message::Quit);
        }

        let mut state = self.shared.lock();
        while state.state == DisplayState::ContextDestroying {
            state = self.shared.wait_context_change(state);
        }
        drop(state);
        self.join_render_thread();
    }

    /// ### English
    /// Allocates a frame with a pooled texture. See `allocate_frame_with`.
    ///
    /// ### 中文
    /// 分配一个带池化纹理的帧，参见 `allocate_frame_with`。
    pub fn allocate_frame(
        &self,
        format: VideoFormat,
        width: u32,
        height: u32,
        crop: CropRect,
    ) -> Result<Frame, DisplayError> {
        self.allocate_frame_with(&FrameRequest::new(format, width, height).with_crop(crop))
    }

    /// ### English
    /// Allocates a frame whose texture comes from the pool, blocking while the pool is full.
    ///
    /// The request is validated (liveness, payload size, platform capability) before anything
    /// reaches the render thread. The geometry is then aligned for the allocator; a change of
    /// format, geometry or crop drops both presentation slots and rebuilds the shader on the
    /// next `present`.
    ///
    /// ### 中文
    /// 分配一个纹理来自纹理池的帧；池满时阻塞。
    ///
    /// 请求在到达渲染线程之前先被校验（存活、载荷大小、平台能力）。随后按分配器要求对齐尺寸；
    /// 格式、尺寸或裁剪区域变化时会清空两个呈现槽位，并在下一次 `present` 时重建着色器。
    pub fn allocate_frame_with(&self, request: &FrameRequest) -> Result<Frame, DisplayError> {
        let FrameRequest {
            format,
            width,
            height,
            crop,
            ..
        } = *request;

        if !self.shared.is_alive() {
            return Err(DisplayError::NotAlive);
        }

        if let Some(actual) = request.expected_size {
            let expected = format.frame_size(width, height);
            if expected != actual {
                tracing::warn!(?format, width, height, expected, actual, "payload size mismatch");
                return Err(DisplayError::SizeMismatch {
                    format,
                    width,
                    height,
                    expected,
                    actual,
                });
            }
        }

        let check = request
            .check_capabilities
            .unwrap_or(self.config.check_capabilities);
        if check && !self.platform.accepts(format, width, height) {
            tracing::debug!(?format, width, height, "platform rejected frame geometry");
            return Err(DisplayError::Unsupported {
                format,
                width,
                height,
            });
        }

        let geometry = align_buffer_size(format, width, height, crop);
        let params = RedisplayParams {
            format,
            width: geometry.width,
            height: geometry.height,
            crop: geometry.crop,
        };
        let evicted = self.shared.lock().update_params(params);
        if let Some(evicted) = evicted {
            tracing::debug!(?params, "redisplay parameters changed");
            self.shared.notify_progress();
            drop(evicted);
            self.post(Message::DelTextures {
                keep: Some(TextureSpec::new(format, geometry.width, geometry.height)),
            })?;
        }

        let frame = Frame::pooled(
            format,
            geometry.width,
            geometry.height,
            geometry.crop,
            self.pool.clone(),
            self.platform.clone(),
        );
        let assigned = self.request(|reply| Message::GenTexture {
            frame: frame.clone(),
            reply,
        })?;
        if !assigned || !frame.has_texture() {
            return Err(DisplayError::AllocationFailed);
        }
        Ok(frame)
    }

    /// ### English
    /// Writes `payload` into the frame's texture on the render thread and waits for it.
    ///
    /// `payload` must be exactly the packed size of the frame's format and (aligned) geometry.
    ///
    /// ### 中文
    /// 在渲染线程上把 `payload` 写入帧的纹理，并等待完成。
    ///
    /// `payload` 的大小必须恰好等于该帧格式与（对齐后）尺寸对应的紧凑大小。
    pub fn upload(&self, frame: &Frame, payload: Bytes) -> Result<(), DisplayError> {
        if !self.shared.is_alive() {
            return Err(DisplayError::NotAlive);
        }
        if !frame.has_texture() {
            return Err(DisplayError::NoTexture);
        }

        let (format, width, height) = (frame.format(), frame.width(), frame.height());
        let expected = format.frame_size(width, height);
        if payload.len() != expected {
            tracing::warn!(
                ?format,
                width,
                height,
                expected,
                actual = payload.len(),
                "upload size mismatch"
            );
            return Err(DisplayError::SizeMismatch {
                format,
                width,
                height,
                expected,
                actual: payload.len(),
            });
        }

        frame.attach_payload(payload);
        let result = self
            .request(|reply| Message::Upload {
                frame: frame.clone(),
                reply,
            })
            .and_then(|result| result);
        if result.is_err() {
            frame.detach_payload();
        }
        result
    }

    /// ### English
    /// Queues `frame` for presentation (or redraws the last one for `None`).
    ///
    /// At most one frame waits ahead of the one on screen: the call blocks while the slot is
    /// taken. Returns whether the display is still alive.
    ///
    /// #### Parameters
    /// - `frame`: Frame to show; `None` redraws.
    /// - `width`/`height`: Current window size in pixels.
    /// - `keep_aspect_ratio`: Letterbox instead of stretching.
    ///
    /// ### 中文
    /// 把 `frame` 排入呈现队列（`None` 表示重绘上一帧）。
    ///
    /// 屏幕上的帧之前最多只有一帧在等待：槽位被占用时调用会阻塞。返回显示实例是否仍存活。
    ///
    /// #### 参数
    /// - `frame`：要显示的帧；`None` 表示重绘。
    /// - `width`/`height`：当前窗口像素尺寸。
    /// - `keep_aspect_ratio`：加黑边而不是拉伸。
    pub fn present(
        &self,
        frame: Option<&Frame>,
        width: u32,
        height: u32,
        keep_aspect_ratio: bool,
    ) -> bool {
        let mut state = self.shared.lock();
        if !state.alive {
            return false;
        }

        if !state.shader_ready && state.params.is_some() {
            drop(state);
            match self.request(|reply| Message::BuildShader { reply }) {
                Ok(Ok(())) => {}
                Ok(Err(_)) | Err(_) => {
                    self.shared.mark_dead();
                    return false;
                }
            }
            state = self.shared.lock();
        }

        while state.alive && frame.is_some() && state.to_draw.is_some() {
            state = self.shared.wait_progress(state);
        }
        if !state.alive {
            return false;
        }

        if let Some(frame) = frame {
            if state.drawing.as_ref().is_some_and(|drawing| drawing.ptr_eq(frame)) {
                return true;
            }
            state.to_draw = Some(frame.clone());
        }

        let size = PhysicalSize::new(width, height);
        if state.keep_aspect_ratio != keep_aspect_ratio {
            state.keep_aspect_ratio = keep_aspect_ratio;
            state.window_size = size;
            drop(state);
            if self.request(|reply| Message::Resize { reply }).is_err() {
                return self.shared.is_alive();
            }
        } else {
            drop(state);
        }

        if self.post(Message::Draw { size }).is_err() {
            return false;
        }
        self.shared.is_alive()
    }

    /// ### English
    /// Retargets presentation to an embedder-owned native window.
    ///
    /// ### 中文
    /// 把呈现目标切换到宿主持有的原生窗口。
    pub fn set_window_handle(&self, handle: u64) -> Result<(), DisplayError> {
        self.post(Message::SetWindowHandle { handle })
    }

    /// ### English
    /// Native context handle captured when the context was created (0 before that).
    ///
    /// ### 中文
    /// 上下文创建时记录的原生上下文句柄（创建前为 0）。
    pub fn internal_context_handle(&self) -> u64 {
        self.shared.lock().context_handle
    }

    /// ### English
    /// Makes the context current (or not) on the render thread; `false` if that failed or the
    /// thread is gone.
    ///
    /// ### 中文
    /// 在渲染线程上使上下文成为（或不再是）current；失败或线程已退出时返回 `false`。
    pub fn activate_context(&self, current: bool) -> bool {
        self.request(|reply| Message::Activate { current, reply })
            .unwrap_or(false)
    }
}

impl<B: GpuBackend> Drop for Display<B> {
    fn drop(&mut self) {
        self.destroy_context();
    }
}
