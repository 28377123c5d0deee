//! ### English
//! State shared between producer threads and the render thread, guarded by one mutex.
//!
//! ### 中文
//! 生产者线程与渲染线程共享、由同一把互斥锁保护的状态。

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use dpi::PhysicalSize;

use crate::engine::error::GpuError;
use crate::engine::format::{CropRect, VideoFormat};
use crate::engine::frame::Frame;
use crate::engine::gpu::SamplerRect;

use super::viewport::sampler_rect;

/// ### English
/// Lifecycle of a display's GPU context.
///
/// ### 中文
/// 显示实例 GPU 上下文的生命周期。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplayState {
    Uninitialized,
    ContextCreating,
    Running,
    ContextDestroying,
    Terminated,
}

/// ### English
/// Format, texture geometry and crop the redisplay program is set up for.
///
/// ### 中文
/// 重显示程序当前对应的格式、纹理尺寸与裁剪区域。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct RedisplayParams {
    pub format: VideoFormat,
    pub width: u32,
    pub height: u32,
    pub crop: CropRect,
}

pub(crate) struct SharedState {
    /// ### English
    /// Goes from `true` to `false` once and never back.
    ///
    /// ### 中文
    /// 只会从 `true` 变为 `false` 一次，不可逆。
    pub alive: bool,
    pub state: DisplayState,
    /// ### English
    /// Frame waiting for its first presentation.
    ///
    /// ### 中文
    /// 等待首次呈现的帧。
    pub to_draw: Option<Frame>,
    /// ### English
    /// Last fully presented frame, redrawn when nothing newer is queued.
    ///
    /// ### 中文
    /// 最近一次完整呈现的帧；没有更新的帧时会重绘它。
    pub drawing: Option<Frame>,
    pub params: Option<RedisplayParams>,
    pub sampler: SamplerRect,
    pub window_size: PhysicalSize<u32>,
    pub keep_aspect_ratio: bool,
    pub shader_ready: bool,
    pub context_handle: u64,
    /// ### English
    /// Why context creation failed, taken by the waiting `create_context`.
    ///
    /// ### 中文
    /// 上下文创建失败的原因，由等待中的 `create_context` 取走。
    pub creation_error: Option<GpuError>,
}

impl SharedState {
    /// ### English
    /// Frame the render thread should sample: the queued one, else the last presented one.
    ///
    /// ### 中文
    /// 渲染线程应采样的帧：优先排队中的帧，否则为上一次呈现的帧。
    pub fn current_frame(&self) -> Option<&Frame> {
        self.to_draw.as_ref().or(self.drawing.as_ref())
    }

    /// ### English
    /// Empties both slots. The returned frames must be dropped after unlocking.
    ///
    /// ### 中文
    /// 清空两个槽位。返回的帧必须在解锁后再 drop。
    #[must_use]
    pub fn take_slots(&mut self) -> [Option<Frame>; 2] {
        [self.to_draw.take(), self.drawing.take()]
    }

    /// ### English
    /// Records new redisplay parameters. Returns the evicted slot frames when they changed.
    ///
    /// ### 中文
    /// 记录新的重显示参数；参数发生变化时返回被清出的槽位帧。
    #[must_use]
    pub fn update_params(&mut self, params: RedisplayParams) -> Option<[Option<Frame>; 2]> {
        if self.params == Some(params) {
            return None;
        }
        self.params = Some(params);
        self.sampler = sampler_rect(params.width, params.height, params.crop);
        self.shader_ready = false;
        Some(self.take_slots())
    }
}

/// ### English
/// Shared state plus its two wake-up conditions.
///
/// ### 中文
/// 共享状态及其两个唤醒条件。
pub(crate) struct Shared {
    state: Mutex<SharedState>,
    /// ### English
    /// Signalled when a slot frees up or `alive` drops.
    ///
    /// ### 中文
    /// 槽位空出或 `alive` 变为 false 时通知。
    display_progressed: Condvar,
    /// ### English
    /// Signalled when the context finished being created or destroyed.
    ///
    /// ### 中文
    /// 上下文完成创建或销毁时通知。
    context_changed: Condvar,
}

impl Shared {
    pub fn new(window_size: PhysicalSize<u32>) -> Self {
        Self {
            state: Mutex::new(SharedState {
                alive: false,
                state: DisplayState::Uninitialized,
                to_draw: None,
                drawing: None,
                params: None,
                sampler: SamplerRect::default(),
                window_size,
                keep_aspect_ratio: false,
                shader_ready: false,
                context_handle: 0,
                creation_error: None,
            }),
            display_progressed: Condvar::new(),
            context_changed: Condvar::new(),
        }
    }

    #[inline]
    pub fn lock(&self) -> MutexGuard<'_, SharedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn wait_progress<'a>(&self, guard: MutexGuard<'a, SharedState>) -> MutexGuard<'a, SharedState> {
        self.display_progressed
            .wait(guard)
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn wait_context_change<'a>(
        &self,
        guard: MutexGuard<'a, SharedState>,
    ) -> MutexGuard<'a, SharedState> {
        self.context_changed
            .wait(guard)
            .unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    pub fn notify_progress(&self) {
        self.display_progressed.notify_all();
    }

    #[inline]
    pub fn notify_context_change(&self) {
        self.context_changed.notify_all();
    }

    /// ### English
    /// Marks the display dead and wakes every producer waiting on it.
    ///
    /// ### 中文
    /// 标记显示实例已失效，并唤醒所有等待它的生产者。
    pub fn mark_dead(&self) {
        self.lock().alive = false;
        self.notify_progress();
    }

    pub fn is_alive(&self) -> bool {
        self.lock().alive
    }
}
