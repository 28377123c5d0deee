//! ### English
//! Bounded texture pool shared between producer threads (which return textures) and the
//! render thread (the only one that creates, reuses or deletes them).
//!
//! ### 中文
//! 有界纹理池：生产者线程归还纹理，渲染线程是唯一创建、复用或删除纹理的线程。

use std::fmt::Display;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use super::texture::{TextureDescriptor, TextureSpec};

struct PoolState {
    allocated: usize,
    free: Vec<TextureDescriptor>,
    closed: bool,
}

/// ### English
/// Fixed-capacity set of texture descriptors.
///
/// `allocated` counts every descriptor created and not yet deleted, wherever it currently
/// lives (free list or a live frame). It never exceeds `capacity`; once it reaches it,
/// `acquire` waits for a `release`.
///
/// ### 中文
/// 固定容量的纹理描述符集合。
///
/// `allocated` 统计所有已创建且未删除的描述符（无论位于空闲列表还是存活帧中），
/// 永远不超过 `capacity`；达到上限后 `acquire` 会等待 `release`。
pub struct TexturePool {
    capacity: usize,
    state: Mutex<PoolState>,
    texture_released: Condvar,
}

impl TexturePool {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(PoolState {
                allocated: 0,
                free: Vec::with_capacity(capacity),
                closed: false,
            }),
            texture_released: Condvar::new(),
        }
    }

    #[inline]
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// ### English
    /// Finds or creates a descriptor for `spec`. Render thread only.
    ///
    /// Free descriptors are popped until one matches exactly; every mismatched one popped on
    /// the way is deleted through `destroy`. With nothing reusable and room left, `create`
    /// makes a new one. With the pool full, the call waits for a release and searches again.
    ///
    /// Returns `None` when `create` fails (logged, not fatal) or the pool is closed.
    ///
    /// #### Parameters
    /// - `spec`: Exact format/geometry wanted.
    /// - `create`: Allocates a fresh descriptor (platform image + GPU texture).
    /// - `destroy`: Deletes an evicted descriptor.
    ///
    /// ### 中文
    /// 为 `spec` 查找或创建描述符。仅限渲染线程调用。
    ///
    /// 从空闲列表依次弹出，直到找到完全匹配的描述符；途中弹出的不匹配描述符都会经
    /// `destroy` 删除。没有可复用的且仍有余量时，用 `create` 新建；池已满时等待归还后重新查找。
    ///
    /// `create` 失败（仅记录日志，不致命）或池已关闭时返回 `None`。
    ///
    /// #### 参数
    /// - `spec`：需要的精确格式/尺寸。
    /// - `create`：分配新描述符（平台图像 + GPU 纹理）。
    /// - `destroy`：删除被淘汰的描述符。
    pub fn acquire<C, D, E>(
        &self,
        spec: &TextureSpec,
        mut create: C,
        mut destroy: D,
    ) -> Option<TextureDescriptor>
    where
        C: FnMut(&TextureSpec) -> Result<TextureDescriptor, E>,
        D: FnMut(TextureDescriptor),
        E: Display,
    {
        let mut state = self.lock();
        loop {
            if state.closed {
                return None;
            }

            while let Some(descriptor) = state.free.pop() {
                if descriptor.matches(spec) {
                    tracing::trace!(texture = descriptor.texture_id(), "reusing pooled texture");
                    return Some(descriptor);
                }
                state.allocated -= 1;
                tracing::trace!(
                    texture = descriptor.texture_id(),
                    "evicting texture with stale geometry"
                );
                destroy(descriptor);
            }

            if state.allocated < self.capacity {
                return match create(spec) {
                    Ok(descriptor) => {
                        state.allocated += 1;
                        tracing::debug!(
                            texture = descriptor.texture_id(),
                            allocated = state.allocated,
                            capacity = self.capacity,
                            "allocated texture"
                        );
                        Some(descriptor)
                    }
                    Err(err) => {
                        tracing::warn!(
                            format = ?spec.format,
                            width = spec.width,
                            height = spec.height,
                            %err,
                            "texture allocation failed"
                        );
                        None
                    }
                };
            }

            tracing::debug!(capacity = self.capacity, "texture pool exhausted, waiting for a release");
            state = self
                .texture_released
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// ### English
    /// Returns a descriptor to the free list and wakes a waiting `acquire`.
    ///
    /// No GPU work happens here, so any thread may call it. After `close` the descriptor is
    /// handed back to the caller instead; its texture died with the context.
    ///
    /// ### 中文
    /// 将描述符放回空闲列表并唤醒等待中的 `acquire`。
    ///
    /// 这里不做任何 GPU 调用，因此任意线程均可调用。`close` 之后描述符会退还给调用方；
    /// 其纹理已随上下文一同销毁。
    pub fn release(&self, descriptor: TextureDescriptor) -> Option<TextureDescriptor> {
        let mut state = self.lock();
        if state.closed {
            return Some(descriptor);
        }
        state.free.push(descriptor);
        drop(state);
        self.texture_released.notify_all();
        None
    }

    /// ### English
    /// Deletes every free descriptor whose spec differs from `keep` (all of them for `None`).
    /// Render thread only.
    ///
    /// ### 中文
    /// 删除所有与 `keep` 不同的空闲描述符（`None` 时全部删除）。仅限渲染线程调用。
    pub fn reclaim<D>(&self, keep: Option<&TextureSpec>, mut destroy: D)
    where
        D: FnMut(TextureDescriptor),
    {
        let mut state = self.lock();
        let free = std::mem::take(&mut state.free);
        for descriptor in free {
            if keep.is_some_and(|spec| descriptor.matches(spec)) {
                state.free.push(descriptor);
            } else {
                state.allocated -= 1;
                destroy(descriptor);
            }
        }
    }

    /// ### English
    /// Deletes the whole free list and resets the allocation count. Teardown only, on the
    /// render thread.
    ///
    /// ### 中文
    /// 删除整个空闲列表并将分配计数清零。仅在渲染线程的拆除阶段调用。
    pub fn drain<D>(&self, destroy: D)
    where
        D: FnMut(TextureDescriptor),
    {
        let free = {
            let mut state = self.lock();
            state.allocated = 0;
            std::mem::take(&mut state.free)
        };
        free.into_iter().for_each(destroy);
    }

    /// ### English
    /// Stops the pool: pending and future `acquire` calls return `None`.
    ///
    /// ### 中文
    /// 关闭纹理池：正在等待及之后的 `acquire` 调用都会返回 `None`。
    pub fn close(&self) {
        self.lock().closed = true;
        self.texture_released.notify_all();
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn allocated(&self) -> usize {
        self.lock().allocated
    }

    pub fn free_count(&self) -> usize {
        self.lock().free.len()
    }
}
