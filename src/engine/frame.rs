//! ### English
//! Reference-counted frame handle coupling a pending pixel payload to a pooled texture.
//!
//! Clones share one frame. When the last clone drops, the texture goes back to the pool (or
//! to the custom hook the frame was created with); no GPU call happens on that path.
//!
//! ### 中文
//! 引用计数的帧句柄：把待上传的像素载荷与池化纹理关联起来。
//!
//! 所有克隆共享同一帧。最后一个克隆 drop 时，纹理回到纹理池（或创建时指定的自定义钩子）；
//! 该路径上不会发生任何 GPU 调用。

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;

use super::format::{CropRect, TextureTarget, VideoFormat};
use super::platform::Platform;
use super::pool::TexturePool;
use super::texture::{TextureDescriptor, TextureSpec};

/// ### English
/// Custom texture provider replacing the pool for frames created with `Frame::with_hooks`.
///
/// Both hooks run on whatever thread creates or drops the frame.
///
/// ### 中文
/// 自定义纹理提供者；通过 `Frame::with_hooks` 创建的帧用它代替纹理池。
///
/// 两个钩子都在创建或 drop 帧的线程上执行。
pub trait TextureHooks: Send + Sync {
    fn gen_texture(&self, spec: &TextureSpec) -> Option<TextureDescriptor>;
    fn del_texture(&self, descriptor: Option<TextureDescriptor>);
}

enum ReleaseHook {
    Pool {
        pool: Arc<TexturePool>,
        platform: Arc<dyn Platform>,
    },
    Custom(Arc<dyn TextureHooks>),
}

struct FrameInner {
    format: VideoFormat,
    width: u32,
    height: u32,
    crop: CropRect,
    texture: Mutex<Option<TextureDescriptor>>,
    payload: Mutex<Option<Bytes>>,
    release: ReleaseHook,
}

impl Drop for FrameInner {
    fn drop(&mut self) {
        self.payload
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let texture = self
            .texture
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        match &self.release {
            ReleaseHook::Custom(hooks) => hooks.del_texture(texture),
            ReleaseHook::Pool { pool, platform } => {
                let Some(descriptor) = texture else {
                    return;
                };
                /* ### English
                 * The pool is closed once the context is gone: only the CPU side is left.
                 * ### 中文
                 * 上下文销毁后纹理池已关闭：只剩 CPU 侧资源需要释放。
                 */
                if let Some(orphan) = pool.release(descriptor) {
                    let (_, image) = orphan.into_parts();
                    platform.free_image(image);
                }
            }
        }
    }
}

/// ### English
/// Producer-held frame. Cheap to clone; all clones refer to the same texture and payload.
///
/// ### 中文
/// 生产者持有的帧。克隆开销低，所有克隆指向同一纹理与载荷。
#[derive(Clone)]
pub struct Frame {
    inner: Arc<FrameInner>,
}

impl Frame {
    /// ### English
    /// Creates a frame without texture that returns its texture to `pool` when dropped.
    ///
    /// ### 中文
    /// 创建一个尚无纹理的帧；drop 时把纹理归还给 `pool`。
    pub(crate) fn pooled(
        format: VideoFormat,
        width: u32,
        height: u32,
        crop: CropRect,
        pool: Arc<TexturePool>,
        platform: Arc<dyn Platform>,
    ) -> Self {
        Self::from_parts(
            format,
            width,
            height,
            crop,
            None,
            ReleaseHook::Pool { pool, platform },
        )
    }

    /// ### English
    /// Creates a frame whose texture comes from `hooks` instead of a display's pool.
    ///
    /// `gen_texture` is called right away; its result may be `None`, in which case the frame
    /// stays without texture.
    ///
    /// #### Parameters
    /// - `format`/`width`/`height`: Frame geometry.
    /// - `crop`: Visible region.
    /// - `hooks`: Texture provider; `del_texture` receives the texture on drop.
    ///
    /// ### 中文
    /// 创建一个纹理来自 `hooks` 而非显示实例纹理池的帧。
    ///
    /// 会立即调用 `gen_texture`；其结果可以为 `None`，此时帧没有纹理。
    ///
    /// #### 参数
    /// - `format`/`width`/`height`：帧几何信息。
    /// - `crop`：可见区域。
    /// - `hooks`：纹理提供者；drop 时 `del_texture` 收回纹理。
    pub fn with_hooks(
        format: VideoFormat,
        width: u32,
        height: u32,
        crop: CropRect,
        hooks: Arc<dyn TextureHooks>,
    ) -> Self {
        let texture = hooks.gen_texture(&TextureSpec::new(format, width, height));
        Self::from_parts(format, width, height, crop, texture, ReleaseHook::Custom(hooks))
    }

    fn from_parts(
        format: VideoFormat,
        width: u32,
        height: u32,
        crop: CropRect,
        texture: Option<TextureDescriptor>,
        release: ReleaseHook,
    ) -> Self {
        Self {
            inner: Arc::new(FrameInner {
                format,
                width,
                height,
                crop,
                texture: Mutex::new(texture),
                payload: Mutex::new(None),
                release,
            }),
        }
    }

    #[inline]
    fn texture_slot(&self) -> MutexGuard<'_, Option<TextureDescriptor>> {
        self.inner
            .texture
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    fn payload_slot(&self) -> MutexGuard<'_, Option<Bytes>> {
        self.inner
            .payload
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    pub fn format(&self) -> VideoFormat {
        self.inner.format
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.inner.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.inner.height
    }

    #[inline]
    pub fn crop(&self) -> CropRect {
        self.inner.crop
    }

    #[inline]
    pub fn spec(&self) -> TextureSpec {
        TextureSpec::new(self.inner.format, self.inner.width, self.inner.height)
    }

    pub fn has_texture(&self) -> bool {
        self.texture_slot().is_some()
    }

    /// ### English
    /// Native texture name, once a texture is assigned.
    ///
    /// ### 中文
    /// 已分配纹理时返回原生纹理名。
    pub fn texture_id(&self) -> Option<u32> {
        self.texture_slot().as_ref().map(TextureDescriptor::texture_id)
    }

    pub fn texture_target(&self) -> Option<TextureTarget> {
        self.texture_slot().as_ref().map(TextureDescriptor::target)
    }

    /// ### English
    /// Attaches `payload` for the next upload, returning the payload it replaces.
    ///
    /// ### 中文
    /// 附加 `payload` 以供下一次上传，返回被替换的旧载荷。
    pub fn attach_payload(&self, payload: Bytes) -> Option<Bytes> {
        self.payload_slot().replace(payload)
    }

    /// ### English
    /// Detaches the pending payload. No-op on a frame without one.
    ///
    /// ### 中文
    /// 移除待上传载荷；没有载荷时为 no-op。
    pub fn detach_payload(&self) -> Option<Bytes> {
        self.payload_slot().take()
    }

    pub fn has_payload(&self) -> bool {
        self.payload_slot().is_some()
    }

    pub(crate) fn payload(&self) -> Option<Bytes> {
        self.payload_slot().clone()
    }

    /// ### English
    /// Whether both handles refer to the same frame.
    ///
    /// ### 中文
    /// 两个句柄是否指向同一帧。
    #[inline]
    pub fn ptr_eq(&self, other: &Frame) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// ### English
    /// Number of live handles to this frame.
    ///
    /// ### 中文
    /// 指向该帧的存活句柄数。
    #[inline]
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// ### English
    /// Installs the texture acquired on the render thread. A previously assigned texture is
    /// returned to the caller.
    ///
    /// ### 中文
    /// 设置在渲染线程获取到的纹理；若之前已有纹理则将其返回给调用方。
    pub(crate) fn assign_texture(&self, descriptor: TextureDescriptor) -> Option<TextureDescriptor> {
        self.texture_slot().replace(descriptor)
    }

    /// ### English
    /// Runs `f` on the assigned texture, `None` if the frame has none.
    ///
    /// ### 中文
    /// 对已分配的纹理执行 `f`；帧没有纹理时返回 `None`。
    pub(crate) fn with_texture<R>(&self, f: impl FnOnce(&mut TextureDescriptor) -> R) -> Option<R> {
        self.texture_slot().as_mut().map(f)
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("format", &self.inner.format)
            .field("width", &self.inner.width)
            .field("height", &self.inner.height)
            .field("texture", &self.texture_id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use bytes::BytesMut;

    use super::*;
    use crate::engine::platform::SoftwarePlatform;
    use crate::engine::texture::PlatformImage;

    fn descriptor(spec: TextureSpec, texture: u32) -> TextureDescriptor {
        TextureDescriptor::new(
            spec,
            texture,
            PlatformImage {
                real_format: spec.format,
                stride: spec.width as usize * 4,
                target: TextureTarget::Texture2D,
                native_image: 0,
                memory: BytesMut::new(),
                hw_metadata: 0,
            },
        )
    }

    #[derive(Default)]
    struct CountingHooks {
        generated: AtomicUsize,
        deleted: AtomicUsize,
    }

    impl TextureHooks for CountingHooks {
        fn gen_texture(&self, spec: &TextureSpec) -> Option<TextureDescriptor> {
            let n = self.generated.fetch_add(1, Ordering::SeqCst);
            Some(descriptor(*spec, 100 + n as u32))
        }

        fn del_texture(&self, descriptor: Option<TextureDescriptor>) {
            assert!(descriptor.is_some());
            self.deleted.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn last_drop_returns_texture_to_the_pool() {
        let pool = Arc::new(TexturePool::new(2));
        let spec = TextureSpec::new(VideoFormat::Rgba, 32, 32);
        let acquired = pool
            .acquire(&spec, |s| Ok::<_, String>(descriptor(*s, 7)), drop)
            .unwrap();

        let frame = Frame::pooled(
            VideoFormat::Rgba,
            32,
            32,
            CropRect::default(),
            pool.clone(),
            Arc::new(SoftwarePlatform),
        );
        assert!(frame.assign_texture(acquired).is_none());
        let clone = frame.clone();
        assert_eq!(frame.ref_count(), 2);

        drop(frame);
        assert_eq!(pool.free_count(), 0);
        drop(clone);
        assert_eq!(pool.free_count(), 1);
        assert_eq!(pool.allocated(), 1);
    }

    #[test]
    fn payload_attach_and_detach() {
        let frame = Frame::with_hooks(
            VideoFormat::Rgba,
            1,
            1,
            CropRect::default(),
            Arc::new(CountingHooks::default()),
        );
        assert!(frame.detach_payload().is_none());
        assert!(frame.attach_payload(Bytes::from_static(&[1, 2, 3, 4])).is_none());
        assert!(frame.has_payload());
        let previous = frame.attach_payload(Bytes::from_static(&[5, 6, 7, 8]));
        assert_eq!(previous.as_deref(), Some(&[1u8, 2, 3, 4][..]));
        assert_eq!(frame.detach_payload().as_deref(), Some(&[5u8, 6, 7, 8][..]));
        assert!(frame.detach_payload().is_none());
    }

    #[test]
    fn custom_hooks_replace_the_pool() {
        let hooks = Arc::new(CountingHooks::default());
        let frame = Frame::with_hooks(
            VideoFormat::Bgra,
            64,
            16,
            CropRect::default(),
            hooks.clone(),
        );
        assert_eq!(frame.texture_id(), Some(100));
        assert_eq!(hooks.generated.load(Ordering::SeqCst), 1);

        drop(frame);
        assert_eq!(hooks.deleted.load(Ordering::SeqCst), 1);
    }
}
