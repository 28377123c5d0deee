//! ### English
//! Error types crossing the producer / render-thread boundary.
//!
//! ### 中文
//! 跨越生产者线程与渲染线程边界的错误类型。

use super::format::VideoFormat;

/// ### English
/// Failures reported by the GPU device (always raised on the render thread).
///
/// ### 中文
/// GPU 设备上报的错误（总是在渲染线程产生）。
#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    #[error("GPU context creation failed: {0}")]
    Context(String),
    #[error("texture operation failed: {0}")]
    Texture(String),
    #[error("shader build failed: {0}")]
    Shader(String),
    #[error("{0} is not supported by this device")]
    Unsupported(String),
}

/// ### English
/// Failures from the platform image allocator.
///
/// ### 中文
/// 平台图像分配器返回的错误。
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("platform cannot allocate images of format {0:?}")]
    UnsupportedFormat(VideoFormat),
    #[error("out of memory allocating a {width}x{height} {format:?} image")]
    OutOfMemory {
        format: VideoFormat,
        width: u32,
        height: u32,
    },
}

/// ### English
/// Failures from the pixel-format converter.
///
/// ### 中文
/// 像素格式转换器返回的错误。
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("no conversion from {src:?} to {dst:?}")]
    UnsupportedPair { src: VideoFormat, dst: VideoFormat },
    #[error("source holds {actual} bytes, {required} required")]
    SourceTooSmall { required: usize, actual: usize },
    #[error("destination holds {actual} bytes, {required} required")]
    DestinationTooSmall { required: usize, actual: usize },
}

/// ### English
/// Producer-facing error of the display façade.
///
/// ### 中文
/// 显示门面对生产者暴露的错误。
#[derive(Debug, thiserror::Error)]
pub enum DisplayError {
    #[error("display engine is not alive")]
    NotAlive,
    #[error("display context was already created")]
    AlreadyCreated,
    #[error("display context creation failed: {0}")]
    ContextCreation(#[source] GpuError),
    #[error("render thread spawn failed: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("{format:?} {width}x{height} needs {expected} bytes, caller declared {actual}")]
    SizeMismatch {
        format: VideoFormat,
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error("platform does not accept {format:?} at {width}x{height}")]
    Unsupported {
        format: VideoFormat,
        width: u32,
        height: u32,
    },
    #[error("texture allocation failed")]
    AllocationFailed,
    #[error("frame has no texture attached")]
    NoTexture,
    #[error("pixel upload failed: {0}")]
    Convert(#[from] ConvertError),
    #[error("pixel upload failed: {0}")]
    Gpu(#[from] GpuError),
    #[error("render thread went away")]
    Disconnected,
}
