//! ### English
//! Bitflags controlling optional display behaviors.
//!
//! These are passed through the C ABI as a `u32` bitmask.
//!
//! ### 中文
//! 控制显示实例可选行为的位标志（bitflags）。
//!
//! 通过 C ABI 以 `u32` 位掩码传入。

use super::config::DisplayConfig;

/// ### English
/// Allocate frames even when the platform does not report the format/geometry as accepted.
///
/// Uploads to such frames go through the pixel converter.
///
/// ### 中文
/// 即使平台不接受该格式/尺寸，也照常分配帧。
///
/// 对这类帧的上传会经过像素转换器。
pub const GL_DISPLAY_FLAG_SKIP_CAPABILITY_CHECK: u32 = 1 << 0;

/// ### English
/// Applies a C ABI flag mask on top of `config`. Unknown bits are ignored.
///
/// ### 中文
/// 把 C ABI 位掩码应用到 `config` 上。未知位会被忽略。
pub fn apply(config: DisplayConfig, flags: u32) -> DisplayConfig {
    config.with_capability_check(flags & GL_DISPLAY_FLAG_SKIP_CAPABILITY_CHECK == 0)
}
