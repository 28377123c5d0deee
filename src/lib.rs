/// ### English
/// `gl_display` crate root.
/// Core implementation lives under `engine`; the C ABI is exported via `ffi`.
///
/// ### 中文
/// `gl_display` 的 crate 根。
/// 核心实现位于 `engine` 模块；通过 `ffi` 导出 C ABI。
pub mod engine;
mod ffi;

pub use engine::*;
