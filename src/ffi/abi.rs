#[unsafe(no_mangle)]
/// ### English
/// Returns the C ABI version.
///
/// ### 中文
/// 返回 C ABI 版本号。
pub extern "C" fn gl_display_abi_version() -> u32 {
    super::GL_DISPLAY_ABI_VERSION
}
