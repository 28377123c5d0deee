//! ### English
//! Messages posted from producer threads to the render thread.
//!
//! ### 中文
//! 生产者线程投递给渲染线程的消息。

use crossbeam_channel as channel;
use dpi::PhysicalSize;

use crate::engine::error::{DisplayError, GpuError};
use crate::engine::frame::Frame;
use crate::engine::texture::TextureSpec;

/// ### English
/// Work items of the render loop. Requests that need an answer carry a one-shot reply channel;
/// a reply sender dropped without sending counts as failure.
///
/// ### 中文
/// 渲染循环的工作项。需要应答的请求携带一次性应答 channel；
/// 应答端未发送即被 drop 视为失败。
pub(crate) enum Message {
    /// ### English
    /// First message of every render thread: builds the GPU device.
    ///
    /// ### 中文
    /// 每个渲染线程的第一条消息：创建 GPU 设备。
    CreateContext {
        /// ### English
        /// Native context to share objects with.
        ///
        /// ### 中文
        /// 需要共享对象的原生上下文。
        external_context: Option<u64>,
        initial_size: PhysicalSize<u32>,
    },
    /// ### English
    /// Presents the queued (or last) frame on a surface of `size`.
    ///
    /// ### 中文
    /// 在尺寸为 `size` 的 surface 上呈现排队中（或上一次）的帧。
    Draw { size: PhysicalSize<u32> },
    /// ### English
    /// Promotes `to_draw` to `drawing` after a swap, provided `drawn` is that very frame.
    ///
    /// ### 中文
    /// 交换缓冲后把 `to_draw` 提升为 `drawing`，前提是 `drawn` 正是该帧。
    DrawFinished { drawn: Option<Frame> },
    /// ### English
    /// Recomputes the viewport from the stored window size and aspect policy.
    ///
    /// ### 中文
    /// 根据保存的窗口尺寸与宽高比策略重新计算视口。
    Resize { reply: channel::Sender<()> },
    /// ### English
    /// Moves the frame's attached payload into its texture.
    ///
    /// ### 中文
    /// 把帧上附加的载荷写入其纹理。
    Upload {
        frame: Frame,
        reply: channel::Sender<Result<(), DisplayError>>,
    },
    /// ### English
    /// Assigns a pooled texture to the frame; replies whether it got one.
    ///
    /// ### 中文
    /// 为帧分配池化纹理；应答是否分配成功。
    GenTexture {
        frame: Frame,
        reply: channel::Sender<bool>,
    },
    /// ### English
    /// Deletes free textures that no longer match `keep`.
    ///
    /// ### 中文
    /// 删除与 `keep` 不再匹配的空闲纹理。
    DelTextures { keep: Option<TextureSpec> },
    /// ### English
    /// (Re)builds the redisplay program for the current format.
    ///
    /// ### 中文
    /// 为当前格式（重新）构建重显示程序。
    BuildShader {
        reply: channel::Sender<Result<(), GpuError>>,
    },
    SetWindowHandle { handle: u64 },
    Activate {
        current: bool,
        reply: channel::Sender<bool>,
    },
    /// ### English
    /// Tears the context down and ends the thread.
    ///
    /// ### 中文
    /// 拆除上下文并结束线程。
    Quit,
}

impl Message {
    pub fn name(&self) -> &'static str {
        match self {
            Message::CreateContext { .. } => "CreateContext",
            Message::Draw { .. } => "Draw",
            Message::DrawFinished { .. } => "DrawFinished",
            Message::Resize { .. } => "Resize",
            Message::Upload { .. } => "Upload",
            Message::GenTexture { .. } => "GenTexture",
            Message::DelTextures { .. } => "DelTextures",
            Message::BuildShader { .. } => "BuildShader",
            Message::SetWindowHandle { .. } => "SetWindowHandle",
            Message::Activate { .. } => "Activate",
            Message::Quit => "Quit",
        }
    }
}
