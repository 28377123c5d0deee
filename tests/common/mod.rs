//! Recording mock GPU backend shared by the integration tests.
//!
//! Every device call is logged together with the thread it was made on, so tests can check
//! that the render thread is the only one touching the device.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use dpi::PhysicalSize;
use gl_display::engine::gpu::{ContextInfo, SamplerRect, Viewport, WindowEvent};
use gl_display::{
    CapabilityQuery, ConvertError, Display, DisplayConfig, GpuBackend, GpuDevice, GpuError,
    ImageAllocator, PixelConverter, PlatformError, PlatformImage, ShaderSource, SoftwarePlatform,
    TextureSpec, TextureTarget, VideoFormat,
};

pub const MOCK_CONTEXT_HANDLE: u64 = 0xC0FFEE;

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    CreateDevice { external_context: Option<u64> },
    CreateTexture { texture: u32, spec: TextureSpec },
    DeleteTexture(u32),
    CompileProgram(u32),
    DeleteProgram(u32),
    SetViewport(Viewport),
    Draw { texture: u32, sampler: SamplerRect },
    SwapBuffers,
    UploadSubImage { texture: u32, len: usize },
    CommitImage { texture: u32, head: Vec<u8> },
    ResizeSurface(PhysicalSize<u32>),
    SetWindowHandle(u64),
    MakeCurrent(bool),
    DropDevice,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct MockOptions {
    pub fail_context: bool,
    pub fail_shader: bool,
}

/// Shared journal of device calls plus the knobs tests use to steer the device.
#[derive(Default)]
pub struct GpuLog {
    calls: Mutex<Vec<(ThreadId, Call)>>,
    render_thread: Mutex<Option<ThreadId>>,
    foreign_calls: AtomicUsize,
    draws_blocked: Mutex<bool>,
    draws_unblocked: Condvar,
    draws_entered: AtomicUsize,
    events: Mutex<VecDeque<WindowEvent>>,
}

impl GpuLog {
    fn record(&self, call: Call) {
        let current = thread::current().id();
        if *self.render_thread.lock().unwrap() != Some(current) {
            self.foreign_calls.fetch_add(1, Ordering::SeqCst);
        }
        self.calls.lock().unwrap().push((current, call));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, call)| call.clone())
            .collect()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|call| matches(call)).count()
    }

    pub fn threads(&self) -> Vec<ThreadId> {
        self.calls.lock().unwrap().iter().map(|(id, _)| *id).collect()
    }

    pub fn render_thread(&self) -> Option<ThreadId> {
        *self.render_thread.lock().unwrap()
    }

    /// Device calls made from any thread other than the one that created the device.
    pub fn foreign_calls(&self) -> usize {
        self.foreign_calls.load(Ordering::SeqCst)
    }

    /// Makes every subsequent `draw` wait until `unblock_draws`.
    pub fn block_draws(&self) {
        *self.draws_blocked.lock().unwrap() = true;
    }

    pub fn unblock_draws(&self) {
        *self.draws_blocked.lock().unwrap() = false;
        self.draws_unblocked.notify_all();
    }

    pub fn draws_entered(&self) -> usize {
        self.draws_entered.load(Ordering::SeqCst)
    }

    pub fn push_event(&self, event: WindowEvent) {
        self.events.lock().unwrap().push_back(event);
    }

    fn wait_for_draw_gate(&self) {
        self.draws_entered.fetch_add(1, Ordering::SeqCst);
        let mut blocked = self.draws_blocked.lock().unwrap();
        while *blocked {
            blocked = self.draws_unblocked.wait(blocked).unwrap();
        }
    }
}

pub struct MockBackend {
    log: Arc<GpuLog>,
    options: MockOptions,
}

impl MockBackend {
    pub fn new(log: Arc<GpuLog>, options: MockOptions) -> Self {
        Self { log, options }
    }
}

impl GpuBackend for MockBackend {
    type Device = MockDevice;

    fn create_device(
        self,
        external_context: Option<u64>,
        initial_size: PhysicalSize<u32>,
    ) -> Result<MockDevice, GpuError> {
        *self.log.render_thread.lock().unwrap() = Some(thread::current().id());
        self.log.record(Call::CreateDevice { external_context });
        if self.options.fail_context {
            return Err(GpuError::Context("mock context refused".to_string()));
        }
        Ok(MockDevice {
            log: self.log,
            options: self.options,
            next_texture: 1,
            next_program: 1,
            surface: initial_size,
        })
    }
}

pub struct MockDevice {
    log: Arc<GpuLog>,
    options: MockOptions,
    next_texture: u32,
    next_program: u32,
    surface: PhysicalSize<u32>,
}

impl GpuDevice for MockDevice {
    type Program = u32;

    fn info(&self) -> ContextInfo {
        ContextInfo {
            vendor: "mock".to_string(),
            renderer: "recording".to_string(),
            version: "0.0".to_string(),
        }
    }

    fn native_context_handle(&self) -> u64 {
        MOCK_CONTEXT_HANDLE
    }

    fn create_texture(&mut self, spec: &TextureSpec, _image: &PlatformImage) -> Result<u32, GpuError> {
        let texture = self.next_texture;
        self.next_texture += 1;
        self.log.record(Call::CreateTexture {
            texture,
            spec: *spec,
        });
        Ok(texture)
    }

    fn delete_texture(&mut self, texture: u32) {
        self.log.record(Call::DeleteTexture(texture));
    }

    fn compile_program(&mut self, vertex: &str, fragment: &str) -> Result<u32, GpuError> {
        assert!(vertex.contains("a_position"));
        assert!(fragment.contains("s_texture"));
        if self.options.fail_shader {
            return Err(GpuError::Shader("0:1: syntax error".to_string()));
        }
        let program = self.next_program;
        self.next_program += 1;
        self.log.record(Call::CompileProgram(program));
        Ok(program)
    }

    fn delete_program(&mut self, program: u32) {
        self.log.record(Call::DeleteProgram(program));
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.log.record(Call::SetViewport(viewport));
    }

    fn draw(
        &mut self,
        _program: &u32,
        texture: u32,
        _target: TextureTarget,
        sampler: SamplerRect,
    ) -> Result<(), GpuError> {
        self.log.wait_for_draw_gate();
        self.log.record(Call::Draw { texture, sampler });
        Ok(())
    }

    fn swap_buffers(&mut self) {
        self.log.record(Call::SwapBuffers);
    }

    fn supports_direct_upload(&self, format: VideoFormat) -> bool {
        matches!(format, VideoFormat::Rgba | VideoFormat::Bgra)
    }

    fn upload_sub_image(
        &mut self,
        texture: u32,
        _spec: &TextureSpec,
        data: &[u8],
    ) -> Result<(), GpuError> {
        self.log.record(Call::UploadSubImage {
            texture,
            len: data.len(),
        });
        Ok(())
    }

    fn commit_image(
        &mut self,
        texture: u32,
        _spec: &TextureSpec,
        image: &PlatformImage,
    ) -> Result<(), GpuError> {
        let head = image.memory.iter().take(8).copied().collect();
        self.log.record(Call::CommitImage { texture, head });
        Ok(())
    }

    fn resize_surface(&mut self, size: PhysicalSize<u32>) {
        self.surface = size;
        self.log.record(Call::ResizeSurface(size));
    }

    fn poll_event(&mut self) -> Option<WindowEvent> {
        self.log.events.lock().unwrap().pop_front()
    }

    fn set_window_handle(&mut self, handle: u64) {
        self.log.record(Call::SetWindowHandle(handle));
    }

    fn make_current(&mut self, current: bool) -> bool {
        self.log.record(Call::MakeCurrent(current));
        true
    }
}

impl Drop for MockDevice {
    fn drop(&mut self) {
        self.log.record(Call::DropDevice);
    }
}

/// Software platform that counts image allocations.
#[derive(Default)]
pub struct CountingPlatform {
    pub allocations: AtomicUsize,
    pub frees: AtomicUsize,
}

impl CountingPlatform {
    pub fn allocations(&self) -> usize {
        self.allocations.load(Ordering::SeqCst)
    }

    pub fn frees(&self) -> usize {
        self.frees.load(Ordering::SeqCst)
    }
}

impl ImageAllocator for CountingPlatform {
    fn alloc_image(&self, spec: &TextureSpec) -> Result<PlatformImage, PlatformError> {
        self.allocations.fetch_add(1, Ordering::SeqCst);
        SoftwarePlatform.alloc_image(spec)
    }

    fn free_image(&self, image: PlatformImage) {
        self.frees.fetch_add(1, Ordering::SeqCst);
        SoftwarePlatform.free_image(image);
    }
}

impl PixelConverter for CountingPlatform {
    fn convert(
        &self,
        src: &[u8],
        src_format: VideoFormat,
        dst: &mut [u8],
        dst_format: VideoFormat,
        width: u32,
        height: u32,
        stride: usize,
    ) -> Result<(), ConvertError> {
        SoftwarePlatform.convert(src, src_format, dst, dst_format, width, height, stride)
    }
}

impl CapabilityQuery for CountingPlatform {
    fn accepts(&self, format: VideoFormat, width: u32, height: u32) -> bool {
        SoftwarePlatform.accepts(format, width, height)
    }
}

impl ShaderSource for CountingPlatform {
    fn vertex_source(&self, format: VideoFormat) -> Option<String> {
        SoftwarePlatform.vertex_source(format)
    }

    fn fragment_source(&self, format: VideoFormat) -> Option<String> {
        SoftwarePlatform.fragment_source(format)
    }
}

pub struct Harness {
    pub display: Arc<Display<MockBackend>>,
    pub log: Arc<GpuLog>,
    pub platform: Arc<CountingPlatform>,
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Builds a display over the mock backend without creating its context.
pub fn harness_with(config: DisplayConfig, options: MockOptions) -> Harness {
    init_tracing();
    let log = Arc::new(GpuLog::default());
    let platform = Arc::new(CountingPlatform::default());
    let display = Display::new(
        config,
        platform.clone(),
        MockBackend::new(log.clone(), options),
    );
    Harness {
        display: Arc::new(display),
        log,
        platform,
    }
}

/// Running display with the given pool capacity.
pub fn running(capacity: usize) -> Harness {
    let harness = harness_with(
        DisplayConfig::default().with_pool_capacity(capacity),
        MockOptions::default(),
    );
    harness
        .display
        .create_context(None)
        .expect("mock context creation");
    harness
}

/// Round-trips a message through the render queue; everything posted before has been handled
/// once it returns.
pub fn sync(display: &Display<MockBackend>) {
    assert!(display.activate_context(true));
}

pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}
