//! Test doubles shared by the render loop integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use kiln_engine::logging::{LoggingConfig, init_logging};
use kiln_engine::{
    ContextArbiter, FatalError, FrameRenderer, GraphicsBackend, LoopHandle, LoopId,
    PresentError, RenderCtx, SurfaceError, SurfaceExtent, SurfaceHost,
};

pub const TIMEOUT: Duration = Duration::from_secs(5);

pub fn init() {
    init_logging(LoggingConfig {
        is_test: true,
        ..Default::default()
    });
}

/// Polls `cond` until it holds or `timeout` elapses.
pub fn wait_for(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    cond()
}

/// Backend call counts.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub acquires: usize,
    pub releases: usize,
    pub create_attempts: usize,
    pub creates: usize,
    pub destroys: usize,
    pub presents: usize,
    pub live_contexts: usize,
    pub live_surfaces: usize,
    /// Resources acquired while another of the same kind was still live.
    pub overlaps: usize,
}

/// One-shot failures injected into the next matching backend call.
#[derive(Debug, Default)]
pub struct Script {
    pub fail_acquire: bool,
    pub fail_surfaces: usize,
    pub context_lost_next: bool,
    pub present_failure_next: bool,
}

#[derive(Default)]
pub struct Probe {
    pub tally: Mutex<Tally>,
    pub script: Mutex<Script>,
}

impl Probe {
    pub fn tally(&self) -> Tally {
        *self.tally.lock()
    }
}

#[derive(Debug)]
pub struct TestConfig {
    pub generation: usize,
}

pub struct TestContext {
    config: TestConfig,
}

#[derive(Debug)]
pub struct TestSurface {
    pub window: u32,
    pub extent: SurfaceExtent,
}

pub struct CountingBackend {
    probe: Arc<Probe>,
}

impl CountingBackend {
    pub fn new(probe: &Arc<Probe>) -> Self {
        Self {
            probe: Arc::clone(probe),
        }
    }
}

impl GraphicsBackend for CountingBackend {
    type Config = TestConfig;
    type Context = TestContext;
    type Surface = TestSurface;
    type NativeWindow = u32;

    fn acquire_context(&mut self) -> anyhow::Result<TestContext> {
        if std::mem::take(&mut self.probe.script.lock().fail_acquire) {
            anyhow::bail!("no display");
        }
        let mut t = self.probe.tally.lock();
        if t.live_contexts > 0 {
            t.overlaps += 1;
        }
        t.acquires += 1;
        t.live_contexts += 1;
        Ok(TestContext {
            config: TestConfig {
                generation: t.acquires,
            },
        })
    }

    fn context_config(context: &TestContext) -> &TestConfig {
        &context.config
    }

    fn create_surface(
        &mut self,
        _context: &TestContext,
        window: &u32,
        extent: SurfaceExtent,
    ) -> Result<TestSurface, SurfaceError> {
        self.probe.tally.lock().create_attempts += 1;
        {
            let mut script = self.probe.script.lock();
            if script.fail_surfaces > 0 {
                script.fail_surfaces -= 1;
                return Err(SurfaceError::BadWindow {
                    reason: "window rejected".to_string(),
                });
            }
        }
        let mut t = self.probe.tally.lock();
        if t.live_surfaces > 0 {
            t.overlaps += 1;
        }
        t.creates += 1;
        t.live_surfaces += 1;
        Ok(TestSurface {
            window: *window,
            extent,
        })
    }

    fn present_frame(
        &mut self,
        _context: &TestContext,
        _surface: &mut TestSurface,
    ) -> Result<(), PresentError> {
        thread::sleep(Duration::from_millis(1));
        {
            let mut script = self.probe.script.lock();
            if std::mem::take(&mut script.context_lost_next) {
                return Err(PresentError::ContextLost);
            }
            if std::mem::take(&mut script.present_failure_next) {
                return Err(PresentError::Failed {
                    code: 0x300d,
                    reason: "bad surface".to_string(),
                });
            }
        }
        self.probe.tally.lock().presents += 1;
        Ok(())
    }

    fn destroy_surface(&mut self, _context: &TestContext, _surface: TestSurface) {
        let mut t = self.probe.tally.lock();
        t.destroys += 1;
        t.live_surfaces -= 1;
    }

    fn release_context(&mut self, _context: TestContext) {
        let mut t = self.probe.tally.lock();
        t.releases += 1;
        t.live_contexts -= 1;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    ContextReady(usize),
    SizeChanged(u32, u32),
    DrawFrame,
    SurfaceLost,
    Fatal(String),
}

pub type DrawHook = Box<dyn FnMut(&mut RenderCtx<'_, CountingBackend>) + Send>;
pub type LostHook = Box<dyn FnMut() + Send>;

/// Renderer that records every callback.
pub struct RecordingRenderer {
    events: Arc<Mutex<Vec<Event>>>,
    on_draw: Option<DrawHook>,
    on_lost: Option<LostHook>,
}

impl RecordingRenderer {
    pub fn new(events: &Arc<Mutex<Vec<Event>>>) -> Self {
        Self {
            events: Arc::clone(events),
            on_draw: None,
            on_lost: None,
        }
    }

    pub fn on_draw(mut self, hook: DrawHook) -> Self {
        self.on_draw = Some(hook);
        self
    }

    pub fn when_surface_lost(mut self, hook: LostHook) -> Self {
        self.on_lost = Some(hook);
        self
    }

    fn push(&self, event: Event) {
        self.events.lock().push(event);
    }
}

impl FrameRenderer<CountingBackend> for RecordingRenderer {
    fn on_context_ready(&mut self, ctx: &mut RenderCtx<'_, CountingBackend>) {
        self.push(Event::ContextReady(ctx.config().generation));
    }

    fn on_size_changed(
        &mut self,
        _ctx: &mut RenderCtx<'_, CountingBackend>,
        width: u32,
        height: u32,
    ) {
        self.push(Event::SizeChanged(width, height));
    }

    fn on_draw_frame(&mut self, ctx: &mut RenderCtx<'_, CountingBackend>) {
        self.push(Event::DrawFrame);
        if let Some(hook) = self.on_draw.as_mut() {
            hook(ctx);
        }
    }

    fn on_surface_lost(&mut self, _ctx: &mut RenderCtx<'_, CountingBackend>) {
        self.push(Event::SurfaceLost);
        if let Some(hook) = self.on_lost.as_mut() {
            hook();
        }
    }

    fn on_fatal_error(&mut self, error: &FatalError) {
        self.push(Event::Fatal(error.to_string()));
    }
}

pub fn count(events: &Mutex<Vec<Event>>, pred: impl Fn(&Event) -> bool) -> usize {
    events.lock().iter().filter(|e| pred(e)).count()
}

pub struct TestHost {
    pub window: u32,
    pub preserve: AtomicBool,
    /// When set, the host inspects the loop while answering pause queries.
    pub observer: Mutex<Option<LoopHandle>>,
}

impl TestHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            window: 7,
            preserve: AtomicBool::new(false),
            observer: Mutex::new(None),
        })
    }
}

impl SurfaceHost for TestHost {
    type Window = u32;

    fn native_window(&self) -> Option<u32> {
        Some(self.window)
    }

    fn preserve_context_on_pause(&self) -> bool {
        if let Some(handle) = self.observer.lock().as_ref() {
            let _ = handle.status();
        }
        self.preserve.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct CountingArbiter {
    pub released: AtomicUsize,
}

impl ContextArbiter for CountingArbiter {
    fn on_context_release_requested(&self, _loop_id: LoopId) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}
