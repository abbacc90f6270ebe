//! The render thread.
//!
//! Each iteration takes the monitor, decides on exactly one [`Step`] from the
//! shared state (or waits), releases the monitor and carries the step out.
//! Backend and renderer calls only ever happen in the second half, so host
//! threads are never blocked behind GPU work.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::thread;

use crate::core::{ContextArbiter, FrameRenderer, RenderCtx, SurfaceHost};
use crate::device::{GraphicsBackend, PresentError, SurfaceExtent};
use crate::error::FatalError;
use crate::logging::target;
use crate::monitor::Locked;
use crate::time::FrameClock;

use super::control::{Shared, WorkerCtl};
use super::state::{Action, FinishCallback, LoopState};

/// What the render thread does after leaving the monitor.
enum Step {
    Exit,
    Run(Action),
    Release { release: Release, ack: Ack },
    /// Whether the context survives is decided by the host when this runs.
    Pause { surface: bool, context: bool },
    ReportFinished(FinishCallback),
    Draw,
}

/// Resources to tear down.
#[derive(Debug, Copy, Clone, Default)]
struct Release {
    surface: bool,
    context: bool,
}

impl Release {
    const ALL: Release = Release {
        surface: true,
        context: true,
    };

    fn any(self) -> bool {
        self.surface || self.context
    }
}

/// State published once a release has finished.
#[derive(Debug, Copy, Clone)]
enum Ack {
    None,
    Paused,
    SurfaceLost,
}

/// Work decided under the monitor and carried across iterations until done.
#[derive(Debug, Default)]
struct Pending {
    acquire_context: bool,
    context_ready: bool,
    create_surface: bool,
    size: Option<(u32, u32)>,
    want_notification: bool,
    extent: SurfaceExtent,
}

pub(crate) struct Worker<B, R, H>
where
    B: GraphicsBackend,
    R: FrameRenderer<B>,
    H: SurfaceHost<Window = B::NativeWindow>,
{
    shared: Arc<Shared>,
    backend: B,
    renderer: R,
    host: Weak<H>,
    arbiter: Option<Arc<dyn ContextArbiter>>,

    context: Option<B::Context>,
    surface: Option<B::Surface>,
    clock: FrameClock,

    pending: Pending,
    lost_context: bool,
    asked_to_release_context: bool,
    do_render_notification: bool,
    finish_drawing: Option<FinishCallback>,
}

impl<B, R, H> Worker<B, R, H>
where
    B: GraphicsBackend,
    R: FrameRenderer<B>,
    H: SurfaceHost<Window = B::NativeWindow>,
{
    pub fn new(
        shared: Arc<Shared>,
        backend: B,
        renderer: R,
        host: Weak<H>,
        arbiter: Option<Arc<dyn ContextArbiter>>,
    ) -> Self {
        Self {
            shared,
            backend,
            renderer,
            host,
            arbiter,
            context: None,
            surface: None,
            clock: FrameClock::new(),
            pending: Pending::default(),
            lost_context: false,
            asked_to_release_context: false,
            do_render_notification: false,
            finish_drawing: None,
        }
    }

    /// Thread body. Whatever happens inside, resources are released first and
    /// `exited` is published last.
    pub fn run(self) {
        let _exit = ExitGuard {
            shared: Arc::clone(&self.shared),
        };
        let mut worker = self;
        let id = worker.shared.id;
        log::debug!(target: target::THREADS, "starting loop={id}");

        if let Err(err) = worker.guarded_run() {
            log::error!(target: target::THREADS, "render loop {id} failed: {err}");
            worker.renderer.on_fatal_error(&err);
            worker
                .shared
                .monitor
                .with_lock(|state| state.failure = Some(err));
        }
    }

    fn guarded_run(&mut self) -> Result<(), FatalError> {
        self.shared
            .monitor
            .with_lock(|state| state.worker = Some(thread::current().id()));

        loop {
            match self.next_step() {
                Step::Exit => return Ok(()),
                Step::Run(action) => {
                    let shared = Arc::clone(&self.shared);
                    action(&WorkerCtl::new(&shared));
                }
                Step::Release { release, ack } => {
                    self.release(release);
                    self.acknowledge(ack);
                }
                Step::Pause { surface, context } => self.pause(surface, context),
                Step::ReportFinished(finish) => {
                    log::warn!(
                        target: target::DRAW,
                        "not ready to draw but a finish-drawing callback is waiting; \
                         reporting early"
                    );
                    finish();
                }
                Step::Draw => self.draw()?,
            }
        }
    }

    fn next_step(&mut self) -> Step {
        let shared = Arc::clone(&self.shared);
        shared.monitor.with_lock(|state| loop {
            if let Some(step) = self.evaluate(state) {
                return step;
            }
            log::trace!(
                target: target::THREADS,
                "waiting loop={} context={} surface_resource={} paused={} has_surface={} \
                 surface_is_bad={} waiting_for_surface={} size={}x{} request_render={} mode={:?}",
                shared.id,
                state.have_context,
                state.have_surface_resource,
                state.paused,
                state.has_surface,
                state.surface_is_bad,
                state.waiting_for_surface,
                state.width,
                state.height,
                state.request_render,
                state.render_mode,
            );
            // The only place the render thread waits.
            state.wait();
        })
    }

    /// One pass over the state in fixed priority order. `None` means there is
    /// nothing to do until the next signal.
    fn evaluate(&mut self, state: &mut Locked<'_, LoopState>) -> Option<Step> {
        let id = self.shared.id;

        if state.should_exit {
            return Some(Step::Exit);
        }

        if let Some(action) = state.events.pop_front() {
            return Some(Step::Run(action));
        }

        if state.paused != state.requested_paused {
            if state.requested_paused {
                let surface = state.have_surface_resource;
                let context = state.have_context;
                if !surface && !context {
                    apply_ack(state, Ack::Paused);
                } else {
                    state.have_surface_resource = false;
                    state.notify_all();
                    return Some(Step::Pause { surface, context });
                }
            } else {
                state.paused = false;
                state.notify_all();
                log::debug!(target: target::PAUSE, "paused is now false loop={id}");
            }
        }

        if state.should_release_context {
            log::debug!(target: target::SURFACE, "releasing context because asked to loop={id}");
            state.should_release_context = false;
            self.asked_to_release_context = true;
            let release = Release {
                surface: state.have_surface_resource,
                context: state.have_context,
            };
            if let Some(step) = self.begin_release(state, release, Ack::None) {
                return Some(step);
            }
        }

        if self.lost_context {
            self.lost_context = false;
            let release = Release {
                surface: state.have_surface_resource,
                context: state.have_context,
            };
            if let Some(step) = self.begin_release(state, release, Ack::None) {
                return Some(step);
            }
        }

        if !state.has_surface && !state.waiting_for_surface {
            log::debug!(target: target::SURFACE, "noticed host surface lost loop={id}");
            let release = Release {
                surface: state.have_surface_resource,
                context: false,
            };
            if let Some(step) = self.begin_release(state, release, Ack::SurfaceLost) {
                return Some(step);
            }
        }

        if state.has_surface && state.waiting_for_surface {
            log::debug!(target: target::SURFACE, "noticed host surface acquired loop={id}");
            state.waiting_for_surface = false;
            state.notify_all();
        }

        if state.recreate_surface {
            state.recreate_surface = false;
            log::debug!(target: target::SURFACE, "replacing surface after bad window loop={id}");
            let release = Release {
                surface: state.have_surface_resource,
                context: false,
            };
            if let Some(step) = self.begin_release(state, release, Ack::None) {
                return Some(step);
            }
        }

        if self.do_render_notification {
            log::trace!(target: target::DRAW, "sending render notification loop={id}");
            self.do_render_notification = false;
            state.want_render_notification = false;
            state.render_complete = true;
            state.notify_all();
        }

        if let Some(finish) = state.pending_finish.take() {
            self.finish_drawing = Some(finish);
        }

        if !state.ready_to_draw() {
            return self.finish_drawing.take().map(Step::ReportFinished);
        }

        if !state.have_context {
            if self.asked_to_release_context {
                self.asked_to_release_context = false;
            } else {
                state.have_context = true;
                self.pending.acquire_context = true;
                self.pending.context_ready = true;
                state.notify_all();
            }
        }

        if state.have_context && !state.have_surface_resource {
            state.have_surface_resource = true;
            self.pending.create_surface = true;
            self.pending.size = Some((state.width, state.height));
        }

        if !state.have_surface_resource {
            return None;
        }

        if state.size_changed {
            log::trace!(
                target: target::SURFACE,
                "size changed, want render notification loop={id}"
            );
            self.pending.size = Some((state.width, state.height));
            self.pending.create_surface = true;
            state.want_render_notification = true;
            state.size_changed = false;
        }

        self.pending.extent = SurfaceExtent::new(state.width, state.height);
        state.request_render = false;
        state.notify_all();
        if state.want_render_notification {
            self.pending.want_notification = true;
        }
        Some(Step::Draw)
    }

    /// Clears the bookkeeping flags for `release` and returns the step that
    /// performs it. With nothing to release, `ack` is applied right away.
    fn begin_release(
        &mut self,
        state: &mut Locked<'_, LoopState>,
        release: Release,
        ack: Ack,
    ) -> Option<Step> {
        if !release.any() {
            apply_ack(state, ack);
            return None;
        }
        if release.surface {
            state.have_surface_resource = false;
        }
        if release.context {
            state.have_context = false;
        }
        state.notify_all();
        Some(Step::Release { release, ack })
    }

    fn pause(&mut self, surface: bool, context: bool) {
        let preserve = self
            .host
            .upgrade()
            .is_some_and(|host| host.preserve_context_on_pause());
        let release = Release {
            surface,
            context: context && !preserve,
        };
        log::debug!(
            target: target::PAUSE,
            "pausing loop={} release_surface={} release_context={}",
            self.shared.id,
            release.surface,
            release.context
        );
        self.release(release);
        self.shared.monitor.with_lock(|state| {
            if release.context {
                state.have_context = false;
            }
            apply_ack(state, Ack::Paused);
        });
    }

    fn acknowledge(&self, ack: Ack) {
        if matches!(ack, Ack::None) {
            return;
        }
        self.shared.monitor.with_lock(|state| apply_ack(state, ack));
    }

    fn draw(&mut self) -> Result<(), FatalError> {
        let id = self.shared.id;

        if self.pending.acquire_context {
            log::debug!(target: target::SURFACE, "acquiring context loop={id}");
            match self.backend.acquire_context() {
                Ok(context) => {
                    self.context = Some(context);
                    self.pending.acquire_context = false;
                    self.clock.restart();
                    self.shared
                        .monitor
                        .with_lock(|state| state.stats.contexts_acquired += 1);
                }
                Err(err) => {
                    self.notify_context_released();
                    return Err(FatalError::context_acquisition(&err));
                }
            }
        }

        if self.pending.create_surface {
            let created = self.create_surface();
            self.shared.monitor.with_lock(|state| {
                state.finished_creating_surface = true;
                if !created {
                    state.surface_is_bad = true;
                    state.stats.surface_failures += 1;
                }
                state.notify_all();
            });
            if !created {
                return Ok(());
            }
            self.pending.create_surface = false;
        }

        let (Some(context), Some(surface)) = (self.context.as_ref(), self.surface.as_mut()) else {
            return Ok(());
        };

        let host = self.host.upgrade();
        let time = self.clock.tick();
        {
            let mut ctx = RenderCtx::<B>::new(context, surface, time, WorkerCtl::new(&self.shared));
            if self.pending.context_ready && host.is_some() {
                log::debug!(
                    target: target::RENDERER,
                    "on_context_ready loop={id} config={:?}",
                    B::context_config(context)
                );
                self.renderer.on_context_ready(&mut ctx);
            }
            if let Some((width, height)) = self.pending.size.take()
                && host.is_some()
            {
                log::debug!(
                    target: target::RENDERER,
                    "on_size_changed({width}, {height}) loop={id}"
                );
                self.renderer.on_size_changed(&mut ctx, width, height);
            }
            if host.is_some() {
                log::trace!(target: target::DRAW, "on_draw_frame loop={id}");
                self.renderer.on_draw_frame(&mut ctx);
                if let Some(finish) = self.finish_drawing.take() {
                    finish();
                }
            }
        }
        self.pending.context_ready = false;
        drop(host);

        let presented = self.backend.present_frame(context, surface);
        self.shared.monitor.with_lock(|state| match presented {
            Ok(()) => state.stats.frames_presented += 1,
            Err(PresentError::ContextLost) => {
                log::info!(target: target::SURFACE, "context lost loop={id}");
                state.stats.context_losses += 1;
                self.lost_context = true;
            }
            Err(err) => {
                log::warn!(target: target::SURFACE, "present failed loop={id}: {err}");
                state.surface_is_bad = true;
                state.stats.surface_failures += 1;
                state.notify_all();
            }
        });

        if self.pending.want_notification {
            self.pending.want_notification = false;
            self.do_render_notification = true;
        }
        Ok(())
    }

    /// Destroys the current surface, if any, and creates a new one for the
    /// host's native window.
    fn create_surface(&mut self) -> bool {
        let id = self.shared.id;
        let Some(context) = self.context.as_ref() else {
            return false;
        };
        if let Some(old) = self.surface.take() {
            self.backend.destroy_surface(context, old);
        }

        let window = self.host.upgrade().and_then(|host| host.native_window());
        let created = match window {
            Some(window) => self
                .backend
                .create_surface(context, &window, self.pending.extent),
            None => Err(crate::device::SurfaceError::WindowUnavailable),
        };

        match created {
            Ok(surface) => {
                log::debug!(
                    target: target::SURFACE,
                    "surface created loop={id} extent={:?}",
                    self.pending.extent
                );
                self.surface = Some(surface);
                true
            }
            Err(err) => {
                log::error!(target: target::SURFACE, "surface creation failed loop={id}: {err}");
                false
            }
        }
    }

    fn release(&mut self, release: Release) {
        let id = self.shared.id;
        let mut unwound = None;
        if release.surface
            && let Some(mut surface) = self.surface.take()
            && let Some(context) = self.context.as_ref()
        {
            if !thread::panicking() && self.host.upgrade().is_some() {
                // The surface and context still go back to the backend if the
                // callback panics; the panic resumes once they have.
                let lost = panic::catch_unwind(AssertUnwindSafe(|| {
                    let mut ctx = RenderCtx::<B>::new(
                        context,
                        &mut surface,
                        self.clock.peek(),
                        WorkerCtl::new(&self.shared),
                    );
                    self.renderer.on_surface_lost(&mut ctx);
                }));
                unwound = lost.err();
            }
            log::debug!(target: target::SURFACE, "destroying surface loop={id}");
            self.backend.destroy_surface(context, surface);
        }
        if (release.context || unwound.is_some())
            && let Some(context) = self.context.take()
        {
            log::debug!(target: target::SURFACE, "releasing context loop={id}");
            self.backend.release_context(context);
            self.notify_context_released();
        }
        if let Some(payload) = unwound {
            self.shared.monitor.with_lock(|state| {
                state.have_surface_resource = false;
                state.have_context = false;
                state.notify_all();
            });
            panic::resume_unwind(payload);
        }
    }

    fn notify_context_released(&self) {
        if let Some(arbiter) = &self.arbiter {
            arbiter.on_context_release_requested(self.shared.id);
        }
    }
}

impl<B, R, H> Drop for Worker<B, R, H>
where
    B: GraphicsBackend,
    R: FrameRenderer<B>,
    H: SurfaceHost<Window = B::NativeWindow>,
{
    fn drop(&mut self) {
        self.shared.monitor.with_lock(|state| {
            state.have_surface_resource = false;
            state.have_context = false;
            state.notify_all();
        });
        self.release(Release::ALL);
    }
}

fn apply_ack(state: &mut Locked<'_, LoopState>, ack: Ack) {
    match ack {
        Ack::None => {}
        Ack::Paused => {
            state.paused = true;
            state.notify_all();
            log::debug!(target: target::PAUSE, "paused is now true");
        }
        Ack::SurfaceLost => {
            state.waiting_for_surface = true;
            state.surface_is_bad = false;
            state.notify_all();
        }
    }
}

/// Publishes `exited` on every way out of the thread, including unwinding.
struct ExitGuard {
    shared: Arc<Shared>,
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        let id = self.shared.id;
        self.shared.monitor.with_lock(|state| {
            if thread::panicking() && state.failure.is_none() {
                state.failure = Some(FatalError::panicked());
            }
            state.exited = true;
            state.notify_all();
        });
        log::debug!(target: target::THREADS, "exiting loop={id}");
    }
}
