//! Control API.
//!
//! [`LoopHandle`] is what host threads hold: surface events, lifecycle
//! requests and the blocking handshakes that wait for the render thread to
//! acknowledge them. [`WorkerCtl`] is the subset that is safe to call from
//! code already running on the render thread (renderer callbacks and queued
//! actions); none of its methods block.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{FatalError, LoopError};
use crate::logging::target;
use crate::monitor::{Locked, Monitor};

use super::state::{Action, FinishCallback, LoopState, LoopStatus, RenderMode};

/// Process-unique render loop identifier.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct LoopId(u64);

impl LoopId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for LoopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub(crate) struct Shared {
    pub id: LoopId,
    pub monitor: Monitor<LoopState>,
}

impl Shared {
    pub fn new(id: LoopId, render_mode: RenderMode) -> Self {
        Self {
            id,
            monitor: Monitor::new(LoopState::new(render_mode)),
        }
    }
}

/// Cloneable host-side handle to a render loop.
///
/// Blocking calls re-check their condition on every wakeup and always return
/// once the loop has exited. Called from the loop's own thread they record
/// the request and return without waiting.
#[derive(Clone)]
pub struct LoopHandle {
    shared: Arc<Shared>,
}

impl LoopHandle {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    pub fn id(&self) -> LoopId {
        self.shared.id
    }

    /// The host's native surface exists. Waits until the loop has noticed.
    pub fn surface_available(&self) {
        let id = self.shared.id;
        self.shared.monitor.with_lock(|state| {
            log::debug!(target: target::THREADS, "surface_available loop={id}");
            state.has_surface = true;
            if state.surface_is_bad && state.have_surface_resource {
                state.recreate_surface = true;
            }
            state.surface_is_bad = false;
            state.finished_creating_surface = false;
            state.notify_all();
            if state.on_worker_thread() {
                return;
            }
            state.wait_while(|s| {
                s.waiting_for_surface && !s.finished_creating_surface && !s.exited
            });
        });
    }

    /// The host's native surface is going away. Waits until the loop has
    /// destroyed its surface resource, so the native window can be released.
    pub fn surface_unavailable(&self) {
        let id = self.shared.id;
        self.shared.monitor.with_lock(|state| {
            log::debug!(target: target::THREADS, "surface_unavailable loop={id}");
            state.has_surface = false;
            state.notify_all();
            if state.on_worker_thread() {
                return;
            }
            state.wait_while(|s| !s.waiting_for_surface && !s.exited);
        });
    }

    /// Applies a new drawable size and waits until a frame has been drawn at
    /// that size, unless the loop is paused, exited or unable to draw.
    pub fn resize(&self, width: u32, height: u32) {
        self.shared.monitor.with_lock(|state| {
            record_resize(state, width, height);
            if state.on_worker_thread() {
                return;
            }
            state.wait_while(|s| {
                let waiting = !s.exited && !s.paused && !s.render_complete && s.able_to_draw();
                if waiting {
                    log::trace!(target: target::SURFACE, "resize waiting for render complete");
                }
                waiting
            });
        });
    }

    /// Waits until the loop has paused and released its surface resource.
    pub fn pause(&self) {
        let id = self.shared.id;
        self.shared.monitor.with_lock(|state| {
            log::debug!(target: target::PAUSE, "pause loop={id}");
            state.requested_paused = true;
            state.notify_all();
            if state.on_worker_thread() {
                return;
            }
            state.wait_while(|s| !s.exited && !s.paused);
        });
    }

    /// Waits until the loop has left the paused state or drawn a frame.
    pub fn resume(&self) {
        let id = self.shared.id;
        self.shared.monitor.with_lock(|state| {
            log::debug!(target: target::PAUSE, "resume loop={id}");
            state.requested_paused = false;
            state.request_render = true;
            state.render_complete = false;
            state.notify_all();
            if state.on_worker_thread() {
                return;
            }
            state.wait_while(|s| !s.exited && s.paused && !s.render_complete);
        });
    }

    pub fn request_redraw(&self) {
        self.shared.monitor.with_lock(record_redraw);
    }

    /// Requests a frame and runs `finish` on the render thread once it has
    /// been drawn. Does not block.
    pub fn request_redraw_and_notify<F>(&self, finish: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.shared
            .monitor
            .with_lock(|state| record_redraw_and_notify(state, Box::new(finish)));
    }

    /// Queues `action` to run on the render thread before anything else the
    /// loop does next. Actions run in insertion order.
    pub fn queue_action<F>(&self, action: F)
    where
        F: FnOnce(&WorkerCtl<'_>) + Send + 'static,
    {
        self.shared
            .monitor
            .with_lock(|state| record_action(state, Box::new(action)));
    }

    pub fn set_render_mode(&self, mode: RenderMode) {
        self.shared
            .monitor
            .with_lock(|state| record_render_mode(state, mode));
    }

    /// Sets the render mode from its raw value (0 = when dirty,
    /// 1 = continuous).
    pub fn set_render_mode_raw(&self, raw: i32) -> Result<(), LoopError> {
        self.set_render_mode(RenderMode::try_from(raw)?);
        Ok(())
    }

    pub fn render_mode(&self) -> RenderMode {
        self.shared.monitor.with_lock(|state| state.render_mode)
    }

    /// Asks the loop to give up its context and surface. The loop skips one
    /// re-acquisition afterwards.
    pub fn request_context_release(&self) {
        self.shared.monitor.with_lock(record_context_release);
    }

    /// Asks the loop to exit and waits until it has released everything.
    /// Safe to call more than once.
    pub fn shutdown_and_wait(&self) -> Result<(), LoopError> {
        let id = self.shared.id;
        self.shared.monitor.with_lock(|state| {
            if state.on_worker_thread() {
                return Err(LoopError::CalledFromRenderThread);
            }
            record_shutdown(state, id);
            state.wait_while(|s| !s.exited);
            Ok(())
        })
    }

    /// Asks the loop to exit without waiting. Usable from any thread.
    pub fn request_shutdown(&self) {
        let id = self.shared.id;
        self.shared
            .monitor
            .with_lock(|state| record_shutdown(state, id));
    }

    pub fn status(&self) -> LoopStatus {
        self.shared.monitor.with_lock(|state| state.status())
    }

    pub fn is_exited(&self) -> bool {
        self.shared.monitor.with_lock(|state| state.exited)
    }

    /// The fatal error that terminated the render thread, if any.
    pub fn failure(&self) -> Option<FatalError> {
        self.shared.monitor.with_lock(|state| state.failure.clone())
    }

    pub(crate) fn is_worker_thread(&self) -> bool {
        self.shared.monitor.with_lock(|state| state.on_worker_thread())
    }
}

impl fmt::Debug for LoopHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopHandle").field("id", &self.shared.id).finish()
    }
}

/// Render-thread side of the control API.
///
/// Handed to renderer callbacks through [`RenderCtx`](crate::RenderCtx) and
/// to queued actions. Requests are recorded and picked up on a later loop
/// iteration.
pub struct WorkerCtl<'a> {
    shared: &'a Arc<Shared>,
}

impl<'a> WorkerCtl<'a> {
    pub(crate) fn new(shared: &'a Arc<Shared>) -> Self {
        Self { shared }
    }

    pub fn id(&self) -> LoopId {
        self.shared.id
    }

    /// Records a new drawable size. Applied on the next iteration.
    pub fn resize(&self, width: u32, height: u32) {
        self.shared
            .monitor
            .with_lock(|state| record_resize(state, width, height));
    }

    pub fn request_redraw(&self) {
        self.shared.monitor.with_lock(record_redraw);
    }

    pub fn request_redraw_and_notify<F>(&self, finish: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.shared
            .monitor
            .with_lock(|state| record_redraw_and_notify(state, Box::new(finish)));
    }

    /// Queues `action` behind everything already queued.
    pub fn queue_action<F>(&self, action: F)
    where
        F: FnOnce(&WorkerCtl<'_>) + Send + 'static,
    {
        self.shared
            .monitor
            .with_lock(|state| record_action(state, Box::new(action)));
    }

    pub fn set_render_mode(&self, mode: RenderMode) {
        self.shared
            .monitor
            .with_lock(|state| record_render_mode(state, mode));
    }

    pub fn render_mode(&self) -> RenderMode {
        self.shared.monitor.with_lock(|state| state.render_mode)
    }

    pub fn request_context_release(&self) {
        self.shared.monitor.with_lock(record_context_release);
    }

    /// The loop exits once the current callback or action returns.
    pub fn request_shutdown(&self) {
        let id = self.shared.id;
        self.shared
            .monitor
            .with_lock(|state| record_shutdown(state, id));
    }

    /// A host-side handle to this loop, for handing to other threads.
    pub fn handle(&self) -> LoopHandle {
        LoopHandle::new(Arc::clone(self.shared))
    }
}

fn record_resize(state: &mut Locked<'_, LoopState>, width: u32, height: u32) {
    state.width = width;
    state.height = height;
    state.size_changed = true;
    state.request_render = true;
    state.render_complete = false;
    state.notify_all();
}

fn record_redraw(state: &mut Locked<'_, LoopState>) {
    state.request_render = true;
    state.notify_all();
}

fn record_redraw_and_notify(state: &mut Locked<'_, LoopState>, finish: FinishCallback) {
    state.want_render_notification = true;
    state.request_render = true;
    state.render_complete = false;
    if state.pending_finish.replace(finish).is_some() {
        log::debug!(target: target::DRAW, "replacing a pending finish-drawing callback");
    }
    state.notify_all();
}

fn record_action(state: &mut Locked<'_, LoopState>, action: Action) {
    state.events.push_back(action);
    state.notify_all();
}

fn record_render_mode(state: &mut Locked<'_, LoopState>, mode: RenderMode) {
    state.render_mode = mode;
    state.notify_all();
}

fn record_shutdown(state: &mut Locked<'_, LoopState>, id: LoopId) {
    if !state.should_exit {
        log::debug!(target: target::THREADS, "shutdown requested loop={id}");
    }
    state.should_exit = true;
    state.notify_all();
}

fn record_context_release(state: &mut Locked<'_, LoopState>) {
    state.should_release_context = true;
    state.notify_all();
}
