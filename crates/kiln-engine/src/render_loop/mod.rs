//! Render loop.
//!
//! [`RenderLoop`] spawns and owns the render thread. The thread owns the
//! graphics context and surface exclusively; host threads drive it through
//! [`LoopHandle`], with every piece of shared state guarded by a single
//! monitor per loop.

mod control;
mod state;
mod worker;

use std::ops::Deref;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

pub use control::{LoopHandle, LoopId, WorkerCtl};
pub use state::{FrameStats, LoopPhase, LoopStatus, RenderMode};

use crate::core::{ContextArbiter, FrameRenderer, SurfaceHost};
use crate::device::GraphicsBackend;
use crate::error::LoopError;
use crate::logging::target;

use control::Shared;
use worker::Worker;

/// Settings applied when a render loop is spawned.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Prefix of the render thread name. The loop id is appended.
    pub thread_name: String,
    pub render_mode: RenderMode,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            thread_name: "kiln-render".to_string(),
            render_mode: RenderMode::default(),
        }
    }
}

pub struct RenderLoopBuilder<B, R> {
    backend: B,
    renderer: R,
    config: LoopConfig,
    arbiter: Option<Arc<dyn ContextArbiter>>,
}

impl<B, R> RenderLoopBuilder<B, R>
where
    B: GraphicsBackend,
    R: FrameRenderer<B>,
{
    pub fn config(mut self, config: LoopConfig) -> Self {
        self.config = config;
        self
    }

    pub fn render_mode(mut self, mode: RenderMode) -> Self {
        self.config.render_mode = mode;
        self
    }

    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.config.thread_name = name.into();
        self
    }

    /// Notified on the render thread whenever the loop gives up its context.
    pub fn arbiter(mut self, arbiter: Arc<dyn ContextArbiter>) -> Self {
        self.arbiter = Some(arbiter);
        self
    }

    /// Starts the render thread.
    ///
    /// The loop keeps only a weak reference to `host`; once the host is
    /// dropped, surface creation fails and renderer callbacks are skipped.
    pub fn spawn<H>(self, host: &Arc<H>) -> Result<RenderLoop, LoopError>
    where
        H: SurfaceHost<Window = B::NativeWindow> + 'static,
    {
        let Self {
            backend,
            renderer,
            config,
            arbiter,
        } = self;

        let id = LoopId::next();
        let shared = Arc::new(Shared::new(id, config.render_mode));
        let host = Arc::downgrade(host);
        let name = format!("{} {id}", config.thread_name);

        let thread_shared = Arc::clone(&shared);
        let thread = thread::Builder::new()
            .name(name.clone())
            .spawn(move || Worker::new(thread_shared, backend, renderer, host, arbiter).run())
            .map_err(LoopError::Spawn)?;

        log::info!(target: target::THREADS, "spawned render thread \"{name}\"");
        Ok(RenderLoop {
            handle: LoopHandle::new(shared),
            thread: Some(thread),
        })
    }
}

/// An owned render thread.
///
/// Dereferences to its [`LoopHandle`]. Dropping it shuts the loop down and
/// joins the thread.
pub struct RenderLoop {
    handle: LoopHandle,
    thread: Option<JoinHandle<()>>,
}

impl RenderLoop {
    pub fn builder<B, R>(backend: B, renderer: R) -> RenderLoopBuilder<B, R>
    where
        B: GraphicsBackend,
        R: FrameRenderer<B>,
    {
        RenderLoopBuilder {
            backend,
            renderer,
            config: LoopConfig::default(),
            arbiter: None,
        }
    }

    /// A cloneable handle for other host threads.
    pub fn handle(&self) -> LoopHandle {
        self.handle.clone()
    }

    /// Shuts the loop down, joins the render thread and reports how it ended.
    ///
    /// Called on the render thread itself, this fails with
    /// [`LoopError::CalledFromRenderThread`] and the loop exits once the
    /// current callback returns.
    pub fn join(mut self) -> Result<(), LoopError> {
        self.handle.shutdown_and_wait()?;
        if let Some(thread) = self.thread.take() {
            thread.join().map_err(|_| LoopError::Panicked)?;
        }
        match self.handle.failure() {
            Some(err) => Err(LoopError::Fatal(err)),
            None => Ok(()),
        }
    }
}

impl Deref for RenderLoop {
    type Target = LoopHandle;

    fn deref(&self) -> &LoopHandle {
        &self.handle
    }
}

impl Drop for RenderLoop {
    fn drop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        // The render thread cannot join itself. It exits once the callback
        // that dropped us returns.
        if self.handle.is_worker_thread() {
            self.handle.request_shutdown();
            return;
        }
        if let Err(err) = self.handle.shutdown_and_wait() {
            log::warn!(target: target::THREADS, "shutdown on drop failed: {err}");
        }
        if thread.join().is_err() {
            log::error!(
                target: target::THREADS,
                "render thread panicked loop={}",
                self.handle.id()
            );
        }
    }
}

impl std::fmt::Debug for RenderLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderLoop")
            .field("id", &self.handle.id())
            .field("joined", &self.thread.is_none())
            .finish()
    }
}
