use crate::render_loop::LoopId;

/// Owner of the native drawable.
///
/// The render loop only keeps a weak reference to its host and resolves it
/// at each use. Once the host is dropped, surface creation fails as
/// [`SurfaceError::WindowUnavailable`](crate::SurfaceError) and renderer
/// callbacks are skipped.
pub trait SurfaceHost: Send + Sync {
    /// Native window type handed to the backend.
    type Window;

    /// The current native window, if any.
    fn native_window(&self) -> Option<Self::Window>;

    /// Whether pausing should keep the graphics context alive. Read on every
    /// pause.
    fn preserve_context_on_pause(&self) -> bool {
        false
    }
}

/// Extension hook for sharing a limited pool of contexts between loops.
///
/// Invoked on the render thread, without the loop's monitor held, every time
/// the loop gives up its context: on pause, on request, on context loss, on
/// exit, and when acquisition fails. The default does nothing.
pub trait ContextArbiter: Send + Sync {
    fn on_context_release_requested(&self, loop_id: LoopId) {
        let _ = loop_id;
    }
}
