use crate::device::GraphicsBackend;
use crate::error::FatalError;
use crate::render_loop::WorkerCtl;
use crate::time::FrameTime;

/// Drawing contract implemented by higher layers.
///
/// Every method runs synchronously on the render thread with the live
/// context and surface. Use [`RenderCtx::control`] to talk back to the loop;
/// it only offers calls that cannot block on the render thread itself.
pub trait FrameRenderer<B: GraphicsBackend>: Send + 'static {
    /// A new context is ready: first start, and again after every context
    /// release or loss. Resources tied to the old context are gone.
    fn on_context_ready(&mut self, ctx: &mut RenderCtx<'_, B>) {
        let _ = ctx;
    }

    /// The drawable size changed. Always called after `on_context_ready` and
    /// before the next `on_draw_frame`.
    fn on_size_changed(&mut self, ctx: &mut RenderCtx<'_, B>, width: u32, height: u32) {
        let _ = (ctx, width, height);
    }

    /// Draws one frame. The loop presents it afterwards.
    fn on_draw_frame(&mut self, ctx: &mut RenderCtx<'_, B>);

    /// The surface is about to be destroyed (pause, host surface loss,
    /// context loss, shutdown). Not called for the destroy + create used to
    /// apply a resize.
    fn on_surface_lost(&mut self, ctx: &mut RenderCtx<'_, B>) {
        let _ = ctx;
    }

    /// The render thread is about to terminate because of `error`.
    fn on_fatal_error(&mut self, error: &FatalError) {
        let _ = error;
    }
}

/// Per-callback context passed to [`FrameRenderer`] methods.
///
/// Lifetimes:
/// - `'a` is the duration of the callback invocation
pub struct RenderCtx<'a, B: GraphicsBackend> {
    context: &'a B::Context,
    surface: &'a mut B::Surface,
    time: FrameTime,
    control: WorkerCtl<'a>,
}

impl<'a, B: GraphicsBackend> RenderCtx<'a, B> {
    pub(crate) fn new(
        context: &'a B::Context,
        surface: &'a mut B::Surface,
        time: FrameTime,
        control: WorkerCtl<'a>,
    ) -> Self {
        Self {
            context,
            surface,
            time,
            control,
        }
    }

    /// The live graphics context.
    ///
    /// The reference outlives the `&self` borrow so it can be held alongside
    /// [`surface_mut`](Self::surface_mut).
    pub fn context(&self) -> &'a B::Context {
        self.context
    }

    /// Configuration the context was created with.
    pub fn config(&self) -> &'a B::Config {
        B::context_config(self.context)
    }

    pub fn surface(&self) -> &B::Surface {
        &*self.surface
    }

    pub fn surface_mut(&mut self) -> &mut B::Surface {
        &mut *self.surface
    }

    /// Timing for the current frame. Outside `on_draw_frame` this is a
    /// snapshot with zero `dt`.
    pub fn time(&self) -> FrameTime {
        self.time
    }

    /// Reentrancy-safe control calls for the loop running this callback.
    pub fn control(&self) -> &WorkerCtl<'a> {
        &self.control
    }
}
