//! Graphics backend contract.
//!
//! A backend wraps the platform primitives that create and destroy a
//! graphics context and a drawable surface, and presents finished frames.
//! Every call is made from the render thread and never while the loop's
//! monitor is held, so implementations are free to block on the GPU.

mod error;

#[cfg(feature = "wgpu")]
pub mod wgpu;

pub use error::{PresentError, SurfaceError};

/// Drawable size requested for a new surface, in physical pixels.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub struct SurfaceExtent {
    pub width: u32,
    pub height: u32,
}

impl SurfaceExtent {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Platform graphics primitives driven by the render loop.
///
/// The loop owns the returned context and surface handles exclusively and
/// hands them back to `destroy_surface` / `release_context` exactly once.
pub trait GraphicsBackend: Send + 'static {
    /// Configuration the context was created with.
    type Config: std::fmt::Debug;

    /// A live graphics context.
    type Context;

    /// A drawable bound to a native window.
    type Surface;

    /// Native window handle supplied by the [`SurfaceHost`](crate::SurfaceHost).
    type NativeWindow;

    /// Acquires a graphics context. Any error is fatal for the render loop.
    fn acquire_context(&mut self) -> anyhow::Result<Self::Context>;

    /// Returns the configuration chosen for `context`.
    fn context_config(context: &Self::Context) -> &Self::Config;

    /// Creates a surface for `window`. Failure is recoverable: the loop marks
    /// the surface bad and waits for a fresh one from the host.
    fn create_surface(
        &mut self,
        context: &Self::Context,
        window: &Self::NativeWindow,
        extent: SurfaceExtent,
    ) -> Result<Self::Surface, SurfaceError>;

    /// Presents the frame drawn into `surface`.
    fn present_frame(
        &mut self,
        context: &Self::Context,
        surface: &mut Self::Surface,
    ) -> Result<(), PresentError>;

    fn destroy_surface(&mut self, context: &Self::Context, surface: Self::Surface);

    fn release_context(&mut self, context: Self::Context);
}
