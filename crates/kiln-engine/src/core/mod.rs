//! Collaborator contracts.
//!
//! This module defines the stable interface between the render loop and the
//! code around it: the renderer that draws, the host that owns the native
//! window, and the optional arbiter notified when a context is given up.

mod host;
mod renderer;

pub use host::{ContextArbiter, SurfaceHost};
pub use renderer::{FrameRenderer, RenderCtx};
