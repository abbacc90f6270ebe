//! Kiln engine crate.
//!
//! This crate owns the render thread and the lifecycle contract around it:
//! when a graphics context and drawable surface may exist, and when a frame
//! is allowed to be drawn. Drawing itself is delegated to a [`FrameRenderer`].

pub mod core;
pub mod device;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod render_loop;
pub mod time;

pub use crate::core::{ContextArbiter, FrameRenderer, RenderCtx, SurfaceHost};
pub use device::{GraphicsBackend, PresentError, SurfaceError, SurfaceExtent};
pub use error::{FatalError, FatalKind, LoopError};
pub use render_loop::{
    FrameStats, LoopConfig, LoopHandle, LoopId, LoopPhase, LoopStatus, RenderLoop,
    RenderLoopBuilder, RenderMode, WorkerCtl,
};
