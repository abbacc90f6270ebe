//! Logging utilities.
//!
//! This module centralizes logger initialization and the log targets used by
//! the render loop. Library code only talks to the `log` facade.

mod init;

pub use init::{init_logging, LoggingConfig};

/// Log targets, filterable through `RUST_LOG` (e.g. `kiln::surface=debug`).
pub mod target {
    /// Render thread start, exit and wait diagnostics.
    pub const THREADS: &str = "kiln::threads";
    /// Pause and resume handshakes.
    pub const PAUSE: &str = "kiln::pause";
    /// Context and surface acquisition and release.
    pub const SURFACE: &str = "kiln::surface";
    /// Renderer lifecycle callbacks.
    pub const RENDERER: &str = "kiln::renderer";
    /// Per-frame draw and present.
    pub const DRAW: &str = "kiln::draw";
    /// Concrete backend calls.
    pub const BACKEND: &str = "kiln::backend";
}
