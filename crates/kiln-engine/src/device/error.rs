use thiserror::Error;

/// Surface creation failure. Always recoverable.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum SurfaceError {
    /// The native window was rejected by the platform.
    #[error("bad native window: {reason}")]
    BadWindow { reason: String },

    /// The host is gone or currently has no native window to offer.
    #[error("no native window available")]
    WindowUnavailable,
}

/// Outcome of a failed present.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum PresentError {
    /// The context became invalid; the loop tears down and re-acquires it.
    #[error("graphics context lost")]
    ContextLost,

    /// Any other failure, usually a surface that went away before the host
    /// told us. The loop marks the surface bad and stops drawing.
    #[error("present failed ({code:#x}): {reason}")]
    Failed { code: u32, reason: String },
}
