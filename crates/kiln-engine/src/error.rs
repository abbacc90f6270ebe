//! Render loop error taxonomy.

use std::fmt;

use thiserror::Error;

/// An unrecoverable render thread failure.
///
/// Kept in the shared loop state after the thread exits so it can still be
/// observed by host threads.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct FatalError {
    kind: FatalKind,
    message: String,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FatalKind {
    /// The backend could not acquire a graphics context.
    ContextAcquisition,
    /// A collaborator callback panicked on the render thread.
    Panicked,
}

impl FatalError {
    pub(crate) fn context_acquisition(err: &anyhow::Error) -> Self {
        Self {
            kind: FatalKind::ContextAcquisition,
            message: format!("{err:#}"),
        }
    }

    pub(crate) fn panicked() -> Self {
        Self {
            kind: FatalKind::Panicked,
            message: "render thread panicked".to_string(),
        }
    }

    pub fn kind(&self) -> FatalKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for FatalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            FatalKind::ContextAcquisition => {
                write!(f, "graphics context acquisition failed: {}", self.message)
            }
            FatalKind::Panicked => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for FatalError {}

/// Errors surfaced synchronously by the control API and by `RenderLoop`.
#[derive(Debug, Error)]
pub enum LoopError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// `shutdown_and_wait` would wait on the thread it runs on.
    #[error("shutdown_and_wait called from the render thread")]
    CalledFromRenderThread,

    #[error("failed to spawn render thread")]
    Spawn(#[source] std::io::Error),

    #[error(transparent)]
    Fatal(FatalError),

    #[error("render thread panicked")]
    Panicked,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_failure_keeps_the_whole_chain() {
        let err = anyhow::anyhow!("no adapter").context("acquire_context");
        let fatal = FatalError::context_acquisition(&err);
        assert_eq!(fatal.kind(), FatalKind::ContextAcquisition);
        assert_eq!(
            fatal.to_string(),
            "graphics context acquisition failed: acquire_context: no adapter"
        );
    }

    #[test]
    fn fatal_is_transparent_in_loop_error() {
        let fatal = FatalError::panicked();
        assert_eq!(LoopError::Fatal(fatal.clone()).to_string(), fatal.to_string());
    }
}
