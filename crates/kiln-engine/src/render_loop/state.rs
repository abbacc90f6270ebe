//! State shared between the render thread and host threads.
//!
//! Every field of [`LoopState`] is read and written only while holding the
//! loop's monitor. The render thread is the only writer of `paused`,
//! `waiting_for_surface`, `have_context`, `have_surface_resource` and
//! `exited`; host threads write the request side.

use std::collections::VecDeque;
use std::thread::ThreadId;

use crate::error::{FatalError, LoopError};

use super::control::WorkerCtl;

/// Work queued to run on the render thread before the next draw.
pub(crate) type Action = Box<dyn FnOnce(&WorkerCtl<'_>) + Send + 'static>;

/// Callback run once the next requested frame has been drawn.
pub(crate) type FinishCallback = Box<dyn FnOnce() + Send + 'static>;

/// Policy governing when frames are drawn.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum RenderMode {
    /// Draw only after `request_redraw`, a resize or a surface change.
    WhenDirty,
    /// Draw every iteration while a surface is available.
    #[default]
    Continuous,
}

impl RenderMode {
    pub const fn as_raw(self) -> i32 {
        match self {
            RenderMode::WhenDirty => 0,
            RenderMode::Continuous => 1,
        }
    }
}

impl TryFrom<i32> for RenderMode {
    type Error = LoopError;

    fn try_from(raw: i32) -> Result<Self, LoopError> {
        match raw {
            0 => Ok(RenderMode::WhenDirty),
            1 => Ok(RenderMode::Continuous),
            other => Err(LoopError::InvalidArgument(format!(
                "render mode {other} is out of range"
            ))),
        }
    }
}

/// Coarse loop state derived from the flags in [`LoopState`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LoopPhase {
    WaitingForSurface,
    SurfaceBad,
    ReadyIdle,
    AcquiringContext,
    AcquiringSurface,
    Drawing,
    Paused,
    ReleasingContext,
    Exiting,
    Exited,
}

/// Running totals kept by the render thread.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub struct FrameStats {
    pub frames_presented: u64,
    pub contexts_acquired: u64,
    pub context_losses: u64,
    pub surface_failures: u64,
}

/// Point-in-time copy of the loop state, for hosts and tests.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct LoopStatus {
    pub phase: LoopPhase,
    pub paused: bool,
    pub has_surface: bool,
    pub surface_is_bad: bool,
    pub waiting_for_surface: bool,
    pub have_context: bool,
    pub have_surface_resource: bool,
    pub width: u32,
    pub height: u32,
    pub render_mode: RenderMode,
    pub exited: bool,
    pub stats: FrameStats,
}

pub(crate) struct LoopState {
    pub should_exit: bool,
    pub exited: bool,

    pub requested_paused: bool,
    pub paused: bool,

    pub has_surface: bool,
    pub surface_is_bad: bool,
    pub waiting_for_surface: bool,
    pub finished_creating_surface: bool,
    /// The surface resource outlived a bad native surface and must be rebuilt.
    pub recreate_surface: bool,

    pub have_context: bool,
    pub have_surface_resource: bool,
    pub should_release_context: bool,

    pub width: u32,
    pub height: u32,
    pub size_changed: bool,

    pub render_mode: RenderMode,
    pub request_render: bool,
    pub render_complete: bool,
    pub want_render_notification: bool,

    pub pending_finish: Option<FinishCallback>,
    pub events: VecDeque<Action>,

    /// Set by the render thread before it runs any collaborator code.
    pub worker: Option<ThreadId>,
    pub failure: Option<FatalError>,
    pub stats: FrameStats,
}

impl LoopState {
    pub fn new(render_mode: RenderMode) -> Self {
        Self {
            should_exit: false,
            exited: false,
            requested_paused: false,
            paused: false,
            has_surface: false,
            surface_is_bad: false,
            waiting_for_surface: false,
            finished_creating_surface: false,
            recreate_surface: false,
            have_context: false,
            have_surface_resource: false,
            should_release_context: false,
            width: 0,
            height: 0,
            size_changed: true,
            render_mode,
            request_render: true,
            render_complete: false,
            want_render_notification: false,
            pending_finish: None,
            events: VecDeque::new(),
            worker: None,
            failure: None,
            stats: FrameStats::default(),
        }
    }

    pub fn ready_to_draw(&self) -> bool {
        !self.paused
            && self.has_surface
            && !self.surface_is_bad
            && self.width > 0
            && self.height > 0
            && (self.request_render || self.render_mode == RenderMode::Continuous)
    }

    pub fn able_to_draw(&self) -> bool {
        self.have_context && self.have_surface_resource && self.ready_to_draw()
    }

    /// True when called from this loop's render thread.
    pub fn on_worker_thread(&self) -> bool {
        self.worker == Some(std::thread::current().id())
    }

    pub fn phase(&self) -> LoopPhase {
        if self.exited {
            LoopPhase::Exited
        } else if self.should_exit {
            LoopPhase::Exiting
        } else if self.paused {
            LoopPhase::Paused
        } else if self.should_release_context {
            LoopPhase::ReleasingContext
        } else if !self.has_surface || self.waiting_for_surface {
            LoopPhase::WaitingForSurface
        } else if self.surface_is_bad {
            LoopPhase::SurfaceBad
        } else if !self.ready_to_draw() {
            LoopPhase::ReadyIdle
        } else if !self.have_context {
            LoopPhase::AcquiringContext
        } else if !self.have_surface_resource {
            LoopPhase::AcquiringSurface
        } else {
            LoopPhase::Drawing
        }
    }

    pub fn status(&self) -> LoopStatus {
        LoopStatus {
            phase: self.phase(),
            paused: self.paused,
            has_surface: self.has_surface,
            surface_is_bad: self.surface_is_bad,
            waiting_for_surface: self.waiting_for_surface,
            have_context: self.have_context,
            have_surface_resource: self.have_surface_resource,
            width: self.width,
            height: self.height,
            render_mode: self.render_mode,
            exited: self.exited,
            stats: self.stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drawable() -> LoopState {
        let mut s = LoopState::new(RenderMode::Continuous);
        s.has_surface = true;
        s.width = 100;
        s.height = 200;
        s
    }

    #[test]
    fn initial_state_waits_for_surface() {
        let s = LoopState::new(RenderMode::default());
        assert_eq!(s.phase(), LoopPhase::WaitingForSurface);
        assert_eq!(s.render_mode, RenderMode::Continuous);
        assert!(!s.ready_to_draw());
    }

    #[test]
    fn ready_requires_positive_size() {
        let mut s = drawable();
        assert!(s.ready_to_draw());
        s.width = 0;
        assert!(!s.ready_to_draw());
        s.width = 100;
        s.height = 0;
        assert!(!s.ready_to_draw());
    }

    #[test]
    fn when_dirty_needs_a_request() {
        let mut s = drawable();
        s.render_mode = RenderMode::WhenDirty;
        s.request_render = false;
        assert!(!s.ready_to_draw());
        assert_eq!(s.phase(), LoopPhase::ReadyIdle);
        s.request_render = true;
        assert!(s.ready_to_draw());
    }

    #[test]
    fn bad_surface_and_pause_block_drawing() {
        let mut s = drawable();
        s.surface_is_bad = true;
        assert!(!s.ready_to_draw());
        assert_eq!(s.phase(), LoopPhase::SurfaceBad);

        let mut s = drawable();
        s.paused = true;
        assert!(!s.ready_to_draw());
        assert_eq!(s.phase(), LoopPhase::Paused);
    }

    #[test]
    fn phase_follows_resource_acquisition() {
        let mut s = drawable();
        assert_eq!(s.phase(), LoopPhase::AcquiringContext);
        s.have_context = true;
        assert_eq!(s.phase(), LoopPhase::AcquiringSurface);
        s.have_surface_resource = true;
        assert_eq!(s.phase(), LoopPhase::Drawing);
        assert!(s.able_to_draw());
    }

    #[test]
    fn exit_dominates_every_other_phase() {
        let mut s = drawable();
        s.paused = true;
        s.should_exit = true;
        assert_eq!(s.phase(), LoopPhase::Exiting);
        s.exited = true;
        assert_eq!(s.phase(), LoopPhase::Exited);
    }

    #[test]
    fn render_mode_from_raw() {
        assert_eq!(RenderMode::try_from(0).unwrap(), RenderMode::WhenDirty);
        assert_eq!(RenderMode::try_from(1).unwrap(), RenderMode::Continuous);
        assert!(matches!(
            RenderMode::try_from(2),
            Err(LoopError::InvalidArgument(_))
        ));
        assert!(RenderMode::try_from(-1).is_err());
        assert_eq!(RenderMode::WhenDirty.as_raw(), 0);
    }

    #[test]
    fn status_copies_flags() {
        let mut s = drawable();
        s.stats.frames_presented = 3;
        let status = s.status();
        assert!(status.has_surface);
        assert_eq!((status.width, status.height), (100, 200));
        assert_eq!(status.stats.frames_presented, 3);
    }
}
