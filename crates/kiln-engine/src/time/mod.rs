//! Frame timing handed to renderers.
//!
//! The render loop owns one `FrameClock`, ticks it once per drawn frame and
//! restarts it whenever a fresh graphics context becomes ready, so the first
//! frame after a pause or context loss does not see the whole gap as `dt`.

mod frame_clock;

pub use frame_clock::{FrameClock, FrameTime};
