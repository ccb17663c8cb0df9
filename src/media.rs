//! Environment capability and media-query flags.
//!
//! [`Capabilities`] describes which scheduling primitives the host environment offers. They are
//! probed once and used to pick adapters, never re-checked at call sites.
//!
//! [`MediaFlags`] captures the media conditions that make the page render its decorative layers
//! in adaptive (cheaper) mode.

use crate::render::Viewport;
use bitflags::bitflags;
use std::fmt::Display;

bitflags! {
    /// Primitives offered by the host environment.
    pub struct Capabilities: u8 {
        /// Idle callbacks (run work when the event loop has nothing better to do)
        const IDLE_CALLBACK         = 0b01;
        /// Viewport intersection notifications
        const INTERSECTION_OBSERVER = 0b10;
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Capabilities::all()
    }
}

bitflags! {
    /// Media conditions that request adaptive rendering.
    pub struct MediaFlags: u8 {
        const REDUCED_MOTION = 0b001;
        const NARROW         = 0b010;
        const COARSE_POINTER = 0b100;
    }
}

/// User/device preferences that cannot be derived from the viewport alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MediaPreferences {
    pub prefers_reduced_motion: bool,
    pub coarse_pointer: bool,
}

impl MediaFlags {
    /// Evaluates the media queries for the given viewport and preferences.
    pub fn evaluate(viewport: &Viewport, prefs: MediaPreferences, narrow_breakpoint: u32) -> Self {
        let mut flags = MediaFlags::empty();
        flags.set(MediaFlags::REDUCED_MOTION, prefs.prefers_reduced_motion);
        flags.set(MediaFlags::NARROW, viewport.width < narrow_breakpoint);
        flags.set(MediaFlags::COARSE_POINTER, prefs.coarse_pointer);
        flags
    }

    /// Decorative subsystems should run in their cheap mode when any condition holds.
    pub fn adaptive(&self) -> bool {
        !self.is_empty()
    }
}

impl Display for MediaFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();

        if self.contains(MediaFlags::REDUCED_MOTION) {
            parts.push("ReducedMotion");
        }
        if self.contains(MediaFlags::NARROW) {
            parts.push("Narrow");
        }
        if self.contains(MediaFlags::COARSE_POINTER) {
            parts.push("CoarsePointer");
        }

        if parts.is_empty() {
            write!(f, "None")
        } else {
            write!(f, "{}", parts.join("+"))
        }
    }
}
