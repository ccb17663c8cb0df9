//! Deferred, viewport-gated mounting of heavy decorative subsystems.
//!
//! A landing page hosts its expensive 3D background behind a [`DeferredMountGate`]. The gate
//! renders an inert placeholder, starts observing once its host has painted, and only loads the
//! subsystem when the host comes near the viewport and the environment is idle.

pub mod config;
pub mod errors;
pub mod events;
pub mod gate;
pub mod media;
pub mod net;
pub mod page;
pub mod partners;
pub mod render;
pub mod subsystem;

pub use config::{GateConfig, GateConfigError};
pub use errors::{GateError, LoadError};
pub use events::{GateEvent, GateId};
pub use gate::{DeferredMountGate, GateProps, GateServices, MountState, RenderNode};
pub use media::{Capabilities, MediaFlags, MediaPreferences};
pub use page::PageView;
pub use render::{Rect, Viewport};
pub use subsystem::{HeavyVisual, SubsystemLoader, VisualProps};
