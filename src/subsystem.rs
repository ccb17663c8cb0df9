//! Heavy visual subsystem contract.
//!
//! The gate knows nothing about the decorative layer it mounts beyond this module: a
//! [`SubsystemLoader`] produces something implementing [`HeavyVisual`] from [`VisualProps`].
//! The concrete landing page background is the [`ParticleField`].

use crate::errors::LoadError;
use crate::render::{DisplayItem, Viewport};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;

mod particles;

pub use particles::{LocalSceneLoader, Particle, ParticleField, SceneDescriptor};

/// Properties passed unchanged from the page to the mounted visual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VisualProps {
    /// Render in the cheaper mode (reduced motion, small screens, touch devices)
    pub adaptive: bool,
}

pub trait HeavyVisual: Send + Sync + Debug {
    fn name(&self) -> &str;

    /// The props this visual was created with.
    fn props(&self) -> VisualProps;

    /// Height of the first rendered frame for the given viewport.
    fn initial_height(&self, viewport: &Viewport) -> u32;

    /// Paints the visual into display items, with its top edge at document offset `top`.
    fn paint(&self, top: i32, viewport: &Viewport) -> Vec<DisplayItem>;
}

pub type LoadFuture = BoxFuture<'static, Result<Arc<dyn HeavyVisual>, LoadError>>;

pub trait SubsystemLoader: Send + Sync {
    fn load(&self, props: VisualProps) -> LoadFuture;
}
