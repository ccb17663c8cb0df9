//! 3D particle field background.
//!
//! A [`ParticleField`] scatters particles through a box of the given depth and paints them with a
//! simple perspective scale. Particle positions are derived from the scene seed, so the same
//! descriptor always produces the same field.

use super::{HeavyVisual, LoadFuture, SubsystemLoader, VisualProps};
use crate::errors::LoadError;
use crate::render::{Color, DisplayItem, Viewport};
use futures::FutureExt;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const PARTICLE_COLOR: Color = Color { r: 0.62, g: 0.78, b: 1.0, a: 1.0 };

/// Scene description as shipped alongside the landing page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneDescriptor {
    pub particle_count: usize,
    /// Particle count used in adaptive mode
    pub adaptive_particle_count: usize,
    /// Depth of the particle box in scene units
    pub depth: f32,
    /// The field never grows taller than this many pixels
    pub max_height: u32,
    pub seed: u64,
}

impl Default for SceneDescriptor {
    fn default() -> Self {
        Self {
            particle_count: 1200,
            adaptive_particle_count: 300,
            depth: 600.0,
            max_height: 800,
            seed: 0x5eed,
        }
    }
}

/// Position in normalised screen space (`x`, `y` in `0..1`) plus depth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub radius: f32,
}

#[derive(Debug)]
pub struct ParticleField {
    props: VisualProps,
    descriptor: SceneDescriptor,
    particles: Vec<Particle>,
}

impl ParticleField {
    pub fn instantiate(props: VisualProps, descriptor: SceneDescriptor) -> Result<Self, LoadError> {
        if descriptor.particle_count == 0 {
            return Err(LoadError::Instantiate("scene has no particles".into()));
        }
        // Also rejects NaN.
        if !(descriptor.depth > 0.0) {
            return Err(LoadError::Instantiate(format!("invalid scene depth {}", descriptor.depth)));
        }

        let count = if props.adaptive {
            descriptor.adaptive_particle_count.clamp(1, descriptor.particle_count)
        } else {
            descriptor.particle_count
        };

        let mut rng = StdRng::seed_from_u64(descriptor.seed);
        let particles = (0..count)
            .map(|_| Particle {
                x: rng.random_range(0.0..1.0),
                y: rng.random_range(0.0..1.0),
                z: rng.random_range(0.0..descriptor.depth),
                radius: rng.random_range(0.5..2.0),
            })
            .collect();

        log::debug!("particle field instantiated with {count} particles (adaptive: {})", props.adaptive);

        Ok(Self {
            props,
            descriptor,
            particles,
        })
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn descriptor(&self) -> &SceneDescriptor {
        &self.descriptor
    }
}

impl HeavyVisual for ParticleField {
    fn name(&self) -> &str {
        "particle-field"
    }

    fn props(&self) -> VisualProps {
        self.props
    }

    fn initial_height(&self, viewport: &Viewport) -> u32 {
        viewport.height.min(self.descriptor.max_height)
    }

    fn paint(&self, top: i32, viewport: &Viewport) -> Vec<DisplayItem> {
        let width = viewport.width as f32;
        let height = self.initial_height(viewport) as f32;
        let depth = self.descriptor.depth;

        self.particles
            .iter()
            .map(|p| {
                let scale = depth / (depth + p.z);
                DisplayItem::Circle {
                    cx: p.x * width,
                    cy: top as f32 + p.y * height,
                    radius: p.radius * scale,
                    color: PARTICLE_COLOR.with_alpha(0.8 * scale),
                }
            })
            .collect()
    }
}

/// Instantiates the field from a descriptor bundled with the page, no network involved.
#[derive(Debug, Clone, Default)]
pub struct LocalSceneLoader {
    descriptor: SceneDescriptor,
}

impl LocalSceneLoader {
    pub fn new(descriptor: SceneDescriptor) -> Self {
        Self { descriptor }
    }
}

impl SubsystemLoader for LocalSceneLoader {
    fn load(&self, props: VisualProps) -> LoadFuture {
        let descriptor = self.descriptor.clone();
        async move {
            let field = ParticleField::instantiate(props, descriptor)?;
            Ok(Arc::new(field) as Arc<dyn HeavyVisual>)
        }
        .boxed()
    }
}
