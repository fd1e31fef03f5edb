use std::sync::Arc;

use rand::Rng;

use crate::{config, model::Visual, palette, physics::Physics, texture::Texture};

/// Per-instance linear RGB colors, recomputed only when the instance
/// count or the palette range changes.
#[derive(Default)]
pub struct ColorCache {
    key: Option<(usize, usize)>,
    colors: Option<Arc<[f32]>>,
}

impl ColorCache {
    pub fn get(
        &mut self,
        count: usize,
        palette_range: usize,
        rng: &mut impl Rng,
    ) -> Arc<[f32]> {
        let key = (count, palette_range);
        match self.colors {
            Some(ref colors) if self.key == Some(key) => Arc::clone(colors),
            _ => {
                let colors: Arc<[f32]> = sample_colors(count, palette_range, rng).into();
                self.key = Some(key);
                self.colors = Some(Arc::clone(&colors));
                colors
            }
        }
    }
}

/// Three floats per instance, each color picked uniformly among the
/// first `palette_range` palette slots.
pub fn sample_colors(count: usize, palette_range: usize, rng: &mut impl Rng) -> Vec<f32> {
    let range = palette_range.clamp(1, palette::NICE_COLORS.len());
    let mut colors = Vec::with_capacity(3 * count);
    for _ in 0..count {
        let srgb = palette::slot(rng.gen_range(0..range)).unwrap_or(palette::DEFAULT_COLOR);
        colors.extend_from_slice(&palette::srgb_to_linear(srgb));
    }
    colors
}

/// Jittered around the Z axis in X/Y, spaced evenly along Z.
pub fn initial_positions(
    count: usize,
    spacing: f32,
    rng: &mut impl Rng,
) -> Vec<nalgebra::Vector3<f32>> {
    (0..count)
        .map(|index| {
            nalgebra::Vector3::new(
                rng.gen::<f32>() - 0.5,
                rng.gen::<f32>() - 0.5,
                index as f32 * spacing,
            )
        })
        .collect()
}

/// Instanced spheres, body `i` backing instance `i`.
///
/// Each field owns its color cache, so two fields never share a buffer.
pub struct SphereField {
    pub bodies: Vec<rapier3d::dynamics::RigidBodyHandle>,
    pub colors: Arc<[f32]>,
    pub visual: Visual,
    palette_range: usize,
    color_cache: ColorCache,
}

impl SphereField {
    pub fn mount(
        desc: &config::Spheres,
        normal_texture: Arc<Texture>,
        physics: &mut Physics,
        rng: &mut impl Rng,
        tag: u128,
    ) -> Self {
        log::info!("Mounting {} instanced spheres", desc.count);
        let bodies = initial_positions(desc.count, desc.spacing, rng)
            .into_iter()
            .map(|position| physics.create_ball(position, desc.radius, desc.mass, tag))
            .collect();
        let mut color_cache = ColorCache::default();
        Self {
            bodies,
            colors: color_cache.get(desc.count, desc.palette_range, rng),
            visual: Visual::spheres(desc, normal_texture),
            palette_range: desc.palette_range,
            color_cache,
        }
    }

    /// Asks the cache again for the current instance count. The buffer is
    /// only resampled if the count changed since the last call.
    pub fn refresh_colors(&mut self, rng: &mut impl Rng) -> Arc<[f32]> {
        self.colors = self
            .color_cache
            .get(self.bodies.len(), self.palette_range, rng);
        Arc::clone(&self.colors)
    }

    pub fn count(&self) -> usize {
        self.bodies.len()
    }

    pub fn transforms(&self, physics: &Physics) -> Vec<nalgebra::Isometry3<f32>> {
        self.bodies
            .iter()
            .map(|&body| physics.get_transform(body))
            .collect()
    }
}
