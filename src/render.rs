use std::sync::Arc;

use crate::{
    config,
    model::Visual,
    physics::Physics,
    scene::{Entity, Scene},
};

#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct CameraParams {
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub pos: [f32; 4],
}

/// Row-major 3x4 affine transform, the layout instance buffers expect.
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct InstanceTransform {
    pub rows: [[f32; 4]; 3],
}

impl From<&nalgebra::Isometry3<f32>> for InstanceTransform {
    fn from(iso: &nalgebra::Isometry3<f32>) -> Self {
        Self {
            rows: *iso.to_homogeneous().remove_row(3).transpose().as_ref(),
        }
    }
}

pub struct DrawItem<'a> {
    pub visual: &'a Visual,
    pub transform: nalgebra::Isometry3<f32>,
}

pub struct InstancedItem<'a> {
    pub visual: &'a Visual,
    pub transforms: Vec<InstanceTransform>,
    pub colors: Arc<[f32]>,
}

impl InstancedItem<'_> {
    pub fn color_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.colors[..])
    }

    pub fn transform_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.transforms[..])
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub draw_calls: usize,
    pub instances: usize,
}

/// Everything a rasterizer needs to draw one frame of the scene.
pub struct Frame<'a> {
    pub camera: CameraParams,
    pub lights: &'a [config::Light],
    pub items: Vec<DrawItem<'a>>,
    pub instanced: Vec<InstancedItem<'a>>,
}

impl<'a> Frame<'a> {
    pub fn build(scene: &'a Scene, physics: &Physics) -> Self {
        profiling::scope!("Build frame");
        let camera = &scene.camera;
        let mut items = Vec::new();
        let mut instanced = Vec::new();
        for entity in scene.entities() {
            match *entity {
                Entity::Plane(ref plane) => items.push(DrawItem {
                    visual: &plane.visual,
                    transform: physics.get_transform(plane.body),
                }),
                Entity::Box(ref cuboid) => items.push(DrawItem {
                    visual: &cuboid.visual,
                    transform: physics.get_transform(cuboid.body),
                }),
                Entity::Spheres(ref field) => instanced.push(InstancedItem {
                    visual: &field.visual,
                    transforms: field
                        .transforms(physics)
                        .iter()
                        .map(InstanceTransform::from)
                        .collect(),
                    colors: Arc::clone(&field.colors),
                }),
            }
        }
        Self {
            camera: CameraParams {
                view: camera.view_matrix().into(),
                projection: camera.projection_matrix().into(),
                pos: camera.pos.push(1.0).into(),
            },
            lights: &scene.lights,
            items,
            instanced,
        }
    }

    pub fn stats(&self) -> FrameStats {
        FrameStats {
            draw_calls: self.items.len() + self.instanced.len(),
            instances: self.items.len()
                + self
                    .instanced
                    .iter()
                    .map(|item| item.transforms.len())
                    .sum::<usize>(),
        }
    }
}
