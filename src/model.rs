use std::sync::Arc;

use crate::{config, texture::Texture};

#[derive(Clone, Debug, PartialEq)]
pub enum Geometry {
    Plane {
        width: f32,
        height: f32,
    },
    Cuboid {
        size: [f32; 3],
    },
    Sphere {
        radius: f32,
        width_segments: u32,
        height_segments: u32,
    },
}

#[derive(Clone, Debug)]
pub struct NormalMap {
    pub texture: Arc<Texture>,
    pub scale: [f32; 2],
    pub wrap: [config::Wrap; 2],
    pub repeat: [f32; 2],
}

#[derive(Clone, Debug)]
pub enum Material {
    /// Lit material with a flat sRGB color.
    Standard { color: [f32; 3] },
    /// Colors the surface by its normal.
    Normal,
    Phong {
        vertex_colors: bool,
        normal_map: Option<NormalMap>,
    },
}

/// Geometry and material of one drawable primitive.
#[derive(Clone, Debug)]
pub struct Visual {
    pub geometry: Geometry,
    pub material: Material,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
}

impl Visual {
    pub fn plane(desc: &config::Plane) -> Self {
        Self {
            geometry: Geometry::Plane {
                width: desc.size[0],
                height: desc.size[1],
            },
            material: Material::Standard {
                color: desc.color.resolve(),
            },
            cast_shadow: false,
            receive_shadow: false,
        }
    }

    pub fn cuboid(desc: &config::Cuboid) -> Self {
        Self {
            geometry: Geometry::Cuboid { size: desc.size },
            material: Material::Normal,
            cast_shadow: false,
            receive_shadow: false,
        }
    }

    pub fn spheres(desc: &config::Spheres, normal_texture: Arc<Texture>) -> Self {
        Self {
            geometry: Geometry::Sphere {
                radius: desc.radius,
                width_segments: desc.segments[0],
                height_segments: desc.segments[1],
            },
            material: Material::Phong {
                vertex_colors: true,
                normal_map: Some(NormalMap {
                    texture: normal_texture,
                    scale: desc.normal_map.scale,
                    wrap: desc.normal_map.wrap,
                    repeat: desc.normal_map.repeat,
                }),
            },
            cast_shadow: true,
            receive_shadow: true,
        }
    }
}
