use std::{fs, path::{Path, PathBuf}};

use crate::palette;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unable to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("unable to parse the scene config: {0}")]
    Parse(#[from] ron::error::SpannedError),
}

/// Position plus an Euler rotation in radians, applied X then Y then Z.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Deserialize)]
pub struct Pose {
    #[serde(default)]
    pub position: [f32; 3],
    #[serde(default)]
    pub rotation: [f32; 3],
}

impl Pose {
    pub fn at(position: [f32; 3]) -> Self {
        Self {
            position,
            rotation: [0.0; 3],
        }
    }

    pub fn orientation(&self) -> nalgebra::UnitQuaternion<f32> {
        let [x, y, z] = self.rotation;
        nalgebra::UnitQuaternion::from_axis_angle(&nalgebra::Vector3::x_axis(), x)
            * nalgebra::UnitQuaternion::from_axis_angle(&nalgebra::Vector3::y_axis(), y)
            * nalgebra::UnitQuaternion::from_axis_angle(&nalgebra::Vector3::z_axis(), z)
    }

    pub fn isometry(&self) -> nalgebra::Isometry3<f32> {
        nalgebra::Isometry3::from_parts(
            nalgebra::Vector3::from(self.position).into(),
            self.orientation(),
        )
    }
}

#[derive(Clone, Debug, PartialEq, serde::Deserialize)]
pub enum Color {
    Palette(usize),
    Hex(String),
    Rgb([f32; 3]),
}

impl Color {
    /// sRGB components of the color, or the default material color
    /// if the palette slot or hex string is invalid.
    pub fn resolve(&self) -> [f32; 3] {
        let resolved = match *self {
            Self::Palette(index) => palette::slot(index),
            Self::Hex(ref hex) => palette::parse_hex(hex),
            Self::Rgb(rgb) => Some(rgb),
        };
        resolved.unwrap_or_else(|| {
            log::warn!("Color {:?} is not valid, using the default", self);
            palette::DEFAULT_COLOR
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Deserialize)]
pub enum BroadPhase {
    Naive,
    SweepAndPrune,
}

#[derive(Clone, Debug, serde::Deserialize)]
pub struct Physics {
    pub gravity: [f32; 3],
    pub iterations: usize,
    pub broad_phase: BroadPhase,
    /// Fixed integration step, in seconds.
    pub step: f32,
    #[serde(default)]
    pub allow_sleep: bool,
    /// Number of bodies to reserve room for.
    #[serde(default = "Physics::default_capacity")]
    pub capacity: usize,
}

impl Physics {
    fn default_capacity() -> usize {
        100
    }
}

impl Default for Physics {
    fn default() -> Self {
        Self {
            gravity: [0.0, -10.0, 0.0],
            iterations: 5,
            broad_phase: BroadPhase::Naive,
            step: 1.0 / 60.0,
            allow_sleep: false,
            capacity: Self::default_capacity(),
        }
    }
}

#[derive(Clone, Debug, serde::Deserialize)]
pub struct Camera {
    pub position: [f32; 3],
    pub near: f32,
    pub far: f32,
    #[serde(default = "Camera::default_fov_y")]
    pub fov_y_degrees: f32,
}

impl Camera {
    fn default_fov_y() -> f32 {
        75.0
    }
}

#[derive(Clone, Debug, PartialEq, serde::Deserialize)]
pub enum Light {
    Ambient { intensity: f32 },
    Point { intensity: f32, position: [f32; 3] },
}

#[derive(Clone, Debug, serde::Deserialize)]
pub struct Plane {
    pub color: Color,
    #[serde(default)]
    pub pose: Pose,
    #[serde(default = "Plane::default_size")]
    pub size: [f32; 2],
}

impl Plane {
    fn default_size() -> [f32; 2] {
        [1000.0, 1000.0]
    }
}

/// Commands sent to the body of a clicked box, in this order.
#[derive(Clone, Debug, PartialEq, serde::Deserialize)]
pub struct ClickResponse {
    pub impulse: [f32; 3],
    /// Where the impulse is applied, relative to the body center.
    pub impulse_point: [f32; 3],
    pub velocity: [f32; 3],
}

impl Default for ClickResponse {
    fn default() -> Self {
        Self {
            impulse: [0.0, 5.0, -10.0],
            impulse_point: [1.0, 1.0, 1.0],
            velocity: [0.0, 2.0, 0.0],
        }
    }
}

#[derive(Clone, Debug, serde::Deserialize)]
pub struct Cuboid {
    #[serde(default)]
    pub pose: Pose,
    #[serde(default = "Cuboid::default_size")]
    pub size: [f32; 3],
    #[serde(default = "Cuboid::default_mass")]
    pub mass: f32,
    #[serde(default)]
    pub on_click: ClickResponse,
}

impl Cuboid {
    fn default_size() -> [f32; 3] {
        [1.0; 3]
    }
    fn default_mass() -> f32 {
        1.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Deserialize)]
pub enum Wrap {
    Clamp,
    Repeat,
}

#[derive(Clone, Debug, PartialEq, serde::Deserialize)]
pub struct NormalMap {
    pub path: PathBuf,
    #[serde(default = "NormalMap::default_scale")]
    pub scale: [f32; 2],
    #[serde(default = "NormalMap::default_wrap")]
    pub wrap: [Wrap; 2],
    #[serde(default = "NormalMap::default_repeat")]
    pub repeat: [f32; 2],
}

impl NormalMap {
    fn default_scale() -> [f32; 2] {
        [1.0, 1.0]
    }
    fn default_wrap() -> [Wrap; 2] {
        [Wrap::Repeat; 2]
    }
    fn default_repeat() -> [f32; 2] {
        [10.0, 10.0]
    }
}

#[derive(Clone, Debug, serde::Deserialize)]
pub struct Spheres {
    pub count: usize,
    #[serde(default = "Spheres::default_radius")]
    pub radius: f32,
    #[serde(default = "Spheres::default_mass")]
    pub mass: f32,
    #[serde(default = "Spheres::default_segments")]
    pub segments: [u32; 2],
    /// Distance between consecutive spheres along Z.
    #[serde(default = "Spheres::default_spacing")]
    pub spacing: f32,
    /// How many leading palette slots the instance colors are sampled from.
    #[serde(default = "Spheres::default_palette_range")]
    pub palette_range: usize,
    pub normal_map: NormalMap,
}

impl Spheres {
    fn default_radius() -> f32 {
        1.0
    }
    fn default_mass() -> f32 {
        1.0
    }
    fn default_segments() -> [u32; 2] {
        [16, 16]
    }
    fn default_spacing() -> f32 {
        4.0
    }
    fn default_palette_range() -> usize {
        5
    }
}

#[derive(Clone, Debug, serde::Deserialize)]
pub enum Node {
    Plane(Plane),
    Box(Cuboid),
    InstancedSpheres(Spheres),
    /// Children stay unmounted until every texture they need is loaded.
    Suspense(Vec<Node>),
}

impl Node {
    /// Textures this node and its children need before they can mount.
    pub fn textures(&self) -> Vec<&Path> {
        match *self {
            Self::Plane(_) | Self::Box(_) => Vec::new(),
            Self::InstancedSpheres(ref spheres) => vec![spheres.normal_map.path.as_path()],
            Self::Suspense(ref children) => children.iter().flat_map(Node::textures).collect(),
        }
    }

    fn rebase(&mut self, base: &Path) {
        match *self {
            Self::Plane(_) | Self::Box(_) => {}
            Self::InstancedSpheres(ref mut spheres) => {
                if spheres.normal_map.path.is_relative() {
                    spheres.normal_map.path = base.join(&spheres.normal_map.path);
                }
            }
            Self::Suspense(ref mut children) => {
                for child in children.iter_mut() {
                    child.rebase(base);
                }
            }
        }
    }
}

#[derive(Clone, Debug, serde::Deserialize)]
pub struct Config {
    pub physics: Physics,
    pub camera: Camera,
    pub lights: Vec<Light>,
    pub nodes: Vec<Node>,
}

impl Config {
    pub fn from_ron(source: &str) -> Result<Self, ConfigError> {
        Ok(ron::de::from_str(source)?)
    }

    /// Reads the config file. Relative texture paths are taken
    /// relative to the directory of the file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_ron(&source)?;
        if let Some(base) = path.parent() {
            for node in config.nodes.iter_mut() {
                node.rebase(base);
            }
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn euler_order_is_xyz() {
        let pose = Pose {
            position: [1.0, 2.0, 3.0],
            rotation: [0.3, -0.7, 1.1],
        };
        let expected = nalgebra::Rotation3::from_axis_angle(&nalgebra::Vector3::x_axis(), 0.3)
            * nalgebra::Rotation3::from_axis_angle(&nalgebra::Vector3::y_axis(), -0.7)
            * nalgebra::Rotation3::from_axis_angle(&nalgebra::Vector3::z_axis(), 1.1);
        let iso = pose.isometry();
        assert_relative_eq!(
            iso.rotation.to_rotation_matrix().into_inner(),
            expected.into_inner(),
            epsilon = 1e-5
        );
        assert_eq!(iso.translation.vector, nalgebra::Vector3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn floor_rotation_faces_up() {
        let pose = Pose {
            position: [0.0, -2.0, 0.0],
            rotation: [-std::f32::consts::FRAC_PI_2, 0.0, 0.0],
        };
        let normal = pose.orientation() * nalgebra::Vector3::z();
        assert_relative_eq!(normal, nalgebra::Vector3::y(), epsilon = 1e-6);
    }

    #[test]
    fn colors_resolve() {
        assert_eq!(Color::Rgb([0.1, 0.2, 0.3]).resolve(), [0.1, 0.2, 0.3]);
        assert_eq!(Color::Palette(0).resolve(), palette::slot(0).unwrap());
        assert_eq!(Color::Palette(5).resolve(), palette::DEFAULT_COLOR);
        assert_eq!(Color::Hex("nope".to_string()).resolve(), palette::DEFAULT_COLOR);
    }

    #[test]
    fn defaults_fill_in() {
        let config = Config::from_ron(
            r#"(
                physics: (gravity: (0.0, -10.0, 0.0), iterations: 5, broad_phase: Naive, step: 0.0166),
                camera: (position: (0.0, 0.0, 0.0), near: 0.1, far: 1000.0),
                lights: [],
                nodes: [
                    Box((pose: (position: (1.0, 2.0, 3.0)))),
                    Suspense([InstancedSpheres((count: 3, normal_map: (path: "tex.png")))]),
                ],
            )"#,
        )
        .unwrap();
        assert!(!config.physics.allow_sleep);
        assert_eq!(config.physics.capacity, 100);
        assert_eq!(config.camera.fov_y_degrees, 75.0);
        match config.nodes[0] {
            Node::Box(ref cuboid) => {
                assert_eq!(cuboid.pose, Pose::at([1.0, 2.0, 3.0]));
                assert_eq!(cuboid.size, [1.0; 3]);
                assert_eq!(cuboid.mass, 1.0);
                assert_eq!(cuboid.on_click, ClickResponse::default());
            }
            ref other => panic!("unexpected {:?}", other),
        }
        assert_eq!(config.nodes[1].textures(), vec![Path::new("tex.png")]);
        match config.nodes[1] {
            Node::Suspense(ref children) => match children[0] {
                Node::InstancedSpheres(ref spheres) => {
                    assert_eq!(spheres.segments, [16, 16]);
                    assert_eq!(spheres.normal_map.wrap, [Wrap::Repeat; 2]);
                    assert_eq!(spheres.normal_map.repeat, [10.0, 10.0]);
                }
                ref other => panic!("unexpected {:?}", other),
            },
            ref other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn shipped_config_parses() {
        let config = Config::load(Path::new(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/data/config.ron"
        )))
        .unwrap();
        assert_eq!(config.physics.gravity, [0.0, -10.0, 0.0]);
        assert_eq!(config.physics.iterations, 5);
        assert_eq!(config.physics.broad_phase, BroadPhase::Naive);
        assert_eq!(config.lights.len(), 2);
        let textures: Vec<_> = config.nodes.iter().flat_map(Node::textures).collect();
        assert_eq!(textures.len(), 1);
        assert!(textures[0].exists());
    }
}
