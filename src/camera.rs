use std::ops::Range;

use crate::config;

pub struct Camera {
    pub pos: nalgebra::Vector3<f32>,
    pub rot: nalgebra::UnitQuaternion<f32>,
    pub clip: Range<f32>,
    pub fov_y: f32,
    pub aspect: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            pos: nalgebra::Vector3::default(),
            rot: nalgebra::UnitQuaternion::identity(),
            clip: 0.1..1000.0,
            fov_y: 75f32.to_radians(),
            aspect: 1.0,
        }
    }
}

impl Camera {
    pub fn new(config: &config::Camera) -> Self {
        Self {
            pos: config.position.into(),
            clip: config.near..config.far,
            fov_y: config.fov_y_degrees.to_radians(),
            ..Self::default()
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width != 0 && height != 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    pub fn view_matrix(&self) -> nalgebra::Matrix4<f32> {
        nalgebra::Isometry3::from_parts(self.pos.into(), self.rot)
            .inverse()
            .to_homogeneous()
    }

    pub fn projection_matrix(&self) -> nalgebra::Matrix4<f32> {
        nalgebra::Perspective3::new(self.aspect, self.fov_y, self.clip.start, self.clip.end)
            .to_homogeneous()
    }

    /// World space ray through a cursor position, given in pixels from the
    /// top-left corner of a window of `size` pixels.
    pub fn ray(
        &self,
        cursor: [f32; 2],
        size: [f32; 2],
    ) -> (nalgebra::Point3<f32>, nalgebra::Vector3<f32>) {
        let ndc_x = 2.0 * cursor[0] / size[0] - 1.0;
        let ndc_y = 1.0 - 2.0 * cursor[1] / size[1];
        let half_height = (0.5 * self.fov_y).tan();
        // looking down -Z in camera space
        let local = nalgebra::Vector3::new(
            ndc_x * half_height * self.aspect,
            ndc_y * half_height,
            -1.0,
        );
        (self.pos.into(), (self.rot * local).normalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn center_looks_forward() {
        let camera = Camera::default();
        let (origin, dir) = camera.ray([400.0, 300.0], [800.0, 600.0]);
        assert_eq!(origin, nalgebra::Point3::origin());
        assert_relative_eq!(dir, -nalgebra::Vector3::z(), epsilon = 1e-6);
    }

    #[test]
    fn corner_ray_matches_projection() {
        let mut camera = Camera::default();
        camera.resize(800, 600);
        let (origin, dir) = camera.ray([800.0, 0.0], [800.0, 600.0]);
        let point = origin + dir * 10.0;
        let clip = camera.projection_matrix() * camera.view_matrix() * point.to_homogeneous();
        assert_relative_eq!(clip.x / clip.w, 1.0, epsilon = 1e-4);
        assert_relative_eq!(clip.y / clip.w, 1.0, epsilon = 1e-4);
    }

    #[test]
    fn from_config() {
        let camera = Camera::new(&config::Camera {
            position: [1.0, 2.0, 3.0],
            near: 0.1,
            far: 1000.0,
            fov_y_degrees: 90.0,
        });
        assert_eq!(camera.pos, nalgebra::Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(camera.clip, 0.1..1000.0);
        assert_relative_eq!(camera.fov_y, std::f32::consts::FRAC_PI_2);
    }
}
