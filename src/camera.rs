// Camera model: view, projection, and their inverses

use std::f32::consts::PI;

use glam::{Mat4, Quat, Vec2, Vec3, Vec4};

use crate::config::CameraConfig;
use crate::error::ConfigError;
use crate::math::mat4_from_rows;

/// A free camera.
///
/// `target` and `up` are unit length and orthogonal; only [`Camera::rotate`]
/// changes them. `near` and `far` are negative, with `near` closer to zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    target: Vec3,
    up: Vec3,
    pub fov: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 10.0),
            target: Vec3::new(0.0, 0.0, -1.0),
            up: Vec3::Y,
            fov: PI / 2.0,
            near: -0.5,
            far: -100.0,
        }
    }
}

impl Camera {
    pub fn new(config: &CameraConfig) -> Result<Self, ConfigError> {
        let CameraConfig {
            fov,
            near,
            far,
            position,
        } = *config;

        if !(fov > 0.0 && fov < PI) {
            return Err(ConfigError::InvalidCamera(format!(
                "fov {fov} must be in (0, pi)"
            )));
        }
        if !(near < 0.0 && far < near) {
            return Err(ConfigError::InvalidCamera(format!(
                "near {near} and far {far} must be negative with far < near"
            )));
        }

        Ok(Self {
            position: Vec3::from(position),
            fov,
            near,
            far,
            ..Self::default()
        })
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    pub fn right(&self) -> Vec3 {
        self.target.cross(self.up)
    }

    /// Rotates target and up together about `axis`, then renormalizes both.
    pub fn rotate(&mut self, angle: f32, axis: Vec3) {
        let Some(axis) = axis.try_normalize() else {
            return;
        };
        let rotation = Quat::from_axis_angle(axis, angle);
        self.target = (rotation * self.target).normalize();
        self.up = (rotation * self.up).normalize();
    }

    /// Look-at view matrix with rows right/up/target.
    pub fn view(&self) -> Mat4 {
        let p = self.position;
        let t = self.target;
        let u = self.up;
        let r = self.right();

        mat4_from_rows([
            [r.x, r.y, r.z, -r.dot(p)],
            [u.x, u.y, u.z, -u.dot(p)],
            [t.x, t.y, t.z, -t.dot(p)],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    pub fn inverse_view(&self) -> Mat4 {
        Mat4::from_cols(
            self.right().extend(0.0),
            self.up.extend(0.0),
            self.target.extend(0.0),
            self.position.extend(1.0),
        )
    }

    fn projection_terms(&self, aspect: f32) -> [f32; 5] {
        let h = self.near * (self.fov / 2.0).tan();
        let w = aspect * h;

        let a = -1.0 / w;
        let b = -1.0 / h;
        let c = 2.0 / (self.near - self.far);
        let d = (self.near + self.far) / (self.near - self.far);
        let e = 1.0;
        [a, b, c, d, e]
    }

    /// The perspective term sits in the third column of the fourth row, so
    /// clip-space `w` is the view-space distance along `target`.
    pub fn projection(&self, aspect: f32) -> Mat4 {
        let [a, b, c, d, e] = self.projection_terms(aspect);
        mat4_from_rows([
            [a, 0.0, 0.0, 0.0],
            [0.0, b, 0.0, 0.0],
            [0.0, 0.0, c, d],
            [0.0, 0.0, e, 0.0],
        ])
    }

    pub fn inverse_projection(&self, aspect: f32) -> Mat4 {
        let [a, b, c, d, e] = self.projection_terms(aspect);
        mat4_from_rows([
            [1.0 / a, 0.0, 0.0, 0.0],
            [0.0, 1.0 / b, 0.0, 0.0],
            [0.0, 0.0, 0.0, 1.0 / e],
            [0.0, 0.0, 1.0 / d, -c / (d * e)],
        ])
    }

    pub fn world_transform(&self, aspect: f32) -> Mat4 {
        self.projection(aspect) * self.view()
    }

    pub fn inverse_world_transform(&self, aspect: f32) -> Mat4 {
        self.inverse_view() * self.inverse_projection(aspect)
    }

    /// Maps a pixel position to the world-space point on the near side of the
    /// frustum. Together with `position` it defines the picking ray.
    pub fn unproject(&self, screen_x: f32, screen_y: f32, width: f32, height: f32) -> Vec3 {
        let unproject = self.inverse_world_transform(width / height);
        let x = 2.0 * (screen_x / width - 0.5);
        let y = 2.0 * (screen_y / height - 0.5);

        let position = unproject * Vec4::new(x, -y, -1.0, 1.0);
        position.truncate() / position.w
    }

    /// Forward mapping from world space to pixels. `None` for points on the
    /// camera plane.
    pub fn project_to_screen(&self, point: Vec3, width: f32, height: f32) -> Option<Vec2> {
        let clip = self.world_transform(width / height) * point.extend(1.0);
        if clip.w.abs() < f32::EPSILON {
            return None;
        }

        let ndc = clip.truncate() / clip.w;
        Some(Vec2::new(
            (ndc.x / 2.0 + 0.5) * width,
            (-ndc.y / 2.0 + 0.5) * height,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn tilted_camera() -> Camera {
        let mut camera = Camera {
            position: Vec3::new(1.5, -8.0, 10.0),
            ..Camera::default()
        };
        camera.rotate(0.5, Vec3::X);
        camera.rotate(-0.3, Vec3::Z);
        camera
    }

    fn homogeneous(v: Vec4) -> Vec3 {
        v.truncate() / v.w
    }

    #[test]
    fn test_default_basis() {
        let camera = Camera::default();
        assert_eq!(camera.right(), Vec3::X);
        assert_eq!(camera.view() * Vec4::new(0.0, 0.0, 0.0, 1.0), Vec4::new(0.0, 0.0, 10.0, 1.0));
    }

    #[test]
    fn test_rotate_keeps_basis_orthonormal() {
        let camera = tilted_camera();
        assert_relative_eq!(camera.target().length(), 1.0, epsilon = 1e-5);
        assert_relative_eq!(camera.up().length(), 1.0, epsilon = 1e-5);
        assert_relative_eq!(camera.target().dot(camera.up()), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_rotate_ignores_zero_axis() {
        let mut camera = Camera::default();
        camera.rotate(1.0, Vec3::ZERO);
        assert_eq!(camera, Camera::default());
    }

    #[test]
    fn test_view_inverse() {
        let camera = tilted_camera();
        let product = camera.inverse_view() * camera.view();
        assert!(product.abs_diff_eq(Mat4::IDENTITY, 1e-5));
    }

    #[test]
    fn test_projection_inverse() {
        let camera = tilted_camera();
        let product = camera.inverse_projection(16.0 / 9.0) * camera.projection(16.0 / 9.0);
        assert!(product.abs_diff_eq(Mat4::IDENTITY, 1e-5));
    }

    #[test]
    fn test_world_transform_round_trip() {
        let aspect = 4.0 / 3.0;
        for camera in [Camera::default(), tilted_camera()] {
            let forward = camera.world_transform(aspect);
            let inverse = camera.inverse_world_transform(aspect);

            for p in [
                Vec3::ZERO,
                Vec3::new(3.0, -2.0, 1.0),
                Vec3::new(-4.5, 4.0, -5.0),
                Vec3::new(0.25, 7.0, 2.5),
            ] {
                let back = homogeneous(inverse * (forward * p.extend(1.0)));
                assert!(back.abs_diff_eq(p, 1e-4), "{p} came back as {back}");
            }
        }
    }

    #[test]
    fn test_unproject_center_is_on_view_axis() {
        let camera = Camera::default();
        let point = camera.unproject(400.0, 300.0, 800.0, 600.0);
        assert_relative_eq!(point.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(point.y, 0.0, epsilon = 1e-5);
        assert!(point.z < camera.position.z);
    }

    #[test]
    fn test_unproject_screen_axes() {
        let camera = Camera::default();
        let top_right = camera.unproject(800.0, 0.0, 800.0, 600.0);
        assert!(top_right.x > 0.0);
        assert!(top_right.y > 0.0);
    }

    #[test]
    fn test_project_then_unproject_is_colinear() {
        let (width, height) = (1280.0, 720.0);
        for camera in [Camera::default(), tilted_camera()] {
            for p in [Vec3::new(2.0, 1.0, 0.0), Vec3::new(-3.0, 0.5, -2.0)] {
                let screen = camera.project_to_screen(p, width, height).unwrap();
                let q = camera.unproject(screen.x, screen.y, width, height);

                let to_p = (p - camera.position).normalize();
                let to_q = (q - camera.position).normalize();
                assert!(to_p.abs_diff_eq(to_q, 1e-4), "{to_p} vs {to_q}");
            }
        }
    }

    #[test]
    fn test_new_rejects_bad_planes() {
        let config = CameraConfig {
            near: 0.5,
            ..CameraConfig::default()
        };
        assert!(matches!(
            Camera::new(&config),
            Err(ConfigError::InvalidCamera(_))
        ));

        let config = CameraConfig {
            far: -0.1,
            ..CameraConfig::default()
        };
        assert!(Camera::new(&config).is_err());
    }

    #[test]
    fn test_new_from_default_config() {
        let camera = Camera::new(&CameraConfig::default()).unwrap();
        assert_eq!(camera, Camera::default());
    }
}
