// Cursor picking against per-circle planes

use glam::Vec3;

use crate::camera::Camera;
use crate::input::InputState;
use crate::math::Ray;
use crate::pool::{CircleId, CirclePool};

/// Normal of every picking plane. Also the axis used to decide which circle
/// is in front.
pub const WORLD_UP: Vec3 = Vec3::Z;

/// Where the cursor ray meets a circle's picking plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickHit {
    pub point: Vec3,
    /// Distance from `point` to the circle center.
    pub distance: f32,
}

/// The ray from the camera through the cursor. `None` without a viewport.
pub fn cursor_ray(camera: &Camera, input: &InputState) -> Option<Ray> {
    if !input.has_viewport() {
        return None;
    }

    let viewport = input.viewport.as_vec2();
    let through = camera.unproject(input.pointer.x, input.pointer.y, viewport.x, viewport.y);
    Ray::through(camera.position, through)
}

/// Intersects `ray` with the plane through `center` facing [`WORLD_UP`].
pub fn pick(ray: &Ray, center: Vec3) -> Option<PickHit> {
    let point = ray.intersect_plane(center, WORLD_UP)?;
    Some(PickHit {
        point,
        distance: point.distance(center),
    })
}

fn depth(position: Vec3) -> f32 {
    position.dot(WORLD_UP)
}

/// Makes `id` hot when the hit is inside its radius and nothing in front of it
/// is hot already. Called once per circle in active-list order.
pub fn offer_hover(pool: &mut CirclePool, id: CircleId, hit: &PickHit) {
    let Some(circle) = pool.get(id) else {
        return;
    };
    if hit.distance >= circle.radius {
        return;
    }

    let in_front = match pool.hot().and_then(|hot| pool.get(hot)) {
        None => true,
        Some(hot) => depth(circle.position) > depth(hot.position),
    };
    if in_front {
        pool.set_hot(id);
    }
}

/// Drag and release handling for the hot circle. Returns whether the circle is
/// still hot and should be drawn highlighted.
///
/// A missing hit counts as the cursor being outside the circle. While the
/// primary button is held the circle stays hot and keeps its position.
pub fn interact(
    pool: &mut CirclePool,
    id: CircleId,
    hit: Option<&PickHit>,
    primary_down: bool,
) -> bool {
    if pool.hot() != Some(id) {
        return false;
    }
    let Some(circle) = pool.get_mut(id) else {
        return false;
    };

    let outside = hit.map_or(true, |hit| hit.distance > circle.radius);
    if outside && !primary_down {
        pool.clear_hot();
        return false;
    }
    if let (true, Some(hit)) = (primary_down, hit) {
        circle.position = hit.point;
    }
    true
}
