// Static mesh storage and procedural geometry

use glam::{Vec3, Vec4};
use rand::Rng;

use crate::arena::{Arena, ArenaArray};
use crate::config::AssetConfig;
use crate::error::GeometryError;
use crate::math::BoundingBox;

/// Vertex shared by static meshes and quads.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub color: [f32; 4],
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LineVertex {
    pub color: [f32; 4],
    pub position: [f32; 3],
}

/// Every static mesh the demo knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeshSlot {
    TestPlane,
}

impl MeshSlot {
    pub const COUNT: usize = 1;
    pub const ALL: [MeshSlot; Self::COUNT] = [MeshSlot::TestPlane];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Handles to a mesh's vertices and indices inside an [`AssetStore`].
#[derive(Debug, Clone, Copy)]
pub struct Mesh {
    vertices: ArenaArray<Vertex>,
    indices: ArenaArray<u16>,
}

impl Mesh {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }
}

/// Owns the arenas that back every static mesh for the whole session.
#[derive(Debug)]
pub struct AssetStore {
    vertex_arena: Arena,
    index_arena: Arena,
    meshes: [Option<Mesh>; MeshSlot::COUNT],
}

impl AssetStore {
    pub fn new(vertex_bytes: usize, index_bytes: usize) -> Self {
        Self {
            vertex_arena: Arena::new(vertex_bytes),
            index_arena: Arena::new(index_bytes),
            meshes: [None; MeshSlot::COUNT],
        }
    }

    /// Builds every mesh the demo needs. A mesh that does not fit stays unset.
    pub fn load_assets(&mut self, config: &AssetConfig, rng: &mut impl Rng) {
        let plane = self.create_plane(
            Vec3::ZERO,
            config.plane_width,
            config.plane_height,
            config.plane_vertex_count,
            Vec4::ONE,
            rng,
        );
        match plane {
            Ok(mesh) => self.meshes[MeshSlot::TestPlane.index()] = Some(mesh),
            Err(err) => log::warn!("Failed to create plane. {err}"),
        }
    }

    pub fn mesh(&self, slot: MeshSlot) -> Option<Mesh> {
        self.meshes[slot.index()]
    }

    pub fn loaded(&self) -> impl Iterator<Item = (MeshSlot, Mesh)> + '_ {
        MeshSlot::ALL
            .into_iter()
            .filter_map(|slot| self.mesh(slot).map(|mesh| (slot, mesh)))
    }

    pub fn vertices(&self, mesh: &Mesh) -> &[Vertex] {
        self.vertex_arena.slice(&mesh.vertices)
    }

    pub fn indices(&self, mesh: &Mesh) -> &[u16] {
        self.index_arena.slice(&mesh.indices)
    }

    /// Generates an `n` x `n` grid in the XY plane with jittered depth.
    pub fn create_plane(
        &mut self,
        center: Vec3,
        width: f32,
        height: f32,
        vertex_count: u32,
        color: Vec4,
        rng: &mut impl Rng,
    ) -> Result<Mesh, GeometryError> {
        let n = vertex_count as usize;
        if n < 2 || n * n > u16::MAX as usize + 1 {
            return Err(GeometryError::InvalidGridSize(vertex_count));
        }

        let quad_count = (n - 1) * (n - 1);
        let index_count = 6 * quad_count;
        let total_vertex_count = n * n;

        let out_of_space = |store: &Self| GeometryError::OutOfSpace {
            required_vertices: total_vertex_count,
            required_indices: index_count,
            remaining_vertices: store.vertex_arena.remaining_capacity()
                / std::mem::size_of::<Vertex>(),
            remaining_indices: store.index_arena.remaining_capacity()
                / std::mem::size_of::<u16>(),
        };

        // Check both up front so a failed index allocation does not strand vertices.
        let vertex_bytes = total_vertex_count * std::mem::size_of::<Vertex>();
        let index_bytes = index_count * std::mem::size_of::<u16>();
        if vertex_bytes > self.vertex_arena.remaining_capacity()
            || index_bytes > self.index_arena.remaining_capacity()
        {
            return Err(out_of_space(self));
        }

        let vertices = self
            .vertex_arena
            .push_array::<Vertex>(total_vertex_count)
            .map_err(|_| out_of_space(self))?;
        let indices = self
            .index_arena
            .push_array::<u16>(index_count)
            .map_err(|_| out_of_space(self))?;

        let spacing_x = width / n as f32;
        let spacing_y = height / n as f32;
        let origin = center - Vec3::new(0.5 * (width - spacing_x), 0.5 * (height - spacing_y), 0.0);

        let vertex_data = self.vertex_arena.slice_mut(&vertices);
        for j in 0..n {
            for i in 0..n {
                let mut position =
                    origin + Vec3::new(i as f32 * spacing_x, j as f32 * spacing_y, 0.0);
                position.z += 0.15 * rng.gen_range(-1.0f32..1.0);

                vertex_data[j * n + i] = Vertex {
                    color: color.to_array(),
                    position: position.to_array(),
                    uv: [0.0, 0.0],
                };
            }
        }

        let index_data = self.index_arena.slice_mut(&indices);
        let mut quad = 0;
        for i in 0..total_vertex_count - n {
            if i % n < n - 1 {
                let quad_indices = [i, i + 1, i + 1 + n, i + 1 + n, i + n, i];
                for (slot, value) in index_data[quad * 6..quad * 6 + 6]
                    .iter_mut()
                    .zip(quad_indices)
                {
                    *slot = value as u16;
                }
                quad += 1;
            }
        }
        debug_assert_eq!(quad, quad_count);

        Ok(Mesh { vertices, indices })
    }

    /// Box centered on the vertex centroid, spanning the vertex extremes.
    pub fn mesh_bounding_box(&self, mesh: &Mesh) -> BoundingBox {
        let vertices = self.vertices(mesh);
        if vertices.is_empty() {
            return BoundingBox::default();
        }

        let mut sum = Vec3::ZERO;
        let mut min = Vec3::splat(f32::MAX);
        let mut max = Vec3::splat(-f32::MAX);
        for vertex in vertices {
            let p = Vec3::from(vertex.position);
            sum += p;
            min = min.min(p);
            max = max.max(p);
        }

        BoundingBox {
            position: sum / vertices.len() as f32,
            bounds: max - min,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(12)
    }

    #[test]
    fn test_plane_layout() {
        let mut store = AssetStore::new(1 << 16, 1 << 16);
        let mesh = store
            .create_plane(Vec3::ZERO, 8.0, 6.0, 4, Vec4::ONE, &mut rng())
            .unwrap();

        assert_eq!(mesh.vertex_count(), 16);
        assert_eq!(mesh.index_count(), 6 * 9);

        // First quad, and the first quad of the second row.
        let indices = store.indices(&mesh);
        assert_eq!(&indices[..6], &[0, 1, 5, 5, 4, 0]);
        assert_eq!(&indices[18..24], &[4, 5, 9, 9, 8, 4]);
        assert!(indices.iter().all(|&i| (i as usize) < mesh.vertex_count()));
    }

    #[test]
    fn test_plane_jitter_is_bounded_and_seeded() {
        let mut a = AssetStore::new(1 << 16, 1 << 16);
        let mut b = AssetStore::new(1 << 16, 1 << 16);
        let mesh_a = a
            .create_plane(Vec3::ZERO, 8.0, 6.0, 8, Vec4::ONE, &mut rng())
            .unwrap();
        let mesh_b = b
            .create_plane(Vec3::ZERO, 8.0, 6.0, 8, Vec4::ONE, &mut rng())
            .unwrap();

        assert_eq!(a.vertices(&mesh_a), b.vertices(&mesh_b));
        assert!(a.vertices(&mesh_a).iter().all(|v| v.position[2].abs() <= 0.15));
    }

    #[test]
    fn test_plane_is_centered() {
        let mut store = AssetStore::new(1 << 16, 1 << 16);
        let center = Vec3::new(1.0, -2.0, 0.0);
        let mesh = store
            .create_plane(center, 8.0, 6.0, 5, Vec4::ONE, &mut rng())
            .unwrap();

        let bbox = store.mesh_bounding_box(&mesh);
        assert!(bbox.position.truncate().abs_diff_eq(center.truncate(), 1e-4));
        // Spacing is width / n, so the grid spans (n - 1) / n of the width.
        assert!((bbox.bounds.x - 8.0 * 4.0 / 5.0).abs() < 1e-4);
        assert!((bbox.bounds.y - 6.0 * 4.0 / 5.0).abs() < 1e-4);
    }

    #[test]
    fn test_plane_out_of_space_leaves_arenas_untouched() {
        let mut store = AssetStore::new(64 * std::mem::size_of::<Vertex>(), 1 << 16);
        let err = store
            .create_plane(Vec3::ZERO, 8.0, 6.0, 24, Vec4::ONE, &mut rng())
            .unwrap_err();

        assert_eq!(
            err,
            GeometryError::OutOfSpace {
                required_vertices: 576,
                required_indices: 6 * 23 * 23,
                remaining_vertices: 64,
                remaining_indices: (1 << 16) / 2,
            }
        );
        assert_eq!(store.vertex_arena.used(), 0);
        assert_eq!(store.index_arena.used(), 0);
    }

    #[test]
    fn test_invalid_grid_sizes() {
        let mut store = AssetStore::new(1 << 24, 1 << 24);
        assert_eq!(
            store
                .create_plane(Vec3::ZERO, 1.0, 1.0, 1, Vec4::ONE, &mut rng())
                .unwrap_err(),
            GeometryError::InvalidGridSize(1)
        );
        assert!(store
            .create_plane(Vec3::ZERO, 1.0, 1.0, 257, Vec4::ONE, &mut rng())
            .is_err());
        assert!(store
            .create_plane(Vec3::ZERO, 1.0, 1.0, 256, Vec4::ONE, &mut rng())
            .is_ok());
    }

    #[test]
    fn test_load_assets_fills_test_plane() {
        let mut store = AssetStore::new(1 << 20, 1 << 20);
        store.load_assets(&AssetConfig::default(), &mut rng());

        let mesh = store.mesh(MeshSlot::TestPlane).unwrap();
        assert_eq!(mesh.vertex_count(), 24 * 24);
        assert_eq!(store.loaded().count(), 1);
    }

    #[test]
    fn test_load_assets_failure_leaves_slot_empty() {
        let mut store = AssetStore::new(16, 16);
        store.load_assets(&AssetConfig::default(), &mut rng());
        assert!(store.mesh(MeshSlot::TestPlane).is_none());
        assert_eq!(store.loaded().count(), 0);
    }
}
