// Consumers of a frame's render commands

use std::ops::Range;

use glam::Mat4;

use crate::commands::{RenderCommands, RenderEntry};
use crate::geometry::{AssetStore, MeshSlot};

/// Something that can draw a recorded frame.
pub trait RenderBackend {
    /// Processes the frame's upload requests, then draws every entry in
    /// order. Returns the number of draw calls issued.
    fn end_frame(&mut self, commands: &RenderCommands, assets: &AssetStore) -> u32;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawKind {
    Mesh(MeshSlot),
    Lines,
    Quads,
}

/// One indexed draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawCall {
    pub kind: DrawKind,
    pub indices: Range<u32>,
    pub base_vertex: i32,
}

/// Translates the entry stream into draw calls. Meshes not yet resident, and
/// empty batches, produce nothing.
pub fn plan_draws(
    entries: &[RenderEntry],
    mesh_index_count: impl Fn(MeshSlot) -> Option<u32>,
) -> Vec<DrawCall> {
    entries
        .iter()
        .filter_map(|entry| match *entry {
            RenderEntry::Mesh(slot) => mesh_index_count(slot).map(|count| DrawCall {
                kind: DrawKind::Mesh(slot),
                indices: 0..count,
                base_vertex: 0,
            }),
            RenderEntry::Lines(batch) | RenderEntry::Quads(batch) => {
                if batch.index_count == 0 {
                    return None;
                }
                let kind = if matches!(entry, RenderEntry::Lines(_)) {
                    DrawKind::Lines
                } else {
                    DrawKind::Quads
                };
                Some(DrawCall {
                    kind,
                    indices: batch.index_start..batch.index_start + batch.index_count,
                    base_vertex: batch.vertex_start as i32,
                })
            }
        })
        .collect()
}

/// Records what a GPU backend would do, without a GPU.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    resident: [Option<u32>; MeshSlot::COUNT],
    uploads: Vec<MeshSlot>,
    last_draws: Vec<DrawCall>,
    last_transform: Mat4,
    frames: u64,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_resident(&self, slot: MeshSlot) -> bool {
        self.resident[slot.index()].is_some()
    }

    /// Every upload processed so far, in order.
    pub fn uploads(&self) -> &[MeshSlot] {
        &self.uploads
    }

    pub fn last_draws(&self) -> &[DrawCall] {
        &self.last_draws
    }

    pub fn last_transform(&self) -> Mat4 {
        self.last_transform
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl RenderBackend for HeadlessBackend {
    fn end_frame(&mut self, commands: &RenderCommands, assets: &AssetStore) -> u32 {
        for upload in commands.uploads() {
            let index_count = assets.indices(&upload.mesh).len() as u32;
            self.resident[upload.slot.index()] = Some(index_count);
            self.uploads.push(upload.slot);
        }

        self.last_draws = plan_draws(commands.entries(), |slot| self.resident[slot.index()]);
        self.last_transform = commands.world_transform();
        self.frames += 1;

        log::trace!("Headless frame {}: {} draws", self.frames, self.last_draws.len());
        self.last_draws.len() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::COLOR_RED;
    use crate::config::{AssetConfig, CommandCapacity};
    use glam::{Vec2, Vec3, Vec4};
    use rand::SeedableRng;

    fn store_with_plane() -> AssetStore {
        let mut store = AssetStore::new(1 << 16, 1 << 16);
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(3);
        store.load_assets(&AssetConfig::default(), &mut rng);
        store
    }

    #[test]
    fn test_mesh_skipped_until_uploaded() {
        let store = store_with_plane();
        let mut commands = RenderCommands::new(&CommandCapacity::default());
        let mut backend = HeadlessBackend::new();

        commands.push_mesh_entry(MeshSlot::TestPlane);
        assert_eq!(backend.end_frame(&commands, &store), 0);

        commands.begin_frame();
        let mesh = store.mesh(MeshSlot::TestPlane).unwrap();
        commands.push_upload_request(MeshSlot::TestPlane, mesh);
        commands.push_mesh_entry(MeshSlot::TestPlane);
        assert_eq!(backend.end_frame(&commands, &store), 1);
        assert!(backend.is_resident(MeshSlot::TestPlane));
        assert_eq!(
            backend.last_draws()[0].indices,
            0..mesh.index_count() as u32
        );

        // Stays resident without another upload.
        commands.begin_frame();
        commands.push_mesh_entry(MeshSlot::TestPlane);
        assert_eq!(backend.end_frame(&commands, &store), 1);
        assert_eq!(backend.uploads(), &[MeshSlot::TestPlane]);
    }

    #[test]
    fn test_draws_follow_entry_order() {
        let store = store_with_plane();
        let mut commands = RenderCommands::new(&CommandCapacity::default());
        commands.push_line(Vec3::ZERO, Vec3::X, COLOR_RED);
        commands.push_circle(Vec3::ZERO, Vec2::ONE, Vec4::ONE);
        commands.push_circle(Vec3::X, Vec2::ONE, Vec4::ONE);

        let mut backend = HeadlessBackend::new();
        assert_eq!(backend.end_frame(&commands, &store), 2);
        assert_eq!(
            backend.last_draws(),
            &[
                DrawCall {
                    kind: DrawKind::Lines,
                    indices: 0..2,
                    base_vertex: 0,
                },
                DrawCall {
                    kind: DrawKind::Quads,
                    indices: 0..12,
                    base_vertex: 0,
                },
            ]
        );
    }

    #[test]
    fn test_split_batches_use_base_vertex() {
        let entries = [
            RenderEntry::Quads(crate::commands::BatchRange {
                vertex_start: 0,
                vertex_count: 40,
                index_start: 0,
                index_count: 60,
            }),
            RenderEntry::Quads(crate::commands::BatchRange {
                vertex_start: 40,
                vertex_count: 4,
                index_start: 60,
                index_count: 6,
            }),
        ];

        let draws = plan_draws(&entries, |_| None);
        assert_eq!(draws[1].indices, 60..66);
        assert_eq!(draws[1].base_vertex, 40);
    }

    #[test]
    fn test_transform_forwarded() {
        let store = store_with_plane();
        let mut commands = RenderCommands::new(&CommandCapacity::default());
        let transform = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        commands.set_world_transform(transform);

        let mut backend = HeadlessBackend::new();
        backend.end_frame(&commands, &store);
        assert_eq!(backend.last_transform(), transform);
        assert_eq!(backend.frames(), 1);
    }
}
