// Per-frame render command buffer

use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::config::CommandCapacity;
use crate::geometry::{LineVertex, Mesh, MeshSlot, Vertex};
use crate::math::BoundingBox;

/// Largest index a single batch may reference with 16-bit indices.
pub const MAX_BATCH_INDEX: u32 = u16::MAX as u32;
const LINE_RESERVE: u32 = 2;
const QUAD_RESERVE: u32 = 6;

pub const COLOR_BLACK: Vec4 = Vec4::new(0.0, 0.0, 0.0, 1.0);
pub const COLOR_RED: Vec4 = Vec4::new(1.0, 0.0, 0.0, 1.0);
pub const COLOR_GREEN: Vec4 = Vec4::new(0.0, 1.0, 0.0, 1.0);
pub const COLOR_BLUE: Vec4 = Vec4::new(0.0, 0.0, 1.0, 1.0);

/// Sub-range of a push region drawn by one call.
///
/// Indices inside the range are relative to `vertex_start`, which the backend
/// passes as the base vertex.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchRange {
    pub vertex_start: u32,
    pub vertex_count: u32,
    pub index_start: u32,
    pub index_count: u32,
}

/// One draw, in the order it was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderEntry {
    /// A static mesh already resident on the GPU.
    Mesh(MeshSlot),
    Lines(BatchRange),
    Quads(BatchRange),
}

impl RenderEntry {
    fn batch_mut(&mut self) -> Option<&mut BatchRange> {
        match self {
            RenderEntry::Lines(batch) | RenderEntry::Quads(batch) => Some(batch),
            RenderEntry::Mesh(_) => None,
        }
    }
}

/// Request to make a mesh resident on the GPU, consumed once at frame end.
#[derive(Debug, Clone, Copy)]
pub struct UploadRequest {
    pub slot: MeshSlot,
    pub mesh: Mesh,
}

/// Work dropped this frame because a buffer was full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DropCounts {
    pub lines: u32,
    pub quads: u32,
    pub entries: u32,
    pub uploads: u32,
}

impl DropCounts {
    pub fn total(&self) -> u32 {
        self.lines + self.quads + self.entries + self.uploads
    }
}

/// Fixed-capacity vertex/index storage for one primitive kind.
#[derive(Debug)]
struct PushRegion<V> {
    vertices: Vec<V>,
    indices: Vec<u16>,
    max_vertices: usize,
    max_indices: usize,
}

impl<V> PushRegion<V> {
    fn new(max_vertices: usize, max_indices: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(max_vertices),
            indices: Vec::with_capacity(max_indices),
            max_vertices,
            max_indices,
        }
    }

    fn fits(&self, vertex_count: usize, index_count: usize) -> bool {
        self.vertices.len() + vertex_count <= self.max_vertices
            && self.indices.len() + index_count <= self.max_indices
    }

    fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
    }
}

/// Returns the entry index of the batch to append to, opening a new one when
/// there is none or the open one is too close to the 16-bit limit.
fn open_batch<V>(
    entries: &mut Vec<RenderEntry>,
    max_entries: usize,
    current: &mut Option<usize>,
    region: &PushRegion<V>,
    reserve: u32,
    make: fn(BatchRange) -> RenderEntry,
) -> Option<usize> {
    if let Some(index) = *current {
        let full = entries[index]
            .batch_mut()
            .map_or(true, |batch| batch.index_count >= MAX_BATCH_INDEX - reserve);
        if full {
            *current = None;
        }
    }

    if current.is_none() {
        if entries.len() >= max_entries {
            return None;
        }
        entries.push(make(BatchRange {
            vertex_start: region.vertices.len() as u32,
            index_start: region.indices.len() as u32,
            ..BatchRange::default()
        }));
        *current = Some(entries.len() - 1);
    }
    *current
}

/// Everything the backend needs to draw one frame.
///
/// Storage is sized once from [`CommandCapacity`] and only cleared between
/// frames. Pushes that do not fit are dropped and counted in [`DropCounts`].
#[derive(Debug)]
pub struct RenderCommands {
    lines: PushRegion<LineVertex>,
    quads: PushRegion<Vertex>,

    entries: Vec<RenderEntry>,
    max_entries: usize,
    current_lines: Option<usize>,
    current_quads: Option<usize>,

    uploads: Vec<UploadRequest>,
    max_uploads: usize,

    world_transform: Mat4,
    circle_count: u32,
    dropped: DropCounts,
}

impl RenderCommands {
    pub fn new(capacity: &CommandCapacity) -> Self {
        Self {
            lines: PushRegion::new(capacity.line_vertices, capacity.line_indices),
            quads: PushRegion::new(capacity.quad_vertices, capacity.quad_indices),
            entries: Vec::with_capacity(capacity.entries),
            max_entries: capacity.entries,
            current_lines: None,
            current_quads: None,
            uploads: Vec::with_capacity(capacity.uploads),
            max_uploads: capacity.uploads,
            world_transform: Mat4::IDENTITY,
            circle_count: 0,
            dropped: DropCounts::default(),
        }
    }

    /// Resets every region and counter. Allocated storage is kept.
    pub fn begin_frame(&mut self) {
        self.lines.clear();
        self.quads.clear();
        self.entries.clear();
        self.current_lines = None;
        self.current_quads = None;
        self.uploads.clear();
        self.world_transform = Mat4::IDENTITY;
        self.circle_count = 0;
        self.dropped = DropCounts::default();
    }

    pub fn push_line(&mut self, p0: Vec3, p1: Vec3, color: Vec4) {
        if !self.lines.fits(2, 2) {
            self.dropped.lines += 1;
            log::debug!("Line push buffer full, dropping line");
            return;
        }

        let Some(entry) = open_batch(
            &mut self.entries,
            self.max_entries,
            &mut self.current_lines,
            &self.lines,
            LINE_RESERVE,
            RenderEntry::Lines,
        ) else {
            self.dropped.entries += 1;
            log::debug!("Render entry stream full, dropping line");
            return;
        };
        let Some(batch) = self.entries[entry].batch_mut() else {
            return;
        };

        let base = batch.vertex_count as u16;
        batch.vertex_count += 2;
        batch.index_count += 2;

        let color = color.to_array();
        self.lines.vertices.extend_from_slice(&[
            LineVertex {
                color,
                position: p0.to_array(),
            },
            LineVertex {
                color,
                position: p1.to_array(),
            },
        ]);
        self.lines.indices.extend_from_slice(&[base, base + 1]);
    }

    /// Appends a quad wound `0, 1, 2` and `2, 3, 0`.
    pub fn push_quad(&mut self, positions: [Vec3; 4], colors: [Vec4; 4], uvs: [Vec2; 4]) {
        if !self.quads.fits(4, 6) {
            self.dropped.quads += 1;
            log::debug!("Quad push buffer full, dropping quad");
            return;
        }

        let Some(entry) = open_batch(
            &mut self.entries,
            self.max_entries,
            &mut self.current_quads,
            &self.quads,
            QUAD_RESERVE,
            RenderEntry::Quads,
        ) else {
            self.dropped.entries += 1;
            log::debug!("Render entry stream full, dropping quad");
            return;
        };
        let Some(batch) = self.entries[entry].batch_mut() else {
            return;
        };

        let base = batch.vertex_count as u16;
        batch.vertex_count += 4;
        batch.index_count += 6;

        for i in 0..4 {
            self.quads.vertices.push(Vertex {
                color: colors[i].to_array(),
                position: positions[i].to_array(),
                uv: uvs[i].to_array(),
            });
        }
        self.quads
            .indices
            .extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
    }

    /// Records a draw of a GPU-resident mesh. Open batches stay open.
    pub fn push_mesh_entry(&mut self, slot: MeshSlot) {
        if self.entries.len() >= self.max_entries {
            self.dropped.entries += 1;
            log::debug!("Render entry stream full, dropping mesh {slot:?}");
            return;
        }
        self.entries.push(RenderEntry::Mesh(slot));
    }

    pub fn push_upload_request(&mut self, slot: MeshSlot, mesh: Mesh) {
        if self.uploads.len() >= self.max_uploads {
            self.dropped.uploads += 1;
            log::warn!("Upload queue full, mesh {slot:?} will not be uploaded");
            return;
        }
        self.uploads.push(UploadRequest { slot, mesh });
    }

    /// A UV-mapped square in the XY plane, drawn as a circle by the backend.
    pub fn push_circle(&mut self, center: Vec3, extent: Vec2, color: Vec4) {
        let h = extent / 2.0;
        let positions = [
            center + Vec3::new(-h.x, -h.y, 0.0),
            center + Vec3::new(h.x, -h.y, 0.0),
            center + Vec3::new(h.x, h.y, 0.0),
            center + Vec3::new(-h.x, h.y, 0.0),
        ];
        let uvs = [
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ];
        self.push_quad(positions, [color; 4], uvs);
    }

    pub fn push_bounding_box(&mut self, bbox: &BoundingBox) {
        let corners = bbox.corners();
        for (a, b) in BoundingBox::EDGES {
            self.push_line(corners[a], corners[b], COLOR_BLACK);
        }
    }

    pub fn push_axes(&mut self, p: Vec3) {
        self.push_line(p, p + Vec3::X, COLOR_RED);
        self.push_line(p, p + Vec3::Y, COLOR_GREEN);
        self.push_line(p, p + Vec3::Z, COLOR_BLUE);
    }

    pub fn set_world_transform(&mut self, transform: Mat4) {
        self.world_transform = transform;
    }

    pub fn set_circle_count(&mut self, count: u32) {
        self.circle_count = count;
    }

    pub fn world_transform(&self) -> Mat4 {
        self.world_transform
    }

    pub fn circle_count(&self) -> u32 {
        self.circle_count
    }

    pub fn entries(&self) -> &[RenderEntry] {
        &self.entries
    }

    pub fn uploads(&self) -> &[UploadRequest] {
        &self.uploads
    }

    pub fn line_vertices(&self) -> &[LineVertex] {
        &self.lines.vertices
    }

    pub fn line_indices(&self) -> &[u16] {
        &self.lines.indices
    }

    pub fn quad_vertices(&self) -> &[Vertex] {
        &self.quads.vertices
    }

    pub fn quad_indices(&self) -> &[u16] {
        &self.quads.indices
    }

    pub fn dropped(&self) -> DropCounts {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::AssetStore;
    use rand::SeedableRng;

    fn capacity() -> CommandCapacity {
        CommandCapacity {
            line_vertices: 1 << 18,
            line_indices: 1 << 18,
            quad_vertices: 1 << 18,
            quad_indices: 1 << 18,
            entries: 64,
            uploads: 2,
        }
    }

    fn quad_at(i: usize) -> [Vec3; 4] {
        let x = i as f32;
        [
            Vec3::new(x, 0.0, 0.0),
            Vec3::new(x, 1.0, 0.0),
            Vec3::new(x, 2.0, 0.0),
            Vec3::new(x, 3.0, 0.0),
        ]
    }

    fn push_numbered_quad(commands: &mut RenderCommands, i: usize) {
        commands.push_quad(quad_at(i), [Vec4::ONE; 4], [Vec2::ZERO; 4]);
    }

    fn batches(commands: &RenderCommands) -> Vec<BatchRange> {
        commands
            .entries()
            .iter()
            .filter_map(|entry| match entry {
                RenderEntry::Quads(batch) | RenderEntry::Lines(batch) => Some(*batch),
                RenderEntry::Mesh(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_lines_share_one_batch() {
        let mut commands = RenderCommands::new(&capacity());
        commands.push_line(Vec3::ZERO, Vec3::X, COLOR_RED);
        commands.push_line(Vec3::ZERO, Vec3::Y, COLOR_GREEN);

        assert_eq!(
            commands.entries(),
            &[RenderEntry::Lines(BatchRange {
                vertex_start: 0,
                vertex_count: 4,
                index_start: 0,
                index_count: 4,
            })]
        );
        assert_eq!(commands.line_indices(), &[0, 1, 2, 3]);
        assert_eq!(commands.line_vertices()[3].position, [0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_quad_indices_are_batch_relative() {
        let mut commands = RenderCommands::new(&capacity());
        push_numbered_quad(&mut commands, 0);
        push_numbered_quad(&mut commands, 1);

        assert_eq!(commands.quad_indices(), &[0, 1, 2, 2, 3, 0, 4, 5, 6, 6, 7, 4]);
        assert_eq!(commands.quad_vertices().len(), 8);
    }

    #[test]
    fn test_quads_split_at_sixteen_bit_limit() {
        let mut commands = RenderCommands::new(&capacity());
        let k = 65535 / 6 + 1;
        for i in 0..k {
            push_numbered_quad(&mut commands, i);
        }
        assert!(k * 6 > 65535);

        let batches = batches(&commands);
        assert_eq!(batches.len(), 2);
        assert_eq!(commands.dropped(), DropCounts::default());

        let mut expected_vertex = 0;
        for batch in &batches {
            assert_eq!(batch.vertex_start, expected_vertex);
            expected_vertex += batch.vertex_count;

            let start = batch.index_start as usize;
            let indices = &commands.quad_indices()[start..start + batch.index_count as usize];
            assert!(batch.index_count <= MAX_BATCH_INDEX);
            assert!(indices.iter().all(|&i| (i as u32) < batch.vertex_count));
        }
        assert_eq!(expected_vertex as usize, 4 * k);

        // Vertices come back in push order.
        let vertices = commands.quad_vertices();
        assert_eq!(vertices.len(), 4 * k);
        for (i, quad) in vertices.chunks(4).enumerate() {
            let expected = quad_at(i);
            for (vertex, position) in quad.iter().zip(expected) {
                assert_eq!(vertex.position, position.to_array());
            }
        }
    }

    #[test]
    fn test_lines_split_at_sixteen_bit_limit() {
        let mut commands = RenderCommands::new(&capacity());
        for _ in 0..40_000 {
            commands.push_line(Vec3::ZERO, Vec3::ONE, COLOR_BLACK);
        }

        let batches = batches(&commands);
        assert_eq!(batches.len(), 2);
        assert!(batches.iter().all(|b| b.index_count <= MAX_BATCH_INDEX));
        assert_eq!(batches[1].vertex_start, batches[0].vertex_count);
        assert_eq!(batches[0].vertex_count + batches[1].vertex_count, 80_000);
    }

    #[test]
    fn test_region_overflow_drops_silently() {
        let mut commands = RenderCommands::new(&CommandCapacity {
            quad_vertices: 8,
            ..capacity()
        });
        for i in 0..3 {
            push_numbered_quad(&mut commands, i);
        }

        assert_eq!(commands.quad_vertices().len(), 8);
        assert_eq!(commands.dropped().quads, 1);
        assert_eq!(batches(&commands)[0].vertex_count, 8);
    }

    #[test]
    fn test_full_entry_stream_drops() {
        let mut commands = RenderCommands::new(&CommandCapacity {
            entries: 1,
            ..capacity()
        });
        commands.push_mesh_entry(MeshSlot::TestPlane);
        commands.push_line(Vec3::ZERO, Vec3::X, COLOR_RED);
        push_numbered_quad(&mut commands, 0);

        assert_eq!(commands.entries(), &[RenderEntry::Mesh(MeshSlot::TestPlane)]);
        assert_eq!(commands.dropped().entries, 2);
        assert!(commands.line_vertices().is_empty());
        assert!(commands.quad_vertices().is_empty());
    }

    #[test]
    fn test_mesh_entry_keeps_batch_open() {
        let mut commands = RenderCommands::new(&capacity());
        commands.push_line(Vec3::ZERO, Vec3::X, COLOR_RED);
        commands.push_mesh_entry(MeshSlot::TestPlane);
        commands.push_line(Vec3::ZERO, Vec3::Y, COLOR_GREEN);

        assert_eq!(commands.entries().len(), 2);
        assert_eq!(batches(&commands)[0].vertex_count, 4);
    }

    #[test]
    fn test_upload_queue_bounded() {
        let mut store = AssetStore::new(1 << 16, 1 << 16);
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(1);
        let mesh = store
            .create_plane(Vec3::ZERO, 1.0, 1.0, 2, Vec4::ONE, &mut rng)
            .unwrap();

        let mut commands = RenderCommands::new(&capacity());
        for _ in 0..3 {
            commands.push_upload_request(MeshSlot::TestPlane, mesh);
        }
        assert_eq!(commands.uploads().len(), 2);
        assert_eq!(commands.dropped().uploads, 1);
    }

    #[test]
    fn test_begin_frame_resets() {
        let mut commands = RenderCommands::new(&CommandCapacity {
            quad_vertices: 4,
            ..capacity()
        });
        push_numbered_quad(&mut commands, 0);
        push_numbered_quad(&mut commands, 1);
        commands.push_axes(Vec3::ZERO);
        commands.set_circle_count(3);

        commands.begin_frame();
        assert!(commands.entries().is_empty());
        assert!(commands.line_vertices().is_empty());
        assert!(commands.quad_indices().is_empty());
        assert_eq!(commands.dropped(), DropCounts::default());
        assert_eq!(commands.circle_count(), 0);

        push_numbered_quad(&mut commands, 2);
        assert_eq!(batches(&commands)[0].vertex_start, 0);
    }

    #[test]
    fn test_bounding_box_and_axes_lines() {
        let mut commands = RenderCommands::new(&capacity());
        commands.push_bounding_box(&BoundingBox {
            position: Vec3::ZERO,
            bounds: Vec3::ONE,
        });
        commands.push_axes(Vec3::ZERO);

        assert_eq!(commands.line_vertices().len(), 2 * 15);
        assert_eq!(commands.line_vertices()[24].color, COLOR_RED.to_array());
    }

    #[test]
    fn test_circle_quad_corners() {
        let mut commands = RenderCommands::new(&capacity());
        commands.push_circle(Vec3::new(1.0, 1.0, 2.0), Vec2::splat(2.0), COLOR_BLUE);

        let vertices = commands.quad_vertices();
        assert_eq!(vertices[0].position, [0.0, 0.0, 2.0]);
        assert_eq!(vertices[2].position, [2.0, 2.0, 2.0]);
        assert_eq!(vertices[2].uv, [1.0, 1.0]);
        assert!(vertices.iter().all(|v| v.color == COLOR_BLUE.to_array()));
    }
}
