// wgpu backend for Clickable

use std::mem::size_of;
use std::sync::Arc;

use glam::{Mat4, Vec4};
use wgpu::util::DeviceExt;
use wgpu::{Adapter, Buffer, RenderPipeline};
use winit::{dpi::PhysicalSize, event_loop::EventLoop, window::Window, window::WindowBuilder};

use crate::backend::{plan_draws, DrawKind, RenderBackend};
use crate::commands::RenderCommands;
use crate::config::{CommandCapacity, DemoConfig};
use crate::error::RendererError;
use crate::geometry::{AssetStore, LineVertex, MeshSlot, Vertex};

const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.1,
    g: 0.1,
    b: 0.1,
    a: 1.0,
};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const SAMPLE_COUNT: u32 = 4;

const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 3] =
    wgpu::vertex_attr_array![0 => Float32x4, 1 => Float32x3, 2 => Float32x2];
const LINE_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x4, 1 => Float32x3];

/// Maps the camera's [-1, 1] clip depth onto wgpu's [0, 1].
fn depth_remap() -> Mat4 {
    Mat4::from_cols(
        Vec4::X,
        Vec4::Y,
        Vec4::new(0.0, 0.0, 0.5, 0.0),
        Vec4::new(0.0, 0.0, 0.5, 1.0),
    )
}

// Uniform buffer structure for the world transform
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct Uniforms {
    world: [[f32; 4]; 4],
}

impl Uniforms {
    fn new(world: Mat4) -> Self {
        Self {
            world: (depth_remap() * world).to_cols_array_2d(),
        }
    }
}

/// Multisampled color and depth attachments, recreated on resize.
struct FrameTargets {
    color: wgpu::TextureView,
    depth: wgpu::TextureView,
}

impl FrameTargets {
    fn new(device: &wgpu::Device, format: wgpu::TextureFormat, size: PhysicalSize<u32>) -> Self {
        let create = |label: &str, format: wgpu::TextureFormat| {
            device
                .create_texture(&wgpu::TextureDescriptor {
                    label: Some(label),
                    size: wgpu::Extent3d {
                        width: size.width.max(1),
                        height: size.height.max(1),
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: SAMPLE_COUNT,
                    dimension: wgpu::TextureDimension::D2,
                    format,
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                    view_formats: &[],
                })
                .create_view(&wgpu::TextureViewDescriptor::default())
        };

        Self {
            color: create("Multisample Color", format),
            depth: create("Depth", DEPTH_FORMAT),
        }
    }
}

struct GpuMesh {
    vertex_buffer: Buffer,
    index_buffer: Buffer,
}

/// Vertex and index buffers rewritten every frame.
struct StreamBuffers {
    vertices: Buffer,
    indices: Buffer,
}

impl StreamBuffers {
    fn new(device: &wgpu::Device, label: &str, vertex_bytes: usize, index_bytes: usize) -> Self {
        let create = |suffix: &str, size: usize, usage: wgpu::BufferUsages| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&format!("{label} {suffix}")),
                size: wgpu::util::align_to(size as u64, wgpu::COPY_BUFFER_ALIGNMENT),
                usage: usage | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };

        Self {
            vertices: create("Vertices", vertex_bytes, wgpu::BufferUsages::VERTEX),
            indices: create("Indices", index_bytes, wgpu::BufferUsages::INDEX),
        }
    }

    fn write<V: bytemuck::Pod>(&self, queue: &wgpu::Queue, vertices: &[V], indices: &[u16]) {
        if !vertices.is_empty() {
            queue.write_buffer(&self.vertices, 0, bytemuck::cast_slice(vertices));
        }
        // Batches push indices in pairs or sixes, so the byte length stays 4-aligned.
        if !indices.is_empty() {
            queue.write_buffer(&self.indices, 0, bytemuck::cast_slice(indices));
        }
    }
}

pub struct Renderer {
    adapter: Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface: wgpu::Surface<'static>,
    window: Arc<Window>,
    surface_format: wgpu::TextureFormat,
    size: PhysicalSize<u32>,

    mesh_pipeline: RenderPipeline,
    line_pipeline: RenderPipeline,
    circle_pipeline: RenderPipeline,
    uniform_buffer: Buffer,
    uniform_bind_group: wgpu::BindGroup,
    targets: FrameTargets,

    lines: StreamBuffers,
    quads: StreamBuffers,
    meshes: [Option<GpuMesh>; MeshSlot::COUNT],
}

impl Renderer {
    pub async fn new(
        event_loop: &EventLoop<()>,
        config: &DemoConfig,
    ) -> Result<Self, RendererError> {
        let window = Arc::new(
            WindowBuilder::new()
                .with_title(config.window.title.as_str())
                .with_inner_size(PhysicalSize::new(config.window.width, config.window.height))
                .build(event_loop)?,
        );

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(RendererError::NoAdapter)?;
        log::info!("Using adapter {}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Clickable Device"),
                    required_features: wgpu::Features::default(),
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or(RendererError::NoSurfaceFormat)?;

        let shader_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shader.wgsl").into()),
        });

        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Uniform Buffer"),
            contents: bytemuck::cast_slice(&[Uniforms::new(Mat4::IDENTITY)]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Uniform Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Uniform Bind Group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Render Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let vertex_layout = wgpu::VertexBufferLayout {
            array_stride: size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &VERTEX_ATTRIBUTES,
        };
        let line_layout = wgpu::VertexBufferLayout {
            array_stride: size_of::<LineVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &LINE_ATTRIBUTES,
        };

        let pipeline = PipelineBuilder {
            device: &device,
            layout: &layout,
            shader: &shader_module,
            format: surface_format,
        };
        let mesh_pipeline = pipeline.build(
            "Mesh Pipeline",
            ("vs_main", "fs_solid"),
            vertex_layout.clone(),
            wgpu::PrimitiveTopology::TriangleList,
            Some(wgpu::BlendState::REPLACE),
            true,
        );
        let line_pipeline = pipeline.build(
            "Line Pipeline",
            ("vs_line", "fs_solid"),
            line_layout,
            wgpu::PrimitiveTopology::LineList,
            Some(wgpu::BlendState::REPLACE),
            true,
        );
        let circle_pipeline = pipeline.build(
            "Circle Pipeline",
            ("vs_main", "fs_circle"),
            vertex_layout,
            wgpu::PrimitiveTopology::TriangleList,
            Some(wgpu::BlendState::ALPHA_BLENDING),
            // Translucent circles test against the scene but never hide each other.
            false,
        );

        let CommandCapacity {
            line_vertices,
            line_indices,
            quad_vertices,
            quad_indices,
            ..
        } = config.commands;
        let lines = StreamBuffers::new(
            &device,
            "Line",
            line_vertices * size_of::<LineVertex>(),
            line_indices * size_of::<u16>(),
        );
        let quads = StreamBuffers::new(
            &device,
            "Quad",
            quad_vertices * size_of::<Vertex>(),
            quad_indices * size_of::<u16>(),
        );

        let targets = FrameTargets::new(&device, surface_format, window.inner_size());

        let mut renderer = Self {
            adapter,
            device,
            queue,
            surface,
            size: window.inner_size(),
            window,
            surface_format,
            mesh_pipeline,
            line_pipeline,
            circle_pipeline,
            uniform_buffer,
            uniform_bind_group,
            targets,
            lines,
            quads,
            meshes: std::array::from_fn(|_| None),
        };
        renderer.configure_surface();
        Ok(renderer)
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.size = new_size;
        self.configure_surface();
    }

    fn configure_surface(&mut self) {
        if self.size.width == 0 || self.size.height == 0 {
            return;
        }
        let surface_caps = self.surface.get_capabilities(&self.adapter);

        self.surface.configure(
            &self.device,
            &wgpu::SurfaceConfiguration {
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                format: self.surface_format,
                width: self.size.width,
                height: self.size.height,
                present_mode: wgpu::PresentMode::Fifo,
                alpha_mode: surface_caps
                    .alpha_modes
                    .first()
                    .copied()
                    .unwrap_or(wgpu::CompositeAlphaMode::Auto),
                view_formats: vec![],
                desired_maximum_frame_latency: 2,
            },
        );
        self.targets = FrameTargets::new(&self.device, self.surface_format, self.size);
    }

    fn upload(&mut self, commands: &RenderCommands, assets: &AssetStore) {
        for request in commands.uploads() {
            let vertices = assets.vertices(&request.mesh);
            let indices = assets.indices(&request.mesh);

            let vertex_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Mesh Vertex Buffer"),
                contents: bytemuck::cast_slice(vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
            let index_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Mesh Index Buffer"),
                contents: bytemuck::cast_slice(indices),
                usage: wgpu::BufferUsages::INDEX,
            });

            log::debug!(
                "Uploaded {:?}: {} vertices, {} indices",
                request.slot,
                vertices.len(),
                indices.len()
            );
            self.meshes[request.slot.index()] = Some(GpuMesh {
                vertex_buffer,
                index_buffer,
            });
        }
    }
}

impl RenderBackend for Renderer {
    fn end_frame(&mut self, commands: &RenderCommands, assets: &AssetStore) -> u32 {
        self.upload(commands, assets);

        self.queue.write_buffer(
            &self.uniform_buffer,
            0,
            bytemuck::cast_slice(&[Uniforms::new(commands.world_transform())]),
        );
        self.lines
            .write(&self.queue, commands.line_vertices(), commands.line_indices());
        self.quads
            .write(&self.queue, commands.quad_vertices(), commands.quad_indices());

        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.configure_surface();
                return 0;
            }
            Err(err) => {
                log::warn!("Skipping frame: {err}");
                return 0;
            }
        };
        let view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let draws = plan_draws(commands.entries(), |slot| {
            self.meshes[slot.index()]
                .as_ref()
                .and_then(|_| assets.mesh(slot))
                .map(|mesh| mesh.index_count() as u32)
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Render Encoder"),
        });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.targets.color,
                    resolve_target: Some(&view),
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                        store: wgpu::StoreOp::Discard,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.targets.depth,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Discard,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            render_pass.set_bind_group(0, &self.uniform_bind_group, &[]);

            for draw in &draws {
                let (pipeline, vertices, indices) = match draw.kind {
                    DrawKind::Mesh(slot) => {
                        let Some(mesh) = &self.meshes[slot.index()] else {
                            continue;
                        };
                        (&self.mesh_pipeline, &mesh.vertex_buffer, &mesh.index_buffer)
                    }
                    DrawKind::Lines => {
                        (&self.line_pipeline, &self.lines.vertices, &self.lines.indices)
                    }
                    DrawKind::Quads => {
                        (&self.circle_pipeline, &self.quads.vertices, &self.quads.indices)
                    }
                };

                render_pass.set_pipeline(pipeline);
                render_pass.set_vertex_buffer(0, vertices.slice(..));
                render_pass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint16);
                render_pass.draw_indexed(draw.indices.clone(), draw.base_vertex, 0..1);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        draws.len() as u32
    }
}

struct PipelineBuilder<'a> {
    device: &'a wgpu::Device,
    layout: &'a wgpu::PipelineLayout,
    shader: &'a wgpu::ShaderModule,
    format: wgpu::TextureFormat,
}

impl PipelineBuilder<'_> {
    fn build(
        &self,
        label: &str,
        (vs_entry, fs_entry): (&str, &str),
        buffer: wgpu::VertexBufferLayout<'_>,
        topology: wgpu::PrimitiveTopology,
        blend: Option<wgpu::BlendState>,
        depth_write: bool,
    ) -> RenderPipeline {
        self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(self.layout),
            vertex: wgpu::VertexState {
                module: self.shader,
                entry_point: vs_entry,
                buffers: &[buffer],
            },
            fragment: Some(wgpu::FragmentState {
                module: self.shader,
                entry_point: fs_entry,
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.format,
                    blend,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: depth_write,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState {
                count: SAMPLE_COUNT,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Camera;
    use glam::Vec3;

    #[test]
    fn test_depth_remap_maps_clip_range() {
        let remap = depth_remap();
        let near = remap * Vec4::new(0.0, 0.0, -1.0, 1.0);
        let far = remap * Vec4::new(0.0, 0.0, 1.0, 1.0);
        assert!((near.z / near.w).abs() < 1e-6);
        assert!((far.z / far.w - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_depth_remap_keeps_xy() {
        let p = depth_remap() * Vec3::new(0.3, -0.7, 0.2).extend(1.0);
        assert_eq!(p.x, 0.3);
        assert_eq!(p.y, -0.7);
        assert_eq!(p.w, 1.0);
    }

    #[test]
    fn test_nearer_points_get_smaller_depth() {
        let camera = Camera::default();
        let world = Uniforms::new(camera.world_transform(4.0 / 3.0)).world;
        let world = Mat4::from_cols_array_2d(&world);

        // The default camera sits at z = 10 looking down -Z.
        let depths: Vec<f32> = [2.0, 5.0, 10.0, 40.0]
            .iter()
            .map(|distance| {
                let clip = world * Vec4::new(0.0, 0.0, 10.0 - distance, 1.0);
                clip.z / clip.w
            })
            .collect();

        for pair in depths.windows(2) {
            assert!(pair[0] < pair[1], "{depths:?}");
        }
        assert!(depths.iter().all(|d| (0.0..=1.0).contains(d)), "{depths:?}");
    }
}
