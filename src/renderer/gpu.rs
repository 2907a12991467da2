use std::sync::Arc;

use thiserror::Error;
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::math::SurfaceMesh;
use crate::math::color::srgb_to_linear;
use crate::renderer::camera::{CameraUniform, PerspectiveCamera};
use crate::renderer::scene::{
    LineVertex, Lighting, SURFACE_METALNESS, SURFACE_OPACITY, SURFACE_ROUGHNESS, Scene,
};

pub const MAX_SURFACE_VERTICES: usize = 512 * 512;
const MAX_SURFACE_INDICES: usize = 6 * 511 * 511;
const MAX_WIRE_INDICES: usize = 2 * (2 * 512 * 511 + 511 * 511);
const MAX_HELPER_VERTICES: usize = 2000;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

#[derive(Debug, Error)]
pub enum GpuError {
    #[error("could not create a rendering surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),
    #[error("no compatible GPU adapter found")]
    NoAdapter,
    #[error("could not open the GPU device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
}

fn to_vec4(rgb: [f32; 3], w: f32) -> [f32; 4] {
    [rgb[0], rgb[1], rgb[2], w]
}

fn light_color(color: [u8; 3], intensity: f32) -> [f32; 4] {
    to_vec4(srgb_to_linear(color).map(|c| c * intensity), 1.0)
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SceneUniform {
    pub ambient: [f32; 4],
    pub light_dir: [f32; 4],
    pub light_color: [f32; 4],
    pub point_pos: [[f32; 4]; 2],
    pub point_color: [[f32; 4]; 2],
    pub base_color: [f32; 4],
    pub material: [f32; 4],
}

impl SceneUniform {
    pub fn new(lighting: &Lighting, base_color: [u8; 3]) -> Self {
        let dir = lighting.directional_position.normalize_or_zero();
        Self {
            ambient: light_color(lighting.ambient.color, lighting.ambient.intensity),
            light_dir: to_vec4(dir.to_array(), 0.0),
            light_color: light_color(lighting.directional.color, lighting.directional.intensity),
            point_pos: lighting.points.map(|p| to_vec4(p.position.to_array(), 1.0)),
            point_color: lighting
                .points
                .map(|p| light_color(p.light.color, p.light.intensity)),
            base_color: to_vec4(srgb_to_linear(base_color), SURFACE_OPACITY),
            material: [SURFACE_METALNESS, SURFACE_ROUGHNESS, 0.0, 0.0],
        }
    }
}

fn vertex_buffer(device: &wgpu::Device, label: &str, floats: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: (floats * 4) as u64,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn index_buffer(device: &wgpu::Device, label: &str, count: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: (count * 4) as u64,
        usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

pub struct SurfaceBuffers {
    pub position_buffer: wgpu::Buffer,
    pub color_buffer: wgpu::Buffer,
    pub normal_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub wire_index_buffer: wgpu::Buffer,
    pub index_count: u32,
    pub wire_index_count: u32,
    pub wireframe: bool,

    pub helper_buffer: wgpu::Buffer,
    pub helper_vertex_count: u32,
}

const FLOAT3_CAPACITY: usize = MAX_SURFACE_VERTICES * 3;

impl SurfaceBuffers {
    pub fn new(device: &wgpu::Device) -> Self {
        Self {
            position_buffer: vertex_buffer(device, "Surface Position Buffer", FLOAT3_CAPACITY),
            color_buffer: vertex_buffer(device, "Surface Color Buffer", FLOAT3_CAPACITY),
            normal_buffer: vertex_buffer(device, "Surface Normal Buffer", FLOAT3_CAPACITY),
            index_buffer: index_buffer(device, "Surface Index Buffer", MAX_SURFACE_INDICES),
            wire_index_buffer: index_buffer(device, "Wireframe Index Buffer", MAX_WIRE_INDICES),
            index_count: 0,
            wire_index_count: 0,
            wireframe: false,

            helper_buffer: vertex_buffer(
                device,
                "Helper Vertex Buffer",
                MAX_HELPER_VERTICES * std::mem::size_of::<LineVertex>() / 4,
            ),
            helper_vertex_count: 0,
        }
    }

    /// Meshes larger than the buffers are refused whole rather than drawn truncated.
    pub fn upload_surface(&mut self, queue: &wgpu::Queue, mesh: &SurfaceMesh) -> bool {
        if mesh.vertex_count() > MAX_SURFACE_VERTICES
            || mesh.indices.len() > MAX_SURFACE_INDICES
            || mesh.wire_indices.len() > MAX_WIRE_INDICES
        {
            tracing::warn!(
                vertices = mesh.vertex_count(),
                "surface exceeds GPU buffer capacity, not uploaded"
            );
            return false;
        }

        queue.write_buffer(&self.position_buffer, 0, bytemuck::cast_slice(&mesh.positions));
        queue.write_buffer(&self.color_buffer, 0, bytemuck::cast_slice(&mesh.colors));
        queue.write_buffer(&self.normal_buffer, 0, bytemuck::cast_slice(&mesh.normals));
        queue.write_buffer(&self.index_buffer, 0, bytemuck::cast_slice(&mesh.indices));
        queue.write_buffer(
            &self.wire_index_buffer,
            0,
            bytemuck::cast_slice(&mesh.wire_indices),
        );

        self.index_count = mesh.indices.len() as u32;
        self.wire_index_count = mesh.wire_indices.len() as u32;
        self.wireframe = mesh.appearance.wireframe;
        true
    }

    pub fn upload_helpers(&mut self, queue: &wgpu::Queue, vertices: &[LineVertex]) {
        let count = vertices.len().min(MAX_HELPER_VERTICES);
        queue.write_buffer(
            &self.helper_buffer,
            0,
            bytemuck::cast_slice(&vertices[..count]),
        );
        self.helper_vertex_count = count as u32;
    }
}

const POSITION_ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x3];
const COLOR_ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![1 => Float32x3];
const NORMAL_ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![2 => Float32x3];
const LINE_ATTRS: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];

fn float3_layout(
    attributes: &'static [wgpu::VertexAttribute],
) -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: 12,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes,
    }
}

fn surface_layouts() -> [wgpu::VertexBufferLayout<'static>; 3] {
    [
        float3_layout(&POSITION_ATTRS),
        float3_layout(&COLOR_ATTRS),
        float3_layout(&NORMAL_ATTRS),
    ]
}

fn line_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<LineVertex>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &LINE_ATTRS,
    }
}

/// Everything the scene pipelines have in common.
struct PipelineFactory<'a> {
    device: &'a wgpu::Device,
    layout: &'a wgpu::PipelineLayout,
    shader: &'a wgpu::ShaderModule,
    format: wgpu::TextureFormat,
}

impl PipelineFactory<'_> {
    fn create(
        &self,
        label: &str,
        vs: &str,
        fs: &str,
        buffers: &[wgpu::VertexBufferLayout],
        topology: wgpu::PrimitiveTopology,
    ) -> wgpu::RenderPipeline {
        self.device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(self.layout),
                vertex: wgpu::VertexState {
                    module: self.shader,
                    entry_point: Some(vs),
                    buffers,
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: self.shader,
                    entry_point: Some(fs),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: self.format,
                        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology,
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
    }
}

pub struct GpuState {
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub size: PhysicalSize<u32>,

    pub pipeline_surface: wgpu::RenderPipeline,
    pub pipeline_wireframe: wgpu::RenderPipeline,
    pub pipeline_helpers: wgpu::RenderPipeline,

    pub camera_buffer: wgpu::Buffer,
    pub scene_buffer: wgpu::Buffer,
    pub scene_bind_group: wgpu::BindGroup,

    pub buffers: SurfaceBuffers,
    pub clear_color: wgpu::Color,

    pub depth_texture: wgpu::TextureView,
}

impl GpuState {
    pub async fn new(window: Arc<Window>, vsync: bool) -> Result<Self, GpuError> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance.create_surface(window)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;

        tracing::info!(adapter = ?adapter.get_info().name, "GPU adapter selected");

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: None,
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: present_mode(vsync),
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders.wgsl").into()),
        });

        let camera_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Camera Buffer"),
            size: std::mem::size_of::<CameraUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let scene_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Scene Buffer"),
            size: std::mem::size_of::<SceneUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let uniform_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let scene_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Scene Bind Group Layout"),
                entries: &[uniform_entry(0), uniform_entry(1)],
            });

        let scene_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Scene Bind Group"),
            layout: &scene_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: camera_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: scene_buffer.as_entire_binding(),
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Scene Pipeline Layout"),
            bind_group_layouts: &[&scene_bind_group_layout],
            push_constant_ranges: &[],
        });

        let factory = PipelineFactory {
            device: &device,
            layout: &pipeline_layout,
            shader: &shader,
            format: config.format,
        };

        let surface_buffers = surface_layouts();
        let pipeline_surface = factory.create(
            "Surface Render Pipeline",
            "vs_surface_main",
            "fs_surface_main",
            &surface_buffers,
            wgpu::PrimitiveTopology::TriangleList,
        );
        let pipeline_wireframe = factory.create(
            "Wireframe Render Pipeline",
            "vs_surface_main",
            "fs_surface_main",
            &surface_buffers,
            wgpu::PrimitiveTopology::LineList,
        );
        let pipeline_helpers = factory.create(
            "Helper Render Pipeline",
            "vs_line_main",
            "fs_line_main",
            &[line_layout()],
            wgpu::PrimitiveTopology::LineList,
        );

        let buffers = SurfaceBuffers::new(&device);
        let depth_texture = Self::create_depth_texture(&device, &config);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            size,
            pipeline_surface,
            pipeline_wireframe,
            pipeline_helpers,
            camera_buffer,
            scene_buffer,
            scene_bind_group,
            buffers,
            clear_color: wgpu::Color::BLACK,
            depth_texture,
        })
    }

    fn create_depth_texture(
        device: &wgpu::Device,
        config: &wgpu::SurfaceConfiguration,
    ) -> wgpu::TextureView {
        let size = wgpu::Extent3d {
            width: config.width.max(1),
            height: config.height.max(1),
            depth_or_array_layers: 1,
        };

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Depth Texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });

        texture.create_view(&wgpu::TextureViewDescriptor::default())
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
            self.depth_texture = Self::create_depth_texture(&self.device, &self.config);
        }
    }

    pub fn set_vsync(&mut self, enabled: bool) {
        self.config.present_mode = present_mode(enabled);
        self.surface.configure(&self.device, &self.config);
    }

    /// Uploads helpers and lights once; the surface itself goes through `upload_surface`.
    pub fn prepare_scene(&mut self, scene: &Scene, base_color: [u8; 3]) {
        self.buffers.upload_helpers(&self.queue, &scene.helpers);
        self.update_material(scene, base_color);
        self.clear_color = scene.clear_color();
    }

    pub fn update_material(&self, scene: &Scene, base_color: [u8; 3]) {
        let uniform = SceneUniform::new(&scene.lighting, base_color);
        self.queue
            .write_buffer(&self.scene_buffer, 0, bytemuck::cast_slice(&[uniform]));
    }

    pub fn upload_surface(&mut self, scene: &Scene, mesh: &SurfaceMesh) {
        if self.buffers.upload_surface(&self.queue, mesh) {
            self.update_material(scene, mesh.appearance.base_color);
        }
    }

    pub fn update_camera(&self, camera: &PerspectiveCamera) {
        let uniform = CameraUniform::from_camera(camera);
        self.queue
            .write_buffer(&self.camera_buffer, 0, bytemuck::cast_slice(&[uniform]));
    }

    pub fn render_scene(&self, view: &wgpu::TextureView, encoder: &mut wgpu::CommandEncoder) {
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Scene Render Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(self.clear_color),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth_texture,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        render_pass.set_bind_group(0, &self.scene_bind_group, &[]);

        if self.buffers.helper_vertex_count > 0 {
            render_pass.set_pipeline(&self.pipeline_helpers);
            render_pass.set_vertex_buffer(0, self.buffers.helper_buffer.slice(..));
            render_pass.draw(0..self.buffers.helper_vertex_count, 0..1);
        }

        // translucent, so drawn after the opaque helpers
        if self.buffers.index_count > 0 {
            render_pass.set_vertex_buffer(0, self.buffers.position_buffer.slice(..));
            render_pass.set_vertex_buffer(1, self.buffers.color_buffer.slice(..));
            render_pass.set_vertex_buffer(2, self.buffers.normal_buffer.slice(..));

            if self.buffers.wireframe {
                render_pass.set_pipeline(&self.pipeline_wireframe);
                render_pass.set_index_buffer(
                    self.buffers.wire_index_buffer.slice(..),
                    wgpu::IndexFormat::Uint32,
                );
                render_pass.draw_indexed(0..self.buffers.wire_index_count, 0, 0..1);
            } else {
                render_pass.set_pipeline(&self.pipeline_surface);
                render_pass.set_index_buffer(
                    self.buffers.index_buffer.slice(..),
                    wgpu::IndexFormat::Uint32,
                );
                render_pass.draw_indexed(0..self.buffers.index_count, 0, 0..1);
            }
        }
    }
}

/// What a frame that failed to acquire its surface texture should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceRecovery {
    /// Configure the surface again at the current size; the next frame draws.
    Reconfigure,
    /// Drop this frame and try again on the next one.
    Skip,
    Fatal,
}

pub fn surface_recovery(err: &wgpu::SurfaceError) -> SurfaceRecovery {
    match err {
        wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => SurfaceRecovery::Reconfigure,
        wgpu::SurfaceError::Timeout => SurfaceRecovery::Skip,
        wgpu::SurfaceError::OutOfMemory => SurfaceRecovery::Fatal,
    }
}

fn present_mode(vsync: bool) -> wgpu::PresentMode {
    if vsync {
        wgpu::PresentMode::AutoVsync
    } else {
        wgpu::PresentMode::AutoNoVsync
    }
}
