use std::mem::size_of;

use bytemuck::{bytes_of, cast_slice};
use wgpu::util::DeviceExt;

use super::{
    gpu::{GpuContext, BACKDROP_COLOR, DEPTH_FORMAT},
    DrawCommand, FrameDriver,
};
use crate::{
    particles::{create_frame_layout, FrameUniforms, GpuEmitterProgram, GpuProgramCompiler},
    scene::{
        crystal_vertices, CrystalInstance, CrystalVertex, Scene, TunnelVertex, CRYSTAL_SHADER,
        TUNNEL_SHADER,
    },
    Result, TunnelError,
};

const TUNNEL_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2];
const CRYSTAL_MESH_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];
const CRYSTAL_INSTANCE_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![2 => Float32x4, 3 => Float32x4];

/// Mesh buffers for the mounted scene.
struct SceneBuffers {
    tunnel_vertices: wgpu::Buffer,
    tunnel_indices: wgpu::Buffer,
    tunnel_index_count: u32,
    crystal_instances: wgpu::Buffer,
    crystal_count: u32,
    crystal_generation: u64,
}

/// Executes [`FramePlan`](super::FramePlan)s against a window surface.
pub struct Renderer {
    frame_layout: wgpu::BindGroupLayout,
    frame_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
    depth_view: wgpu::TextureView,
    tunnel_pipeline: wgpu::RenderPipeline,
    crystal_pipeline: wgpu::RenderPipeline,
    crystal_mesh: wgpu::Buffer,
    crystal_vertex_count: u32,
    scene: Option<SceneBuffers>,
}

impl Renderer {
    /// Builds the shared pipelines. A shader failure here is fatal for the
    /// live renderer; callers fall back to [`StaticFallback`](super::StaticFallback).
    pub fn new(gpu: &GpuContext) -> Result<Self> {
        let device = &gpu.device;

        let frame_layout = create_frame_layout(device);
        let frame_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("frame.uniform"),
            size: size_of::<FrameUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("frame.bg"),
            layout: &frame_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("frame.pl"),
            bind_group_layouts: &[&frame_layout],
            push_constant_ranges: &[],
        });

        let tunnel_pipeline = create_pipeline(
            gpu,
            &pipeline_layout,
            PipelineDesc {
                label: "tunnel",
                source: TUNNEL_SHADER,
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: size_of::<TunnelVertex>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &TUNNEL_ATTRIBUTES,
                }],
                cull_mode: None,
            },
        )?;
        let crystal_pipeline = create_pipeline(
            gpu,
            &pipeline_layout,
            PipelineDesc {
                label: "crystals",
                source: CRYSTAL_SHADER,
                buffers: &[
                    wgpu::VertexBufferLayout {
                        array_stride: size_of::<CrystalVertex>() as wgpu::BufferAddress,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &CRYSTAL_MESH_ATTRIBUTES,
                    },
                    wgpu::VertexBufferLayout {
                        array_stride: size_of::<CrystalInstance>() as wgpu::BufferAddress,
                        step_mode: wgpu::VertexStepMode::Instance,
                        attributes: &CRYSTAL_INSTANCE_ATTRIBUTES,
                    },
                ],
                cull_mode: Some(wgpu::Face::Back),
            },
        )?;

        let vertices = crystal_vertices();
        let crystal_mesh = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("crystals.mesh"),
            contents: cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });

        Ok(Self {
            depth_view: create_depth_view(gpu),
            frame_layout,
            frame_buffer,
            frame_bind_group,
            tunnel_pipeline,
            crystal_pipeline,
            crystal_mesh,
            crystal_vertex_count: vertices.len() as u32,
            scene: None,
        })
    }

    /// Emitter compiler bound to this renderer's device and frame layout.
    pub fn compiler<'a>(&'a self, gpu: &'a GpuContext) -> GpuProgramCompiler<'a> {
        GpuProgramCompiler::new(&gpu.device, &self.frame_layout, gpu.config.format, DEPTH_FORMAT)
    }

    /// Uploads the tunnel mesh and crystal instances of a freshly mounted
    /// scene. Replaces any previous scene's buffers.
    pub fn prepare_scene<P>(&mut self, gpu: &GpuContext, scene: &Scene<P>) {
        self.release_scene();

        let tunnel = scene.tunnel();
        let device = &gpu.device;
        let tunnel_vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("tunnel.vertices"),
            contents: cast_slice(&tunnel.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let tunnel_indices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("tunnel.indices"),
            contents: cast_slice(&tunnel.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        // Never zero-sized, so an empty snapshot still gets a valid buffer.
        let crystal_instances = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("crystals.instances"),
            size: (size_of::<CrystalInstance>() * scene.crystals().len().max(1)) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        if !scene.crystals().is_empty() {
            gpu.queue
                .write_buffer(&crystal_instances, 0, cast_slice(scene.crystals()));
        }

        self.scene = Some(SceneBuffers {
            tunnel_vertices,
            tunnel_indices,
            tunnel_index_count: tunnel.indices.len() as u32,
            crystal_instances,
            crystal_count: scene.crystals().len() as u32,
            crystal_generation: scene.crystal_generation(),
        });
    }

    pub fn release_scene(&mut self) {
        if let Some(buffers) = self.scene.take() {
            buffers.tunnel_vertices.destroy();
            buffers.tunnel_indices.destroy();
            buffers.crystal_instances.destroy();
        }
    }

    pub fn resize(&mut self, gpu: &mut GpuContext, width: u32, height: u32) {
        gpu.resize(width, height);
        self.depth_view = create_depth_view(gpu);
    }

    /// Draws the driver's latest plan. Does nothing once the driver has been
    /// torn down or before its first tick.
    pub fn render(&mut self, gpu: &GpuContext, driver: &FrameDriver<GpuEmitterProgram>) -> Result<()> {
        let (Some(plan), Some(scene)) = (driver.plan(), driver.scene()) else {
            return Ok(());
        };
        gpu.queue.write_buffer(&self.frame_buffer, 0, bytes_of(&plan.frame));
        if let Some(buffers) = self.scene.as_mut() {
            if buffers.crystal_generation != scene.crystal_generation() && buffers.crystal_count > 0 {
                gpu.queue
                    .write_buffer(&buffers.crystal_instances, 0, cast_slice(scene.crystals()));
                buffers.crystal_generation = scene.crystal_generation();
            }
        }
        for draw in &plan.draws {
            if let DrawCommand::Particles { emitter, dirty: true } = *draw {
                if let Some(Some(emitter)) = scene.emitters().get(emitter) {
                    emitter.program().write_uniforms(&gpu.queue, emitter.uniforms());
                }
            }
        }

        // Uploads precede acquire; a skipped frame's writes go out with the
        // next submit.
        let Some(frame) = gpu.acquire()? else {
            return Ok(());
        };

        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame.encoder"),
            });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("frame.pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(BACKDROP_COLOR),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_bind_group(0, &self.frame_bind_group, &[]);

            for draw in &plan.draws {
                match *draw {
                    DrawCommand::Backdrop => {
                        if let Some(buffers) = &self.scene {
                            pass.set_pipeline(&self.tunnel_pipeline);
                            pass.set_vertex_buffer(0, buffers.tunnel_vertices.slice(..));
                            pass.set_index_buffer(
                                buffers.tunnel_indices.slice(..),
                                wgpu::IndexFormat::Uint32,
                            );
                            pass.draw_indexed(0..buffers.tunnel_index_count, 0, 0..1);
                        }
                    }
                    DrawCommand::Particles { emitter, .. } => {
                        if let Some(Some(emitter)) = scene.emitters().get(emitter) {
                            emitter.program().draw(&mut pass);
                        }
                    }
                    DrawCommand::Crystals => {
                        if let Some(buffers) = self.scene.as_ref().filter(|b| b.crystal_count > 0) {
                            pass.set_pipeline(&self.crystal_pipeline);
                            pass.set_vertex_buffer(0, self.crystal_mesh.slice(..));
                            pass.set_vertex_buffer(1, buffers.crystal_instances.slice(..));
                            pass.draw(0..self.crystal_vertex_count, 0..buffers.crystal_count);
                        }
                    }
                }
            }
        }

        gpu.queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        self.release_scene();
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("crystal_vertex_count", &self.crystal_vertex_count)
            .field("scene_prepared", &self.scene.is_some())
            .finish()
    }
}

struct PipelineDesc<'a> {
    label: &'a str,
    source: &'static str,
    buffers: &'a [wgpu::VertexBufferLayout<'a>],
    cull_mode: Option<wgpu::Face>,
}

/// Opaque, depth-writing pipeline over the frame bind group.
fn create_pipeline(
    gpu: &GpuContext,
    layout: &wgpu::PipelineLayout,
    desc: PipelineDesc<'_>,
) -> Result<wgpu::RenderPipeline> {
    let device = &gpu.device;
    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(desc.label),
        source: wgpu::ShaderSource::Wgsl(desc.source.into()),
    });
    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(desc.label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: desc.buffers,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: desc.cull_mode,
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
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: gpu.config.format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multiview: None,
        cache: None,
    });

    match pollster::block_on(device.pop_error_scope()) {
        Some(error) => Err(TunnelError::ShaderCompilation {
            label: desc.label.to_string(),
            message: error.to_string(),
        }),
        None => Ok(pipeline),
    }
}

fn create_depth_view(gpu: &GpuContext) -> wgpu::TextureView {
    let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("frame.depth"),
        size: wgpu::Extent3d {
            width: gpu.config.width.max(1),
            height: gpu.config.height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}
