use std::{mem::size_of, sync::Arc};

use bytemuck::bytes_of;
use wgpu::util::DeviceExt;

use super::shader::PARTICLE_SHADER;
use super::{EmitterSpec, EmitterUniforms, ParticleBuffer, ParticleRecord, ProgramCompiler};
use crate::{Result, TunnelError};

const PARTICLE_ATTRIBUTES: [wgpu::VertexAttribute; 3] =
    wgpu::vertex_attr_array![0 => Float32x4, 1 => Float32x4, 2 => Float32x4];

/// Additive blending: particles brighten whatever is behind them.
pub const ADDITIVE_BLEND: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::SrcAlpha,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
};

/// Frame uniform block layout shared by every scene program (group 0).
pub fn create_frame_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("frame.bgl"),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    })
}

/// Builds the particle pipeline once, on the first emitter, and the
/// immutable buffers of every emitter.
pub struct GpuProgramCompiler<'a> {
    device: &'a wgpu::Device,
    frame_layout: &'a wgpu::BindGroupLayout,
    emitter_layout: wgpu::BindGroupLayout,
    color_format: wgpu::TextureFormat,
    depth_format: wgpu::TextureFormat,
    /// Outcome of the single pipeline build; a failure message is replayed
    /// for every later emitter.
    pipeline: Option<std::result::Result<Arc<wgpu::RenderPipeline>, String>>,
}

impl<'a> GpuProgramCompiler<'a> {
    pub fn new(
        device: &'a wgpu::Device,
        frame_layout: &'a wgpu::BindGroupLayout,
        color_format: wgpu::TextureFormat,
        depth_format: wgpu::TextureFormat,
    ) -> Self {
        let emitter_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("particles.emitter.bgl"),
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
        Self {
            device,
            frame_layout,
            emitter_layout,
            color_format,
            depth_format,
            pipeline: None,
        }
    }

    fn shared_pipeline(&mut self) -> std::result::Result<Arc<wgpu::RenderPipeline>, String> {
        if let Some(outcome) = &self.pipeline {
            return outcome.clone();
        }
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = self.create_pipeline();
        let outcome = match pollster::block_on(self.device.pop_error_scope()) {
            Some(error) => Err(error.to_string()),
            None => Ok(Arc::new(pipeline)),
        };
        self.pipeline.insert(outcome).clone()
    }

    fn create_pipeline(&self) -> wgpu::RenderPipeline {
        let shader = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("particles.shader"),
            source: wgpu::ShaderSource::Wgsl(PARTICLE_SHADER.into()),
        });

        let pipeline_layout = self.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("particles.pl"),
            bind_group_layouts: &[self.frame_layout, &self.emitter_layout],
            push_constant_ranges: &[],
        });

        self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("particles.pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: size_of::<ParticleRecord>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Instance,
                    attributes: &PARTICLE_ATTRIBUTES,
                }],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: self.depth_format,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.color_format,
                    blend: Some(ADDITIVE_BLEND),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview: None,
            cache: None,
        })
    }
}

impl ProgramCompiler for GpuProgramCompiler<'_> {
    type Program = GpuEmitterProgram;

    fn compile(
        &mut self,
        label: &str,
        _spec: &EmitterSpec,
        buffer: &ParticleBuffer,
    ) -> Result<GpuEmitterProgram> {
        let pipeline = self
            .shared_pipeline()
            .map_err(|message| TunnelError::ShaderCompilation {
                label: label.to_string(),
                message,
            })?;

        let instance_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("particles.instances"),
            contents: buffer.as_bytes(),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let uniform_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("particles.emitter.uniform"),
            size: size_of::<EmitterUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("particles.emitter.bg"),
            layout: &self.emitter_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        Ok(GpuEmitterProgram {
            pipeline,
            instance_buffer,
            uniform_buffer,
            bind_group,
            instance_count: buffer.capacity() as u32,
        })
    }
}

/// GPU resources owned by one emitter. Buffers are destroyed on drop; the
/// pipeline is shared with the other emitters of the mount.
pub struct GpuEmitterProgram {
    pipeline: Arc<wgpu::RenderPipeline>,
    instance_buffer: wgpu::Buffer,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    instance_count: u32,
}

impl GpuEmitterProgram {
    pub fn write_uniforms(&self, queue: &wgpu::Queue, uniforms: &EmitterUniforms) {
        queue.write_buffer(&self.uniform_buffer, 0, bytes_of(uniforms));
    }

    /// Expects the frame bind group to already be set at group 0.
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        if self.instance_count == 0 {
            return;
        }
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(1, &self.bind_group, &[]);
        pass.set_vertex_buffer(0, self.instance_buffer.slice(..));
        pass.draw(0..6, 0..self.instance_count);
    }
}

impl Drop for GpuEmitterProgram {
    fn drop(&mut self) {
        self.instance_buffer.destroy();
        self.uniform_buffer.destroy();
    }
}

impl std::fmt::Debug for GpuEmitterProgram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuEmitterProgram")
            .field("instance_count", &self.instance_count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::EventCategory;

    fn device() -> Option<(wgpu::Device, wgpu::Queue)> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        let adapter =
            pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions::default()))?;
        pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor::default(), None)).ok()
    }

    fn spec(seed: u64) -> EmitterSpec {
        EmitterSpec {
            origin: Vec3::new(0.0, 0.0, -8.0 * seed as f32),
            category: EventCategory::ALL[seed as usize % EventCategory::ALL.len()],
            capacity: 16,
            seed,
            stream_target: Vec3::NEG_Z,
        }
    }

    #[test]
    fn emitters_share_one_pipeline() {
        // Machines without any adapter cannot build pipelines at all.
        let Some((device, _queue)) = device() else {
            return;
        };
        let frame_layout = create_frame_layout(&device);
        let mut compiler = GpuProgramCompiler::new(
            &device,
            &frame_layout,
            wgpu::TextureFormat::Rgba8UnormSrgb,
            wgpu::TextureFormat::Depth32Float,
        );

        let programs: Vec<GpuEmitterProgram> = (1..=3)
            .map(|seed| {
                let spec = spec(seed);
                let buffer = ParticleBuffer::generate(&spec);
                compiler.compile(&format!("emitter.{seed}"), &spec, &buffer).unwrap()
            })
            .collect();

        assert!(Arc::ptr_eq(&programs[0].pipeline, &programs[1].pipeline));
        assert!(Arc::ptr_eq(&programs[0].pipeline, &programs[2].pipeline));
        assert_eq!(Arc::strong_count(&programs[0].pipeline), 4);
        assert_eq!(programs[2].instance_count, 16);
    }
}
