use super::{EmitterSpec, EmitterUniforms, ParticleBuffer};
use crate::Result;

/// Turns an emitter's static data into a drawable program. Called exactly
/// once per emitter, at construction; a rejected program fails only that
/// emitter.
pub trait ProgramCompiler {
    type Program;

    fn compile(
        &mut self,
        label: &str,
        spec: &EmitterSpec,
        buffer: &ParticleBuffer,
    ) -> Result<Self::Program>;
}

/// Compiler used when no GPU is attached (planning, tests). Accepts every
/// program.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeadlessCompiler;

impl ProgramCompiler for HeadlessCompiler {
    type Program = ();

    fn compile(&mut self, _label: &str, _spec: &EmitterSpec, _buffer: &ParticleBuffer) -> Result<()> {
        Ok(())
    }
}

/// The (buffer, program, uniforms) triple for one scene location.
#[derive(Debug)]
pub struct Emitter<P> {
    label: String,
    spec: EmitterSpec,
    buffer: ParticleBuffer,
    program: P,
    uniforms: EmitterUniforms,
    reported: bool,
}

impl<P> Emitter<P> {
    pub fn new<C>(label: impl Into<String>, spec: EmitterSpec, compiler: &mut C) -> Result<Self>
    where
        C: ProgramCompiler<Program = P>,
    {
        let label = label.into();
        let buffer = ParticleBuffer::generate(&spec);
        let program = compiler.compile(&label, &spec, &buffer)?;
        let uniforms = EmitterUniforms {
            category_index: spec.category.index(),
            point_size: 1.0,
            ..EmitterUniforms::default()
        };
        Ok(Self {
            label,
            spec,
            buffer,
            program,
            uniforms,
            reported: false,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn spec(&self) -> &EmitterSpec {
        &self.spec
    }

    pub fn buffer(&self) -> &ParticleBuffer {
        &self.buffer
    }

    pub fn program(&self) -> &P {
        &self.program
    }

    pub fn uniforms(&self) -> &EmitterUniforms {
        &self.uniforms
    }

    pub fn particle_count(&self) -> usize {
        self.buffer.capacity()
    }

    /// Writes this frame's scalar uniforms. Returns whether they need to be
    /// uploaded: always on the first call, afterwards only when a value
    /// changed.
    pub fn update(&mut self, time: f32, point_size: f32, quality_scale: f32) -> bool {
        let next = EmitterUniforms {
            time,
            point_size,
            quality_scale,
            ..self.uniforms
        };
        let changed = !self.reported || next != self.uniforms;
        self.uniforms = next;
        self.reported = true;
        changed
    }
}
