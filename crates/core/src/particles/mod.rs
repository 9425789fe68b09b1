//! Shader-driven particle emitters.
//!
//! The CPU generates each emitter's attributes once. Afterwards the state of
//! every particle is a pure function of elapsed time evaluated in the vertex
//! shader; [`ParticleBuffer::sample`] mirrors that math for tests and
//! headless use.

pub mod buffer;
pub mod gpu;
pub mod profile;
pub mod program;
pub mod shader;

pub use buffer::{age_at, opacity_at, EmitterSpec, ParticleBuffer, ParticleRecord, ParticleSample};
pub use gpu::{create_frame_layout, GpuEmitterProgram, GpuProgramCompiler, ADDITIVE_BLEND};
pub use profile::VelocityProfile;
pub use program::{Emitter, HeadlessCompiler, ProgramCompiler};
pub use shader::{EmitterUniforms, FrameUniforms, PARTICLE_SHADER};
