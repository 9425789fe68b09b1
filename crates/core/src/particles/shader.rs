use bytemuck::{Pod, Zeroable};

/// WGSL program shared by every emitter. Group 0 is the frame uniform block
/// owned by the renderer, group 1 the emitter's own uniforms.
pub const PARTICLE_SHADER: &str = r#"
struct Frame {
    view_proj: mat4x4<f32>,
    camera_position: vec4<f32>,
    camera_right: vec4<f32>,
    camera_up: vec4<f32>,
    tint: vec4<f32>,
    params: vec4<f32>,
};

struct Emitter {
    time: f32,
    point_size: f32,
    category_index: u32,
    quality_scale: f32,
};

const OPACITY_FLOOR: f32 = 1.1920929e-7;

@group(0) @binding(0) var<uniform> frame: Frame;
@group(1) @binding(0) var<uniform> emitter: Emitter;

struct ParticleIn {
    @location(0) position_scale: vec4<f32>,
    @location(1) velocity_lifetime: vec4<f32>,
    @location(2) color_seed: vec4<f32>,
};

struct VsOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) color: vec4<f32>,
    @location(1) local: vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32, particle: ParticleIn) -> VsOut {
    var corners = array<vec2<f32>, 6>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>( 1.0, -1.0),
        vec2<f32>(-1.0,  1.0),
        vec2<f32>(-1.0,  1.0),
        vec2<f32>( 1.0, -1.0),
        vec2<f32>( 1.0,  1.0)
    );
    let corner = corners[vertex_index];

    let lifetime = max(particle.velocity_lifetime.w, 0.0001);
    let wrapped = max(emitter.time - floor(emitter.time / lifetime) * lifetime, 0.0);
    let age = select(wrapped, 0.0, wrapped >= lifetime);
    let ratio = age / lifetime;
    let world = particle.position_scale.xyz + particle.velocity_lifetime.xyz * age;

    // Quads are sized in world units, so perspective attenuates them by depth.
    let half_size = 0.05 * particle.position_scale.w * emitter.point_size * (1.0 - 0.35 * ratio);
    let offset = (frame.camera_right.xyz * corner.x + frame.camera_up.xyz * corner.y) * half_size;

    var out: VsOut;
    out.clip = frame.view_proj * vec4<f32>(world + offset, 1.0);
    let opacity = clamp(1.0 - ratio, OPACITY_FLOOR, 1.0);
    let flicker = 0.85 + 0.15 * sin(emitter.time * 3.0 + particle.color_seed.w * 6.2831);
    out.color = vec4<f32>(particle.color_seed.rgb * flicker, opacity);
    out.local = corner;
    return out;
}

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4<f32> {
    let d = length(in.local);
    if (d > 1.0) {
        discard;
    }
    let falloff = (1.0 - d) * (1.0 - d);
    return vec4<f32>(in.color.rgb, in.color.a * falloff);
}
"#;

/// Per-emitter uniforms. The only data written for an emitter after creation.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct EmitterUniforms {
    pub time: f32,
    pub point_size: f32,
    pub category_index: u32,
    pub quality_scale: f32,
}

/// Frame-wide uniforms shared by the tunnel, particle and crystal programs.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FrameUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub camera_position: [f32; 4],
    pub camera_right: [f32; 4],
    pub camera_up: [f32; 4],
    /// rgb: category tint of the nearest event, a: tint strength.
    pub tint: [f32; 4],
    /// x: elapsed time, y: quality scale, z: tunnel length, w: unused.
    pub params: [f32; 4],
}

impl Default for FrameUniforms {
    fn default() -> Self {
        Self {
            view_proj: glam::Mat4::IDENTITY.to_cols_array_2d(),
            camera_position: [0.0; 4],
            camera_right: [1.0, 0.0, 0.0, 0.0],
            camera_up: [0.0, 1.0, 0.0, 0.0],
            tint: [0.0; 4],
            params: [0.0; 4],
        }
    }
}
