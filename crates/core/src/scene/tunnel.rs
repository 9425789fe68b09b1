use std::f32::consts::TAU;

use bytemuck::{Pod, Zeroable};

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct TunnelVertex {
    pub position: [f32; 3],
    /// u: around the circumference in [0, 1], v: along the length in [0, 1].
    pub uv: [f32; 2],
}

/// Open cylinder around the z axis, from `z_start` to `z_start - length`.
/// Built once per mount and drawn without culling.
#[derive(Debug, Clone, PartialEq)]
pub struct TunnelMesh {
    pub vertices: Vec<TunnelVertex>,
    pub indices: Vec<u32>,
    pub radius: f32,
    pub length: f32,
}

impl TunnelMesh {
    pub fn cylinder(radius: f32, z_start: f32, length: f32, radial: u32, segments: u32) -> Self {
        let radial = radial.max(3);
        let segments = segments.max(1);

        let mut vertices = Vec::with_capacity(((radial + 1) * (segments + 1)) as usize);
        for ring in 0..=segments {
            let v = ring as f32 / segments as f32;
            let z = z_start - v * length;
            for step in 0..=radial {
                let u = step as f32 / radial as f32;
                let angle = u * TAU;
                vertices.push(TunnelVertex {
                    position: [radius * angle.cos(), radius * angle.sin(), z],
                    uv: [u, v],
                });
            }
        }

        let stride = radial + 1;
        let mut indices = Vec::with_capacity((radial * segments * 6) as usize);
        for ring in 0..segments {
            for step in 0..radial {
                let a = ring * stride + step;
                let b = a + stride;
                indices.extend_from_slice(&[a, a + 1, b, b, a + 1, b + 1]);
            }
        }

        Self {
            vertices,
            indices,
            radius,
            length,
        }
    }
}

pub const TUNNEL_SHADER: &str = r#"
struct Frame {
    view_proj: mat4x4<f32>,
    camera_position: vec4<f32>,
    camera_right: vec4<f32>,
    camera_up: vec4<f32>,
    tint: vec4<f32>,
    params: vec4<f32>,
};

@group(0) @binding(0) var<uniform> frame: Frame;

struct VsOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) uv: vec2<f32>,
    @location(1) world: vec3<f32>,
};

@vertex
fn vs_main(@location(0) position: vec3<f32>, @location(1) uv: vec2<f32>) -> VsOut {
    var out: VsOut;
    out.clip = frame.view_proj * vec4<f32>(position, 1.0);
    out.uv = uv;
    out.world = position;
    return out;
}

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4<f32> {
    let time = frame.params.x;
    let tunnel_length = max(frame.params.z, 1.0);
    let along = in.uv.y * tunnel_length;

    let bands = 0.5 + 0.5 * sin(along * 0.9 - time * 2.2 + sin(in.uv.x * 6.2831 * 3.0) * 0.6);
    let fine = 0.5 + 0.5 * sin(in.uv.x * 6.2831 * 24.0 + time * 0.4);
    let distance_to_camera = abs(in.world.z - frame.camera_position.z);
    let glow = exp(-distance_to_camera * 0.08);

    let base = vec3<f32>(0.02, 0.025, 0.06);
    let band_color = vec3<f32>(0.12, 0.16, 0.32) * pow(bands, 3.0) + vec3<f32>(0.03) * fine;
    var color = base + band_color + vec3<f32>(0.25, 0.3, 0.5) * glow * 0.4;
    color = mix(color, color + frame.tint.rgb * (0.35 + 0.4 * bands), frame.tint.a);

    let fog = exp(-distance_to_camera * 0.02);
    return vec4<f32>(color * fog, 1.0);
}
"#;
