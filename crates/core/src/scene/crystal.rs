use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use super::CrystalPlacement;

const ACTIVE_SCALE: f32 = 1.6;
const IDLE_EMISSIVE: f32 = 0.45;
const ACTIVE_EMISSIVE: f32 = 1.5;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CrystalVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CrystalInstance {
    pub position: [f32; 3],
    pub scale: f32,
    pub color: [f32; 3],
    pub emissive: f32,
}

impl CrystalInstance {
    pub fn from_placement(placement: &CrystalPlacement, size: f32, active: bool) -> Self {
        let (scale, emissive) = if active {
            (size * ACTIVE_SCALE, ACTIVE_EMISSIVE)
        } else {
            (size, IDLE_EMISSIVE)
        };
        Self {
            position: placement.position.to_array(),
            scale,
            color: placement.color,
            emissive,
        }
    }
}

/// Flat-shaded elongated octahedron, 8 faces, non-indexed.
pub fn crystal_vertices() -> Vec<CrystalVertex> {
    let top = Vec3::new(0.0, 1.6, 0.0);
    let bottom = Vec3::new(0.0, -1.6, 0.0);
    let ring = [
        Vec3::new(1.0, 0.0, 0.0),
        Vec3::new(0.0, 0.0, -1.0),
        Vec3::new(-1.0, 0.0, 0.0),
        Vec3::new(0.0, 0.0, 1.0),
    ];

    let mut vertices = Vec::with_capacity(24);
    for i in 0..ring.len() {
        let a = ring[i];
        let b = ring[(i + 1) % ring.len()];
        for [p0, p1, p2] in [[top, a, b], [bottom, b, a]] {
            let normal = (p1 - p0).cross(p2 - p0).normalize();
            for p in [p0, p1, p2] {
                vertices.push(CrystalVertex {
                    position: p.to_array(),
                    normal: normal.to_array(),
                });
            }
        }
    }
    vertices
}

pub const CRYSTAL_SHADER: &str = r#"
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
    @location(0) normal: vec3<f32>,
    @location(1) color: vec3<f32>,
    @location(2) emissive: f32,
    @location(3) world: vec3<f32>,
};

@vertex
fn vs_main(
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) instance_position_scale: vec4<f32>,
    @location(3) instance_color_emissive: vec4<f32>,
) -> VsOut {
    let spin = frame.params.x * 0.6 + instance_position_scale.z * 0.1;
    let c = cos(spin);
    let s = sin(spin);
    let rotated = vec3<f32>(c * position.x + s * position.z, position.y, -s * position.x + c * position.z);
    let rotated_normal = vec3<f32>(c * normal.x + s * normal.z, normal.y, -s * normal.x + c * normal.z);
    let world = instance_position_scale.xyz + rotated * instance_position_scale.w;

    var out: VsOut;
    out.clip = frame.view_proj * vec4<f32>(world, 1.0);
    out.normal = rotated_normal;
    out.color = instance_color_emissive.rgb;
    out.emissive = instance_color_emissive.w;
    out.world = world;
    return out;
}

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4<f32> {
    let to_camera = normalize(frame.camera_position.xyz - in.world);
    let n = normalize(in.normal);
    let diffuse = max(dot(n, normalize(vec3<f32>(0.3, 0.8, 0.5))), 0.0);
    let rim = pow(1.0 - max(dot(n, to_camera), 0.0), 2.0);
    let color = in.color * (0.25 + 0.6 * diffuse) + in.color * in.emissive * (0.5 + rim);
    return vec4<f32>(color, 1.0);
}
"#;
