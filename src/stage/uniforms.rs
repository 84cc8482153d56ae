// src/stage/uniforms.rs
// CPU mirrors of the WGSL uniform blocks shared by the six compute
// programs, plus the ray-matrix derivation first-order rays use to turn
// normalized pixel coordinates into world-space directions.

use glam::{Mat3, Vec3};

/// Per-frame globals, matching the WGSL `Globals` block (128 bytes).
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GlobalUniforms {
    pub eye: [f32; 3],
    pub fovy: f32,
    pub center: [f32; 3],
    pub aspect: f32,
    pub up: [f32; 3],
    pub z_near: f32,
    /// Column-major mat3x3, columns padded to vec4 stride.
    pub ray_matrix: [[f32; 4]; 3],
    pub viewport_size: [i32; 2],
    pub coarse_window_size: u32,
    pub frame_counter: u32,
    pub random_offset: [f32; 2],
    pub time: u32,
    pub z_far: f32,
}

impl Default for GlobalUniforms {
    fn default() -> Self {
        bytemuck::Zeroable::zeroed()
    }
}

/// Per-dispatch parameters, matching the WGSL `DispatchParams` block.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DispatchParams {
    pub num_rays: u32,
    pub stride: u32,
    pub depth: u32,
    pub num_stack_layers: u32,
    pub layer_size: [u32; 2],
    pub layer_stride: u32,
    pub _pad: u32,
}

/// Camera basis scaled by field of view and aspect ratio. Multiplying a
/// vector `(u, v, 1)` with `u, v` in `[-1, 1]` yields an unnormalized
/// primary-ray direction through that screen position.
pub fn ray_matrix(eye: Vec3, center: Vec3, up: Vec3, fovy: f32, aspect: f32) -> Mat3 {
    let eye_dir = (center - eye).normalize();
    let side = eye_dir.cross(up).normalize();
    let new_up = side.cross(eye_dir).normalize();

    let l = 1.0f32;
    let h = 2.0 * l * (fovy / 2.0).tan();
    let w = h * aspect;

    Mat3::from_cols(side * w / 2.0, new_up * h / 2.0, eye_dir * l)
}

/// Pad a mat3 into the vec4-stride column layout uniform blocks use.
pub fn mat3_columns(m: Mat3) -> [[f32; 4]; 3] {
    [
        [m.x_axis.x, m.x_axis.y, m.x_axis.z, 0.0],
        [m.y_axis.x, m.y_axis.y, m.y_axis.z, 0.0],
        [m.z_axis.x, m.z_axis.y, m.z_axis.z, 0.0],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_block_sizes() {
        assert_eq!(std::mem::size_of::<GlobalUniforms>(), 128);
        assert_eq!(std::mem::size_of::<DispatchParams>(), 32);
    }

    #[test]
    fn ray_matrix_basis() {
        let m = ray_matrix(
            Vec3::new(0.0, 0.0, 2.0),
            Vec3::ZERO,
            Vec3::Y,
            std::f32::consts::FRAC_PI_2,
            2.0,
        );
        // forward column is unit length, side/up columns carry the
        // half-width and half-height scaling
        assert!((m.z_axis.length() - 1.0).abs() < 1e-6);
        let half_h = (std::f32::consts::FRAC_PI_2 / 2.0).tan();
        assert!((m.y_axis.length() - half_h).abs() < 1e-5);
        assert!((m.x_axis.length() - 2.0 * half_h).abs() < 1e-5);
        // orthogonal basis
        assert!(m.x_axis.dot(m.y_axis).abs() < 1e-6);
        assert!(m.x_axis.dot(m.z_axis).abs() < 1e-6);
    }
}
