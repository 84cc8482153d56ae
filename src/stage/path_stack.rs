// src/stage/path_stack.rs
// Layered GPU memory holding one record per pixel per bounce depth.
// Layer sizing is padded so every layer starts at a valid storage-buffer
// offset; the padding, expressed in entries, is the layer stride shaders
// use for address computation.

use glam::UVec2;
use std::num::NonZeroU64;

use crate::math::{lcm, next_multiple};

/// One path-stack record: written by the ray passes, consumed by flatten.
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PathStackEntry {
    pub object_id: i32,
    pub material_id: i32,
    pub aux0: i32,
    pub aux1: i32,
    pub light_color: [f32; 4],
}

pub const ENTRY_SIZE: u64 = std::mem::size_of::<PathStackEntry>() as u64;

/// Pure layer-sizing computation, kept separate from the buffer so the
/// alignment invariant is testable without a device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PathStackLayout {
    /// Unpadded payload bytes of one layer.
    pub layer_data_size: u64,
    /// Padded byte size of one layer; always a multiple of
    /// `lcm(ssbo_alignment, ENTRY_SIZE)`.
    pub layer_size: u64,
    /// Padding entries appended to each layer.
    pub layer_stride: u32,
}

impl PathStackLayout {
    pub fn compute(extent: UVec2, ssbo_alignment: u64) -> Self {
        let alignment = lcm(ssbo_alignment, ENTRY_SIZE);
        let layer_data_size = extent.x as u64 * extent.y as u64 * ENTRY_SIZE;
        let layer_size = next_multiple(layer_data_size, alignment);
        let layer_stride = ((layer_size - layer_data_size) / ENTRY_SIZE) as u32;
        debug_assert_eq!(
            layer_size,
            layer_data_size + ENTRY_SIZE * layer_stride as u64
        );
        Self {
            layer_data_size,
            layer_size,
            layer_stride,
        }
    }

    /// Entries per layer including padding, the shader-side layer pitch.
    pub fn entries_per_layer(&self) -> u32 {
        (self.layer_size / ENTRY_SIZE) as u32
    }
}

/// The layered path-stack buffer. Reallocates only when the stack depth
/// (`max_ray_depth + 1`) or the pixel extent changes; contents persist
/// across the allocation check and are zeroed each frame by the dedicated
/// clear dispatch.
pub struct PathStack {
    buffer: Option<wgpu::Buffer>,
    depth: u32,
    extent: UVec2,
    layout: PathStackLayout,
    ssbo_alignment: u64,
}

impl PathStack {
    pub fn new(ssbo_alignment: u64) -> Self {
        Self {
            buffer: None,
            depth: 0,
            extent: UVec2::ZERO,
            layout: PathStackLayout {
                layer_data_size: 0,
                layer_size: 0,
                layer_stride: 0,
            },
            ssbo_alignment,
        }
    }

    /// Make sure the buffer covers `depth` layers of `extent` pixels.
    /// Returns whether a reallocation happened.
    pub fn ensure(&mut self, device: &wgpu::Device, depth: u32, extent: UVec2) -> bool {
        if self.buffer.is_some() && self.depth == depth && self.extent == extent {
            return false;
        }

        self.layout = PathStackLayout::compute(extent, self.ssbo_alignment);
        let size = depth as u64 * self.layout.layer_size;
        log::debug!(
            "path stack realloc: {} layers x {} px = {} bytes (stride {})",
            depth,
            extent.x * extent.y,
            size,
            self.layout.layer_stride
        );

        self.buffer = Some(device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("path-stack"),
            size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        }));
        self.depth = depth;
        self.extent = extent;
        true
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn extent(&self) -> UVec2 {
        self.extent
    }

    pub fn layout(&self) -> PathStackLayout {
        self.layout
    }

    /// Binding for one layer (`Some(i)` binds the byte range
    /// `[i * layer_size, layer_size)`) or the whole buffer (`None`, used
    /// by the clear and flatten passes).
    ///
    /// Panics if called before the first `ensure`; the dispatch sequence
    /// allocates before it binds.
    pub fn bind_layer(&self, layer: Option<u32>) -> wgpu::BindingResource<'_> {
        let buffer = self
            .buffer
            .as_ref()
            .expect("path stack bound before allocation");
        match layer {
            None => buffer.as_entire_binding(),
            Some(i) => wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer,
                offset: i as u64 * self.layout.layer_size,
                size: NonZeroU64::new(self.layout.layer_size),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_size_is_alignment_multiple() {
        for (w, h) in [(1u32, 1u32), (3, 5), (640, 480), (1920, 1080)] {
            let layout = PathStackLayout::compute(UVec2::new(w, h), 256);
            let alignment = lcm(256, ENTRY_SIZE);
            assert_eq!(layout.layer_size % alignment, 0);
            assert_eq!(
                layout.layer_size,
                layout.layer_data_size + ENTRY_SIZE * layout.layer_stride as u64
            );
        }
    }

    #[test]
    fn aligned_extent_needs_no_padding() {
        // 64 * 64 * 32 bytes is already a multiple of lcm(256, 32) = 256
        let layout = PathStackLayout::compute(UVec2::splat(64), 256);
        assert_eq!(layout.layer_stride, 0);
        assert_eq!(layout.layer_size, layout.layer_data_size);
    }

    #[test]
    fn recompute_is_deterministic() {
        let a = PathStackLayout::compute(UVec2::new(801, 601), 256);
        let b = PathStackLayout::compute(UVec2::new(801, 601), 256);
        assert_eq!(a, b);
    }
}
