// src/sampling.rs
// Coarse-to-fine sampling scheduler.
//
// During the coarse phase every sampling window of W x W pixels shares one
// traced sample per frame. The schedule below decides which pixel inside
// the window is traced on which frame: the window's origin first, then the
// origins of its quad-tree subdivisions, so the image refines evenly from
// one sample per window to one sample per pixel. The emitted order is the
// literal refinement sequence consumed by the first-order-ray kernel.

use glam::UVec2;
use std::collections::VecDeque;
use wgpu::util::DeviceExt;

/// A block of screen pixels sharing one traced sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CoarseWindow {
    /// Minimal pixel coordinate of the window.
    pub origin: UVec2,
    /// Window extent, clamped to the actual W x W region.
    pub size: UVec2,
}

/// GPU mirror of [`CoarseWindow`], std430 layout.
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CoarseWindowGpu {
    pub origin: [u32; 2],
    pub size: [u32; 2],
}

impl From<CoarseWindow> for CoarseWindowGpu {
    fn from(w: CoarseWindow) -> Self {
        Self {
            origin: w.origin.to_array(),
            size: w.size.to_array(),
        }
    }
}

/// Build the pixel-refinement order for a W x W sampling window.
///
/// W is rounded up to the next power of two P and a P x P block is
/// subdivided level by level; the four half-size sub-blocks are visited in
/// the fixed order top-left, bottom-right, top-right, bottom-left. Blocks
/// whose origin falls outside the actual W x W region are discarded and
/// never expanded; kept window sizes are clamped to the region. Each pixel
/// origin is emitted at its first (shallowest) appearance only, so the
/// result holds exactly W*W windows.
///
/// A zero window size is out of contract and not validated here.
pub fn coarse_sampling_order(window_size: u32) -> Vec<CoarseWindow> {
    let w = window_size;
    let pot = w.next_power_of_two();

    let mut order = Vec::with_capacity((w * w) as usize);
    let mut seen = vec![false; (w * w) as usize];

    // Level-order worklist instead of the obvious recursion: FIFO
    // processing reproduces the breadth-first-by-depth traversal while
    // keeping the stack flat.
    let mut worklist = VecDeque::new();
    worklist.push_back((pot, UVec2::ZERO));

    while let Some((size, origin)) = worklist.pop_front() {
        // virtual pixels of the power-of-two expansion
        if origin.x >= w || origin.y >= w {
            continue;
        }

        let clamped = UVec2::new((origin.x + size).min(w), (origin.y + size).min(w)) - origin;
        let idx = (origin.y * w + origin.x) as usize;
        if !seen[idx] {
            seen[idx] = true;
            order.push(CoarseWindow {
                origin,
                size: clamped,
            });
        }

        let half = size / 2;
        if half == 0 {
            continue;
        }

        worklist.push_back((half, origin));
        worklist.push_back((half, origin + UVec2::splat(half)));
        worklist.push_back((half, origin + UVec2::new(half, 0)));
        worklist.push_back((half, origin + UVec2::new(0, half)));
    }

    debug_assert_eq!(order.len(), (w * w) as usize);
    order
}

/// Upload a refinement order as a read-only storage buffer.
pub fn upload_order(device: &wgpu::Device, order: &[CoarseWindow]) -> wgpu::Buffer {
    let gpu: Vec<CoarseWindowGpu> = order.iter().copied().map(Into::into).collect();
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("coarse-pixel-order"),
        contents: bytemuck::cast_slice(&gpu),
        usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_pixel_window() {
        let order = coarse_sampling_order(1);
        assert_eq!(
            order,
            vec![CoarseWindow {
                origin: UVec2::ZERO,
                size: UVec2::ONE,
            }]
        );
    }

    #[test]
    fn first_entry_is_always_the_window_origin() {
        for w in 1..=64 {
            let order = coarse_sampling_order(w);
            assert_eq!(order[0].origin, UVec2::ZERO);
            assert_eq!(order[0].size, UVec2::splat(w));
        }
    }

    #[test]
    fn refinement_order_for_w4() {
        let origins: Vec<[u32; 2]> = coarse_sampling_order(4)
            .iter()
            .map(|w| w.origin.to_array())
            .collect();
        assert_eq!(
            origins,
            vec![
                [0, 0],
                [2, 2],
                [2, 0],
                [0, 2],
                [1, 1],
                [1, 0],
                [0, 1],
                [3, 3],
                [3, 2],
                [2, 3],
                [3, 1],
                [3, 0],
                [2, 1],
                [1, 3],
                [1, 2],
                [0, 3],
            ]
        );
    }
}
