// src/stage/ray_queue.rs
// Ping-pong ray queues driven by a single GPU atomic counter.
//
// Both buffers hold one slot per screen pixel, the worst case a
// well-behaved extension can produce (at most one second-order ray per
// invocation), so overflow cannot occur and is not runtime-checked. The
// counter is reset before each producing dispatch and read back
// synchronously afterwards; the read value becomes the next phase's queue
// length, then input/output roles swap.

use crate::error::{StageError, StageResult};

/// One queued ray. Matches the WGSL `RayRecord` std430 layout (64 bytes);
/// `color` carries the first-order color through for diagnostics.
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct RayRecord {
    pub pixel: [i32; 2],
    pub _pad0: [f32; 2],
    pub origin: [f32; 3],
    pub _pad1: f32,
    pub direction: [f32; 3],
    pub _pad2: f32,
    pub color: [f32; 4],
}

pub const RAY_RECORD_SIZE: u64 = std::mem::size_of::<RayRecord>() as u64;

pub struct RayQueues {
    buffers: Option<[wgpu::Buffer; 2]>,
    capacity: u32,
    output_index: usize,
    counter: wgpu::Buffer,
    counter_staging: wgpu::Buffer,
}

impl RayQueues {
    pub fn new(device: &wgpu::Device) -> Self {
        let counter = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("ray-counter"),
            size: 4,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let counter_staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("ray-counter-staging"),
            size: 4,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Self {
            buffers: None,
            capacity: 0,
            output_index: 0,
            counter,
            counter_staging,
        }
    }

    /// Size both queues for one ray slot per pixel. Reallocates only when
    /// the pixel count changes, never per frame.
    pub fn ensure(&mut self, device: &wgpu::Device, pixel_count: u32) -> bool {
        if self.buffers.is_some() && self.capacity == pixel_count {
            return false;
        }

        let size = pixel_count as u64 * RAY_RECORD_SIZE;
        log::debug!("ray queue realloc: 2 x {} rays ({} bytes each)", pixel_count, size);
        let make = |label: &str| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };
        self.buffers = Some([make("ray-queue-0"), make("ray-queue-1")]);
        self.capacity = pixel_count;
        self.output_index = 0;
        true
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn output_buffer(&self) -> &wgpu::Buffer {
        &self.buffers.as_ref().expect("ray queues bound before allocation")[self.output_index]
    }

    pub fn input_buffer(&self) -> &wgpu::Buffer {
        &self.buffers.as_ref().expect("ray queues bound before allocation")
            [(self.output_index + 1) % 2]
    }

    /// Swap producer/consumer roles; called after every producing phase.
    pub fn swap(&mut self) {
        self.output_index = (self.output_index + 1) % 2;
    }

    pub fn counter(&self) -> &wgpu::Buffer {
        &self.counter
    }

    pub fn reset_counter(&self, queue: &wgpu::Queue) {
        queue.write_buffer(&self.counter, 0, bytemuck::bytes_of(&0u32));
    }

    /// Blocking GPU->CPU round-trip for the emitted ray count. This is the
    /// one deliberate synchronization point of the dispatch sequence: the
    /// count decides the next phase's work-group geometry, so the driving
    /// thread waits for it.
    pub fn read_counter(&self, device: &wgpu::Device, queue: &wgpu::Queue) -> StageResult<u32> {
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("ray-counter-readback"),
        });
        encoder.copy_buffer_to_buffer(&self.counter, 0, &self.counter_staging, 0, 4);
        queue.submit(Some(encoder.finish()));

        let slice = self.counter_staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|_| StageError::readback("counter map callback dropped"))?
            .map_err(|e| StageError::readback(e))?;

        let count = {
            let view = slice.get_mapped_range();
            let mut bytes = [0u8; 4];
            bytes.copy_from_slice(&view[..4]);
            u32::from_le_bytes(bytes)
        };
        self.counter_staging.unmap();
        Ok(count)
    }
}
