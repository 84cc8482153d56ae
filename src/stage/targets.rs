// src/stage/targets.rs
// Render-target set: accumulated color, transient per-frame color, normal
// and depth. Resized only on viewport change; cleared on any
// scene-affecting change. Color targets clear to opaque white, normal and
// depth to zero. The accumulation working state lives in a storage buffer
// (vec4 per pixel); the color texture is the presented copy the aggregate
// pass rewrites every non-frozen frame.

use glam::UVec2;

pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;
pub const NORMAL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Float;

pub struct Target {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

impl Target {
    fn new(device: &wgpu::Device, label: &str, extent: UVec2, format: wgpu::TextureFormat) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: extent.x,
                height: extent.y,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&Default::default());
        Self { texture, view }
    }
}

pub struct RenderTargets {
    pub color: Target,
    pub color_per_frame: Target,
    pub normal: Target,
    pub depth: Target,
    pub accum: wgpu::Buffer,
    extent: UVec2,
    // cached clear rows, rebuilt on resize
    white_rgba32f: Vec<u8>,
    zero_rgba8: Vec<u8>,
    zero_r32f: Vec<u8>,
}

impl RenderTargets {
    pub fn new(device: &wgpu::Device) -> Self {
        Self::with_extent(device, UVec2::ONE)
    }

    fn with_extent(device: &wgpu::Device, extent: UVec2) -> Self {
        let pixel_count = extent.x as u64 * extent.y as u64;
        let accum = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("color-accumulation"),
            size: pixel_count * 16,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let white: [f32; 4] = [1.0, 1.0, 1.0, 1.0];
        let white_rgba32f = bytemuck::bytes_of(&white).repeat(pixel_count as usize);

        Self {
            color: Target::new(device, "color-texture", extent, COLOR_FORMAT),
            color_per_frame: Target::new(device, "color-per-frame-texture", extent, COLOR_FORMAT),
            normal: Target::new(device, "normal-texture", extent, NORMAL_FORMAT),
            depth: Target::new(device, "depth-texture", extent, DEPTH_FORMAT),
            accum,
            extent,
            white_rgba32f,
            zero_rgba8: vec![0u8; pixel_count as usize * 4],
            zero_r32f: vec![0u8; pixel_count as usize * 4],
        }
    }

    pub fn extent(&self) -> UVec2 {
        self.extent
    }

    /// Recreate all targets at the new viewport extent.
    pub fn resize(&mut self, device: &wgpu::Device, extent: UVec2) {
        if extent == self.extent {
            return;
        }
        log::debug!("render targets resize: {}x{}", extent.x, extent.y);
        *self = Self::with_extent(device, extent);
    }

    /// Full clear of every accumulation target, issued before tracing
    /// whenever the scene changed.
    pub fn clear(&self, queue: &wgpu::Queue) {
        self.write_full(queue, &self.color, &self.white_rgba32f, 16);
        self.write_full(queue, &self.color_per_frame, &self.white_rgba32f, 16);
        self.write_full(queue, &self.normal, &self.zero_rgba8, 4);
        self.write_full(queue, &self.depth, &self.zero_r32f, 4);
        queue.write_buffer(&self.accum, 0, &self.white_rgba32f);
    }

    fn write_full(&self, queue: &wgpu::Queue, target: &Target, data: &[u8], bpp: u32) {
        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &target.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(self.extent.x * bpp),
                rows_per_image: Some(self.extent.y),
            },
            wgpu::Extent3d {
                width: self.extent.x,
                height: self.extent.y,
                depth_or_array_layers: 1,
            },
        );
    }
}
