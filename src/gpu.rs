use once_cell::sync::OnceCell;
use std::sync::Arc;

/// Shared device/queue context for hosts that do not bring their own.
pub struct GpuContext {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    pub adapter: wgpu::Adapter,
}

static CTX: OnceCell<GpuContext> = OnceCell::new();

pub fn ctx() -> &'static GpuContext {
    CTX.get_or_init(|| {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .expect("No suitable GPU adapter");

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits {
                    // the stage's firstOrderRays pipeline binds groups 0-4
                    max_bind_groups: 5,
                    ..wgpu::Limits::downlevel_defaults()
                },
                label: Some("glint-device"),
            },
            None,
        ))
        .expect("request_device failed");

        GpuContext {
            device: Arc::new(device),
            queue: Arc::new(queue),
            adapter,
        }
    })
}

/// Storage-buffer offset alignment the path stack layer layout must honor.
#[inline]
pub fn storage_offset_alignment(device: &wgpu::Device) -> u64 {
    device.limits().min_storage_buffer_offset_alignment as u64
}
