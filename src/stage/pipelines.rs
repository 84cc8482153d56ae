// src/stage/pipelines.rs
// Compute pipelines and bind group layouts for the six dispatch phases.
// Shader sources come assembled from the catalog (extension markers
// already spliced); every program owns its own DispatchParams uniform so
// phases can be parameterized independently within a frame.

use crate::error::StageResult;
use crate::stage::shaders::{ExtensionRegistry, ShaderCatalog};
use crate::stage::targets::{COLOR_FORMAT, DEPTH_FORMAT, NORMAL_FORMAT};
use crate::stage::uniforms::DispatchParams;

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn storage_texture_entry(binding: u32, format: wgpu::TextureFormat) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::StorageTexture {
            access: wgpu::StorageTextureAccess::WriteOnly,
            format,
            view_dimension: wgpu::TextureViewDimension::D2,
        },
        count: None,
    }
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

/// One compiled compute program and its per-dispatch parameter buffer.
pub struct ComputeProgram {
    pub pipeline: wgpu::ComputePipeline,
    pub params: wgpu::Buffer,
}

pub struct StagePrograms {
    // shared bind group layouts
    pub globals: wgpu::BindGroupLayout,
    pub stack_rw: wgpu::BindGroupLayout,
    pub stack_ro: wgpu::BindGroupLayout,
    /// counter + output queue (first-order rays)
    pub rays_produce: wgpu::BindGroupLayout,
    /// counter + input queue + output queue (second-order rays)
    pub rays_transform: wgpu::BindGroupLayout,
    /// input queue only (shadow rays)
    pub rays_consume: wgpu::BindGroupLayout,
    /// normal + depth storage textures (first-order rays)
    pub gbuffer_out: wgpu::BindGroupLayout,
    /// per-frame color storage texture (flatten)
    pub per_frame_out: wgpu::BindGroupLayout,
    /// per-frame texture + accumulation buffer + color texture (aggregate)
    pub aggregate_io: wgpu::BindGroupLayout,
    /// test or host-supplied geometry buffers
    pub scene: wgpu::BindGroupLayout,

    pub clear_path_stack: ComputeProgram,
    pub first_order: ComputeProgram,
    pub second_order: ComputeProgram,
    pub shadow: ComputeProgram,
    pub flatten: ComputeProgram,
    pub aggregate: ComputeProgram,
}

impl StagePrograms {
    pub fn new(
        device: &wgpu::Device,
        catalog: &ShaderCatalog,
        extensions: &ExtensionRegistry,
    ) -> StageResult<Self> {
        let layout = |label: &str, entries: &[wgpu::BindGroupLayoutEntry]| {
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(label),
                entries,
            })
        };

        let globals = layout(
            "pt-globals-layout",
            &[
                uniform_entry(0),
                uniform_entry(1),
                storage_entry(2, true),
                storage_entry(3, true),
                storage_entry(4, true),
            ],
        );
        let stack_rw = layout("pt-stack-rw-layout", &[storage_entry(0, false)]);
        let stack_ro = layout("pt-stack-ro-layout", &[storage_entry(0, true)]);
        let rays_produce = layout(
            "pt-rays-produce-layout",
            &[storage_entry(0, false), storage_entry(1, false)],
        );
        let rays_transform = layout(
            "pt-rays-transform-layout",
            &[
                storage_entry(0, false),
                storage_entry(1, true),
                storage_entry(2, false),
            ],
        );
        let rays_consume = layout("pt-rays-consume-layout", &[storage_entry(0, true)]);
        let gbuffer_out = layout(
            "pt-gbuffer-layout",
            &[
                storage_texture_entry(0, NORMAL_FORMAT),
                storage_texture_entry(1, DEPTH_FORMAT),
            ],
        );
        let per_frame_out = layout(
            "pt-per-frame-layout",
            &[storage_texture_entry(0, COLOR_FORMAT)],
        );
        let aggregate_io = layout(
            "pt-aggregate-layout",
            &[
                texture_entry(0),
                storage_entry(1, false),
                storage_texture_entry(2, COLOR_FORMAT),
            ],
        );
        let scene = layout(
            "pt-scene-layout",
            &[storage_entry(0, true), storage_entry(1, true)],
        );

        let program = |name: &str, groups: &[&wgpu::BindGroupLayout]| -> StageResult<ComputeProgram> {
            let source = catalog.assemble(name, extensions)?;
            let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(name),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });
            let pipeline_layout =
                device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: Some(name),
                    bind_group_layouts: groups,
                    push_constant_ranges: &[],
                });
            let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(name),
                layout: Some(&pipeline_layout),
                module: &module,
                entry_point: "main",
            });
            let params = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("pt-dispatch-params"),
                size: std::mem::size_of::<DispatchParams>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            log::debug!("compiled compute program '{}'", name);
            Ok(ComputeProgram { pipeline, params })
        };

        let clear_path_stack = program("clearPathStack", &[&globals, &stack_rw])?;
        let first_order = program(
            "firstOrderRays",
            &[&globals, &stack_rw, &rays_produce, &gbuffer_out, &scene],
        )?;
        let second_order = program(
            "secondOrderRays",
            &[&globals, &stack_rw, &rays_transform, &scene],
        )?;
        let shadow = program("shadowRays", &[&globals, &stack_rw, &rays_consume, &scene])?;
        let flatten = program(
            "flattenPathStack",
            &[&globals, &stack_ro, &per_frame_out],
        )?;
        let aggregate = program("aggregateColors", &[&globals, &aggregate_io])?;

        Ok(Self {
            globals,
            stack_rw,
            stack_ro,
            rays_produce,
            rays_transform,
            rays_consume,
            gbuffer_out,
            per_frame_out,
            aggregate_io,
            scene,
            clear_path_stack,
            first_order,
            second_order,
            shadow,
            flatten,
            aggregate,
        })
    }
}
