// src/stage/mod.rs
//! Progressive path-tracing compute stage.
//!
//! One `process()` call renders one frame: collect input changes, decide
//! the frame phase, then run the fixed dispatch sequence (clear path
//! stack, first-order rays, shadow rays, the bounce loop, flatten,
//! aggregate). Every ray-producing dispatch goes through a blocking
//! counter readback so the next dispatch is sized to the compacted ray
//! count.

pub mod frame;
pub mod path_stack;
pub mod pipelines;
pub mod ray_queue;
pub mod shaders;
pub mod targets;
pub mod test_scene;
pub mod uniforms;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use glam::{UVec2, UVec3, Vec3};
use rand::seq::SliceRandom;
use rand::Rng;
use wgpu::util::DeviceExt;

use crate::error::StageResult;
use crate::gpu::storage_offset_alignment;
use crate::input::{CameraView, ChangeSet, Input, InputSlot, Perspective, ViewportRect};
use crate::math::{ceil_div, ray_dispatch_extent};
use crate::sampling::{coarse_sampling_order, upload_order};

use frame::{FrameControl, FramePhase};
use path_stack::PathStack;
use pipelines::{ComputeProgram, StagePrograms};
use ray_queue::RayQueues;
use shaders::{ExtensionKind, ExtensionRegistry, ShaderCatalog};
use targets::RenderTargets;
use test_scene::TestScene;
use uniforms::{mat3_columns, ray_matrix, DispatchParams, GlobalUniforms};

/// Compute workgroups are 16x16 across every program.
pub const WORKGROUP_SIZE: u32 = 16;

/// Entries in the random direction and index tables.
const RANDOM_TABLE_LEN: usize = 4096;

/// Host-side handles to the stage inputs. Clone the handles you need and
/// write through them; the stage picks the changes up on the next frame.
#[derive(Clone)]
pub struct StageInputs {
    pub viewport: Input<ViewportRect>,
    pub camera: Input<CameraView>,
    pub projection: Input<Perspective>,
    /// Side length W of the coarse sampling window, in pixels.
    pub coarse_window_size: Input<u32>,
    /// Accumulated frames before the stage freezes; negative = unlimited.
    pub frame_limit: Input<i32>,
    /// Maximum number of secondary bounces per path.
    pub max_ray_depth: Input<u32>,
}

impl Default for StageInputs {
    fn default() -> Self {
        Self {
            viewport: Input::default(),
            camera: Input::default(),
            projection: Input::default(),
            coarse_window_size: Input::new(1),
            frame_limit: Input::new(-1),
            max_ray_depth: Input::new(7),
        }
    }
}

struct StageSlots {
    viewport: InputSlot<ViewportRect>,
    camera: InputSlot<CameraView>,
    projection: InputSlot<Perspective>,
    coarse_window_size: InputSlot<u32>,
    frame_limit: InputSlot<i32>,
    max_ray_depth: InputSlot<u32>,
}

impl StageSlots {
    fn new(inputs: &StageInputs) -> Self {
        Self {
            viewport: InputSlot::new(&inputs.viewport),
            camera: InputSlot::new(&inputs.camera),
            projection: InputSlot::new(&inputs.projection),
            coarse_window_size: InputSlot::new(&inputs.coarse_window_size),
            frame_limit: InputSlot::new(&inputs.frame_limit),
            max_ray_depth: InputSlot::new(&inputs.max_ray_depth),
        }
    }

    fn collect(&mut self) -> ChangeSet {
        ChangeSet {
            viewport: self.viewport.take_changed(),
            camera: self.camera.take_changed(),
            projection: self.projection.take_changed(),
            coarse_window: self.coarse_window_size.take_changed(),
            frame_limit: self.frame_limit.take_changed(),
            max_depth: self.max_ray_depth.take_changed(),
        }
    }
}

pub struct StageConfig {
    /// Directory scanned for the six program sources and the
    /// `extension_templates/` stub directory.
    pub shader_root: PathBuf,
    pub extensions: ExtensionRegistry,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            shader_root: PathBuf::from("shaders/pathtracing"),
            extensions: ExtensionRegistry::new(),
        }
    }
}

pub struct PathTracingStage {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    slots: StageSlots,

    programs: StagePrograms,
    targets: RenderTargets,
    path_stack: PathStack,
    ray_queues: RayQueues,
    frame: FrameControl,

    globals: GlobalUniforms,
    globals_buffer: wgpu::Buffer,
    coarse_order: wgpu::Buffer,
    coarse_order_len: u32,
    random_vectors: wgpu::Buffer,
    random_indices: wgpu::Buffer,

    scene_vertices: wgpu::Buffer,
    scene_indices: wgpu::Buffer,

    started: Instant,
}

impl PathTracingStage {
    pub fn new(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        inputs: &StageInputs,
        config: StageConfig,
    ) -> StageResult<Self> {
        let catalog = ShaderCatalog::scan(&config.shader_root)?;
        let programs = StagePrograms::new(&device, &catalog, &config.extensions)?;

        if !config.extensions.has(ExtensionKind::GeometryTraversal) {
            log::info!(
                "no geometry traversal extension registered, tracing the built-in test scene ({} triangles)",
                TestScene::triangle_count()
            );
        }
        let test_scene = TestScene::new(&device);

        let targets = RenderTargets::new(&device);
        let path_stack = PathStack::new(storage_offset_alignment(&device));
        let ray_queues = RayQueues::new(&device);

        let globals = GlobalUniforms::default();
        let globals_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("pt-globals"),
            size: std::mem::size_of::<GlobalUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let order = coarse_sampling_order(inputs.coarse_window_size.get().max(1));
        let coarse_order_len = order.len() as u32;
        let coarse_order = upload_order(&device, &order);

        let mut rng = rand::thread_rng();
        let vectors: Vec<[f32; 4]> = (0..RANDOM_TABLE_LEN)
            .map(|_| random_unit_vector(&mut rng))
            .collect();
        let random_vectors = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("pt-random-vectors"),
            contents: bytemuck::cast_slice(&vectors),
            usage: wgpu::BufferUsages::STORAGE,
        });
        let mut indices: Vec<u32> = (0..RANDOM_TABLE_LEN as u32).collect();
        indices.shuffle(&mut rng);
        let random_indices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("pt-random-indices"),
            contents: bytemuck::cast_slice(&indices),
            usage: wgpu::BufferUsages::STORAGE,
        });

        Ok(Self {
            device,
            queue,
            slots: StageSlots::new(inputs),
            programs,
            targets,
            path_stack,
            ray_queues,
            frame: FrameControl::new(),
            globals,
            globals_buffer,
            coarse_order,
            coarse_order_len,
            random_vectors,
            random_indices,
            scene_vertices: test_scene.vertices,
            scene_indices: test_scene.indices,
            started: Instant::now(),
        })
    }

    /// Replace the built-in test geometry. `vertices` holds vec4
    /// positions, `indices` uvec4 triangles whose fourth component is the
    /// material id. Invalidates accumulated samples on the next frame via
    /// the host bumping any scene input.
    pub fn set_geometry(&mut self, vertices: wgpu::Buffer, indices: wgpu::Buffer) {
        self.scene_vertices = vertices;
        self.scene_indices = indices;
    }

    pub fn color_texture(&self) -> &wgpu::TextureView {
        &self.targets.color.view
    }

    pub fn normal_texture(&self) -> &wgpu::TextureView {
        &self.targets.normal.view
    }

    pub fn depth_texture(&self) -> &wgpu::TextureView {
        &self.targets.depth.view
    }

    pub fn frame_counter(&self) -> u32 {
        self.frame.counter()
    }

    /// Render one frame. Frozen frames return without touching the GPU.
    pub fn process(&mut self) -> StageResult<()> {
        let changes = self.slots.collect();

        if changes.viewport {
            let extent = self.slots.viewport.value().extent().max(UVec2::ONE);
            self.targets.resize(&self.device, extent);
        }
        if changes.coarse_window {
            let order = coarse_sampling_order(self.slots.coarse_window_size.value().max(1));
            self.coarse_order_len = order.len() as u32;
            self.coarse_order = upload_order(&self.device, &order);
        }

        let phase = self
            .frame
            .advance(changes.scene_changed(), self.slots.frame_limit.value());
        if phase == FramePhase::Frozen {
            return Ok(());
        }

        self.update_globals(&changes);
        self.render(phase)
    }

    fn update_globals(&mut self, changes: &ChangeSet) {
        if changes.camera || changes.projection {
            let camera = self.slots.camera.value();
            let projection = self.slots.projection.value();
            self.globals.eye = camera.eye.to_array();
            self.globals.center = camera.center.to_array();
            self.globals.up = camera.up.to_array();
            self.globals.fovy = projection.fovy;
            self.globals.aspect = projection.aspect;
            self.globals.z_near = projection.z_near;
            self.globals.z_far = projection.z_far;
            self.globals.ray_matrix = mat3_columns(ray_matrix(
                camera.eye,
                camera.center,
                camera.up,
                projection.fovy,
                projection.aspect,
            ));
        }

        let extent = self.targets.extent();
        self.globals.viewport_size = [extent.x as i32, extent.y as i32];
        self.globals.coarse_window_size = self.slots.coarse_window_size.value().max(1);
        self.globals.frame_counter = self.frame.counter();
        let mut rng = rand::thread_rng();
        self.globals.random_offset = jitter_offset(&mut rng);
        self.globals.time = self.started.elapsed().as_millis() as u32;

        self.queue
            .write_buffer(&self.globals_buffer, 0, bytemuck::bytes_of(&self.globals));
    }

    fn render(&mut self, phase: FramePhase) -> StageResult<()> {
        let extent = self.targets.extent();
        if phase == FramePhase::Reset {
            self.targets.clear(&self.queue);
        }

        let max_depth = self.slots.max_ray_depth.value();
        self.ray_queues.ensure(&self.device, extent.x * extent.y);
        self.path_stack.ensure(&self.device, max_depth + 1, extent);

        self.clear_path_stack();
        let mut num_rays = self.first_order_rays()?;
        self.shadow_rays(0, num_rays);

        let mut depth = 1;
        while depth <= max_depth && num_rays > 0 {
            num_rays = self.second_order_rays(depth, num_rays)?;
            self.shadow_rays(depth, num_rays);
            depth += 1;
        }

        // `depth` is now one past the deepest layer the loop populated
        self.flatten(depth);
        self.aggregate();
        Ok(())
    }

    fn write_params(
        &self,
        program: &ComputeProgram,
        num_rays: u32,
        stride: u32,
        depth: u32,
        layers: u32,
    ) {
        let extent = self.path_stack.extent();
        let params = DispatchParams {
            num_rays,
            stride,
            depth,
            num_stack_layers: layers,
            layer_size: extent.to_array(),
            layer_stride: self.path_stack.layout().layer_stride,
            _pad: 0,
        };
        self.queue
            .write_buffer(&program.params, 0, bytemuck::bytes_of(&params));
    }

    fn bind(
        &self,
        label: &str,
        layout: &wgpu::BindGroupLayout,
        resources: Vec<wgpu::BindingResource>,
    ) -> wgpu::BindGroup {
        let entries: Vec<wgpu::BindGroupEntry> = resources
            .into_iter()
            .enumerate()
            .map(|(i, resource)| wgpu::BindGroupEntry {
                binding: i as u32,
                resource,
            })
            .collect();
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &entries,
        })
    }

    fn globals_group(&self, program: &ComputeProgram) -> wgpu::BindGroup {
        self.bind(
            "pt-globals",
            &self.programs.globals,
            vec![
                self.globals_buffer.as_entire_binding(),
                program.params.as_entire_binding(),
                self.coarse_order.as_entire_binding(),
                self.random_vectors.as_entire_binding(),
                self.random_indices.as_entire_binding(),
            ],
        )
    }

    fn scene_group(&self) -> wgpu::BindGroup {
        self.bind(
            "pt-scene",
            &self.programs.scene,
            vec![
                self.scene_indices.as_entire_binding(),
                self.scene_vertices.as_entire_binding(),
            ],
        )
    }

    /// Record and submit one compute dispatch in its own command buffer.
    /// Each phase submits separately so the counter readbacks between
    /// phases see completed work.
    fn dispatch(
        &self,
        label: &str,
        pipeline: &wgpu::ComputePipeline,
        groups: &[wgpu::BindGroup],
        grid: UVec3,
    ) {
        if grid.x == 0 || grid.y == 0 {
            return;
        }
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(label),
                timestamp_writes: None,
            });
            pass.set_pipeline(pipeline);
            for (i, group) in groups.iter().enumerate() {
                pass.set_bind_group(i as u32, group, &[]);
            }
            pass.dispatch_workgroups(grid.x, grid.y, grid.z);
        }
        self.queue.submit(Some(encoder.finish()));
    }

    fn clear_path_stack(&self) {
        let program = &self.programs.clear_path_stack;
        let total = self.path_stack.depth() * self.path_stack.layout().entries_per_layer();
        let (grid, stride) = ray_dispatch_extent(total, WORKGROUP_SIZE);
        self.write_params(program, total, stride, 0, self.path_stack.depth());
        let groups = [
            self.globals_group(program),
            self.bind(
                "pt-stack-all",
                &self.programs.stack_rw,
                vec![self.path_stack.bind_layer(None)],
            ),
        ];
        self.dispatch("clearPathStack", &program.pipeline, &groups, grid);
    }

    /// Trace one primary ray per coarse window and read back how many
    /// secondary rays the pass emitted.
    fn first_order_rays(&mut self) -> StageResult<u32> {
        let program = &self.programs.first_order;
        let extent = self.targets.extent();
        let window = self.globals.coarse_window_size;
        let cells = UVec2::new(ceil_div(extent.x, window), ceil_div(extent.y, window));
        let grid = UVec3::new(
            ceil_div(cells.x, WORKGROUP_SIZE),
            ceil_div(cells.y, WORKGROUP_SIZE),
            1,
        );
        self.write_params(program, self.coarse_order_len, 0, 0, self.path_stack.depth());
        self.ray_queues.reset_counter(&self.queue);
        let groups = [
            self.globals_group(program),
            self.bind(
                "pt-stack-layer0",
                &self.programs.stack_rw,
                vec![self.path_stack.bind_layer(Some(0))],
            ),
            self.bind(
                "pt-rays-out",
                &self.programs.rays_produce,
                vec![
                    self.ray_queues.counter().as_entire_binding(),
                    self.ray_queues.output_buffer().as_entire_binding(),
                ],
            ),
            self.bind(
                "pt-gbuffer",
                &self.programs.gbuffer_out,
                vec![
                    wgpu::BindingResource::TextureView(&self.targets.normal.view),
                    wgpu::BindingResource::TextureView(&self.targets.depth.view),
                ],
            ),
            self.scene_group(),
        ];
        self.dispatch("firstOrderRays", &program.pipeline, &groups, grid);

        let count = self.ray_queues.read_counter(&self.device, &self.queue)?;
        self.ray_queues.swap();
        log::trace!("first-order rays emitted {}", count);
        Ok(count)
    }

    /// Consume `num_rays` rays at `depth`, scatter survivors into the
    /// other queue, and read back the survivor count.
    fn second_order_rays(&mut self, depth: u32, num_rays: u32) -> StageResult<u32> {
        let program = &self.programs.second_order;
        let (grid, stride) = ray_dispatch_extent(num_rays, WORKGROUP_SIZE);
        self.write_params(program, num_rays, stride, depth, self.path_stack.depth());
        self.ray_queues.reset_counter(&self.queue);
        let groups = [
            self.globals_group(program),
            self.bind(
                "pt-stack-layer",
                &self.programs.stack_rw,
                vec![self.path_stack.bind_layer(Some(depth))],
            ),
            self.bind(
                "pt-rays-io",
                &self.programs.rays_transform,
                vec![
                    self.ray_queues.counter().as_entire_binding(),
                    self.ray_queues.input_buffer().as_entire_binding(),
                    self.ray_queues.output_buffer().as_entire_binding(),
                ],
            ),
            self.scene_group(),
        ];
        self.dispatch("secondOrderRays", &program.pipeline, &groups, grid);

        let count = self.ray_queues.read_counter(&self.device, &self.queue)?;
        self.ray_queues.swap();
        log::trace!("second-order rays at depth {}: {}", depth, count);
        Ok(count)
    }

    /// Cast one shadow ray per queued ray, writing direct light into the
    /// stack layer at `depth`. Skipped entirely when the queue is empty.
    fn shadow_rays(&self, depth: u32, num_rays: u32) {
        if num_rays == 0 {
            return;
        }
        let program = &self.programs.shadow;
        let (grid, stride) = ray_dispatch_extent(num_rays, WORKGROUP_SIZE);
        self.write_params(program, num_rays, stride, depth, self.path_stack.depth());
        let groups = [
            self.globals_group(program),
            self.bind(
                "pt-stack-layer",
                &self.programs.stack_rw,
                vec![self.path_stack.bind_layer(Some(depth))],
            ),
            self.bind(
                "pt-rays-in",
                &self.programs.rays_consume,
                vec![self.ray_queues.input_buffer().as_entire_binding()],
            ),
            self.scene_group(),
        ];
        self.dispatch("shadowRays", &program.pipeline, &groups, grid);
    }

    /// Collapse the populated stack layers of every pixel into the
    /// per-frame color texture. `layers` is the depth the bounce loop
    /// actually reached, not the allocated stack depth.
    fn flatten(&self, layers: u32) {
        let program = &self.programs.flatten;
        let extent = self.targets.extent();
        let grid = UVec3::new(
            ceil_div(extent.x, WORKGROUP_SIZE),
            ceil_div(extent.y, WORKGROUP_SIZE),
            1,
        );
        self.write_params(program, extent.x * extent.y, extent.x, 0, layers);
        let groups = [
            self.globals_group(program),
            self.bind(
                "pt-stack-ro",
                &self.programs.stack_ro,
                vec![self.path_stack.bind_layer(None)],
            ),
            self.bind(
                "pt-per-frame",
                &self.programs.per_frame_out,
                vec![wgpu::BindingResource::TextureView(
                    &self.targets.color_per_frame.view,
                )],
            ),
        ];
        self.dispatch("flattenPathStack", &program.pipeline, &groups, grid);
    }

    /// Fold the per-frame color into the running average and publish it
    /// to the color texture.
    fn aggregate(&self) {
        let program = &self.programs.aggregate;
        let extent = self.targets.extent();
        let grid = UVec3::new(
            ceil_div(extent.x, WORKGROUP_SIZE),
            ceil_div(extent.y, WORKGROUP_SIZE),
            1,
        );
        self.write_params(program, extent.x * extent.y, extent.x, 0, self.path_stack.depth());
        let groups = [
            self.globals_group(program),
            self.bind(
                "pt-aggregate",
                &self.programs.aggregate_io,
                vec![
                    wgpu::BindingResource::TextureView(&self.targets.color_per_frame.view),
                    self.targets.accum.as_entire_binding(),
                    wgpu::BindingResource::TextureView(&self.targets.color.view),
                ],
            ),
        ];
        self.dispatch("aggregateColors", &program.pipeline, &groups, grid);
    }
}

/// Sub-pixel jitter for primary rays, one sample in `[-1, 1]^2` per frame.
fn jitter_offset<R: Rng>(rng: &mut R) -> [f32; 2] {
    [rng.gen_range(-1.0f32..1.0), rng.gen_range(-1.0f32..1.0)]
}

fn random_unit_vector<R: Rng>(rng: &mut R) -> [f32; 4] {
    loop {
        let v = Vec3::new(
            rng.gen_range(-1.0f32..1.0),
            rng.gen_range(-1.0f32..1.0),
            rng.gen_range(-1.0f32..1.0),
        );
        let len_sq = v.length_squared();
        if len_sq > 1e-4 && len_sq <= 1.0 {
            let v = v / len_sq.sqrt();
            return [v.x, v.y, v.z, 0.0];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jitter_covers_the_signed_unit_square() {
        let mut rng = rand::thread_rng();
        let mut saw_negative = [false; 2];
        for _ in 0..4096 {
            let offset = jitter_offset(&mut rng);
            for axis in 0..2 {
                assert!((-1.0..1.0).contains(&offset[axis]));
                saw_negative[axis] |= offset[axis] < 0.0;
            }
        }
        assert!(saw_negative[0] && saw_negative[1]);
    }

    #[test]
    fn random_vectors_are_unit_length() {
        let mut rng = rand::thread_rng();
        for _ in 0..256 {
            let v = random_unit_vector(&mut rng);
            let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
            assert!((len - 1.0).abs() < 1e-4);
            assert_eq!(v[3], 0.0);
        }
    }
}
