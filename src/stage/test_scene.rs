// src/stage/test_scene.rs
// Built-in triangle test scene, bound whenever no geometry-traversal
// extension is supplied so the stage is runnable standalone.
// Cornell Box data: http://www.graphics.cornell.edu/online/box/data.html

use wgpu::util::DeviceExt;

/// Vertex positions, `w` unused. Indices 0-3 are the area light.
#[rustfmt::skip]
const VERTICES: [[f32; 4]; 28] = [
    // light
    [343.0, 448.8, 227.0, 0.0],
    [343.0, 548.8, 332.0, 0.0],
    [213.0, 548.8, 332.0, 0.0],
    [213.0, 548.8, 227.0, 0.0],
    // room
    [0.0, 0.0, 0.0, 0.0],
    [0.0, 0.0, 559.2, 0.0],
    [0.0, 548.8, 0.0, 0.0],
    [0.0, 548.8, 559.2, 0.0],
    [552.8, 0.0, 0.0, 0.0],
    [549.6, 0.0, 559.2, 0.0],
    [556.0, 548.8, 0.0, 0.0],
    [556.0, 548.8, 559.2, 0.0],
    // short block
    [290.0, 0.0, 114.0, 0.0],
    [290.0, 165.0, 114.0, 0.0],
    [240.0, 0.0, 272.0, 0.0],
    [240.0, 165.0, 272.0, 0.0],
    [82.0, 0.0, 225.0, 0.0],
    [82.0, 165.0, 225.0, 0.0],
    [130.0, 0.0, 65.0, 0.0],
    [130.0, 165.0, 65.0, 0.0],
    // tall block
    [423.0, 0.0, 247.0, 0.0],
    [423.0, 330.0, 247.0, 0.0],
    [472.0, 0.0, 406.0, 0.0],
    [472.0, 330.0, 406.0, 0.0],
    [314.0, 0.0, 456.0, 0.0],
    [314.0, 330.0, 456.0, 0.0],
    [265.0, 0.0, 296.0, 0.0],
    [265.0, 330.0, 296.0, 0.0],
];

/// Triangles as vertex index triples; `w` is the material id
/// (0 light, 1 white, 2 red, 3 green).
#[rustfmt::skip]
const INDICES: [[u32; 4]; 34] = [
    // light
    [0, 1, 2, 0], [0, 2, 3, 0],
    // ceiling
    [10, 11, 7, 1], [10, 7, 6, 1],
    // floor
    [8, 4, 5, 1], [8, 5, 9, 1],
    // front wall
    [10, 6, 4, 1], [10, 4, 8, 1],
    // back wall
    [9, 5, 7, 1], [9, 7, 11, 1],
    // right wall
    [5, 4, 6, 3], [5, 6, 7, 3],
    // left wall
    [8, 9, 11, 2], [8, 11, 10, 2],
    // short block
    [19, 17, 15, 1], [19, 15, 13, 1],
    [12, 13, 15, 1], [12, 15, 14, 1],
    [18, 19, 13, 1], [18, 13, 12, 1],
    [16, 17, 19, 1], [16, 19, 18, 1],
    [14, 15, 17, 1], [14, 17, 16, 1],
    // tall block
    [27, 25, 23, 1], [27, 23, 21, 1],
    [20, 21, 23, 1], [20, 23, 22, 1],
    [26, 27, 21, 1], [26, 21, 20, 1],
    [24, 25, 27, 1], [24, 27, 26, 1],
    [22, 23, 25, 1], [22, 25, 24, 1],
];

pub struct TestScene {
    pub vertices: wgpu::Buffer,
    pub indices: wgpu::Buffer,
}

impl TestScene {
    pub fn new(device: &wgpu::Device) -> Self {
        let vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("test-scene-vertices"),
            contents: bytemuck::cast_slice(&VERTICES),
            usage: wgpu::BufferUsages::STORAGE,
        });
        let indices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("test-scene-indices"),
            contents: bytemuck::cast_slice(&INDICES),
            usage: wgpu::BufferUsages::STORAGE,
        });
        Self { vertices, indices }
    }

    pub fn triangle_count() -> u32 {
        INDICES.len() as u32
    }
}
