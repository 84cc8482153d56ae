// src/input.rs
// Change-detecting input layer: versioned values shared between the host
// pipeline and the stage, observed through slots that consume a "changed
// since last read" flag once per frame.

use glam::{UVec2, Vec3};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Viewport rectangle in window coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ViewportRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl ViewportRect {
    pub fn extent(&self) -> UVec2 {
        UVec2::new(self.width, self.height)
    }
}

impl Default for ViewportRect {
    fn default() -> Self {
        Self {
            x: 0,
            y: 0,
            width: 1,
            height: 1,
        }
    }
}

/// Look-at camera pose.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraView {
    pub eye: Vec3,
    pub center: Vec3,
    pub up: Vec3,
}

impl Default for CameraView {
    fn default() -> Self {
        Self {
            eye: Vec3::new(0.0, 0.0, 2.0),
            center: Vec3::ZERO,
            up: Vec3::Y,
        }
    }
}

/// Perspective projection parameters. `fovy` is the vertical field of
/// view in radians.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Perspective {
    pub fovy: f32,
    pub aspect: f32,
    pub z_near: f32,
    pub z_far: f32,
}

impl Default for Perspective {
    fn default() -> Self {
        Self {
            fovy: std::f32::consts::FRAC_PI_4,
            aspect: 1.0,
            z_near: 0.1,
            z_far: 1000.0,
        }
    }
}

struct InputCell<T> {
    value: RwLock<T>,
    version: AtomicU64,
}

/// A shared input value carrying a version counter. The host keeps one
/// handle and writes through it; the stage observes it through an
/// [`InputSlot`].
pub struct Input<T> {
    cell: Arc<InputCell<T>>,
}

impl<T: Clone> Input<T> {
    pub fn new(value: T) -> Self {
        Self {
            cell: Arc::new(InputCell {
                value: RwLock::new(value),
                version: AtomicU64::new(0),
            }),
        }
    }

    /// Replace the value and bump the version, marking it changed for
    /// every observer.
    pub fn set(&self, value: T) {
        *self.cell.value.write().unwrap() = value;
        self.cell.version.fetch_add(1, Ordering::Release);
    }

    pub fn get(&self) -> T {
        self.cell.value.read().unwrap().clone()
    }

    fn version(&self) -> u64 {
        self.cell.version.load(Ordering::Acquire)
    }
}

impl<T> Clone for Input<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T: Clone + Default> Default for Input<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// Observer end of an [`Input`]. `take_changed` reports whether the value
/// was written since the previous call and marks it seen; a fresh slot
/// reports changed so initial values are always picked up.
pub struct InputSlot<T> {
    input: Input<T>,
    last_seen: Option<u64>,
}

impl<T: Clone> InputSlot<T> {
    pub fn new(input: &Input<T>) -> Self {
        Self {
            input: input.clone(),
            last_seen: None,
        }
    }

    pub fn value(&self) -> T {
        self.input.get()
    }

    pub fn take_changed(&mut self) -> bool {
        let version = self.input.version();
        let changed = self.last_seen != Some(version);
        self.last_seen = Some(version);
        changed
    }
}

/// Per-frame snapshot of all input change flags, collected exactly once
/// at the top of a frame.
#[derive(Clone, Copy, Debug, Default)]
pub struct ChangeSet {
    pub viewport: bool,
    pub camera: bool,
    pub projection: bool,
    pub coarse_window: bool,
    pub frame_limit: bool,
    pub max_depth: bool,
}

impl ChangeSet {
    /// Any change that invalidates accumulated samples. Max ray depth is
    /// excluded: it only resizes the path stack.
    pub fn scene_changed(&self) -> bool {
        self.viewport || self.camera || self.projection || self.coarse_window || self.frame_limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_slot_reports_changed_once() {
        let input = Input::new(3u32);
        let mut slot = InputSlot::new(&input);
        assert!(slot.take_changed());
        assert!(!slot.take_changed());
    }

    #[test]
    fn set_marks_all_observers() {
        let input = Input::new(ViewportRect::default());
        let mut a = InputSlot::new(&input);
        let mut b = InputSlot::new(&input);
        a.take_changed();
        b.take_changed();

        input.set(ViewportRect {
            x: 0,
            y: 0,
            width: 64,
            height: 64,
        });
        assert!(a.take_changed());
        assert!(b.take_changed());
        assert_eq!(a.value().extent(), UVec2::splat(64));
        assert!(!a.take_changed());
    }

    #[test]
    fn max_depth_is_not_scene_affecting() {
        let mut changes = ChangeSet::default();
        changes.max_depth = true;
        assert!(!changes.scene_changed());
        changes.camera = true;
        assert!(changes.scene_changed());
    }
}
