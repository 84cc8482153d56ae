//! Progressive GPU path tracing as a self-contained compute stage.
//!
//! The stage renders into accumulation targets over many frames: each
//! frame traces a sparse set of primary rays chosen by a coarse-to-fine
//! refinement order, bounces them through a queue-compacted wavefront
//! loop, and folds the result into a running average. Host code drives
//! it through versioned [`input`] handles; any scene-affecting change
//! restarts accumulation, and an optional frame limit freezes the image
//! once enough samples are in.
//!
//! Shader bodies are open at five named extension points so applications
//! can splice their own WGSL for geometry traversal, materials and ray
//! generation; every point has a stub fallback and a built-in test scene
//! backs the geometry stubs.

pub mod error;
pub mod gpu;
pub mod input;
pub mod math;
pub mod sampling;
pub mod stage;

pub use error::{StageError, StageResult};
pub use input::{CameraView, Input, Perspective, ViewportRect};
pub use sampling::{coarse_sampling_order, CoarseWindow};
pub use stage::frame::FramePhase;
pub use stage::shaders::{ExtensionKind, ExtensionRegistry};
pub use stage::{PathTracingStage, StageConfig, StageInputs};
