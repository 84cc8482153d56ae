// src/stage/shaders.rs
// Shader catalog and extension registry.
//
// Compute-shader sources live in a directory scanned recursively at
// initialization; the six pipeline programs are resolved by fixed names.
// Extension points are named WGSL snippets spliced into `//!extension`
// markers: external code supplies materials/geometry/ray-generation logic,
// and any slot left empty falls back to a stub template so every program
// still compiles. The registry is owned per stage instance, so concurrent
// stages remain independent.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{StageError, StageResult};

/// The fixed program names the dispatch sequence loads from the catalog.
pub const PROGRAM_NAMES: [&str; 6] = [
    "firstOrderRays",
    "secondOrderRays",
    "shadowRays",
    "clearPathStack",
    "flattenPathStack",
    "aggregateColors",
];

/// Named shader-source injection points.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExtensionKind {
    /// Writes the primary-hit outputs (normal/depth targets).
    RayCastOutput,
    /// Material lookup for hits.
    Materials,
    /// Scene intersection; when absent the built-in test geometry is bound.
    GeometryTraversal,
    /// Emits the bounce ray for a hit.
    SecondOrderRayGeneration,
    /// Casts shadow rays and writes light color into the path stack.
    ShadowRayCast,
}

impl ExtensionKind {
    pub fn all() -> &'static [ExtensionKind] {
        &[
            ExtensionKind::RayCastOutput,
            ExtensionKind::Materials,
            ExtensionKind::GeometryTraversal,
            ExtensionKind::SecondOrderRayGeneration,
            ExtensionKind::ShadowRayCast,
        ]
    }

    /// Stable snippet name used in `//!extension` markers and template
    /// file names.
    pub fn name(self) -> &'static str {
        match self {
            ExtensionKind::RayCastOutput => "rayCastingOutput",
            ExtensionKind::Materials => "materials",
            ExtensionKind::GeometryTraversal => "geometryTraversal",
            ExtensionKind::SecondOrderRayGeneration => "secondOrderRayGeneration",
            ExtensionKind::ShadowRayCast => "shadowRayCast",
        }
    }

    pub fn from_name(name: &str) -> Option<ExtensionKind> {
        ExtensionKind::all()
            .iter()
            .copied()
            .find(|kind| kind.name() == name)
    }
}

/// Externally supplied extension snippets, keyed by slot.
#[derive(Default)]
pub struct ExtensionRegistry {
    sources: HashMap<ExtensionKind, String>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<S: Into<String>>(&mut self, kind: ExtensionKind, source: S) {
        self.sources.insert(kind, source.into());
    }

    pub fn register_file(&mut self, kind: ExtensionKind, path: &Path) -> StageResult<()> {
        let source = std::fs::read_to_string(path)?;
        self.register(kind, source);
        Ok(())
    }

    pub fn has(&self, kind: ExtensionKind) -> bool {
        self.sources.contains_key(&kind)
    }

    fn get(&self, kind: ExtensionKind) -> Option<&str> {
        self.sources.get(&kind).map(String::as_str)
    }
}

/// Recursive index of `*.wgsl` sources under the shader root, keyed by
/// file stem.
pub struct ShaderCatalog {
    root: PathBuf,
    files: HashMap<String, PathBuf>,
    /// Stub snippets for unimplemented extension slots; loaded eagerly,
    /// a missing template file is a fatal precondition failure.
    stubs: HashMap<ExtensionKind, String>,
}

impl ShaderCatalog {
    pub fn scan(root: &Path) -> StageResult<Self> {
        let mut files = HashMap::new();
        collect_wgsl(root, &mut files)?;
        log::debug!("shader catalog: {} files under {}", files.len(), root.display());

        let mut stubs = HashMap::new();
        for kind in ExtensionKind::all() {
            let path = root
                .join("extension_templates")
                .join(format!("{}.wgsl", kind.name()));
            let source = std::fs::read_to_string(&path).map_err(|_| StageError::MissingTemplate {
                name: kind.name().to_string(),
                path: path.clone(),
            })?;
            stubs.insert(*kind, source);
        }

        Ok(Self {
            root: root.to_path_buf(),
            files,
            stubs,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Raw source of a cataloged shader.
    pub fn source(&self, name: &str) -> StageResult<String> {
        let path = self.files.get(name).ok_or_else(|| {
            StageError::shader(format!(
                "compute shader '{}' not found under {}",
                name,
                self.root.display()
            ))
        })?;
        Ok(std::fs::read_to_string(path)?)
    }

    /// Load a program source and splice every `//!extension <name>` marker
    /// with the registered snippet, or the stub template when the slot is
    /// not supplied.
    pub fn assemble(&self, name: &str, extensions: &ExtensionRegistry) -> StageResult<String> {
        let source = self.source(name)?;
        let mut out = String::with_capacity(source.len());
        for line in source.lines() {
            match line.trim().strip_prefix("//!extension") {
                Some(rest) => {
                    let ext_name = rest.trim();
                    let kind = ExtensionKind::from_name(ext_name).ok_or_else(|| {
                        StageError::shader(format!(
                            "unknown extension point '{}' in shader '{}'",
                            ext_name, name
                        ))
                    })?;
                    let snippet = extensions
                        .get(kind)
                        .unwrap_or_else(|| self.stubs[&kind].as_str());
                    out.push_str(snippet);
                    if !snippet.ends_with('\n') {
                        out.push('\n');
                    }
                }
                None => {
                    out.push_str(line);
                    out.push('\n');
                }
            }
        }
        Ok(out)
    }
}

fn collect_wgsl(dir: &Path, files: &mut HashMap<String, PathBuf>) -> StageResult<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_wgsl(&path, files)?;
        } else if path.extension().and_then(|e| e.to_str()) == Some("wgsl") {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                files.insert(stem.to_string(), path.clone());
            }
        }
    }
    Ok(())
}
