// Shader catalog behavior against a scratch shader tree: marker
// splicing, stub fallback and the fatal missing-template case.

use std::fs;
use std::path::Path;

use anyhow::Result;
use glint::stage::shaders::{ExtensionKind, ExtensionRegistry, ShaderCatalog};
use glint::StageError;

fn write_stub_templates(root: &Path) -> Result<()> {
    let dir = root.join("extension_templates");
    fs::create_dir_all(&dir)?;
    for kind in ExtensionKind::all() {
        fs::write(
            dir.join(format!("{}.wgsl", kind.name())),
            format!("// stub {}\n", kind.name()),
        )?;
    }
    Ok(())
}

#[test]
fn splices_registered_extension_over_stub() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_stub_templates(dir.path())?;
    fs::write(
        dir.path().join("trace.wgsl"),
        "// head\n//!extension materials\n// tail\n",
    )?;

    let catalog = ShaderCatalog::scan(dir.path())?;

    let mut registry = ExtensionRegistry::new();
    registry.register(ExtensionKind::Materials, "fn shade() {}\n");
    let assembled = catalog.assemble("trace", &registry)?;
    assert!(assembled.contains("fn shade() {}"));
    assert!(!assembled.contains("//!extension"));
    assert!(assembled.contains("// head"));
    assert!(assembled.contains("// tail"));
    Ok(())
}

#[test]
fn falls_back_to_stub_when_slot_is_empty() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_stub_templates(dir.path())?;
    fs::write(
        dir.path().join("trace.wgsl"),
        "//!extension geometryTraversal\n",
    )?;

    let catalog = ShaderCatalog::scan(dir.path())?;
    let assembled = catalog.assemble("trace", &ExtensionRegistry::new())?;
    assert!(assembled.contains("// stub geometryTraversal"));
    Ok(())
}

#[test]
fn missing_template_is_fatal() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_stub_templates(dir.path())?;
    fs::remove_file(
        dir.path()
            .join("extension_templates")
            .join("shadowRayCast.wgsl"),
    )?;

    match ShaderCatalog::scan(dir.path()) {
        Err(StageError::MissingTemplate { name, .. }) => assert_eq!(name, "shadowRayCast"),
        other => panic!("expected missing template error, got {:?}", other.map(|_| ())),
    }
    Ok(())
}

#[test]
fn finds_sources_in_nested_directories() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_stub_templates(dir.path())?;
    let nested = dir.path().join("passes");
    fs::create_dir_all(&nested)?;
    fs::write(nested.join("aggregate.wgsl"), "// aggregate\n")?;

    let catalog = ShaderCatalog::scan(dir.path())?;
    assert_eq!(catalog.root(), dir.path());
    assert!(catalog.source("aggregate")?.contains("// aggregate"));
    assert!(catalog.source("unknown").is_err());
    Ok(())
}

#[test]
fn shipped_programs_assemble_with_stub_extensions() -> Result<()> {
    let catalog = ShaderCatalog::scan(Path::new("shaders/pathtracing"))?;
    for name in glint::stage::shaders::PROGRAM_NAMES {
        let source = catalog.assemble(name, &ExtensionRegistry::new())?;
        assert!(source.contains("fn main"), "{} has no entry point", name);
        assert!(
            !source.contains("//!extension"),
            "{} kept an unexpanded marker",
            name
        );
    }
    Ok(())
}

#[test]
fn unknown_marker_name_is_an_error() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_stub_templates(dir.path())?;
    fs::write(dir.path().join("trace.wgsl"), "//!extension bogusSlot\n")?;

    let catalog = ShaderCatalog::scan(dir.path())?;
    assert!(catalog.assemble("trace", &ExtensionRegistry::new()).is_err());
    Ok(())
}
