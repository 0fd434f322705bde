//! Turns a finished resource graph into files
//!
//! Every descriptor is rendered before anything is written, so a failing
//! renderer or an unresolved reference in strict mode leaves the destination
//! untouched.

use anyhow::Result;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::ExportError;
use crate::hcl::HclWriter;
use crate::registry::{RenderContext, ResourceRegistry};
use crate::traits::{FileSystem, Output};

/// One output file and its concatenated contents
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedFile {
    pub path: String,
    pub contents: String,
}

/// Render every emitted descriptor. Descriptors sharing a file are
/// concatenated in registration order; files keep the order in which they
/// were first targeted.
pub fn render_files(registry: &ResourceRegistry, hcl: &HclWriter) -> Result<Vec<RenderedFile>> {
    let ctx = RenderContext { registry, hcl };
    let mut files: Vec<RenderedFile> = Vec::new();

    for resource in registry.resources() {
        let Some(file_name) = resource.file_name.as_deref() else {
            continue;
        };
        if !resource.is_emitted() {
            continue;
        }

        let rendered = resource.render(&ctx).map_err(|err| ExportError::Render {
            file_name: file_name.to_string(),
            message: format!("{:#}", err),
        })?;

        // Renderers return nothing when everything they need is outside the export
        if rendered.trim().is_empty() {
            continue;
        }

        match files.iter_mut().find(|file| file.path == file_name) {
            Some(file) => {
                if !file.contents.is_empty() && !file.contents.ends_with("\n\n") {
                    file.contents.push('\n');
                }
                file.contents.push_str(&rendered);
            }
            None => files.push(RenderedFile {
                path: file_name.to_string(),
                contents: rendered,
            }),
        }
    }

    debug!(files = files.len(), resources = registry.len(), "rendered resources");
    Ok(files)
}

/// Fail in strict mode when any required reference was left empty.
/// Outside strict mode the empty placeholders stay in the output.
pub fn check_references(registry: &ResourceRegistry, strict: bool) -> Result<()> {
    let unresolved = registry.unresolved_references();
    if unresolved.is_empty() {
        return Ok(());
    }

    if strict {
        return Err(ExportError::UnresolvedReferences(unresolved).into());
    }

    warn!(
        count = unresolved.len(),
        "references to resources outside the export were left empty"
    );

    Ok(())
}

/// Write every file below `dest`
pub fn write_files(fs: &dyn FileSystem, dest: &Path, files: &[RenderedFile]) -> Result<()> {
    fs.create_dir_all(dest)?;

    for file in files {
        let path = dest.join(&file.path);
        debug!(path = %path.display(), "writing file");
        fs.write(&path, &file.contents)?;
    }

    Ok(())
}

/// Print every file with a `---` header instead of writing it
pub fn print_files(output: &dyn Output, files: &[RenderedFile]) {
    for file in files {
        output.plain(&format!("---\n# {}\n---", file.path));
        output.plain(&file.contents);
    }
}

/// Render, check and then either write or print the graph.
/// Returns the number of files produced.
pub fn emit(
    registry: &ResourceRegistry,
    fs: &dyn FileSystem,
    output: &dyn Output,
    dest: Option<&Path>,
    strict: bool,
) -> Result<usize> {
    let hcl = HclWriter::new()?;
    let files = render_files(registry, &hcl)?;

    check_references(registry, strict)?;

    match dest {
        Some(dest) => write_files(fs, dest, &files)?,
        None => print_files(output, &files),
    }

    Ok(files.len())
}
