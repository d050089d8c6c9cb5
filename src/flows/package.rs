//! Deployment artifact packaging
//!
//! The serving container expects a single archive holding the rendered
//! serving config, the optional handler script, and its dependency list.

use crate::core::artifact::DeploymentConfig;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::ZipWriter;

pub const SERVING_PROPERTIES: &str = "serving.properties";
pub const REQUIREMENTS_FILE: &str = "requirements.txt";

/// Package the deployment into a zip archive under `output_dir`
pub fn package_artifact(config: &DeploymentConfig, output_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create staging dir {}", output_dir.display()))?;

    let archive_path = output_dir.join(format!("{}.zip", config.model_name));
    let file = File::create(&archive_path)
        .with_context(|| format!("Failed to create archive {}", archive_path.display()))?;
    let mut archive = ZipWriter::new(file);
    let options = FileOptions::default();

    archive.start_file(SERVING_PROPERTIES, options)?;
    archive.write_all(config.serving_properties().as_bytes())?;

    if let Some(handler) = &config.handler {
        let entry_name = Path::new(handler)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| handler.clone());
        let content = std::fs::read(handler)
            .with_context(|| format!("Failed to read handler {}", handler))?;
        archive.start_file(entry_name, options)?;
        archive.write_all(&content)?;
    }

    if !config.requirements.is_empty() {
        archive.start_file(REQUIREMENTS_FILE, options)?;
        let mut listing = config.requirements.join("\n");
        listing.push('\n');
        archive.write_all(listing.as_bytes())?;
    }

    archive.finish()?;
    Ok(archive_path)
}
