pub mod check;
pub mod render;

use std::path::Path;

use anyhow::{Context, Result};

/// Read a template file into memory.
pub(crate) fn read_template(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("failed to read template {}", path.display()))
}
