use std::path::{Path, PathBuf};

use anyhow::Context;
use cap_texture_converter::Dimensions;

pub fn file_name(dimensions: Dimensions) -> String {
    format!(
        "convertedBitmap_{}x{}.bin",
        dimensions.width(),
        dimensions.height()
    )
}

/// Writes `bytes` verbatim to `dir`, named after the output size.
pub fn write_raw(dir: &Path, bytes: &[u8], dimensions: Dimensions) -> anyhow::Result<PathBuf> {
    let path = dir.join(file_name(dimensions));
    std::fs::write(&path, bytes)
        .with_context(|| format!("Failed to write '{}'", path.display()))?;
    Ok(path)
}
