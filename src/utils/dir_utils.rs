use std::path::Path;

use tracing::info;

/// Creates the uploads directory on first start.
pub fn ensure_dir_exists(dir_path: &str) -> std::io::Result<()> {
    let path = Path::new(dir_path);
    if !path.is_dir() {
        std::fs::create_dir_all(path)?;
        info!(dir = dir_path, "created directory");
    }
    Ok(())
}
