//! Directory layout under the nest root.
//!
//! ```text
//! <nest>/data/pixel-hawk.db
//! <nest>/tiles/tile-<x>_<y>.png
//! <nest>/projects/<person>/<tx>_<ty>_<px>_<py>.png
//! <nest>/snapshots/<person>/<tx>_<ty>_<px>_<py>.png
//! <nest>/logs/
//! ```

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;

use domain::coords::{CanvasPosition, TileCoord};
use domain::person::PersonId;
use pixel_hawk_application::error::{AppError, AppResult};

/// The nest root plus path arithmetic for everything stored beneath it.
#[derive(Debug, Clone)]
pub struct NestLayout {
    root: PathBuf,
}

impl NestLayout {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the fixed subdirectories. Safe to call repeatedly.
    pub async fn ensure_directories(&self) -> AppResult<()> {
        for sub in ["data", "tiles", "projects", "snapshots", "logs"] {
            fs::create_dir_all(self.root.join(sub)).await?;
        }
        Ok(())
    }

    #[must_use]
    pub fn database_file(&self) -> PathBuf {
        self.root.join("data").join("pixel-hawk.db")
    }

    #[must_use]
    pub fn tile_file(&self, coord: TileCoord) -> PathBuf {
        self.root
            .join("tiles")
            .join(format!("tile-{}_{}.png", coord.x, coord.y))
    }

    #[must_use]
    pub fn target_file(&self, owner: PersonId, position: CanvasPosition) -> PathBuf {
        self.root
            .join("projects")
            .join(owner.to_string())
            .join(format!("{position}.png"))
    }

    #[must_use]
    pub fn snapshot_file(&self, owner: PersonId, position: CanvasPosition) -> PathBuf {
        self.root
            .join("snapshots")
            .join(owner.to_string())
            .join(format!("{position}.png"))
    }
}

/// Read a whole file; `None` when it does not exist.
pub(crate) async fn read_optional(path: &Path) -> AppResult<Option<Vec<u8>>> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(error) => Err(AppError::Io(error)),
    }
}

/// Atomic replace: write a sibling temp file, then rename over the
/// destination. Readers only ever see a complete file.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> AppResult<()> {
    let parent = path.parent().ok_or_else(|| AppError::Config {
        message: format!("{} has no parent directory", path.display()),
    })?;
    fs::create_dir_all(parent).await?;

    let file_name = path.file_name().ok_or_else(|| AppError::Config {
        message: format!("{} has no file name", path.display()),
    })?;
    let mut temp_name = file_name.to_owned();
    temp_name.push(".tmp");
    let temp_path = parent.join(temp_name);

    fs::write(&temp_path, bytes).await?;
    fs::rename(&temp_path, path).await?;
    Ok(())
}
