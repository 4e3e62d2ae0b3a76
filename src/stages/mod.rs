mod assemble;
mod bilevel;
mod extract;

use std::fs;
use std::path::{Path, PathBuf};

pub use assemble::{COMBINED_TIFF, ConcatenateStage, WrapStage};
pub use bilevel::BilevelStage;
pub use extract::{EXTRACT_PREFIX, ExtractStage};

use crate::error::RecompressError;
use crate::pipeline::Stage;

pub fn default_stages() -> Vec<Box<dyn Stage>> {
    vec![
        Box::new(ExtractStage),
        Box::new(BilevelStage),
        Box::new(ConcatenateStage),
        Box::new(WrapStage),
    ]
}

/// Regular files directly inside `dir`, sorted by file name (byte order).
pub(crate) fn sorted_files(dir: &Path) -> Result<Vec<PathBuf>, RecompressError> {
    let read_err =
        |err| RecompressError::io(format!("Failed to list directory {}", dir.display()), err);

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        if entry.file_type().map_err(read_err)?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}
