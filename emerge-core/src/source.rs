use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::FrontendError;

pub const SOURCE_EXTENSION: &str = "em";

/// Expands `root` into the source files it names: a file is taken as
/// is, a directory is searched recursively for `.em` files. Results are
/// sorted by path.
pub fn discover_sources(root: impl AsRef<Path>) -> Result<Vec<PathBuf>, FrontendError> {
    let root = root.as_ref();
    let metadata = fs::metadata(root).map_err(|source| FrontendError::SourceIo {
        path: root.to_path_buf(),
        source,
    })?;
    if metadata.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }

    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .map(|entry| entry.into_path())
        .filter(|path| path.is_file() && is_source_file(path))
        .collect();
    files.sort();
    Ok(files)
}

pub fn is_source_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == SOURCE_EXTENSION)
}

/// Reads a source file as UTF-8 text.
pub fn read_source(path: &Path) -> Result<String, FrontendError> {
    fs::read_to_string(path).map_err(|source| FrontendError::SourceIo {
        path: path.to_path_buf(),
        source,
    })
}
