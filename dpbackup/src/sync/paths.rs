use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

const ROOT_DIR_NAME: &str = "root";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("remote name is empty")]
    Empty,
    #[error("remote name {0:?} cannot be used as a local path component")]
    UnsupportedName(String),
    #[error("remote path contains unsupported component")]
    UnsupportedComponent,
}

/// Canonical (NFC) form of a remote name, so decomposed and precomposed
/// spellings land on the same local entry.
pub fn normalize_name(name: &str) -> String {
    name.nfc().collect()
}

pub fn local_child(dir: &Path, name: &str) -> Result<PathBuf, PathError> {
    let normalized = normalize_name(name);
    if normalized.is_empty() {
        return Err(PathError::Empty);
    }
    if normalized == "."
        || normalized == ".."
        || normalized
            .chars()
            .any(|c| std::path::is_separator(c) || c == '\0')
    {
        return Err(PathError::UnsupportedName(normalized));
    }
    Ok(dir.join(normalized))
}

/// Local directory that mirrors `remote_path` under `backup_root`.
pub fn destination_for(backup_root: &Path, remote_path: &str) -> Result<PathBuf, PathError> {
    // Remote paths are POSIX-like ("/Archive/2024"); "/" itself maps to `root`.
    let mut out = backup_root.to_path_buf();
    let mut depth = 0usize;
    for component in Path::new(remote_path).components() {
        match component {
            Component::Normal(part) => {
                out.push(normalize_name(&part.to_string_lossy()));
                depth += 1;
            }
            Component::RootDir | Component::CurDir => continue,
            Component::ParentDir | Component::Prefix(_) => {
                return Err(PathError::UnsupportedComponent);
            }
        }
    }
    if depth == 0 {
        out.push(ROOT_DIR_NAME);
    }
    Ok(out)
}
