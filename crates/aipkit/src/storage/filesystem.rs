use std::ffi::OsString;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::StorageError;

/// Move a file or directory from `src` to `dst`. Uses `rename` first (fast,
/// atomic on the same filesystem) and falls back to copy + delete for
/// cross-device moves.
pub fn move_path(src: &Path, dst: &Path) -> Result<(), StorageError> {
    if std::fs::rename(src, dst).is_ok() {
        return Ok(());
    }

    let move_err = |e: std::io::Error| StorageError::MoveFile {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        source: e,
    };

    let metadata = std::fs::symlink_metadata(src).map_err(move_err)?;
    if metadata.is_dir() {
        copy_tree(src, dst)?;
        std::fs::remove_dir_all(src).map_err(move_err)?;
    } else {
        std::fs::copy(src, dst).map_err(move_err)?;
        std::fs::remove_file(src).map_err(move_err)?;
    }
    Ok(())
}

fn copy_tree(src: &Path, dst: &Path) -> Result<(), StorageError> {
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(|e| StorageError::Walk {
            path: src.to_path_buf(),
            source: e,
        })?;
        let relative = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            ensure_directory(&target)?;
        } else {
            std::fs::copy(entry.path(), &target).map_err(|e| StorageError::MoveFile {
                from: entry.path().to_path_buf(),
                to: target.clone(),
                source: e,
            })?;
        }
    }
    Ok(())
}

pub fn ensure_directory(path: &Path) -> Result<(), StorageError> {
    if !path.exists() {
        std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}

/// Create `path`, failing if anything already sits there.
pub fn create_new_directory(path: &Path) -> Result<(), StorageError> {
    std::fs::create_dir(path).map_err(|e| StorageError::CreateDirectory {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Returns `directory/name`, or the first free `directory/name_N` (N ≥ 2)
/// when that is taken. Symlinks count as taken, even broken ones.
pub fn available_path(directory: &Path, name: &str) -> Result<PathBuf, StorageError> {
    let path = directory.join(name);
    if std::fs::symlink_metadata(&path).is_err() {
        return Ok(path);
    }

    let (base, ext) = match name.rfind('.') {
        Some(dot_pos) if dot_pos > 0 => (&name[..dot_pos], Some(&name[dot_pos..])),
        _ => (name, None),
    };

    for counter in 2..=1000 {
        let candidate = match ext {
            Some(ext) => format!("{}_{}{}", base, counter, ext),
            None => format!("{}_{}", base, counter),
        };
        let candidate = directory.join(candidate);
        if std::fs::symlink_metadata(&candidate).is_err() {
            return Ok(candidate);
        }
    }

    Err(StorageError::FileExists(path))
}

pub fn write_file(path: &Path, contents: &[u8]) -> Result<(), StorageError> {
    std::fs::write(path, contents).map_err(|e| StorageError::WriteFile {
        path: path.to_path_buf(),
        source: e,
    })
}

pub fn copy_file(src: &Path, dst: &Path) -> Result<(), StorageError> {
    std::fs::copy(src, dst)
        .map(|_| ())
        .map_err(|e| StorageError::WriteFile {
            path: dst.to_path_buf(),
            source: e,
        })
}

pub fn remove_file(path: &Path) -> Result<(), StorageError> {
    std::fs::remove_file(path).map_err(|e| StorageError::Remove {
        path: path.to_path_buf(),
        source: e,
    })
}

pub fn file_size(path: &Path) -> Result<u64, StorageError> {
    std::fs::metadata(path)
        .map(|m| m.len())
        .map_err(|e| StorageError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })
}

/// Names of the entries directly inside `dir`, sorted. Names are kept as
/// the filesystem returns them so they can be joined back into real paths.
pub fn list_names(dir: &Path) -> Result<Vec<OsString>, StorageError> {
    let read_err = |e: std::io::Error| StorageError::ReadFile {
        path: dir.to_path_buf(),
        source: e,
    };
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        names.push(entry.file_name());
    }
    names.sort();
    Ok(names)
}

/// Number of regular files anywhere below `dir`.
pub fn count_files(dir: &Path) -> Result<usize, StorageError> {
    let mut count = 0;
    for entry in WalkDir::new(dir).min_depth(1) {
        let entry = entry.map_err(|e| StorageError::Walk {
            path: dir.to_path_buf(),
            source: e,
        })?;
        if entry.file_type().is_file() {
            count += 1;
        }
    }
    Ok(count)
}
