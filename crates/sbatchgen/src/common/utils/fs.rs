use std::path::{Path, PathBuf};

pub fn absolute_path(path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        get_current_dir().join(path)
    }
}

/// Returns the current working directory, or `.` when it cannot be determined
/// (e.g. it was removed).
pub fn get_current_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// Returns the directory that contains `path`, using `.` for bare file names.
pub fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Creates and immediately removes `dir`.
/// On network filesystems this forces pending metadata operations to complete.
pub fn flush_barrier(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    std::fs::remove_dir_all(dir)
}
