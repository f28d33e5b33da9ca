//! Filesystem utilities.

use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use walkdir::WalkDir;

/// Remove a directory and all its contents, if it exists.
pub fn remove_dir_all_if_exists(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path)
            .with_context(|| format!("failed to remove directory: {}", path.display()))?;
    }
    Ok(())
}

/// Remove a file or a whole directory tree, if it exists.
pub fn remove_if_exists(path: &Path) -> Result<()> {
    if path.is_dir() {
        remove_dir_all_if_exists(path)
    } else if path.exists() {
        fs::remove_file(path).with_context(|| format!("failed to remove file: {}", path.display()))
    } else {
        Ok(())
    }
}

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

/// Write a string to a file, creating parent directories if needed.
pub fn write_string(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    fs::write(path, contents).with_context(|| format!("failed to write file: {}", path.display()))
}

/// Every regular file below `dir`, sorted. A missing directory yields nothing.
pub fn files_under(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

/// Names of the immediate subdirectories of `dir`, sorted.
pub fn subdirectories(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Get the relative path from `base` to `path`.
pub fn relative_path(base: &Path, path: &Path) -> PathBuf {
    pathdiff::diff_paths(path, base).unwrap_or_else(|| path.to_path_buf())
}

/// Whether `path` lies below `base` without climbing out through `..`.
pub fn is_inside(path: &Path, base: &Path) -> bool {
    path.strip_prefix(base)
        .map(|rest| !rest.components().any(|c| c == Component::ParentDir))
        .unwrap_or(false)
}

/// Render a path with forward slashes, for pattern matching and records.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_subdirectories_and_removal() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("b/inner")).unwrap();
        fs::create_dir_all(tmp.path().join("a")).unwrap();
        fs::write(tmp.path().join("file.json"), "{}").unwrap();

        assert_eq!(subdirectories(tmp.path()), vec!["a", "b"]);
        assert!(subdirectories(&tmp.path().join("missing")).is_empty());

        remove_if_exists(&tmp.path().join("b")).unwrap();
        remove_if_exists(&tmp.path().join("file.json")).unwrap();
        remove_if_exists(&tmp.path().join("missing")).unwrap();
        assert!(!tmp.path().join("b").exists());
        assert!(!tmp.path().join("file.json").exists());
    }

    #[test]
    fn test_files_under() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(src.join("nested")).unwrap();
        fs::write(src.join("main.c"), "int main() {}").unwrap();
        fs::write(src.join("nested/util.c"), "void util() {}").unwrap();

        let files = files_under(&src);
        assert_eq!(files, vec![src.join("main.c"), src.join("nested/util.c")]);
        assert!(files_under(&tmp.path().join("missing")).is_empty());
    }

    #[test]
    fn test_is_inside() {
        assert!(is_inside(Path::new("/p/src/main/c/a.c"), Path::new("/p/src/main/c")));
        assert!(!is_inside(Path::new("/p/boot/a.s"), Path::new("/p/src/main/asm")));
        assert!(!is_inside(Path::new("/p/src/../a.c"), Path::new("/p/src")));
    }

    #[test]
    fn test_to_slash() {
        assert_eq!(to_slash(Path::new("linux-x64/start.s")), "linux-x64/start.s");
    }

    #[test]
    fn test_remove_dir_all_if_exists() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("obj");
        ensure_dir(&dir.join("deep")).unwrap();
        remove_dir_all_if_exists(&dir).unwrap();
        assert!(!dir.exists());
        remove_dir_all_if_exists(&dir).unwrap();
    }
}
