use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Read a file to string, replacing invalid UTF-8 sequences with the replacement character.
///
/// # Errors
/// Returns an error if the file cannot be read.
pub fn read_to_string_lossy(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Write bytes to `path`, creating parent directories as needed.
///
/// # Errors
/// Returns an error if a directory cannot be created or the write fails.
pub fn write_creating_dirs(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes)
}

/// List every regular file under `root` as a `/`-separated relative path, sorted.
///
/// Returns an empty list if `root` does not exist.
#[must_use]
pub fn list_files(root: &Path) -> Vec<String> {
    if !root.is_dir() {
        return Vec::new();
    }

    let mut files: Vec<String> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            entry
                .path()
                .strip_prefix(root)
                .ok()
                .map(to_slash)
        })
        .collect();
    files.sort();
    files
}

/// Render a relative path with `/` separators regardless of platform.
#[must_use]
pub fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Replace the directory at `target` with `staging` as a single step.
///
/// The previous contents of `target` (if any) are moved aside and removed only
/// after `staging` has been renamed into place, so `target` either holds the old
/// tree or the new one.
///
/// # Errors
/// Returns an error if the rename fails. On failure the old tree is restored.
pub fn replace_dir(staging: &Path, target: &Path) -> io::Result<()> {
    let backup = sibling_path(target, "old");

    if backup.exists() {
        fs::remove_dir_all(&backup)?;
    }

    let had_previous = target.exists();
    if had_previous {
        fs::rename(target, &backup)?;
    }

    if let Err(e) = fs::rename(staging, target) {
        if had_previous {
            let _ = fs::rename(&backup, target);
        }
        return Err(e);
    }

    if had_previous {
        let _ = fs::remove_dir_all(&backup);
    }
    Ok(())
}

/// A hidden sibling of `path` with the given suffix, tagged with the process id.
#[must_use]
pub fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let parent = path.parent().unwrap_or(Path::new("."));
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("out");
    parent.join(format!(".{name}.{suffix}.{}", std::process::id()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    #[test]
    fn test_read_to_string_lossy_invalid_utf8() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[0x48, 0x65, 0x6c, 0x6c, 0x6f, 0x80, 0x81])
            .unwrap();
        file.flush().unwrap();

        let content = read_to_string_lossy(file.path()).unwrap();
        assert!(content.starts_with("Hello"));
        assert!(content.contains('\u{FFFD}'));
    }

    #[test]
    fn test_write_creating_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a/b/c.txt");

        write_creating_dirs(&path, b"nested").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "nested");
    }

    #[test]
    fn test_list_files_sorted_relative() {
        let dir = tempdir().unwrap();
        write_creating_dirs(&dir.path().join("z.txt"), b"").unwrap();
        write_creating_dirs(&dir.path().join("img/a.png"), b"").unwrap();

        assert_eq!(list_files(dir.path()), vec!["img/a.png", "z.txt"]);
        assert!(list_files(&dir.path().join("missing")).is_empty());
    }

    #[test]
    fn test_replace_dir_swaps_contents() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("dist");
        write_creating_dirs(&target.join("old.js"), b"old").unwrap();

        let staging = dir.path().join("staging");
        write_creating_dirs(&staging.join("new.js"), b"new").unwrap();

        replace_dir(&staging, &target).unwrap();

        assert!(target.join("new.js").exists());
        assert!(!target.join("old.js").exists());
        assert!(!staging.exists());

        // Only the target remains; the backup is cleaned up.
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_replace_dir_without_previous_target() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("dist");
        let staging = dir.path().join("staging");
        write_creating_dirs(&staging.join("index.html"), b"<html>").unwrap();

        replace_dir(&staging, &target).unwrap();
        assert!(target.join("index.html").exists());
    }
}
