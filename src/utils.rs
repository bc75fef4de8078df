use std::path::{Component, Path, PathBuf};

use crate::errors::*;

/// A path is rebased only when it is neither absolute nor anchored at the home directory.
pub fn is_relative_path(path: &str) -> bool {
    !path.starts_with('~') && !Path::new(path).is_absolute()
}

/// Lexically collapse `.` and `..` components without touching the filesystem.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut parts: Vec<Component> = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }

    if parts.is_empty() {
        return PathBuf::from(".");
    }

    parts.iter().collect()
}

pub fn absolute_path(path: &Path) -> Result<PathBuf, Error> {
    if path.is_absolute() {
        return Ok(normalize_path(path));
    }

    let cwd = std::env::current_dir().map_err(|err| Error::io(path, err))?;
    Ok(normalize_path(&cwd.join(path)))
}

/// Path that leads from `from_dir` to `to_dir`; both must be absolute.
pub fn relative_path(from_dir: &Path, to_dir: &Path) -> PathBuf {
    let from_dir = normalize_path(from_dir);
    let to_dir = normalize_path(to_dir);
    let from: Vec<Component> = from_dir.components().collect();
    let to: Vec<Component> = to_dir.components().collect();

    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut result = PathBuf::new();
    for _ in common..from.len() {
        result.push("..");
    }
    for component in &to[common..] {
        result.push(component);
    }

    if result.as_os_str().is_empty() {
        return PathBuf::from(".");
    }

    result
}

pub fn rebase_path(offset: &Path, path: &str) -> String {
    normalize_path(&offset.join(path))
        .to_string_lossy()
        .to_string()
}
