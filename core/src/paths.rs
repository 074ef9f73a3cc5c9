use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Lexically normalizes a slash-separated path: repeated separators collapse,
/// `.` elements vanish and `..` consumes the preceding element.
pub fn clean_path(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }

    let rooted = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();

    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                _ if rooted => {}
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{}", joined),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Resolves a target or file name against the build's base directory.
pub fn resolve(base_dir: &Path, name: &str) -> PathBuf {
    let path = Path::new(name);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

pub fn exists(base_dir: &Path, name: &str) -> bool {
    resolve(base_dir, name).symlink_metadata().is_ok()
}

pub fn modified_time(base_dir: &Path, name: &str) -> Option<SystemTime> {
    std::fs::metadata(resolve(base_dir, name))
        .and_then(|m| m.modified())
        .ok()
}
