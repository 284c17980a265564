//! Anchors relative decision-graph paths to the project root, not the
//! process's current directory.

use std::path::{Component, Path, PathBuf};

const ROOT_MARKERS: &[&str] = &[".deliberator", "Cargo.toml", ".git"];

/// Walk upward from `start` looking for a project-root marker file.
pub fn find_project_root(start: impl AsRef<Path>) -> Option<PathBuf> {
    let mut current = start.as_ref().to_path_buf();

    loop {
        for marker in ROOT_MARKERS {
            if current.join(marker).exists() {
                return Some(current);
            }
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Resolve `path` (already `${VAR}`/`~`-expanded by the config loader) to an
/// absolute, canonical location. Relative paths are joined against the
/// project root found from the process's current directory, falling back to
/// the current directory itself when no marker is found.
pub fn resolve_db_path(path: &str) -> PathBuf {
    let candidate = Path::new(path);
    let anchored = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        let cwd = std::env::current_dir().unwrap_or_default();
        let root = find_project_root(&cwd).unwrap_or(cwd);
        root.join(candidate)
    };

    normalize(&anchored)
}

fn normalize(path: &Path) -> PathBuf {
    let mut components = Vec::new();

    for component in path.components() {
        match component {
            Component::Prefix(p) => components.push(Component::Prefix(p)),
            Component::RootDir => {
                components.clear();
                components.push(Component::RootDir);
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(components.last(), Some(Component::Normal(_))) {
                    components.pop();
                } else {
                    components.push(Component::ParentDir);
                }
            }
            Component::Normal(c) => components.push(Component::Normal(c)),
        }
    }

    components.iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_path_is_returned_as_is_but_normalized() {
        let resolved = resolve_db_path("/tmp/a/../b/decisions.db");
        assert_eq!(resolved, PathBuf::from("/tmp/b/decisions.db"));
    }

    #[test]
    fn relative_path_is_anchored_to_project_root() {
        let root = find_project_root(std::env::current_dir().unwrap());
        let resolved = resolve_db_path("decisions.db");
        if let Some(root) = root {
            assert_eq!(resolved, normalize(&root.join("decisions.db")));
        }
    }
}
