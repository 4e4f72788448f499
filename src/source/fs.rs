use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::glob::Glob;
use crate::{error::SetupError, task::TaskDescriptor};

/// Recursively walks a directory and yields one task per file whose base
/// name matches a glob pattern.
///
/// Files come out in traversal order, which is not globally sorted.
/// Entries that cannot be read are skipped with a warning and the walk
/// goes on; only an unreadable root fails, and it fails in [`FsSource::new`].
pub struct FsSource {
    root: PathBuf,
    walker: walkdir::IntoIter,
    pattern: Glob,
    next_index: usize,
}

impl FsSource {
    pub fn new(root: impl AsRef<Path>, pattern: &str) -> Result<Self, SetupError> {
        let root = root.as_ref().to_path_buf();
        let pattern = Glob::new(pattern)?;
        std::fs::read_dir(&root).map_err(|source| SetupError::SourceRoot {
            path: root.clone(),
            source,
        })?;

        Ok(Self {
            walker: WalkDir::new(&root).into_iter(),
            root,
            pattern,
            next_index: 0,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Iterator for FsSource {
    type Item = TaskDescriptor;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry under {}: {e}", self.root.display());
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if !self.pattern.is_match(&name) {
                continue;
            }

            let task = TaskDescriptor::file(self.next_index, entry.into_path());
            self.next_index += 1;
            return Some(task);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{collections::HashSet, fs};
    use tempfile::TempDir;

    #[test]
    fn yields_only_matching_files() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("nested/deeper");
        fs::create_dir_all(&nested).unwrap();

        let wanted = [
            dir.path().join("a.json"),
            dir.path().join("nested/b.json"),
            nested.join("c.json"),
        ];
        for path in &wanted {
            fs::write(path, b"{}").unwrap();
        }
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        fs::write(nested.join("d.json.bak"), b"x").unwrap();

        let tasks: Vec<_> = FsSource::new(dir.path(), "*.json").unwrap().collect();
        assert_eq!(tasks.len(), 3);

        let found: HashSet<PathBuf> = tasks.iter().map(|t| t.path().unwrap().to_path_buf()).collect();
        let expected: HashSet<PathBuf> = wanted.into_iter().collect();
        assert_eq!(found, expected);

        let indices: Vec<usize> = tasks.iter().map(|t| t.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn directories_never_match() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("looks.json")).unwrap();
        assert_eq!(FsSource::new(dir.path(), "*.json").unwrap().count(), 0);
    }

    #[test]
    fn missing_root_fails_fast() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            FsSource::new(&missing, "*"),
            Err(SetupError::SourceRoot { .. })
        ));
    }

    #[test]
    fn bad_pattern_fails_fast() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            FsSource::new(dir.path(), "[oops"),
            Err(SetupError::Pattern { .. })
        ));
    }
}
