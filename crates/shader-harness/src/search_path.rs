use std::path::{Path, PathBuf};

/// Ordered list of include directories. Earlier entries win.
///
/// A default search path holds only the current working directory (`.`). Directories are added
/// while building the session configuration; the resolver only ever reads the list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPath {
    dirs: Vec<PathBuf>,
}

impl SearchPath {
    /// A search path with no directories at all. Resolution against it fails immediately.
    pub fn empty() -> Self {
        Self { dirs: Vec::new() }
    }

    /// `.` followed by `extra`, in order.
    pub fn with_dirs<I, P>(extra: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut path = Self::default();
        path.dirs.extend(extra.into_iter().map(Into::into));
        path
    }

    pub fn push(&mut self, dir: impl Into<PathBuf>) {
        self.dirs.push(dir.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.dirs.iter().map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.dirs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }
}

impl Default for SearchPath {
    fn default() -> Self {
        Self {
            dirs: vec![PathBuf::from(".")],
        }
    }
}
