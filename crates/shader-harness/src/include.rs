//! Include resolution.
//!
//! The engine asks for include files through the two-method [`IncludeHandler`] interface: `open`
//! hands out an owned [`IncludeHandle`], `close` takes it back. A handle is not `Clone` and
//! `close` consumes it, so each acquired buffer is released at most once.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::search_path::SearchPath;

/// `#include "name"` vs `#include <name>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IncludeKind {
    Quoted,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncludeRequest<'a> {
    pub kind: IncludeKind,
    pub name: &'a str,
    /// File containing the `#include` directive, if known.
    pub parent: Option<&'a str>,
}

/// Contents of a resolved include file.
#[derive(Debug, PartialEq, Eq)]
pub struct IncludeHandle {
    path: PathBuf,
    data: Box<[u8]>,
}

impl IncludeHandle {
    pub fn new(path: impl Into<PathBuf>, data: impl Into<Box<[u8]>>) -> Self {
        Self {
            path: path.into(),
            data: data.into(),
        }
    }

    /// Path the file was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum ResolutionFailure {
    #[error("include name is empty")]
    EmptyName,
    #[error("no include search paths are configured")]
    NoSearchPaths,
    #[error("could not find {name} in {} search path(s)", searched.len())]
    NotFound { name: String, searched: Vec<PathBuf> },
    #[error("short read from {}: expected {expected} bytes, got {actual}", path.display())]
    ShortRead {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Include callbacks as seen by an engine.
pub trait IncludeHandler {
    fn open(&mut self, request: &IncludeRequest<'_>) -> Result<IncludeHandle, ResolutionFailure>;

    fn close(&mut self, handle: IncludeHandle);
}

/// Locates `name` in the first directory of `search_path` that has an openable regular file by
/// that name, and loads it fully.
///
/// Once a directory has been selected, a failed or short read is an error; the search does not
/// fall through to later directories.
pub fn resolve(name: &str, search_path: &SearchPath) -> Result<IncludeHandle, ResolutionFailure> {
    if name.is_empty() {
        return Err(ResolutionFailure::EmptyName);
    }
    if search_path.is_empty() {
        return Err(ResolutionFailure::NoSearchPaths);
    }

    for dir in search_path.iter() {
        let candidate = dir.join(name);
        let file = match File::open(&candidate) {
            Ok(file) => file,
            Err(err) => {
                tracing::trace!(path = %candidate.display(), %err, "include candidate rejected");
                continue;
            }
        };
        match file.metadata() {
            Ok(meta) if meta.is_file() => return read_fully(candidate, file, meta.len()),
            Ok(_) => continue,
            Err(source) => {
                return Err(ResolutionFailure::Io {
                    path: candidate,
                    source,
                })
            }
        }
    }

    Err(ResolutionFailure::NotFound {
        name: name.to_owned(),
        searched: search_path.iter().map(Path::to_path_buf).collect(),
    })
}

fn read_fully(path: PathBuf, file: File, expected: u64) -> Result<IncludeHandle, ResolutionFailure> {
    let mut data = Vec::with_capacity(usize::try_from(expected).unwrap_or(0));
    if let Err(source) = file.take(expected).read_to_end(&mut data) {
        return Err(ResolutionFailure::Io { path, source });
    }

    let actual = data.len() as u64;
    if actual != expected {
        return Err(ResolutionFailure::ShortRead {
            path,
            expected,
            actual,
        });
    }

    tracing::debug!(path = %path.display(), bytes = actual, "resolved include");
    Ok(IncludeHandle::new(path, data))
}

/// Search-path backed [`IncludeHandler`].
#[derive(Debug)]
pub struct IncludeResolver {
    search_path: SearchPath,
    outstanding: usize,
    unresolved: Vec<String>,
}

impl IncludeResolver {
    pub fn new(search_path: SearchPath) -> Self {
        Self {
            search_path,
            outstanding: 0,
            unresolved: Vec::new(),
        }
    }

    pub fn search_path(&self) -> &SearchPath {
        &self.search_path
    }

    /// Number of handles handed out by `open` and not yet returned through `close`.
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Names that could not be opened, in request order.
    pub fn unresolved(&self) -> &[String] {
        &self.unresolved
    }
}

impl IncludeHandler for IncludeResolver {
    fn open(&mut self, request: &IncludeRequest<'_>) -> Result<IncludeHandle, ResolutionFailure> {
        tracing::debug!(
            name = request.name,
            kind = ?request.kind,
            parent = request.parent.unwrap_or("<none>"),
            "include requested"
        );
        match resolve(request.name, &self.search_path) {
            Ok(handle) => {
                self.outstanding += 1;
                Ok(handle)
            }
            Err(err) => {
                self.unresolved.push(request.name.to_owned());
                tracing::debug!(name = request.name, %err, "include resolution failed");
                Err(err)
            }
        }
    }

    fn close(&mut self, handle: IncludeHandle) {
        debug_assert!(self.outstanding > 0, "include handle closed more than once");
        self.outstanding = self.outstanding.saturating_sub(1);
        drop(handle);
    }
}
