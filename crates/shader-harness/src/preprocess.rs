//! The preprocessing driver.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::defines::{build_macro_table, MacroDefinition, MalformedDefinitionError};
use crate::engine::{PreprocessResult, Preprocessor};
use crate::include::IncludeResolver;
use crate::search_path::SearchPath;
use crate::text::{load_source, TextLoadError};

/// File name used for diagnostics that do not name a file.
const UNKNOWN_FILE: &str = "unknown";

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{0} path is empty")]
    EmptyPath(&'static str),
    #[error("source and target are the same file: {}", .0.display())]
    SameSourceAndTarget(PathBuf),
}

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    MalformedDefinition(#[from] MalformedDefinitionError),
    #[error(transparent)]
    ReadSource(#[from] TextLoadError),
    #[error("preprocessing failed with {0} error(s)")]
    CompileErrors(usize),
    #[error("could not open {} for writing: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write {}: {source}", path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write to an output stream: {0}")]
    Stream(#[source] io::Error),
}

/// One preprocessing invocation: `source` is run through the engine and the result written to
/// `target`.
#[derive(Debug, Clone)]
pub struct PreprocessJob {
    pub source: PathBuf,
    pub target: PathBuf,
    /// Raw `NAME=VALUE` strings.
    pub defines: Vec<String>,
    pub search_path: SearchPath,
}

/// Macro table scoped to one engine call.
struct MacroTable(Vec<MacroDefinition>);

impl Drop for MacroTable {
    fn drop(&mut self) {
        tracing::trace!(count = self.0.len(), "released macro table");
    }
}

impl PreprocessJob {
    pub fn new(source: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            defines: Vec::new(),
            search_path: SearchPath::default(),
        }
    }

    /// Checks that must pass before anything is read or any engine is called.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.source.as_os_str().is_empty() {
            return Err(ValidationError::EmptyPath("source"));
        }
        if self.target.as_os_str().is_empty() {
            return Err(ValidationError::EmptyPath("target"));
        }
        if same_file(&self.source, &self.target) {
            return Err(ValidationError::SameSourceAndTarget(self.target.clone()));
        }
        Ok(())
    }

    /// Runs the job against `engine`.
    ///
    /// Includes that could not be opened and engine diagnostics are written to `stderr`; on
    /// diagnostics the target is left untouched. On success
    /// the output is written to the target and echoed to `stdout` followed by a newline.
    pub fn run(
        &self,
        engine: &dyn Preprocessor,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
    ) -> Result<(), PreprocessError> {
        self.validate()?;
        let macros = MacroTable(build_macro_table(&self.defines)?);
        let source = load_source(&self.source)?;

        let mut resolver = IncludeResolver::new(self.search_path.clone());
        let filename = self.source.to_string_lossy();
        tracing::debug!(
            source = %filename,
            defines = macros.0.len(),
            search_dirs = self.search_path.len(),
            "preprocessing"
        );
        let result = engine.preprocess(&filename, &source, &macros.0, &mut resolver);
        if resolver.outstanding() != 0 {
            tracing::warn!(
                outstanding = resolver.outstanding(),
                "engine returned with include handles still open"
            );
        }
        for name in resolver.unresolved() {
            writeln!(stderr, "Could not open {name}").map_err(PreprocessError::Stream)?;
        }

        match result {
            PreprocessResult::Failure { diagnostics } => {
                for diag in &diagnostics {
                    writeln!(stderr, "{}", diag.display_with(UNKNOWN_FILE))
                        .map_err(PreprocessError::Stream)?;
                }
                Err(PreprocessError::CompileErrors(diagnostics.len()))
            }
            PreprocessResult::Success { output } => {
                self.write_target(&output)?;
                stdout
                    .write_all(&output)
                    .and_then(|()| stdout.write_all(b"\n"))
                    .map_err(PreprocessError::Stream)?;
                Ok(())
            }
        }
    }

    fn write_target(&self, output: &[u8]) -> Result<(), PreprocessError> {
        let path = &self.target;
        let mut file = File::create(path).map_err(|source| PreprocessError::Io {
            path: path.clone(),
            source,
        })?;
        let write_failed = |source| PreprocessError::WriteFailed {
            path: path.clone(),
            source,
        };
        file.write_all(output).map_err(write_failed)?;
        file.sync_all().map_err(write_failed)?;
        tracing::debug!(target = %path.display(), bytes = output.len(), "wrote output");
        Ok(())
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
