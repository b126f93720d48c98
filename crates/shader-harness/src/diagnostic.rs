use std::fmt;

/// A single engine-reported error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// File the error was reported against, if the engine knows it.
    pub file: Option<String>,
    /// 1-based position. Source diagnostics use line numbers; bytecode diagnostics use the
    /// unit of the parsed format (token number for shaders, byte offset for effects).
    pub position: u32,
    pub message: String,
}

impl Diagnostic {
    pub fn new(file: Option<&str>, position: u32, message: impl Into<String>) -> Self {
        Self {
            file: file.map(str::to_owned),
            position,
            message: message.into(),
        }
    }

    /// Formats as `file:position: ERROR: message`, substituting `fallback` when the diagnostic
    /// carries no file name.
    pub fn display_with<'a>(&'a self, fallback: &'a str) -> impl fmt::Display + 'a {
        DisplayWith {
            diag: self,
            fallback,
        }
    }
}

struct DisplayWith<'a> {
    diag: &'a Diagnostic,
    fallback: &'a str,
}

impl fmt::Display for DisplayWith<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: ERROR: {}",
            self.diag.file.as_deref().unwrap_or(self.fallback),
            self.diag.position,
            self.diag.message
        )
    }
}
