//! The engine boundary.
//!
//! Engines produce values and the harness owns them afterwards: there is no separate "free"
//! call, dropping the returned value releases it.

use crate::defines::MacroDefinition;
use crate::diagnostic::Diagnostic;
use crate::include::IncludeHandler;
use crate::reflect::{EffectReflection, ShaderReflection};

/// Outcome of one preprocessing call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreprocessResult {
    Failure { diagnostics: Vec<Diagnostic> },
    Success { output: Vec<u8> },
}

impl PreprocessResult {
    /// Builds a result from collected diagnostics: any diagnostic makes it a failure and the
    /// output is discarded.
    pub fn from_parts(diagnostics: Vec<Diagnostic>, output: Vec<u8>) -> Self {
        if diagnostics.is_empty() {
            Self::Success { output }
        } else {
            Self::Failure { diagnostics }
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Self::Failure { diagnostics } => diagnostics,
            Self::Success { .. } => &[],
        }
    }
}

pub trait Preprocessor {
    /// Preprocesses `source`, reported as `filename` in diagnostics. Include files are acquired
    /// through `includes` and every acquired handle is closed before returning.
    fn preprocess(
        &self,
        filename: &str,
        source: &str,
        defines: &[MacroDefinition],
        includes: &mut dyn IncludeHandler,
    ) -> PreprocessResult;
}

pub trait BytecodeParser {
    fn parse_shader(&self, profile: &str, bytecode: &[u8]) -> ShaderReflection;

    fn parse_effect(&self, profile: &str, bytecode: &[u8]) -> EffectReflection;
}
