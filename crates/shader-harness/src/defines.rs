//! `-DNAME=VALUE` macro tables.

use thiserror::Error;

/// A predefined macro handed to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroDefinition {
    pub identifier: String,
    pub definition: String,
}

impl MacroDefinition {
    pub fn new(identifier: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            definition: definition.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid preprocessor define `{offending}` (expected NAME=VALUE)")]
pub struct MalformedDefinitionError {
    pub offending: String,
}

/// Parses one `NAME=VALUE` string. Exactly one `=` is allowed and neither side may be empty.
pub fn parse_definition(raw: &str) -> Result<MacroDefinition, MalformedDefinitionError> {
    let malformed = || MalformedDefinitionError {
        offending: raw.to_owned(),
    };

    let (identifier, definition) = raw.split_once('=').ok_or_else(malformed)?;
    if identifier.is_empty() || definition.is_empty() || definition.contains('=') {
        return Err(malformed());
    }
    Ok(MacroDefinition::new(identifier, definition))
}

/// Parses every raw define, preserving order. The first malformed entry aborts the build.
pub fn build_macro_table<S: AsRef<str>>(
    raw: &[S],
) -> Result<Vec<MacroDefinition>, MalformedDefinitionError> {
    raw.iter().map(|s| parse_definition(s.as_ref())).collect()
}
