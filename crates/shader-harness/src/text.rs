//! Source text loading.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TextLoadError {
    #[error("could not read source file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Reads `path` fully and normalizes `\r\n` line endings to `\n`.
///
/// Bytes that are not valid UTF-8 are replaced with U+FFFD; the engine contract is text based.
pub fn load_source(path: &Path) -> Result<String, TextLoadError> {
    let bytes = fs::read(path).map_err(|source| TextLoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                valid_up_to = err.utf8_error().valid_up_to(),
                "source file is not valid UTF-8; replacing invalid sequences"
            );
            String::from_utf8_lossy(err.as_bytes()).into_owned()
        }
    };

    Ok(normalize_line_endings(&text))
}

/// Replaces every `\r\n` pair with `\n`. Lone `\r` characters are kept.
pub fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crlf_is_normalized_but_lone_cr_is_kept() {
        assert_eq!(normalize_line_endings("a\r\nb\r\n"), "a\nb\n");
        assert_eq!(normalize_line_endings("a\rb"), "a\rb");
        assert_eq!(normalize_line_endings(""), "");
    }

    #[test]
    fn load_source_reads_and_normalizes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shader.hlsl");
        fs::write(&path, b"float4 x;\r\n#define Y 1\r\n").unwrap();

        let text = load_source(&path).unwrap();
        assert_eq!(text, "float4 x;\n#define Y 1\n");
    }

    #[test]
    fn load_source_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_source(&dir.path().join("missing.hlsl")).unwrap_err();
        assert!(matches!(err, TextLoadError::Read { .. }), "{err:?}");
        assert!(err.to_string().contains("missing.hlsl"));
    }
}
