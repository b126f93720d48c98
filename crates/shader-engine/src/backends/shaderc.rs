use shader_harness::{Diagnostic, IncludeHandler, MacroDefinition, PreprocessResult, Preprocessor};

/// Preprocesses HLSL through shaderc. Only functional with the `shaderc` feature enabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShadercPreprocessor;

impl ShadercPreprocessor {
    pub fn is_available() -> bool {
        cfg!(feature = "shaderc")
    }
}

#[cfg(feature = "shaderc")]
impl Preprocessor for ShadercPreprocessor {
    fn preprocess(
        &self,
        filename: &str,
        source: &str,
        defines: &[MacroDefinition],
        includes: &mut dyn IncludeHandler,
    ) -> PreprocessResult {
        use std::cell::RefCell;

        use shader_harness::{IncludeKind, IncludeRequest};

        let failure = |message: &str| PreprocessResult::Failure {
            diagnostics: vec![Diagnostic::new(Some(filename), 0, message)],
        };

        // Borrowed by the include callback, so it must outlive `opt`.
        let includes = RefCell::new(includes);

        let Some(compiler) = shaderc::Compiler::new() else {
            return failure("cannot create `shaderc::Compiler`");
        };
        let Some(mut opt) = shaderc::CompileOptions::new() else {
            return failure("cannot create `shaderc::CompileOptions`");
        };
        opt.set_source_language(shaderc::SourceLanguage::HLSL);
        for define in defines {
            opt.add_macro_definition(&define.identifier, Some(&define.definition));
        }

        opt.set_include_callback(|name, ty, parent, _depth| {
            let kind = match ty {
                shaderc::IncludeType::Relative => IncludeKind::Quoted,
                shaderc::IncludeType::Standard => IncludeKind::System,
            };
            let request = IncludeRequest {
                kind,
                name,
                parent: Some(parent),
            };
            let mut includes = includes.borrow_mut();
            let handle = includes.open(&request).map_err(|e| e.to_string())?;
            let resolved = shaderc::ResolvedInclude {
                resolved_name: handle.path().to_string_lossy().into_owned(),
                content: String::from_utf8_lossy(handle.data()).into_owned(),
            };
            includes.close(handle);
            Ok(resolved)
        });

        match compiler.preprocess(source, filename, "main", Some(&opt)) {
            Ok(artifact) => PreprocessResult::Success {
                output: artifact.as_text().into_bytes(),
            },
            Err(shaderc::Error::CompilationError(_, text)) => PreprocessResult::Failure {
                diagnostics: parse_messages(&text),
            },
            Err(other) => failure(&other.to_string()),
        }
    }
}

#[cfg(not(feature = "shaderc"))]
impl Preprocessor for ShadercPreprocessor {
    fn preprocess(
        &self,
        filename: &str,
        _: &str,
        _: &[MacroDefinition],
        _: &mut dyn IncludeHandler,
    ) -> PreprocessResult {
        PreprocessResult::Failure {
            diagnostics: vec![Diagnostic::new(
                Some(filename),
                0,
                "shaderc backend is not enabled",
            )],
        }
    }
}

/// Splits shaderc's `file:line: error: message` text into diagnostics. Lines that do not follow
/// that shape become a diagnostic with no file or position.
#[cfg_attr(not(feature = "shaderc"), allow(dead_code))]
fn parse_messages(text: &str) -> Vec<Diagnostic> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.ends_with("generated."))
        .map(|line| {
            let mut parts = line.splitn(3, ':');
            let parsed = match (parts.next(), parts.next(), parts.next()) {
                (Some(file), Some(pos), Some(rest)) => pos
                    .trim()
                    .parse::<u32>()
                    .ok()
                    .map(|pos| (file, pos, rest.trim())),
                _ => None,
            };
            match parsed {
                Some((file, pos, rest)) => {
                    let message = rest
                        .strip_prefix("error:")
                        .map(str::trim)
                        .unwrap_or(rest);
                    Diagnostic::new(Some(file), pos, message)
                }
                None => Diagnostic::new(None, 0, line),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shaderc_messages_split_into_diagnostics() {
        let text = "main.hlsl:3: error: '#include' : Could not process include directive\n\
                    main.hlsl:9: error: 'FOO' : undeclared identifier\n\
                    2 errors generated.\n";
        let diags = parse_messages(text);
        assert_eq!(
            diags,
            vec![
                Diagnostic::new(
                    Some("main.hlsl"),
                    3,
                    "'#include' : Could not process include directive"
                ),
                Diagnostic::new(Some("main.hlsl"), 9, "'FOO' : undeclared identifier"),
            ]
        );
        assert_eq!(
            parse_messages("something odd"),
            vec![Diagnostic::new(None, 0, "something odd")]
        );
    }

    #[cfg(not(feature = "shaderc"))]
    #[test]
    fn disabled_backend_reports_a_diagnostic() {
        use shader_harness::IncludeRequest;

        struct NoIncludes;
        impl IncludeHandler for NoIncludes {
            fn open(
                &mut self,
                request: &IncludeRequest<'_>,
            ) -> Result<shader_harness::IncludeHandle, shader_harness::ResolutionFailure> {
                Err(shader_harness::ResolutionFailure::NotFound {
                    name: request.name.to_owned(),
                    searched: Vec::new(),
                })
            }

            fn close(&mut self, _: shader_harness::IncludeHandle) {}
        }

        assert!(!ShadercPreprocessor::is_available());
        let result = ShadercPreprocessor.preprocess("a.hlsl", "x", &[], &mut NoIncludes);
        assert_eq!(
            result.diagnostics(),
            &[Diagnostic::new(
                Some("a.hlsl"),
                0,
                "shaderc backend is not enabled"
            )]
        );
    }
}
