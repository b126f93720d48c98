//! Built-in directive-level preprocessor.
//!
//! Handles `#include`, object-like and function-like `#define`, `#undef`, the conditional
//! family and `#error`. `#pragma` lines pass through, `#line` is ignored. The `#` and `##`
//! operators inside macro bodies are not interpreted.

mod expand;
mod expr;
mod lex;
mod source;

use shader_harness::{
    normalize_line_endings, Diagnostic, IncludeHandler, IncludeKind, IncludeRequest,
    MacroDefinition, PreprocessResult, Preprocessor,
};

use self::expand::{Macro, MacroTable};
use self::lex::{Token, TokenKind};
use self::source::{logical_lines, CommentStripper};

/// Default limit on `#include` nesting.
pub const DEFAULT_MAX_INCLUDE_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinPreprocessor {
    pub max_include_depth: usize,
}

impl Default for BuiltinPreprocessor {
    fn default() -> Self {
        Self {
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
        }
    }
}

impl Preprocessor for BuiltinPreprocessor {
    fn preprocess(
        &self,
        filename: &str,
        source: &str,
        defines: &[MacroDefinition],
        includes: &mut dyn IncludeHandler,
    ) -> PreprocessResult {
        let mut session = Session {
            max_include_depth: self.max_include_depth,
            macros: MacroTable::default(),
            includes,
            output: String::new(),
            diagnostics: Vec::new(),
        };
        for define in defines {
            session
                .macros
                .redefine(&define.identifier, Macro::object(&define.definition));
        }

        session.run_file(filename, source, 0);
        tracing::debug!(
            file = filename,
            bytes = session.output.len(),
            errors = session.diagnostics.len(),
            "preprocessed"
        );
        PreprocessResult::from_parts(session.diagnostics, session.output.into_bytes())
    }
}

/// One open `#if` group.
#[derive(Debug)]
struct Conditional {
    /// Lines in the current branch are emitted.
    active: bool,
    /// Some branch of this group has been (or can no longer be) taken.
    taken: bool,
    parent_active: bool,
    seen_else: bool,
}

struct Session<'a> {
    max_include_depth: usize,
    macros: MacroTable,
    includes: &'a mut dyn IncludeHandler,
    output: String,
    diagnostics: Vec<Diagnostic>,
}

impl Session<'_> {
    fn error(&mut self, file: &str, line: u32, message: impl Into<String>) {
        self.diagnostics
            .push(Diagnostic::new(Some(file), line, message));
    }

    fn run_file(&mut self, file: &str, text: &str, depth: usize) {
        let mut conds: Vec<Conditional> = Vec::new();
        let mut comments = CommentStripper::default();

        for (line_no, raw) in logical_lines(text) {
            let line = comments.strip(&raw);
            let active = conds.last().map_or(true, |c| c.active);

            if let Some(rest) = line.trim_start().strip_prefix('#') {
                let rest = rest.trim_start();
                let name_len = rest
                    .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                    .unwrap_or(rest.len());
                let (name, args) = rest.split_at(name_len);
                let args = args.trim();
                if let Err(message) =
                    self.directive(file, line_no, name, args, &line, &mut conds, active, depth)
                {
                    self.error(file, line_no, message);
                }
            } else if active {
                match self.macros.expand(lex::tokenize(&line)) {
                    Ok(tokens) => {
                        self.output.push_str(&lex::concat(&tokens));
                        self.output.push('\n');
                    }
                    Err(err) => self.error(file, line_no, err.message()),
                }
            }
        }

        let eof_line = u32::try_from(text.split_terminator('\n').count().max(1)).unwrap_or(u32::MAX);
        if comments.in_block() {
            self.error(file, eof_line, "Unterminated comment");
        }
        if !conds.is_empty() {
            self.error(file, eof_line, "Unterminated #if");
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn directive(
        &mut self,
        file: &str,
        line_no: u32,
        name: &str,
        args: &str,
        line: &str,
        conds: &mut Vec<Conditional>,
        active: bool,
        depth: usize,
    ) -> Result<(), String> {
        match name {
            "if" | "ifdef" | "ifndef" => {
                let value = if !active {
                    Ok(false)
                } else if name == "if" {
                    self.condition(args)
                } else {
                    macro_name(args, name)
                        .map(|m| self.macros.is_defined(m) == (name == "ifdef"))
                };
                // A group whose condition failed to evaluate is still opened, as false.
                let taken = value.as_ref().map_or(false, |v| *v);
                conds.push(Conditional {
                    active: active && taken,
                    taken: !active || taken,
                    parent_active: active,
                    seen_else: false,
                });
                value.map(drop)
            }
            "elif" => {
                let cond = conds.last_mut().ok_or("#elif without #if")?;
                if cond.seen_else {
                    return Err("#elif after #else".into());
                }
                if cond.taken {
                    cond.active = false;
                    return Ok(());
                }
                let value = self.condition(args)?;
                cond.active = value;
                cond.taken = value;
                Ok(())
            }
            "else" => {
                let cond = conds.last_mut().ok_or("#else without #if")?;
                if cond.seen_else {
                    return Err("#else after #else".into());
                }
                cond.active = cond.parent_active && !cond.taken;
                cond.taken = true;
                cond.seen_else = true;
                Ok(())
            }
            "endif" => {
                conds.pop().map(drop).ok_or_else(|| "#endif without #if".into())
            }
            _ if !active => Ok(()),
            "" => Ok(()),
            "define" => self.define(args),
            "undef" => {
                let name = macro_name(args, "undef")?;
                self.macros.undefine(name);
                Ok(())
            }
            "include" => self.include(file, args, depth),
            "error" => Err(if args.is_empty() {
                "#error".to_owned()
            } else {
                format!("#error {args}")
            }),
            "pragma" => {
                self.output.push_str(line.trim());
                self.output.push('\n');
                Ok(())
            }
            "line" => {
                tracing::trace!(file, line = line_no, "ignoring #line");
                Ok(())
            }
            other => Err(format!("Unknown directive #{other}")),
        }
    }

    /// Evaluates an `#if`/`#elif` expression.
    fn condition(&self, args: &str) -> Result<bool, String> {
        let tokens = self.replace_defined(lex::tokenize(args))?;
        let tokens = self.macros.expand(tokens).map_err(|e| e.message())?;
        expr::evaluate(&tokens)
            .map(|v| v != 0)
            .map_err(|e| e.to_string())
    }

    /// Rewrites `defined X` and `defined(X)` into `1`/`0` before macro expansion.
    fn replace_defined(&self, tokens: Vec<Token>) -> Result<Vec<Token>, String> {
        let mut out = Vec::with_capacity(tokens.len());
        let mut iter = tokens.into_iter().filter(|t| !t.is_space()).peekable();
        while let Some(tok) = iter.next() {
            if !(tok.kind == TokenKind::Ident && tok.text == "defined") {
                out.push(tok);
                out.push(Token::new(TokenKind::Space, " "));
                continue;
            }
            let parens = iter.peek().is_some_and(|t| t.is_punct("("));
            if parens {
                iter.next();
            }
            let name = iter
                .next()
                .filter(|t| t.kind == TokenKind::Ident)
                .ok_or("Operator 'defined' requires an identifier")?;
            if parens && !iter.next().is_some_and(|t| t.is_punct(")")) {
                return Err("Missing ')' after 'defined'".into());
            }
            let value = if self.macros.is_defined(&name.text) { "1" } else { "0" };
            out.push(Token::new(TokenKind::Number, value));
            out.push(Token::new(TokenKind::Space, " "));
        }
        Ok(out)
    }

    fn define(&mut self, args: &str) -> Result<(), String> {
        let name_len = args
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(args.len());
        let (name, rest) = args.split_at(name_len);
        if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
            return Err("Macro names must be identifiers".into());
        }
        if name == "defined" {
            return Err("'defined' cannot be used as a macro name".into());
        }

        let mac = match rest.strip_prefix('(') {
            Some(params) => {
                let (params, body) = params
                    .split_once(')')
                    .ok_or("Missing ')' in macro parameter list")?;
                let params: Vec<String> = if params.trim().is_empty() {
                    Vec::new()
                } else {
                    params
                        .split(',')
                        .map(|p| {
                            let p = p.trim();
                            let valid = p.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_')
                                && p.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
                            valid
                                .then(|| p.to_owned())
                                .ok_or_else(|| format!("Invalid macro parameter '{p}'"))
                        })
                        .collect::<Result<_, _>>()?
                };
                Macro {
                    params: Some(params),
                    body: lex::trim(&lex::tokenize(body)).to_vec(),
                }
            }
            None => Macro::object(rest),
        };

        if self.macros.define(name, mac) {
            Ok(())
        } else {
            Err(format!("'{name}' already defined"))
        }
    }

    fn include(&mut self, file: &str, args: &str, depth: usize) -> Result<(), String> {
        let (kind, name) = match include_target(args) {
            Some(target) => target,
            None => {
                let expanded = self
                    .macros
                    .expand(lex::tokenize(args))
                    .map_err(|e| e.message())?;
                include_target(lex::concat(&expanded).trim())
                    .ok_or("#include expects \"FILENAME\" or <FILENAME>")?
            }
        };
        if depth + 1 > self.max_include_depth {
            return Err("#include nested too deeply".into());
        }

        let request = IncludeRequest {
            kind,
            name: &name,
            parent: Some(file),
        };
        let handle = self
            .includes
            .open(&request)
            .map_err(|err| format!("Include file '{name}' could not be opened: {err}"))?;
        let text = normalize_line_endings(&String::from_utf8_lossy(handle.data()));
        self.includes.close(handle);

        self.run_file(&name, &text, depth + 1);
        Ok(())
    }
}

fn macro_name<'s>(args: &'s str, directive: &str) -> Result<&'s str, String> {
    let name = args.split_whitespace().next().unwrap_or("");
    let valid = name.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(name)
    } else {
        Err(format!("#{directive} requires a macro name"))
    }
}

fn include_target(args: &str) -> Option<(IncludeKind, String)> {
    let (kind, close, rest) = if let Some(rest) = args.strip_prefix('"') {
        (IncludeKind::Quoted, '"', rest)
    } else if let Some(rest) = args.strip_prefix('<') {
        (IncludeKind::System, '>', rest)
    } else {
        return None;
    };
    let end = rest.find(close)?;
    let name = &rest[..end];
    (!name.is_empty()).then(|| (kind, name.to_owned()))
}
