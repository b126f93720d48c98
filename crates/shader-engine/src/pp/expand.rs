//! Macro table and expansion.
//!
//! Expansion tracks a hide set per token: a token produced by expanding `M` carries `M` and is
//! never expanded as `M` again, so self-referential macros terminate.

use std::collections::{HashMap, VecDeque};

use super::lex::{self, Token, TokenKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Macro {
    /// `None` for object-like macros.
    pub params: Option<Vec<String>>,
    pub body: Vec<Token>,
}

impl Macro {
    pub fn object(body: &str) -> Self {
        Self {
            params: None,
            body: lex::trim(&lex::tokenize(body)).to_vec(),
        }
    }

    /// Compares definitions the way redefinition checks need: whitespace runs are equivalent.
    fn same_definition(&self, other: &Macro) -> bool {
        fn shape(tokens: &[Token]) -> Vec<&str> {
            tokens
                .iter()
                .map(|t| if t.is_space() { " " } else { t.text.as_str() })
                .collect()
        }
        self.params == other.params && shape(&self.body) == shape(&other.body)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ExpandError {
    UnterminatedArguments(String),
    ArgumentCount {
        name: String,
        expected: usize,
        got: usize,
    },
}

impl ExpandError {
    pub fn message(&self) -> String {
        match self {
            Self::UnterminatedArguments(name) => {
                format!("Unterminated argument list invoking macro '{name}'")
            }
            Self::ArgumentCount {
                name,
                expected,
                got,
            } => format!("Macro '{name}' expects {expected} argument(s), got {got}"),
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct MacroTable {
    macros: HashMap<String, Macro>,
}

impl MacroTable {
    pub fn is_defined(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    /// Defines `name`. Returns `false` when a different definition already exists.
    pub fn define(&mut self, name: &str, mac: Macro) -> bool {
        match self.macros.get(name) {
            Some(existing) if !existing.same_definition(&mac) => false,
            _ => {
                self.macros.insert(name.to_owned(), mac);
                true
            }
        }
    }

    /// Defines `name`, replacing any earlier definition.
    pub fn redefine(&mut self, name: &str, mac: Macro) {
        self.macros.insert(name.to_owned(), mac);
    }

    pub fn undefine(&mut self, name: &str) {
        self.macros.remove(name);
    }

    pub fn expand(&self, tokens: Vec<Token>) -> Result<Vec<Token>, ExpandError> {
        let mut input: VecDeque<Token> = tokens.into();
        let mut out = Vec::new();

        while let Some(tok) = input.pop_front() {
            if tok.kind != TokenKind::Ident || tok.hide.contains(&tok.text) {
                out.push(tok);
                continue;
            }
            let Some(mac) = self.macros.get(&tok.text) else {
                out.push(tok);
                continue;
            };

            let mut hide = tok.hide.clone();
            hide.push(tok.text.clone());

            let replacement = match &mac.params {
                None => mac.body.clone(),
                Some(params) => {
                    let Some(args) = take_arguments(&mut input, &tok.text)? else {
                        out.push(tok);
                        continue;
                    };
                    let args = match_arguments(&tok.text, params, args)?;
                    let expanded = args
                        .into_iter()
                        .map(|arg| self.expand(arg))
                        .collect::<Result<Vec<_>, _>>()?;
                    substitute(&mac.body, params, &expanded)
                }
            };

            for mut t in replacement.into_iter().rev() {
                for h in &hide {
                    if !t.hide.contains(h) {
                        t.hide.push(h.clone());
                    }
                }
                input.push_front(t);
            }
        }

        Ok(out)
    }
}

/// Consumes `( args )` following a function-like macro name. Returns `None`, consuming nothing,
/// when the next non-space token is not `(`.
fn take_arguments(
    input: &mut VecDeque<Token>,
    name: &str,
) -> Result<Option<Vec<Vec<Token>>>, ExpandError> {
    let Some(open) = input.iter().position(|t| !t.is_space()) else {
        return Ok(None);
    };
    if !input[open].is_punct("(") {
        return Ok(None);
    }
    input.drain(..=open);

    let mut args = vec![Vec::new()];
    let mut depth = 0usize;
    while let Some(tok) = input.pop_front() {
        if tok.is_punct("(") {
            depth += 1;
        } else if tok.is_punct(")") {
            if depth == 0 {
                return Ok(Some(args));
            }
            depth -= 1;
        } else if tok.is_punct(",") && depth == 0 {
            args.push(Vec::new());
            continue;
        }
        if let Some(last) = args.last_mut() {
            last.push(tok);
        }
    }
    Err(ExpandError::UnterminatedArguments(name.to_owned()))
}

fn match_arguments(
    name: &str,
    params: &[String],
    args: Vec<Vec<Token>>,
) -> Result<Vec<Vec<Token>>, ExpandError> {
    let args: Vec<Vec<Token>> = args.into_iter().map(|a| lex::trim(&a).to_vec()).collect();
    // `F()` passes a single empty argument, which matches zero parameters.
    if params.is_empty() && args.len() == 1 && args[0].is_empty() {
        return Ok(Vec::new());
    }
    if args.len() != params.len() {
        return Err(ExpandError::ArgumentCount {
            name: name.to_owned(),
            expected: params.len(),
            got: args.len(),
        });
    }
    Ok(args)
}

fn substitute(body: &[Token], params: &[String], args: &[Vec<Token>]) -> Vec<Token> {
    let mut out = Vec::with_capacity(body.len());
    for tok in body {
        let param = (tok.kind == TokenKind::Ident)
            .then(|| params.iter().position(|p| *p == tok.text))
            .flatten();
        match param {
            Some(i) => out.extend(args[i].iter().cloned()),
            None => out.push(tok.clone()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn function(params: &[&str], body: &str) -> Macro {
        Macro {
            params: Some(params.iter().map(|p| (*p).to_owned()).collect()),
            body: lex::trim(&lex::tokenize(body)).to_vec(),
        }
    }

    fn expand(table: &MacroTable, line: &str) -> Result<String, ExpandError> {
        table
            .expand(lex::tokenize(line))
            .map(|tokens| lex::concat(&tokens))
    }

    #[test]
    fn object_macros_expand_and_rescan() {
        let mut table = MacroTable::default();
        table.define("A", Macro::object("B + 1"));
        table.define("B", Macro::object("2"));
        assert_eq!(expand(&table, "x = A;").unwrap(), "x = 2 + 1;");
    }

    #[test]
    fn self_reference_terminates() {
        let mut table = MacroTable::default();
        table.define("X", Macro::object("X + 1"));
        table.define("P", Macro::object("Q"));
        table.define("Q", Macro::object("P"));
        assert_eq!(expand(&table, "X").unwrap(), "X + 1");
        assert_eq!(expand(&table, "P").unwrap(), "P");
    }

    #[test]
    fn function_macros_substitute_expanded_arguments() {
        let mut table = MacroTable::default();
        table.define("ONE", Macro::object("1"));
        table.define("ADD", function(&["a", "b"], "((a) + (b))"));
        table.define("ZERO", function(&[], "0"));
        assert_eq!(
            expand(&table, "ADD(ONE, f(2, 3))").unwrap(),
            "((1) + (f(2, 3)))"
        );
        assert_eq!(expand(&table, "ZERO()").unwrap(), "0");
        // Name without parentheses is left alone.
        assert_eq!(expand(&table, "ADD + 1").unwrap(), "ADD + 1");
    }

    #[test]
    fn argument_errors_are_reported() {
        let mut table = MacroTable::default();
        table.define("ADD", function(&["a", "b"], "a + b"));
        assert_eq!(
            expand(&table, "ADD(1)").unwrap_err(),
            ExpandError::ArgumentCount {
                name: "ADD".into(),
                expected: 2,
                got: 1
            }
        );
        assert_eq!(
            expand(&table, "ADD(1, 2").unwrap_err(),
            ExpandError::UnterminatedArguments("ADD".into())
        );
    }

    #[test]
    fn redefinition_must_match() {
        let mut table = MacroTable::default();
        assert!(table.define("A", Macro::object("1  +  2")));
        assert!(table.define("A", Macro::object("1 + 2")));
        assert!(!table.define("A", Macro::object("3")));
        table.undefine("A");
        assert!(!table.is_defined("A"));
        assert!(table.define("A", Macro::object("3")));
    }
}
