//! Line tokenizer for the preprocessor.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenKind {
    Ident,
    Number,
    /// String or character literal, quotes included.
    Literal,
    Punct,
    Space,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub text: String,
    /// Macros that must not be expanded again at this token.
    pub hide: Vec<String>,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            hide: Vec::new(),
        }
    }

    pub fn is_punct(&self, p: &str) -> bool {
        self.kind == TokenKind::Punct && self.text == p
    }

    pub fn is_space(&self) -> bool {
        self.kind == TokenKind::Space
    }
}

const PUNCT3: &[&str] = &["...", "<<=", ">>="];
const PUNCT2: &[&str] = &[
    "||", "&&", "==", "!=", "<=", ">=", "<<", ">>", "++", "--", "->", "+=", "-=", "*=", "/=",
    "%=", "&=", "|=", "^=", "##", "::",
];

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

pub(crate) fn tokenize(line: &str) -> Vec<Token> {
    let chars: Vec<char> = line.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let start = i;
        let kind = if c.is_whitespace() {
            while i < chars.len() && chars[i].is_whitespace() {
                i += 1;
            }
            TokenKind::Space
        } else if is_ident_start(c) {
            while i < chars.len() && is_ident_continue(chars[i]) {
                i += 1;
            }
            TokenKind::Ident
        } else if c.is_ascii_digit()
            || (c == '.' && chars.get(i + 1).is_some_and(|d| d.is_ascii_digit()))
        {
            i += 1;
            while i < chars.len() {
                let d = chars[i];
                let exponent_sign = (d == '+' || d == '-')
                    && matches!(chars[i - 1], 'e' | 'E' | 'p' | 'P');
                if is_ident_continue(d) || d == '.' || exponent_sign {
                    i += 1;
                } else {
                    break;
                }
            }
            TokenKind::Number
        } else if c == '"' || c == '\'' {
            i += 1;
            while i < chars.len() {
                match chars[i] {
                    '\\' => i += 2,
                    q if q == c => {
                        i += 1;
                        break;
                    }
                    _ => i += 1,
                }
            }
            i = i.min(chars.len());
            TokenKind::Literal
        } else {
            let rest: String = chars[i..chars.len().min(i + 3)].iter().collect();
            let len = PUNCT3
                .iter()
                .chain(PUNCT2)
                .find(|p| rest.starts_with(**p))
                .map_or(1, |p| p.len());
            i += len;
            TokenKind::Punct
        };
        tokens.push(Token::new(kind, chars[start..i].iter().collect::<String>()));
    }

    tokens
}

pub(crate) fn concat(tokens: &[Token]) -> String {
    tokens.iter().map(|t| t.text.as_str()).collect()
}

/// Drops leading and trailing whitespace tokens.
pub(crate) fn trim(tokens: &[Token]) -> &[Token] {
    let start = tokens.iter().position(|t| !t.is_space()).unwrap_or(tokens.len());
    let end = tokens.iter().rposition(|t| !t.is_space()).map_or(start, |e| e + 1);
    &tokens[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(line: &str) -> Vec<(TokenKind, String)> {
        tokenize(line).into_iter().map(|t| (t.kind, t.text)).collect()
    }

    #[test]
    fn splits_identifiers_numbers_and_punctuators() {
        use TokenKind::*;
        assert_eq!(
            kinds("x<<=0x1Fu+1.5e-3"),
            vec![
                (Ident, "x".to_owned()),
                (Punct, "<<=".to_owned()),
                (Number, "0x1Fu".to_owned()),
                (Punct, "+".to_owned()),
                (Number, "1.5e-3".to_owned()),
            ]
        );
        assert_eq!(
            kinds("a && !b"),
            vec![
                (Ident, "a".to_owned()),
                (Space, " ".to_owned()),
                (Punct, "&&".to_owned()),
                (Space, " ".to_owned()),
                (Punct, "!".to_owned()),
                (Ident, "b".to_owned()),
            ]
        );
    }

    #[test]
    fn literals_keep_escaped_quotes() {
        let tokens = tokenize(r#"f("a\"b", 'c')"#);
        assert_eq!(tokens[2].kind, TokenKind::Literal);
        assert_eq!(tokens[2].text, r#""a\"b""#);
        assert_eq!(tokens[5].text, "'c'");
        assert_eq!(concat(&tokens), r#"f("a\"b", 'c')"#);
    }

    #[test]
    fn unterminated_literal_runs_to_end_of_line() {
        let tokens = tokenize("\"abc\\");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].text, "\"abc\\");
    }

    #[test]
    fn trim_strips_outer_whitespace() {
        let tokens = tokenize("  a b  ");
        assert_eq!(concat(trim(&tokens)), "a b");
        assert!(trim(&tokenize("   ")).is_empty());
    }
}
