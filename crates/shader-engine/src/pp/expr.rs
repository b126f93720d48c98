//! `#if` expression evaluation over already-expanded tokens.

use thiserror::Error;

use super::lex::{Token, TokenKind};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum ExprError {
    #[error("#if with no expression")]
    Empty,
    #[error("Unexpected token '{0}' in preprocessor expression")]
    Unexpected(String),
    #[error("Unexpected end of preprocessor expression")]
    UnexpectedEnd,
    #[error("Invalid integer constant '{0}'")]
    BadNumber(String),
    #[error("Division by zero in preprocessor expression")]
    DivisionByZero,
}

/// Evaluates an integer constant expression. Identifiers left after macro expansion are 0.
pub(crate) fn evaluate(tokens: &[Token]) -> Result<i64, ExprError> {
    let tokens: Vec<&Token> = tokens.iter().filter(|t| !t.is_space()).collect();
    if tokens.is_empty() {
        return Err(ExprError::Empty);
    }
    let mut parser = Parser { tokens, pos: 0 };
    let value = parser.conditional(true)?;
    match parser.peek() {
        None => Ok(value),
        Some(tok) => Err(ExprError::Unexpected(tok.text.clone())),
    }
}

fn parse_number(text: &str) -> Result<i64, ExprError> {
    let digits = text.trim_end_matches(['u', 'U', 'l', 'L']);
    let parsed = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        u64::from_str_radix(hex, 16)
    } else if digits.len() > 1 && digits.starts_with('0') {
        u64::from_str_radix(&digits[1..], 8)
    } else {
        digits.parse::<u64>()
    };
    parsed
        .map(|v| v as i64)
        .map_err(|_| ExprError::BadNumber(text.to_owned()))
}

fn binary_precedence(op: &str) -> Option<u8> {
    Some(match op {
        "||" => 1,
        "&&" => 2,
        "|" => 3,
        "^" => 4,
        "&" => 5,
        "==" | "!=" => 6,
        "<" | ">" | "<=" | ">=" => 7,
        "<<" | ">>" => 8,
        "+" | "-" => 9,
        "*" | "/" | "%" => 10,
        _ => return None,
    })
}

struct Parser<'a> {
    tokens: Vec<&'a Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos).copied()
    }

    fn next(&mut self) -> Result<&'a Token, ExprError> {
        let tok = self.peek().ok_or(ExprError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(tok)
    }

    fn eat(&mut self, punct: &str) -> bool {
        if self.peek().is_some_and(|t| t.is_punct(punct)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, punct: &str) -> Result<(), ExprError> {
        let tok = self.next()?;
        if tok.is_punct(punct) {
            Ok(())
        } else {
            Err(ExprError::Unexpected(tok.text.clone()))
        }
    }

    /// `live` is false inside branches whose value cannot matter (`0 && x`, the untaken arm of
    /// `?:`); division by zero is not an error there.
    fn conditional(&mut self, live: bool) -> Result<i64, ExprError> {
        let cond = self.binary(1, live)?;
        if !self.eat("?") {
            return Ok(cond);
        }
        let a = self.conditional(live && cond != 0)?;
        self.expect(":")?;
        let b = self.conditional(live && cond == 0)?;
        Ok(if cond != 0 { a } else { b })
    }

    fn binary(&mut self, min_prec: u8, live: bool) -> Result<i64, ExprError> {
        let mut lhs = self.unary(live)?;
        loop {
            let Some(tok) = self.peek() else { break };
            if tok.kind != TokenKind::Punct {
                break;
            }
            let Some(prec) = binary_precedence(&tok.text) else {
                break;
            };
            if prec < min_prec {
                break;
            }
            self.pos += 1;
            let op = tok.text.as_str();
            let rhs_live = match op {
                "&&" => live && lhs != 0,
                "||" => live && lhs == 0,
                _ => live,
            };
            let rhs = self.binary(prec + 1, rhs_live)?;
            lhs = apply(op, lhs, rhs, live)?;
        }
        Ok(lhs)
    }

    fn unary(&mut self, live: bool) -> Result<i64, ExprError> {
        let tok = self.next()?;
        match tok.kind {
            TokenKind::Number => parse_number(&tok.text),
            TokenKind::Ident => Ok(0),
            TokenKind::Punct => match tok.text.as_str() {
                "(" => {
                    let value = self.conditional(live)?;
                    self.expect(")")?;
                    Ok(value)
                }
                "!" => Ok(i64::from(self.unary(live)? == 0)),
                "~" => Ok(!self.unary(live)?),
                "-" => Ok(self.unary(live)?.wrapping_neg()),
                "+" => self.unary(live),
                _ => Err(ExprError::Unexpected(tok.text.clone())),
            },
            TokenKind::Literal | TokenKind::Space => Err(ExprError::Unexpected(tok.text.clone())),
        }
    }
}

fn apply(op: &str, a: i64, b: i64, live: bool) -> Result<i64, ExprError> {
    let value = match op {
        "||" => i64::from(a != 0 || b != 0),
        "&&" => i64::from(a != 0 && b != 0),
        "|" => a | b,
        "^" => a ^ b,
        "&" => a & b,
        "==" => i64::from(a == b),
        "!=" => i64::from(a != b),
        "<" => i64::from(a < b),
        ">" => i64::from(a > b),
        "<=" => i64::from(a <= b),
        ">=" => i64::from(a >= b),
        "<<" => a.wrapping_shl(b as u32),
        ">>" => a.wrapping_shr(b as u32),
        "+" => a.wrapping_add(b),
        "-" => a.wrapping_sub(b),
        "*" => a.wrapping_mul(b),
        "/" | "%" if b == 0 => {
            if live {
                return Err(ExprError::DivisionByZero);
            }
            0
        }
        "/" => a.wrapping_div(b),
        "%" => a.wrapping_rem(b),
        _ => return Err(ExprError::Unexpected(op.to_owned())),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pp::lex::tokenize;

    fn eval(expr: &str) -> Result<i64, ExprError> {
        evaluate(&tokenize(expr))
    }

    #[test]
    fn arithmetic_and_precedence() {
        assert_eq!(eval("1 + 2 * 3").unwrap(), 7);
        assert_eq!(eval("(1 + 2) * 3").unwrap(), 9);
        assert_eq!(eval("10 - 4 - 3").unwrap(), 3);
        assert_eq!(eval("1 << 4 | 1").unwrap(), 17);
        assert_eq!(eval("-3 + +5").unwrap(), 2);
        assert_eq!(eval("~0").unwrap(), -1);
        assert_eq!(eval("7 % 4 == 3 && !0").unwrap(), 1);
        assert_eq!(eval("2 > 1 ? 10 : 20").unwrap(), 10);
        assert_eq!(eval("0 ? 10 : 1 ? 30 : 40").unwrap(), 30);
    }

    #[test]
    fn number_forms() {
        assert_eq!(eval("0x1F").unwrap(), 31);
        assert_eq!(eval("010").unwrap(), 8);
        assert_eq!(eval("42UL").unwrap(), 42);
        assert_eq!(eval("0").unwrap(), 0);
        assert_eq!(
            eval("1.5").unwrap_err(),
            ExprError::BadNumber("1.5".into())
        );
    }

    #[test]
    fn unknown_identifiers_are_zero() {
        assert_eq!(eval("UNDEFINED_THING").unwrap(), 0);
        assert_eq!(eval("UNDEFINED_THING + 2").unwrap(), 2);
    }

    #[test]
    fn division_by_zero_only_when_evaluated() {
        assert_eq!(eval("1 / 0").unwrap_err(), ExprError::DivisionByZero);
        assert_eq!(eval("0 && 1 / 0").unwrap(), 0);
        assert_eq!(eval("1 || 1 % 0").unwrap(), 1);
        assert_eq!(eval("1 ? 2 : 3 / 0").unwrap(), 2);
    }

    #[test]
    fn malformed_expressions() {
        assert_eq!(eval("").unwrap_err(), ExprError::Empty);
        assert_eq!(eval("1 +").unwrap_err(), ExprError::UnexpectedEnd);
        assert_eq!(eval("(1").unwrap_err(), ExprError::UnexpectedEnd);
        assert_eq!(eval("1 2").unwrap_err(), ExprError::Unexpected("2".into()));
        assert_eq!(
            eval("\"s\"").unwrap_err(),
            ExprError::Unexpected("\"s\"".into())
        );
    }
}
