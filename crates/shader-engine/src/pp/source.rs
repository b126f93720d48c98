//! Line splicing and comment removal.

/// Splits `text` into logical lines, joining lines that end in a backslash. Each entry carries
/// the 1-based number of its first physical line.
pub(crate) fn logical_lines(text: &str) -> Vec<(u32, String)> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut start = 1;
    let mut continued = false;

    for (n, raw) in text.split_terminator('\n').enumerate() {
        if !continued {
            start = u32::try_from(n + 1).unwrap_or(u32::MAX);
        }
        match raw.strip_suffix('\\') {
            Some(body) => {
                current.push_str(body);
                continued = true;
            }
            None => {
                current.push_str(raw);
                lines.push((start, std::mem::take(&mut current)));
                continued = false;
            }
        }
    }
    if continued {
        lines.push((start, current));
    }
    lines
}

/// Removes `//` and `/* */` comments line by line, carrying block comment state across lines.
/// Comments are replaced by a single space; literals are left alone.
#[derive(Debug, Default)]
pub(crate) struct CommentStripper {
    in_block: bool,
}

impl CommentStripper {
    pub fn in_block(&self) -> bool {
        self.in_block
    }

    pub fn strip(&mut self, line: &str) -> String {
        let mut out = String::with_capacity(line.len());
        let mut chars = line.chars().peekable();

        while let Some(c) = chars.next() {
            if self.in_block {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    self.in_block = false;
                    out.push(' ');
                }
                continue;
            }
            match c {
                '/' if chars.peek() == Some(&'/') => break,
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    self.in_block = true;
                }
                '"' | '\'' => {
                    out.push(c);
                    while let Some(d) = chars.next() {
                        out.push(d);
                        if d == '\\' {
                            if let Some(escaped) = chars.next() {
                                out.push(escaped);
                            }
                        } else if d == c {
                            break;
                        }
                    }
                }
                _ => out.push(c),
            }
        }
        if self.in_block && !out.is_empty() {
            out.push(' ');
        }
        out
    }
}
