//! A GLSL tokenizer that keeps every byte of the input.
//!
//! Comments and whitespace are kept as trivia, and preprocessor directives
//! are single opaque tokens, so concatenating the token texts reproduces the
//! input exactly.

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum TokenKind {
    Ident,
    Number,
    Punct,
    Directive,
    Comment,
    Space,
    Newline,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub text: String,
    /// The 1-based line of the stage source the token starts on, or 0 for
    /// synthesized tokens.
    pub line: u32,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, line: u32) -> Self {
        Self {
            kind,
            text: text.into(),
            line,
        }
    }

    pub fn is_trivia(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Space | TokenKind::Newline | TokenKind::Comment
        )
    }

    /// Whether the token is the significant punctuation or identifier `text`.
    pub fn is(&self, text: &str) -> bool {
        matches!(self.kind, TokenKind::Ident | TokenKind::Punct) && self.text == text
    }

    pub fn is_ident(&self) -> bool {
        self.kind == TokenKind::Ident
    }

    pub fn is_directive(&self) -> bool {
        self.kind == TokenKind::Directive
    }
}

/// A comment or string that was never closed.
#[derive(Debug)]
pub(crate) struct Unterminated {
    pub what: &'static str,
    pub line: u32,
}

const PUNCT3: [&str; 2] = ["<<=", ">>="];
const PUNCT2: [&str; 19] = [
    "++", "--", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "==", "!=", "<=", ">=", "&&",
    "||", "^^", "<<", ">>",
];

pub(crate) fn tokenize(text: &str) -> Result<Vec<Token>, Unterminated> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut idx = 0;
    let mut line = 1u32;
    let mut line_start = true;

    while idx < bytes.len() {
        let start = idx;
        let start_line = line;
        let c = bytes[idx];

        let kind = match c {
            b'\n' => {
                idx += 1;
                line += 1;
                line_start = true;
                tokens.push(Token::new(TokenKind::Newline, "\n", start_line));
                continue;
            }
            b'\r' if bytes.get(idx + 1) == Some(&b'\n') => {
                idx += 2;
                line += 1;
                line_start = true;
                tokens.push(Token::new(TokenKind::Newline, "\r\n", start_line));
                continue;
            }
            b' ' | b'\t' | b'\r' | 0x0b | 0x0c => {
                while idx < bytes.len() && matches!(bytes[idx], b' ' | b'\t' | b'\r' | 0x0b | 0x0c)
                {
                    if bytes[idx] == b'\r' && bytes.get(idx + 1) == Some(&b'\n') {
                        break;
                    }
                    idx += 1;
                }
                tokens.push(Token::new(TokenKind::Space, &text[start..idx], start_line));
                continue;
            }
            b'#' if line_start => {
                // runs to the end of the line, following backslash continuations
                while idx < bytes.len() && bytes[idx] != b'\n' {
                    if bytes[idx] == b'\\' {
                        let next = if bytes.get(idx + 1) == Some(&b'\r') {
                            idx + 2
                        } else {
                            idx + 1
                        };
                        if bytes.get(next) == Some(&b'\n') {
                            idx = next + 1;
                            line += 1;
                            continue;
                        }
                    }
                    idx += 1;
                }
                let mut end = idx;
                if end > start && bytes[end - 1] == b'\r' {
                    end -= 1;
                }
                idx = end;
                TokenKind::Directive
            }
            b'/' if bytes.get(idx + 1) == Some(&b'/') => {
                while idx < bytes.len() && bytes[idx] != b'\n' {
                    idx += 1;
                }
                if idx > start && bytes[idx - 1] == b'\r' {
                    idx -= 1;
                }
                TokenKind::Comment
            }
            b'/' if bytes.get(idx + 1) == Some(&b'*') => {
                idx += 2;
                loop {
                    if idx + 1 >= bytes.len() {
                        return Err(Unterminated {
                            what: "block comment",
                            line: start_line,
                        });
                    }
                    if bytes[idx] == b'*' && bytes[idx + 1] == b'/' {
                        idx += 2;
                        break;
                    }
                    if bytes[idx] == b'\n' {
                        line += 1;
                    }
                    idx += 1;
                }
                // a block comment does not end the leading whitespace of a line
                tokens.push(Token::new(TokenKind::Comment, &text[start..idx], start_line));
                continue;
            }
            b'"' => {
                idx += 1;
                while idx < bytes.len() && bytes[idx] != b'"' {
                    if bytes[idx] == b'\n' {
                        return Err(Unterminated {
                            what: "string",
                            line: start_line,
                        });
                    }
                    idx += 1;
                }
                if idx >= bytes.len() {
                    return Err(Unterminated {
                        what: "string",
                        line: start_line,
                    });
                }
                idx += 1;
                TokenKind::Punct
            }
            c if c.is_ascii_alphabetic() || c == b'_' => {
                while idx < bytes.len() && (bytes[idx].is_ascii_alphanumeric() || bytes[idx] == b'_')
                {
                    idx += 1;
                }
                TokenKind::Ident
            }
            c if c.is_ascii_digit()
                || (c == b'.' && bytes.get(idx + 1).is_some_and(u8::is_ascii_digit)) =>
            {
                let hex = c == b'0' && matches!(bytes.get(idx + 1), Some(b'x' | b'X'));
                while idx < bytes.len() {
                    let b = bytes[idx];
                    if b.is_ascii_alphanumeric() || b == b'.' || b == b'_' {
                        idx += 1;
                    } else if !hex
                        && matches!(b, b'+' | b'-')
                        && matches!(bytes[idx - 1], b'e' | b'E')
                    {
                        idx += 1;
                    } else {
                        break;
                    }
                }
                TokenKind::Number
            }
            _ => {
                let rest = &text[idx..];
                if let Some(op) = PUNCT3.iter().find(|op| rest.starts_with(*op)) {
                    idx += op.len();
                } else if let Some(op) = PUNCT2.iter().find(|op| rest.starts_with(*op)) {
                    idx += op.len();
                } else {
                    idx += rest.chars().next().map_or(1, char::len_utf8);
                }
                TokenKind::Punct
            }
        };

        line_start = false;
        tokens.push(Token::new(kind, &text[start..idx], start_line));
    }

    Ok(tokens)
}

/// Tokenize generated source, attributing every token to `line`.
pub(crate) fn synthesize(text: &str, line: u32) -> Vec<Token> {
    match tokenize(text) {
        Ok(mut tokens) => {
            for token in &mut tokens {
                token.line = line;
            }
            tokens
        }
        // generated text never holds comments or strings
        Err(_) => vec![Token::new(TokenKind::Punct, text, line)],
    }
}

/// Concatenate the text of `tokens`.
pub(crate) fn join(tokens: &[Token]) -> String {
    tokens.iter().map(|t| t.text.as_str()).collect()
}
