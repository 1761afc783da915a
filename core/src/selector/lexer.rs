//! Selector tokenizer
//!
//! Produces a flat token list with byte offsets. Whitespace is significant
//! (it separates steps), so runs of it become a single `Space` token.

use super::error::SelectorSyntaxError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Ident(String),
    Str(String),
    Int(i64),
    At,
    Star,
    LBracket,
    RBracket,
    And,
    Or,
    Eq,
    NotEq,
    Contains,
    StartsWith,
    EndsWith,
    Match,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Space,
    Eof,
}

impl TokenKind {
    /// Human-readable form used in error messages
    pub(crate) fn describe(&self) -> String {
        match self {
            TokenKind::Ident(s) => format!("identifier '{s}'"),
            TokenKind::Str(_) => "string".to_string(),
            TokenKind::Int(n) => format!("integer {n}"),
            TokenKind::Space => "whitespace".to_string(),
            TokenKind::Eof => "end of input".to_string(),
            other => format!("'{}'", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            TokenKind::At => "@",
            TokenKind::Star => "*",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::And => "&&",
            TokenKind::Or => "||",
            TokenKind::Eq => "=",
            TokenKind::NotEq => "!=",
            TokenKind::Contains => "~=",
            TokenKind::StartsWith => "^=",
            TokenKind::EndsWith => "$=",
            TokenKind::Match => "=~",
            TokenKind::Lt => "<",
            TokenKind::Le => "<=",
            TokenKind::Gt => ">",
            TokenKind::Ge => ">=",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            _ => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub pos: usize,
}

pub(crate) fn tokenize(src: &str) -> Result<Vec<Token>, SelectorSyntaxError> {
    let chars: Vec<(usize, char)> = src.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (pos, c) = chars[i];
        let next = chars.get(i + 1).map(|&(_, c)| c);

        let (kind, width) = match c {
            c if c.is_whitespace() => {
                let mut j = i;
                while j < chars.len() && chars[j].1.is_whitespace() {
                    j += 1;
                }
                (TokenKind::Space, j - i)
            }
            '@' => (TokenKind::At, 1),
            '*' => (TokenKind::Star, 1),
            '[' => (TokenKind::LBracket, 1),
            ']' => (TokenKind::RBracket, 1),
            '+' => (TokenKind::Plus, 1),
            '-' => (TokenKind::Minus, 1),
            '&' if next == Some('&') => (TokenKind::And, 2),
            '|' if next == Some('|') => (TokenKind::Or, 2),
            '=' if next == Some('~') => (TokenKind::Match, 2),
            '=' => (TokenKind::Eq, 1),
            '!' if next == Some('=') => (TokenKind::NotEq, 2),
            '~' if next == Some('=') => (TokenKind::Contains, 2),
            '^' if next == Some('=') => (TokenKind::StartsWith, 2),
            '$' if next == Some('=') => (TokenKind::EndsWith, 2),
            '<' if next == Some('=') => (TokenKind::Le, 2),
            '<' => (TokenKind::Lt, 1),
            '>' if next == Some('=') => (TokenKind::Ge, 2),
            '>' => (TokenKind::Gt, 1),
            '"' | '\'' => {
                let (value, consumed) = lex_string(&chars, i)?;
                (TokenKind::Str(value), consumed)
            }
            c if c.is_ascii_digit() => {
                let mut j = i;
                while j < chars.len() && chars[j].1.is_ascii_digit() {
                    j += 1;
                }
                let end = chars.get(j).map(|&(p, _)| p).unwrap_or(src.len());
                let value = src[pos..end]
                    .parse::<i64>()
                    .map_err(|_| SelectorSyntaxError::IntegerOverflow { position: pos })?;
                (TokenKind::Int(value), j - i)
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut j = i;
                while j < chars.len() && is_ident_continue(chars[j].1) {
                    j += 1;
                }
                let end = chars.get(j).map(|&(p, _)| p).unwrap_or(src.len());
                (TokenKind::Ident(src[pos..end].to_string()), j - i)
            }
            other => {
                return Err(SelectorSyntaxError::UnexpectedChar {
                    position: pos,
                    found: other,
                });
            }
        };

        tokens.push(Token { kind, pos });
        i += width;
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        pos: src.len(),
    });
    Ok(tokens)
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

/// Lex a quoted string starting at `start`. Returns the unescaped value and
/// the number of chars consumed including both quotes.
fn lex_string(chars: &[(usize, char)], start: usize) -> Result<(String, usize), SelectorSyntaxError> {
    let (open_pos, quote) = chars[start];
    let mut value = String::new();
    let mut i = start + 1;

    while i < chars.len() {
        let (pos, c) = chars[i];
        match c {
            '\\' => {
                let Some(&(_, escaped)) = chars.get(i + 1) else {
                    break;
                };
                let unescaped = match escaped {
                    '\\' => '\\',
                    '"' => '"',
                    '\'' => '\'',
                    'n' => '\n',
                    't' => '\t',
                    other => {
                        return Err(SelectorSyntaxError::InvalidEscape {
                            position: pos,
                            found: other,
                        });
                    }
                };
                value.push(unescaped);
                i += 2;
            }
            c if c == quote => return Ok((value, i - start + 1)),
            c => {
                value.push(c);
                i += 1;
            }
        }
    }

    Err(SelectorSyntaxError::UnterminatedString { position: open_pos })
}
