//! Selector parser
//!
//! Single left-to-right recursive-descent pass over the token list. The
//! grammar needs one token of lookahead past an identifier to tell a class
//! name (`Button`) from a bare predicate (`text="OK"`); everything else is
//! decided by the current token.

use regex::Regex;

use super::ast::{
    Attr, AttrKind, CompareOp, Filter, Link, NameTest, Operand, Predicate, Relation, Selector,
    Step,
};
use super::error::SelectorSyntaxError;
use super::lexer::{Token, TokenKind, tokenize};

/// Largest `n` accepted in `>n`, `<n`, `+n` and `-n`
pub const MAX_CONNECTOR_OFFSET: i64 = 1 << 16;

/// Compile selector source text.
pub fn parse(src: &str) -> Result<Selector, SelectorSyntaxError> {
    let tokens = tokenize(src)?;
    Parser { tokens, pos: 0 }.parse_selector()
}

/// Literal value before type checking
enum RawValue {
    Str(String),
    Int(i64),
    Bool(bool),
    Null,
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.pos + offset).min(last)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn skip_space(&mut self) {
        while self.peek().kind == TokenKind::Space {
            self.advance();
        }
    }

    fn unexpected(&self, expected: &'static str) -> SelectorSyntaxError {
        let token = self.peek();
        SelectorSyntaxError::UnexpectedToken {
            position: token.pos,
            expected,
            found: token.kind.describe(),
        }
    }

    // ─── Selector ───────────────────────────────────────────────────────────

    fn parse_selector(mut self) -> Result<Selector, SelectorSyntaxError> {
        self.skip_space();
        if self.peek().kind == TokenKind::Eof {
            return Err(SelectorSyntaxError::Empty);
        }

        // Source order: steps[i] and relations[i] joins steps[i] to steps[i + 1]
        let mut steps = Vec::new();
        let mut relations = Vec::new();
        let mut target: Option<usize> = None;

        loop {
            let (step, marked_at) = self.parse_step()?;
            if let Some(at_pos) = marked_at {
                if target.is_some() {
                    return Err(SelectorSyntaxError::DuplicateTarget { position: at_pos });
                }
                target = Some(steps.len());
            }
            steps.push(step);

            match self.peek().kind {
                TokenKind::Eof => break,
                TokenKind::Space => {
                    self.skip_space();
                    if self.peek().kind == TokenKind::Eof {
                        break;
                    }
                    relations.push(self.parse_relation()?);
                }
                _ => return Err(self.unexpected("whitespace or end of input")),
            }
        }

        let step_count = steps.len();
        let mut chain: Vec<Link> = Vec::with_capacity(step_count);
        // Reverse into anchor-first order. The link for source step i carries
        // the relation to source step i - 1.
        for i in (0..step_count).rev() {
            let next = if i > 0 { Some(relations[i - 1]) } else { None };
            chain.push(Link {
                step: steps[i].clone(),
                next,
            });
        }

        let min_depth = chain_min_depth(&chain);
        Ok(Selector {
            chain,
            target: target.map(|i| step_count - 1 - i).unwrap_or(0),
            explicit_target: target.is_some(),
            min_depth,
        })
    }

    /// Parses the connector after the whitespace that follows a step.
    fn parse_relation(&mut self) -> Result<Relation, SelectorSyntaxError> {
        let symbol = match self.peek().kind {
            TokenKind::Gt | TokenKind::Lt | TokenKind::Plus | TokenKind::Minus => {
                self.advance().kind
            }
            _ => return Ok(Relation::Ancestor),
        };

        let offset = match self.peek().kind {
            TokenKind::Int(n) => {
                let token = self.advance();
                if n < 1 {
                    return Err(SelectorSyntaxError::UnexpectedToken {
                        position: token.pos,
                        expected: "a positive offset",
                        found: token.kind.describe(),
                    });
                }
                if n > MAX_CONNECTOR_OFFSET {
                    return Err(SelectorSyntaxError::OffsetOutOfRange {
                        position: token.pos,
                        max: MAX_CONNECTOR_OFFSET,
                    });
                }
                Some(n as usize)
            }
            _ => None,
        };

        if self.peek().kind != TokenKind::Space {
            return Err(self.unexpected("whitespace after connector"));
        }
        self.skip_space();

        Ok(match symbol {
            TokenKind::Gt => Relation::Parent(offset.unwrap_or(1)),
            TokenKind::Lt => Relation::Child(offset),
            TokenKind::Plus => Relation::PrevSibling(offset.unwrap_or(1)),
            _ => Relation::NextSibling(offset.unwrap_or(1)),
        })
    }

    // ─── Steps ──────────────────────────────────────────────────────────────

    /// Returns the step and, if it was marked with `@`, the marker position.
    fn parse_step(&mut self) -> Result<(Step, Option<usize>), SelectorSyntaxError> {
        let start = self.peek().pos;
        let marked_at = if self.peek().kind == TokenKind::At {
            Some(self.advance().pos)
        } else {
            None
        };

        let mut name = None;
        let mut filters = Vec::new();

        match self.peek().kind.clone() {
            TokenKind::Star => {
                self.advance();
                name = Some(NameTest::Any);
            }
            TokenKind::Ident(ident) => {
                if op_of(&self.peek_at(1).kind).is_some() {
                    let predicate = self.parse_predicate(false)?;
                    filters.push(Filter::Expr(vec![vec![predicate]]));
                } else {
                    self.advance();
                    name = Some(NameTest::Class(ident));
                }
            }
            _ => {}
        }

        while self.peek().kind == TokenKind::LBracket {
            filters.push(self.parse_bracket()?);
        }

        if name.is_none() && filters.is_empty() {
            return Err(match self.peek().kind {
                TokenKind::Eof | TokenKind::Space => {
                    SelectorSyntaxError::EmptyStep { position: start }
                }
                _ => self.unexpected("a step"),
            });
        }

        Ok((Step { name, filters }, marked_at))
    }

    fn parse_bracket(&mut self) -> Result<Filter, SelectorSyntaxError> {
        self.advance(); // '['
        self.skip_space();

        if let TokenKind::Int(n) = self.peek().kind {
            self.advance();
            self.skip_space();
            self.expect_close()?;
            return Ok(Filter::Index(n));
        }

        let mut any_of = Vec::new();
        loop {
            let mut all_of = Vec::new();
            loop {
                all_of.push(self.parse_predicate(true)?);
                self.skip_space();
                if self.peek().kind == TokenKind::And {
                    self.advance();
                    self.skip_space();
                    continue;
                }
                break;
            }
            any_of.push(all_of);

            if self.peek().kind == TokenKind::Or {
                self.advance();
                self.skip_space();
                continue;
            }
            break;
        }

        self.expect_close()?;
        Ok(Filter::Expr(any_of))
    }

    fn expect_close(&mut self) -> Result<(), SelectorSyntaxError> {
        if self.peek().kind == TokenKind::RBracket {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected("']'"))
        }
    }

    // ─── Predicates ─────────────────────────────────────────────────────────

    fn parse_predicate(&mut self, in_bracket: bool) -> Result<Predicate, SelectorSyntaxError> {
        let name_pos = self.peek().pos;
        let TokenKind::Ident(name) = self.peek().kind.clone() else {
            return Err(self.unexpected("an attribute name"));
        };
        let attr = Attr::from_name(&name).ok_or(SelectorSyntaxError::UnknownAttribute {
            position: name_pos,
            name,
        })?;
        self.advance();

        if in_bracket {
            self.skip_space();
        }
        let op_pos = self.peek().pos;
        let op = op_of(&self.peek().kind).ok_or_else(|| self.unexpected("an operator"))?;
        self.advance();
        if in_bracket {
            self.skip_space();
        }

        let value_pos = self.peek().pos;
        let value = self.parse_value()?;
        check_predicate(attr, op, value, op_pos, value_pos)
    }

    fn parse_value(&mut self) -> Result<RawValue, SelectorSyntaxError> {
        let value = match self.peek().kind.clone() {
            TokenKind::Str(s) => RawValue::Str(s),
            TokenKind::Int(n) => RawValue::Int(n),
            TokenKind::Minus => {
                if let TokenKind::Int(n) = self.peek_at(1).kind {
                    self.advance();
                    RawValue::Int(-n)
                } else {
                    return Err(self.unexpected("a value"));
                }
            }
            TokenKind::Ident(word) => match word.as_str() {
                "true" => RawValue::Bool(true),
                "false" => RawValue::Bool(false),
                "null" => RawValue::Null,
                _ => return Err(self.unexpected("a value")),
            },
            _ => return Err(self.unexpected("a value")),
        };
        self.advance();
        Ok(value)
    }
}

fn op_of(kind: &TokenKind) -> Option<CompareOp> {
    Some(match kind {
        TokenKind::Eq => CompareOp::Eq,
        TokenKind::NotEq => CompareOp::NotEq,
        TokenKind::Contains => CompareOp::Contains,
        TokenKind::StartsWith => CompareOp::StartsWith,
        TokenKind::EndsWith => CompareOp::EndsWith,
        TokenKind::Match => CompareOp::Regex,
        TokenKind::Lt => CompareOp::Lt,
        TokenKind::Le => CompareOp::Le,
        TokenKind::Gt => CompareOp::Gt,
        TokenKind::Ge => CompareOp::Ge,
        _ => return None,
    })
}

/// Type-check a predicate and compile its operand.
fn check_predicate(
    attr: Attr,
    op: CompareOp,
    value: RawValue,
    op_pos: usize,
    value_pos: usize,
) -> Result<Predicate, SelectorSyntaxError> {
    let unsupported = || SelectorSyntaxError::UnsupportedOperator {
        position: op_pos,
        attr: attr.name(),
        op: op.symbol(),
    };
    let mismatch = |expected| SelectorSyntaxError::TypeMismatch {
        position: value_pos,
        attr: attr.name(),
        expected,
    };
    let equality = matches!(op, CompareOp::Eq | CompareOp::NotEq);

    let operand = match attr.kind() {
        AttrKind::Text => match value {
            _ if matches!(op, CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge) => {
                return Err(unsupported());
            }
            RawValue::Null if equality => Operand::Null,
            RawValue::Null => return Err(unsupported()),
            RawValue::Str(source) if op == CompareOp::Regex => {
                let regex = Regex::new(&source).map_err(|e| SelectorSyntaxError::InvalidRegex {
                    position: value_pos,
                    reason: e.to_string(),
                })?;
                Operand::Pattern(super::ast::Pattern::new(source, regex))
            }
            RawValue::Str(s) => Operand::Str(s),
            _ => return Err(mismatch("a string or null")),
        },
        AttrKind::Bool => {
            if !equality {
                return Err(unsupported());
            }
            match value {
                RawValue::Bool(b) => Operand::Bool(b),
                _ => return Err(mismatch("true or false")),
            }
        }
        AttrKind::Int => {
            if !matches!(
                op,
                CompareOp::Eq
                    | CompareOp::NotEq
                    | CompareOp::Lt
                    | CompareOp::Le
                    | CompareOp::Gt
                    | CompareOp::Ge
            ) {
                return Err(unsupported());
            }
            match value {
                RawValue::Int(n) => Operand::Int(n),
                _ => return Err(mismatch("an integer")),
            }
        }
    };

    Ok(Predicate { attr, op, operand })
}

/// Levels spanned by the chain: the anchor sits at level 0 and every
/// relation moves the next step up, down or sideways.
fn chain_min_depth(chain: &[Link]) -> usize {
    let mut level = 0i64;
    let (mut lo, mut hi) = (0i64, 0i64);
    for link in chain {
        if let Some(relation) = link.next {
            level = level.saturating_add(relation.level_delta());
            lo = lo.min(level);
            hi = hi.max(level);
        }
    }
    usize::try_from(hi.saturating_sub(lo).saturating_add(1)).unwrap_or(usize::MAX)
}
