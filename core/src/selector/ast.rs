//! Compiled selector structure
//!
//! A `Selector` is a chain of steps stored from the anchor (the rightmost step
//! in source order) to the leftmost one. Each link carries the relation used
//! to reach the next link, so matching walks the chain front to back.

use std::fmt;

use regex::Regex;

// ═══════════════════════════════════════════════════════════════════════════
// Attributes
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attr {
    Id,
    Package,
    Name,
    Text,
    Desc,
    Clickable,
    Visible,
    Enabled,
    Focusable,
    Checked,
    Index,
    Depth,
    ChildCount,
    Left,
    Top,
    Right,
    Bottom,
    Width,
    Height,
}

/// Value type of an attribute, used for parse-time type checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrKind {
    Text,
    Bool,
    Int,
}

impl Attr {
    const ALL: [Attr; 19] = [
        Attr::Id,
        Attr::Package,
        Attr::Name,
        Attr::Text,
        Attr::Desc,
        Attr::Clickable,
        Attr::Visible,
        Attr::Enabled,
        Attr::Focusable,
        Attr::Checked,
        Attr::Index,
        Attr::Depth,
        Attr::ChildCount,
        Attr::Left,
        Attr::Top,
        Attr::Right,
        Attr::Bottom,
        Attr::Width,
        Attr::Height,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Attr::Id => "id",
            Attr::Package => "package",
            Attr::Name => "name",
            Attr::Text => "text",
            Attr::Desc => "desc",
            Attr::Clickable => "clickable",
            Attr::Visible => "visible",
            Attr::Enabled => "enabled",
            Attr::Focusable => "focusable",
            Attr::Checked => "checked",
            Attr::Index => "index",
            Attr::Depth => "depth",
            Attr::ChildCount => "childCount",
            Attr::Left => "left",
            Attr::Top => "top",
            Attr::Right => "right",
            Attr::Bottom => "bottom",
            Attr::Width => "width",
            Attr::Height => "height",
        }
    }

    pub fn kind(&self) -> AttrKind {
        match self {
            Attr::Id | Attr::Package | Attr::Name | Attr::Text | Attr::Desc => AttrKind::Text,
            Attr::Clickable | Attr::Visible | Attr::Enabled | Attr::Focusable | Attr::Checked => {
                AttrKind::Bool
            }
            Attr::Index
            | Attr::Depth
            | Attr::ChildCount
            | Attr::Left
            | Attr::Top
            | Attr::Right
            | Attr::Bottom
            | Attr::Width
            | Attr::Height => AttrKind::Int,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Predicates
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Contains,
    StartsWith,
    EndsWith,
    Regex,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "!=",
            CompareOp::Contains => "~=",
            CompareOp::StartsWith => "^=",
            CompareOp::EndsWith => "$=",
            CompareOp::Regex => "=~",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

/// Compiled regex that compares by its source text.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    pub(crate) fn new(source: String, regex: Regex) -> Self {
        Self { source, regex }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, haystack: &str) -> bool {
        self.regex.is_match(haystack)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Str(String),
    Bool(bool),
    Int(i64),
    Null,
    Pattern(Pattern),
}

/// `attr op value` test on a node's own attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub attr: Attr,
    pub op: CompareOp,
    pub operand: Operand,
}

/// One bracket of a step.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `[n]`: index in parent
    Index(i64),
    /// Disjunction of conjunctions: `a && b || c`
    Expr(Vec<Vec<Predicate>>),
}

// ═══════════════════════════════════════════════════════════════════════════
// Steps & Relations
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameTest {
    /// `*`
    Any,
    /// Class name; matches the full name or its last dotted segment
    Class(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub name: Option<NameTest>,
    pub filters: Vec<Filter>,
}

/// How the next link of the chain relates to the current node.
///
/// Read as "the step written to the left is the ... of the step to its right".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// `>` / `>n`: ancestor exactly n levels up
    Parent(usize),
    /// whitespace: any ancestor
    Ancestor,
    /// `<` any child, `<n` the n-th child (1-based)
    Child(Option<usize>),
    /// `+` / `+n`: sibling n positions before
    PrevSibling(usize),
    /// `-` / `-n`: sibling n positions after
    NextSibling(usize),
}

impl Relation {
    /// Level offset of the next step relative to the current one (negative = up)
    pub(crate) fn level_delta(&self) -> i64 {
        match self {
            Relation::Parent(n) => i64::try_from(*n).map_or(i64::MIN, |n| -n),
            Relation::Ancestor => -1,
            Relation::Child(_) => 1,
            Relation::PrevSibling(_) | Relation::NextSibling(_) => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Link {
    pub step: Step,
    pub next: Option<Relation>,
}

// ═══════════════════════════════════════════════════════════════════════════
// Selector
// ═══════════════════════════════════════════════════════════════════════════

/// Compiled selector. Immutable and reusable across scans.
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    pub(crate) chain: Vec<Link>,
    /// Index into `chain` of the node returned by a match
    pub(crate) target: usize,
    /// Whether `@` was written in the source
    pub(crate) explicit_target: bool,
    pub(crate) min_depth: usize,
}

impl Selector {
    /// Number of tree levels the chain spans; shallower trees cannot match
    pub fn min_depth(&self) -> usize {
        self.min_depth
    }

    /// Number of steps
    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }
}

impl std::str::FromStr for Selector {
    type Err = super::SelectorSyntaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        super::parse(s)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Canonical Source Output
// ═══════════════════════════════════════════════════════════════════════════

fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("\"")?;
    for c in s.chars() {
        match c {
            '\\' => f.write_str("\\\\")?,
            '"' => f.write_str("\\\"")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            c => write!(f, "{c}")?,
        }
    }
    f.write_str("\"")
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.attr.name(), self.op.symbol())?;
        match &self.operand {
            Operand::Str(s) => write_quoted(f, s),
            Operand::Pattern(p) => write_quoted(f, p.source()),
            Operand::Bool(b) => write!(f, "{b}"),
            Operand::Int(n) => write!(f, "{n}"),
            Operand::Null => f.write_str("null"),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Index(n) => write!(f, "[{n}]"),
            Filter::Expr(any_of) => {
                f.write_str("[")?;
                for (i, all_of) in any_of.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" || ")?;
                    }
                    for (j, pred) in all_of.iter().enumerate() {
                        if j > 0 {
                            f.write_str(" && ")?;
                        }
                        write!(f, "{pred}")?;
                    }
                }
                f.write_str("]")
            }
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(NameTest::Any) => f.write_str("*")?,
            Some(NameTest::Class(c)) => f.write_str(c)?,
            None => {}
        }
        for filter in &self.filters {
            write!(f, "{filter}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Relation::Ancestor => f.write_str(" "),
            Relation::Parent(1) => f.write_str(" > "),
            Relation::Parent(n) => write!(f, " >{n} "),
            Relation::Child(None) => f.write_str(" < "),
            Relation::Child(Some(n)) => write!(f, " <{n} "),
            Relation::PrevSibling(1) => f.write_str(" + "),
            Relation::PrevSibling(n) => write!(f, " +{n} "),
            Relation::NextSibling(1) => f.write_str(" - "),
            Relation::NextSibling(n) => write!(f, " -{n} "),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in (0..self.chain.len()).rev() {
            let link = &self.chain[i];
            if self.explicit_target && i == self.target {
                f.write_str("@")?;
            }
            write!(f, "{}", link.step)?;
            if i > 0 {
                // The relation between chain[i] (left) and chain[i - 1] (right)
                // is stored on the right-hand link.
                if let Some(relation) = self.chain[i - 1].next {
                    write!(f, "{relation}")?;
                }
            }
        }
        Ok(())
    }
}
