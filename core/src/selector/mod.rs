//! Selector language
//!
//! Compiles selector source such as `@Button[text="Skip"] < FrameLayout` into
//! an immutable [`Selector`] and evaluates it against a [`NodeTree`].
//!
//! [`NodeTree`]: crate::node::NodeTree

mod ast;
mod error;
mod lexer;
mod matcher;
mod parser;

#[cfg(test)]
mod matcher_tests;

pub use ast::{
    Attr, AttrKind, CompareOp, Filter, NameTest, Operand, Pattern, Predicate, Relation, Selector,
    Step,
};
pub use error::SelectorSyntaxError;
pub use matcher::{query_selector, query_selector_all};
pub use parser::{MAX_CONNECTOR_OFFSET, parse};
