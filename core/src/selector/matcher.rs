//! Selector matching against a node tree
//!
//! Every node of the queried subtree is tried as the anchor in pre-order.
//! From the anchor the chain is followed through parent and child links,
//! backtracking over every candidate for the existential relations
//! (`A B`, `A < B`). The first anchor for which the whole chain holds wins.

use super::ast::{Attr, CompareOp, Filter, NameTest, Operand, Predicate, Relation, Selector, Step};
use crate::node::{NodeId, NodeTree};

/// First node in pre-order (from `root`) matched by `selector`.
pub fn query_selector(tree: &NodeTree, root: NodeId, selector: &Selector) -> Option<NodeId> {
    if tree.height() < selector.min_depth() {
        return None;
    }
    tree.pre_order(root)
        .find_map(|anchor| match_at(tree, selector, 0, anchor).flatten())
}

/// Every matched node, in the pre-order of the anchors that produced them.
pub fn query_selector_all(tree: &NodeTree, root: NodeId, selector: &Selector) -> Vec<NodeId> {
    let mut found = Vec::new();
    if tree.height() < selector.min_depth() {
        return found;
    }
    for anchor in tree.pre_order(root) {
        if let Some(Some(target)) = match_at(tree, selector, 0, anchor)
            && !found.contains(&target)
        {
            found.push(target);
        }
    }
    found
}

/// Try to bind `chain[link]` to `node` and the rest of the chain beyond it.
///
/// Outer `None` means no binding exists. On success the inner value is the
/// target node if it lies at or beyond `link`.
fn match_at(tree: &NodeTree, selector: &Selector, link: usize, node: NodeId) -> Option<Option<NodeId>> {
    let current = &selector.chain[link];
    if !step_matches(tree, node, &current.step) {
        return None;
    }

    let rest = match current.next {
        None => None,
        Some(relation) => candidates(tree, node, relation)
            .into_iter()
            .find_map(|candidate| match_at(tree, selector, link + 1, candidate))?,
    };

    if selector.target == link {
        Some(Some(node))
    } else {
        Some(rest)
    }
}

fn candidates(tree: &NodeTree, node: NodeId, relation: Relation) -> Vec<NodeId> {
    match relation {
        Relation::Parent(n) => tree.ancestor(node, n).into_iter().collect(),
        Relation::Ancestor => {
            let mut ancestors = Vec::with_capacity(tree.depth(node));
            let mut current = node;
            while let Some(parent) = tree.parent(current) {
                ancestors.push(parent);
                current = parent;
            }
            ancestors
        }
        Relation::Child(None) => tree.children(node).to_vec(),
        Relation::Child(Some(n)) => tree
            .children(node)
            .get(n - 1)
            .copied()
            .into_iter()
            .collect(),
        Relation::PrevSibling(n) => tree.sibling(node, -(n as i64)).into_iter().collect(),
        Relation::NextSibling(n) => tree.sibling(node, n as i64).into_iter().collect(),
    }
}

// ─── Step Tests ─────────────────────────────────────────────────────────────

fn step_matches(tree: &NodeTree, node: NodeId, step: &Step) -> bool {
    let name_ok = match &step.name {
        None | Some(NameTest::Any) => true,
        Some(NameTest::Class(class)) => tree
            .attrs(node)
            .name
            .as_deref()
            .is_some_and(|name| class_matches(name, class)),
    };

    name_ok
        && step.filters.iter().all(|filter| match filter {
            Filter::Index(i) => tree.index_in_parent(node) as i64 == *i,
            Filter::Expr(any_of) => any_of
                .iter()
                .any(|all_of| all_of.iter().all(|p| predicate_holds(tree, node, p))),
        })
}

/// `Button` matches `Button` and `android.widget.Button`.
fn class_matches(name: &str, class: &str) -> bool {
    if name == class {
        return true;
    }
    name.len() > class.len()
        && name.ends_with(class)
        && name.as_bytes()[name.len() - class.len() - 1] == b'.'
}

enum Value<'a> {
    Text(Option<&'a str>),
    Bool(bool),
    Int(i64),
}

fn attr_value(tree: &NodeTree, node: NodeId, attr: Attr) -> Value<'_> {
    let attrs = tree.attrs(node);
    let bounds = attrs.bounds;
    match attr {
        Attr::Id => Value::Text(attrs.id.as_deref()),
        Attr::Package => Value::Text(attrs.package.as_deref()),
        Attr::Name => Value::Text(attrs.name.as_deref()),
        Attr::Text => Value::Text(attrs.text.as_deref()),
        Attr::Desc => Value::Text(attrs.desc.as_deref()),
        Attr::Clickable => Value::Bool(attrs.clickable),
        Attr::Visible => Value::Bool(attrs.visible),
        Attr::Enabled => Value::Bool(attrs.enabled),
        Attr::Focusable => Value::Bool(attrs.focusable),
        Attr::Checked => Value::Bool(attrs.checked),
        Attr::Index => Value::Int(tree.index_in_parent(node) as i64),
        Attr::Depth => Value::Int(tree.depth(node) as i64),
        Attr::ChildCount => Value::Int(tree.child_count(node) as i64),
        Attr::Left => Value::Int(bounds.left),
        Attr::Top => Value::Int(bounds.top),
        Attr::Right => Value::Int(bounds.right),
        Attr::Bottom => Value::Int(bounds.bottom),
        Attr::Width => Value::Int(bounds.width()),
        Attr::Height => Value::Int(bounds.height()),
    }
}

fn predicate_holds(tree: &NodeTree, node: NodeId, predicate: &Predicate) -> bool {
    let op = predicate.op;
    match (attr_value(tree, node, predicate.attr), &predicate.operand) {
        (Value::Text(value), Operand::Null) => match op {
            CompareOp::Eq => value.is_none(),
            CompareOp::NotEq => value.is_some(),
            _ => false,
        },
        (Value::Text(value), Operand::Str(expected)) => match op {
            CompareOp::Eq => value == Some(expected.as_str()),
            CompareOp::NotEq => value != Some(expected.as_str()),
            CompareOp::Contains => value.is_some_and(|v| v.contains(expected.as_str())),
            CompareOp::StartsWith => value.is_some_and(|v| v.starts_with(expected.as_str())),
            CompareOp::EndsWith => value.is_some_and(|v| v.ends_with(expected.as_str())),
            _ => false,
        },
        (Value::Text(value), Operand::Pattern(pattern)) => {
            value.is_some_and(|v| pattern.is_match(v))
        }
        (Value::Bool(value), Operand::Bool(expected)) => match op {
            CompareOp::Eq => value == *expected,
            CompareOp::NotEq => value != *expected,
            _ => false,
        },
        (Value::Int(value), Operand::Int(expected)) => match op {
            CompareOp::Eq => value == *expected,
            CompareOp::NotEq => value != *expected,
            CompareOp::Lt => value < *expected,
            CompareOp::Le => value <= *expected,
            CompareOp::Gt => value > *expected,
            CompareOp::Ge => value >= *expected,
            _ => false,
        },
        _ => false,
    }
}
