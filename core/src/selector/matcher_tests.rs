//! Tests for selector matching
//!
//! All queries run against one small window:
//!
//! ```text
//! FrameLayout (package com.x)
//! ├── LinearLayout (id com.x:id/bar)
//! │   ├── TextView "Title"
//! │   ├── android.widget.Button "Skip" (clickable)
//! │   └── TextView "5s"
//! └── FrameLayout
//!     └── android.widget.Button "OK" (clickable)
//! ```

use crate::node::{NodeAttrs, NodeId, NodeTree, NodeTreeBuilder, Rect};

use super::{parse, query_selector, query_selector_all};

struct Window {
    tree: NodeTree,
    root: NodeId,
    bar: NodeId,
    title: NodeId,
    skip: NodeId,
    countdown: NodeId,
    ok: NodeId,
}

fn node(name: &str, text: Option<&str>) -> NodeAttrs {
    NodeAttrs {
        package: Some("com.x".to_string()),
        name: Some(name.to_string()),
        text: text.map(str::to_string),
        ..Default::default()
    }
}

fn window() -> Window {
    let mut builder = NodeTreeBuilder::new(node("FrameLayout", None));
    let root = builder.root();

    let bar = builder.add_child(
        root,
        NodeAttrs {
            id: Some("com.x:id/bar".to_string()),
            ..node("LinearLayout", None)
        },
    );
    let title = builder.add_child(bar, node("TextView", Some("Title")));
    let skip = builder.add_child(
        bar,
        NodeAttrs {
            clickable: true,
            bounds: Rect::new(800, 50, 1000, 130),
            ..node("android.widget.Button", Some("Skip"))
        },
    );
    let countdown = builder.add_child(bar, node("TextView", Some("5s")));

    let content = builder.add_child(root, node("FrameLayout", None));
    let ok = builder.add_child(
        content,
        NodeAttrs {
            clickable: true,
            bounds: Rect::new(0, 1000, 1080, 1100),
            ..node("android.widget.Button", Some("OK"))
        },
    );

    Window {
        tree: builder.build(),
        root,
        bar,
        title,
        skip,
        countdown,
        ok,
    }
}

fn query(w: &Window, src: &str) -> Option<NodeId> {
    query_selector(&w.tree, w.root, &parse(src).unwrap())
}

#[test]
fn test_first_match_in_pre_order() {
    let w = window();
    assert_eq!(query(&w, "Button"), Some(w.skip));
    assert_eq!(query(&w, r#"Button[text="OK"]"#), Some(w.ok));
    assert_eq!(query(&w, r#"[text="Cancel"]"#), None);
}

#[test]
fn test_class_name_suffix() {
    let w = window();
    assert_eq!(query(&w, "widget.Button"), Some(w.skip));
    assert_eq!(query(&w, "android.widget.Button"), Some(w.skip));
    assert_eq!(query(&w, "ton"), None);
    assert_eq!(query(&w, "*[text=\"5s\"]"), Some(w.countdown));
}

#[test]
fn test_parent_and_ancestor() {
    let w = window();
    assert_eq!(query(&w, "LinearLayout > Button"), Some(w.skip));
    assert_eq!(query(&w, "@LinearLayout > Button"), Some(w.bar));
    assert_eq!(query(&w, r#"FrameLayout Button[text="OK"]"#), Some(w.ok));
    assert_eq!(query(&w, r#"LinearLayout Button[text="OK"]"#), None);
    assert_eq!(query(&w, r#"@[package="com.x"] >2 Button[text="OK"]"#), Some(w.root));
}

#[test]
fn test_child_relation() {
    let w = window();
    assert_eq!(query(&w, "@Button < LinearLayout"), Some(w.skip));
    assert_eq!(query(&w, "@TextView <3 LinearLayout"), Some(w.countdown));
    assert_eq!(query(&w, "@TextView <2 LinearLayout"), None);
}

#[test]
fn test_sibling_relations() {
    let w = window();
    // A + B: A is right before B
    assert_eq!(query(&w, "TextView + Button"), Some(w.skip));
    assert_eq!(query(&w, "@TextView + Button"), Some(w.title));
    // A - B: A is right after B
    assert_eq!(query(&w, "@TextView - Button"), Some(w.countdown));
    assert_eq!(query(&w, r#"@[text="5s"] -2 TextView"#), Some(w.countdown));
    assert_eq!(query(&w, "TextView +3 Button"), None);
}

#[test]
fn test_index_and_int_attributes() {
    let w = window();
    assert_eq!(query(&w, "TextView[2]"), Some(w.countdown));
    assert_eq!(query(&w, "[depth=2][childCount=0]"), Some(w.title));
    assert_eq!(query(&w, "Button[width>=100 && height<100]"), Some(w.skip));
    assert_eq!(query(&w, "Button[top>500]"), Some(w.ok));
    assert_eq!(query(&w, "LinearLayout[childCount!=3]"), None);
}

#[test]
fn test_string_operators_and_null() {
    let w = window();
    assert_eq!(query(&w, r#"[text^="Sk"]"#), Some(w.skip));
    assert_eq!(query(&w, r#"[text$="s"]"#), Some(w.countdown));
    assert_eq!(query(&w, r#"[text~="itl"]"#), Some(w.title));
    assert_eq!(query(&w, r#"[text=~"^\\d+s$"]"#), Some(w.countdown));
    assert_eq!(query(&w, "[id!=null]"), Some(w.bar));
    assert_eq!(query(&w, "FrameLayout[text=null]"), Some(w.root));
    // Missing text is not equal to any string
    assert_eq!(query(&w, r#"LinearLayout[text!="x"]"#), Some(w.bar));
}

#[test]
fn test_boolean_attributes_and_alternatives() {
    let w = window();
    assert_eq!(query(&w, "[clickable=true][visible=true]"), Some(w.skip));
    assert_eq!(query(&w, r#"[text="Nope" || text="OK"]"#), Some(w.ok));
    assert_eq!(query(&w, "Button[clickable=false]"), None);
}

#[test]
fn test_shallow_tree_short_circuits() {
    let w = window();
    let selector = parse("A > B > C > D").unwrap();
    assert!(selector.min_depth() > w.tree.height());
    assert_eq!(query_selector(&w.tree, w.root, &selector), None);
}

#[test]
fn test_query_from_subtree_root() {
    let w = window();
    let selector = parse("Button").unwrap();
    let content = w.tree.parent(w.ok).unwrap();
    assert_eq!(query_selector(&w.tree, content, &selector), Some(w.ok));
}

#[test]
fn test_query_all_in_pre_order() {
    let w = window();
    let selector = parse("Button").unwrap();
    assert_eq!(
        query_selector_all(&w.tree, w.root, &selector),
        vec![w.skip, w.ok]
    );

    // Both TextViews resolve to the same parent
    let selector = parse("@LinearLayout > TextView").unwrap();
    assert_eq!(query_selector_all(&w.tree, w.root, &selector), vec![w.bar]);
}

#[test]
fn test_query_is_deterministic() {
    let w = window();
    let selector = parse("LinearLayout *").unwrap();
    let first = query_selector(&w.tree, w.root, &selector);
    assert_eq!(first, Some(w.title));
    for _ in 0..5 {
        assert_eq!(query_selector(&w.tree, w.root, &selector), first);
    }
}
