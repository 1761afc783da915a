//! Nested serde form of a node tree, used by snapshot files and platform
//! bridges.

use serde::{Deserialize, Serialize};

use super::{NodeAttrs, NodeId, NodeTree, NodeTreeBuilder};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawNode {
    #[serde(flatten)]
    pub attrs: NodeAttrs,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<RawNode>,
}

impl NodeTree {
    /// Flatten a nested node description into an arena.
    pub fn from_raw(raw: &RawNode) -> NodeTree {
        let mut builder = NodeTreeBuilder::new(raw.attrs.clone());
        let mut pending: Vec<(NodeId, &RawNode)> = vec![(builder.root(), raw)];

        while let Some((id, node)) = pending.pop() {
            for child in &node.children {
                let child_id = builder.add_child(id, child.attrs.clone());
                pending.push((child_id, child));
            }
        }

        builder.build()
    }

    /// Nested copy of the subtree rooted at `from`
    pub fn to_raw(&self, from: NodeId) -> RawNode {
        RawNode {
            attrs: self.attrs(from).clone(),
            children: self
                .children(from)
                .iter()
                .map(|&child| self.to_raw(child))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SNAPSHOT: &str = r#"{
        "package": "com.x",
        "name": "android.widget.FrameLayout",
        "children": [
            { "name": "android.widget.TextView", "text": "Title" },
            {
                "name": "android.widget.LinearLayout",
                "children": [
                    { "name": "android.widget.Button", "text": "OK", "clickable": true,
                      "bounds": { "left": 0, "top": 100, "right": 200, "bottom": 160 } }
                ]
            }
        ]
    }"#;

    #[test]
    fn flattens_nested_snapshot_in_child_order() {
        let raw: RawNode = serde_json::from_str(SNAPSHOT).unwrap();
        let tree = NodeTree::from_raw(&raw);

        assert_eq!(tree.len(), 4);
        assert_eq!(tree.height(), 3);

        let button = tree.node_at_path(&[1, 0]).unwrap();
        let attrs = tree.attrs(button);
        assert_eq!(attrs.text.as_deref(), Some("OK"));
        assert!(attrs.clickable);
        assert!(attrs.visible, "visible defaults to true");
        assert_eq!(attrs.bounds.center(), (100, 130));

        let title = tree.node_at_path(&[0]).unwrap();
        assert_eq!(tree.attrs(title).text.as_deref(), Some("Title"));
    }

    #[test]
    fn to_raw_restores_the_nested_form() {
        let raw: RawNode = serde_json::from_str(SNAPSHOT).unwrap();
        let tree = NodeTree::from_raw(&raw);
        assert_eq!(tree.to_raw(tree.root()), raw);
    }
}
