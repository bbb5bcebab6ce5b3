use super::{
    deserialize::{MAX_DEPTH, Unrecognized},
    extract::{Fragment, extract},
    tree::{ItemNode, TreeNode},
};

fn visit(node: &TreeNode, depth: usize, out: &mut Vec<Fragment>) -> Result<(), Unrecognized> {
    if depth > MAX_DEPTH {
        return Err(Unrecognized::TooDeep);
    }
    match node {
        TreeNode::Scalar(_) => {}
        TreeNode::Sequence(children) => {
            for child in children {
                visit(child, depth + 1, out)?;
            }
        }
        TreeNode::Mapping(entries) => {
            if let Some(item) = ItemNode::classify(entries) {
                out.extend(extract(item));
            }
            // Items nest inside other items (rows > wraps > columns), so
            // descend regardless.
            for child in entries.values() {
                visit(child, depth + 1, out)?;
            }
        }
    }
    Ok(())
}

/// Collect fragments from every item in pre-order. The order of the result
/// is the reading order of the migrated document.
pub fn walk(root: &TreeNode) -> Result<Vec<Fragment>, Unrecognized> {
    let mut fragments = Vec::new();
    visit(root, 0, &mut fragments)?;
    Ok(fragments)
}

#[cfg(test)]
mod tests {
    use indexmap::{IndexMap, indexmap};

    use super::*;

    fn column(content: &str) -> TreeNode {
        TreeNode::Mapping(indexmap! {
            "type".to_string() => TreeNode::from("column"),
            "attr".to_string() => TreeNode::Mapping(indexmap! {
                "content".to_string() => TreeNode::from(content),
            }),
        })
    }

    fn texts(fragments: Vec<Fragment>) -> Vec<String> {
        fragments
            .into_iter()
            .map(|fragment| match fragment {
                Fragment::Text(text) | Fragment::Image(text) => text,
            })
            .collect()
    }

    #[test]
    fn test_preorder_reading_order() {
        let tree = TreeNode::Sequence(vec![
            TreeNode::Mapping(indexmap! {
                "type".to_string() => TreeNode::from("section"),
                "attr".to_string() => TreeNode::Mapping(indexmap! {
                    "content".to_string() => TreeNode::from("A"),
                }),
                "wraps".to_string() => TreeNode::Sequence(vec![column("B")]),
            }),
            column("C"),
        ]);
        assert_eq!(texts(walk(&tree).unwrap()), ["A", "B", "C"]);
    }

    #[test]
    fn test_items_inside_attr_are_visited() {
        let tree = TreeNode::Mapping(indexmap! {
            "type".to_string() => TreeNode::from("tabs"),
            "attr".to_string() => TreeNode::Mapping(indexmap! {
                "tabs".to_string() => TreeNode::Sequence(vec![column("inner")]),
            }),
        });
        assert_eq!(texts(walk(&tree).unwrap()), ["inner"]);
    }

    #[test]
    fn test_no_items_yields_nothing() {
        let tree = TreeNode::Mapping(indexmap! {
            "attr".to_string() => TreeNode::Mapping(indexmap! {
                "content".to_string() => TreeNode::from("orphan"),
            }),
            "list".to_string() => TreeNode::Sequence(vec![TreeNode::from(1), TreeNode::from(true)]),
        });
        assert!(walk(&tree).unwrap().is_empty());
        assert!(walk(&TreeNode::Mapping(IndexMap::new())).unwrap().is_empty());
    }

    #[test]
    fn test_depth_guard() {
        let mut tree = TreeNode::Sequence(vec![]);
        for _ in 0..=MAX_DEPTH {
            tree = TreeNode::Sequence(vec![tree]);
        }
        assert_eq!(walk(&tree), Err(Unrecognized::TooDeep));
    }
}
