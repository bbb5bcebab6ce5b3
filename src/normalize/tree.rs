use indexmap::IndexMap;

/// Leaf value of a deserialized builder tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

/// Universal shape of decoded builder data.
///
/// Only these three kinds exist; the deserializer has no way to produce
/// anything richer, so every match over a tree is exhaustive.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeNode {
    Scalar(Scalar),
    Sequence(Vec<TreeNode>),
    Mapping(IndexMap<String, TreeNode>),
}

impl TreeNode {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Scalar(Scalar::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Same as [`TreeNode::as_str`] but treats `""` as absent.
    pub fn as_non_empty_str(&self) -> Option<&str> {
        self.as_str().filter(|s| !s.is_empty())
    }

    pub fn as_mapping(&self) -> Option<&IndexMap<String, TreeNode>> {
        match self {
            Self::Mapping(map) => Some(map),
            _ => None,
        }
    }

    pub fn is_container(&self) -> bool {
        !matches!(self, Self::Scalar(_))
    }
}

impl From<&str> for TreeNode {
    fn from(value: &str) -> Self {
        Self::Scalar(Scalar::String(value.to_owned()))
    }
}

impl From<String> for TreeNode {
    fn from(value: String) -> Self {
        Self::Scalar(Scalar::String(value))
    }
}

impl From<i64> for TreeNode {
    fn from(value: i64) -> Self {
        Self::Scalar(Scalar::Int(value))
    }
}

impl From<bool> for TreeNode {
    fn from(value: bool) -> Self {
        Self::Scalar(Scalar::Bool(value))
    }
}

/// A mapping that carries the builder item signature: a string `type` and a
/// mapping `attr`.
#[derive(Debug, Clone, Copy)]
pub struct ItemNode<'a> {
    pub kind: &'a str,
    pub attr: &'a IndexMap<String, TreeNode>,
    node: &'a IndexMap<String, TreeNode>,
}

impl<'a> ItemNode<'a> {
    pub fn classify(node: &'a IndexMap<String, TreeNode>) -> Option<Self> {
        let kind = node.get("type")?.as_str()?;
        let attr = node.get("attr")?.as_mapping()?;
        Some(Self { kind, attr, node })
    }

    /// Non-empty string stored under `attr.<key>`.
    pub fn attr_str(&self, key: &str) -> Option<&'a str> {
        self.attr.get(key).and_then(TreeNode::as_non_empty_str)
    }

    /// Non-empty string stored directly on the item, next to `type`.
    pub fn field_str(&self, key: &str) -> Option<&'a str> {
        self.node.get(key).and_then(TreeNode::as_non_empty_str)
    }
}
