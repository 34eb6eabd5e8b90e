//! Scene node tree types.

use serde::{Deserialize, Serialize};

/// Object identifier assigned to geometry, model, material and texture nodes.
///
/// Identifiers are unique within one bake and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub i64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A typed node property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeProperty {
    /// Signed integer (object ids are stored this way).
    Int(i64),
    /// Double precision float.
    Float(f64),
    /// UTF-8 string.
    Str(String),
    /// Opaque bytes.
    Bytes(Vec<u8>),
}

impl NodeProperty {
    /// The integer value, if this is an integer property.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// The float value, if this is a float property.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// The string value, if this is a string property.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(v) => Some(v),
            _ => None,
        }
    }

    /// The bytes, if this is a bytes property.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(v) => Some(v),
            _ => None,
        }
    }
}

impl From<i64> for NodeProperty {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<NodeId> for NodeProperty {
    fn from(id: NodeId) -> Self {
        Self::Int(id.0)
    }
}

impl From<f64> for NodeProperty {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<f32> for NodeProperty {
    fn from(v: f32) -> Self {
        Self::Float(f64::from(v))
    }
}

impl From<&str> for NodeProperty {
    fn from(v: &str) -> Self {
        Self::Str(v.to_owned())
    }
}

impl From<String> for NodeProperty {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<Vec<u8>> for NodeProperty {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

/// A node in the baked scene tree.
///
/// Nodes own their children. Relationships between objects are not expressed
/// through ownership but as identifier pairs in a connections node, so the
/// tree serializes without cycles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneNode {
    /// Node name.
    pub name: String,
    /// Ordered properties.
    pub properties: Vec<NodeProperty>,
    /// Child nodes forming the sub-tree.
    pub children: Vec<SceneNode>,
    /// Object identifier, for nodes that represent objects.
    pub id: Option<NodeId>,
}

impl SceneNode {
    /// Creates an empty node with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Append a property.
    #[must_use]
    pub fn with_property(mut self, property: impl Into<NodeProperty>) -> Self {
        self.properties.push(property.into());
        self
    }

    /// Append a child node.
    #[must_use]
    pub fn with_child(mut self, child: SceneNode) -> Self {
        self.children.push(child);
        self
    }

    /// Set the object identifier.
    #[must_use]
    pub fn with_id(mut self, id: NodeId) -> Self {
        self.id = Some(id);
        self
    }

    /// First direct child with the given name.
    pub fn child(&self, name: &str) -> Option<&SceneNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Direct children with the given name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a SceneNode> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Number of nodes in this sub-tree, including `self`.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(SceneNode::node_count).sum::<usize>()
    }

    /// Visit every node in this sub-tree, depth first.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a SceneNode)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }
}
