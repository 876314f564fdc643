//! Graph structures carried by GraphBinary.
//!
//! Elements are detached: the server sends ids and labels, while properties
//! and parents travel as null and are not materialized.

use std::fmt;


use super::data_type::DataType;
use super::value::Value;

// ============================================================================
// Vertex
// ============================================================================

/// Graph vertex.
///
/// Wire layout: `{id}{label}{properties}` where `id` is fully qualified,
/// `label` is an unqualified string and `properties` is always null.
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    /// Vertex id
    pub id: Box<Value>,
    /// Vertex label
    pub label: String,
}

impl Vertex {
    /// Create a new vertex.
    pub fn new(id: impl Into<Value>, label: impl Into<String>) -> Self {
        Self {
            id: Box::new(id.into()),
            label: label.into(),
        }
    }
}

impl fmt::Display for Vertex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v[{}]", self.id)
    }
}

// ============================================================================
// Edge
// ============================================================================

/// Graph edge.
///
/// Wire layout: `{id}{label}{inV id}{inV label}{outV id}{outV label}{parent}{properties}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    /// Edge id
    pub id: Box<Value>,
    /// Edge label
    pub label: String,
    /// Incoming vertex
    pub in_v: Vertex,
    /// Outgoing vertex
    pub out_v: Vertex,
}

impl Edge {
    /// Create a new edge.
    pub fn new(id: impl Into<Value>, label: impl Into<String>, in_v: Vertex, out_v: Vertex) -> Self {
        Self {
            id: Box::new(id.into()),
            label: label.into(),
            in_v,
            out_v,
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "e[{}][{}-{}->{}]",
            self.id, self.out_v.id, self.label, self.in_v.id
        )
    }
}

// ============================================================================
// Property / VertexProperty
// ============================================================================

/// Key/value property of an edge.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    /// Property key
    pub key: String,
    /// Property value
    pub value: Box<Value>,
}

impl Property {
    /// Create a new property.
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: Box::new(value.into()),
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p[{}->{}]", self.key, self.value)
    }
}

/// Property of a vertex, which has its own id.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexProperty {
    /// Property id
    pub id: Box<Value>,
    /// Property key
    pub label: String,
    /// Property value
    pub value: Box<Value>,
}

impl VertexProperty {
    /// Create a new vertex property.
    pub fn new(id: impl Into<Value>, label: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            id: Box::new(id.into()),
            label: label.into(),
            value: Box::new(value.into()),
        }
    }
}

impl fmt::Display for VertexProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vp[{}->{}]", self.label, self.value)
    }
}

// ============================================================================
// Path
// ============================================================================

/// Traversal path: the objects visited and the step labels attached to each.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    /// Labels per object
    pub labels: Vec<Vec<String>>,
    /// Visited objects
    pub objects: Vec<Value>,
}

impl Path {
    /// Create a new path.
    pub fn new(labels: Vec<Vec<String>>, objects: Vec<Value>) -> Self {
        Self { labels, objects }
    }

    /// Object(s) carrying `label`.
    ///
    /// Returns the single object when the label occurs once and a list when
    /// it occurs several times. `None` when the label is absent or the path
    /// is malformed.
    pub fn get(&self, label: &str) -> Option<Value> {
        if self.labels.len() != self.objects.len() {
            return None;
        }
        let mut matches: Vec<Value> = self
            .labels
            .iter()
            .zip(&self.objects)
            .filter(|(labels, _)| labels.iter().any(|l| l == label))
            .map(|(_, object)| object.clone())
            .collect();
        match matches.len() {
            0 => None,
            1 => matches.pop(),
            _ => Some(Value::List(matches)),
        }
    }

    /// Number of objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the path is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "path[")?;
        for (i, object) in self.objects.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", object)?;
        }
        write!(f, "]")
    }
}

// ============================================================================
// Traverser / Binding
// ============================================================================

/// Traverser: a value with its bulk count.
#[derive(Debug, Clone, PartialEq)]
pub struct Traverser {
    /// Number of traversers this one represents
    pub bulk: i64,
    /// Carried value
    pub value: Box<Value>,
}

impl Traverser {
    /// Create a new traverser.
    pub fn new(bulk: i64, value: impl Into<Value>) -> Self {
        Self {
            bulk,
            value: Box::new(value.into()),
        }
    }
}

/// Named variable binding inside bytecode.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    /// Variable name
    pub key: String,
    /// Bound value
    pub value: Box<Value>,
}

impl Binding {
    /// Create a new binding.
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: Box::new(value.into()),
        }
    }
}

// ============================================================================
// GraphToken - enum tokens
// ============================================================================

/// Enum families with their own type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// `Barrier`
    Barrier,
    /// `Cardinality`
    Cardinality,
    /// `Column`
    Column,
    /// `Direction`
    Direction,
    /// `Operator`
    Operator,
    /// `Order`
    Order,
    /// `Pick`
    Pick,
    /// `Pop`
    Pop,
    /// `Scope`
    Scope,
    /// `T`
    T,
}

impl TokenKind {
    /// Type code of this enum family.
    pub fn data_type(self) -> DataType {
        match self {
            TokenKind::Barrier => DataType::Barrier,
            TokenKind::Cardinality => DataType::Cardinality,
            TokenKind::Column => DataType::Column,
            TokenKind::Direction => DataType::Direction,
            TokenKind::Operator => DataType::Operator,
            TokenKind::Order => DataType::Order,
            TokenKind::Pick => DataType::Pick,
            TokenKind::Pop => DataType::Pop,
            TokenKind::Scope => DataType::Scope,
            TokenKind::T => DataType::T,
        }
    }

    /// Enum family for a type code, if it is one.
    pub fn from_data_type(data_type: DataType) -> Option<Self> {
        let kind = match data_type {
            DataType::Barrier => TokenKind::Barrier,
            DataType::Cardinality => TokenKind::Cardinality,
            DataType::Column => TokenKind::Column,
            DataType::Direction => TokenKind::Direction,
            DataType::Operator => TokenKind::Operator,
            DataType::Order => TokenKind::Order,
            DataType::Pick => TokenKind::Pick,
            DataType::Pop => TokenKind::Pop,
            DataType::Scope => TokenKind::Scope,
            DataType::T => TokenKind::T,
            _ => return None,
        };
        Some(kind)
    }
}

/// Enum token such as `T.id` or `Direction.OUT`.
///
/// Serialized as its type code followed by the token name as a
/// fully-qualified string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GraphToken {
    /// Enum family
    pub kind: TokenKind,
    /// Token name
    pub value: String,
}

impl GraphToken {
    /// Create a new token.
    pub fn new(kind: TokenKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    /// `T` token (`id`, `label`, `key`, `value`)
    pub fn t(value: impl Into<String>) -> Self {
        Self::new(TokenKind::T, value)
    }

    /// `Direction` token (`OUT`, `IN`, `BOTH`)
    pub fn direction(value: impl Into<String>) -> Self {
        Self::new(TokenKind::Direction, value)
    }

    /// `Order` token (`asc`, `desc`, `shuffle`)
    pub fn order(value: impl Into<String>) -> Self {
        Self::new(TokenKind::Order, value)
    }
}

impl fmt::Display for GraphToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}.{}", self.kind, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_display() {
        let marko = Vertex::new(1i32, "person");
        let lop = Vertex::new(3i32, "software");
        assert_eq!(marko.to_string(), "v[1]");
        let edge = Edge::new(9i32, "created", lop, marko);
        assert_eq!(edge.to_string(), "e[9][1-created->3]");
        assert_eq!(Property::new("weight", 0.5f64).to_string(), "p[weight->0.5]");
        assert_eq!(
            VertexProperty::new(0i64, "name", "marko").to_string(),
            "vp[name->marko]"
        );
    }

    #[test]
    fn test_path_get() {
        let path = Path::new(
            vec![
                vec!["a".to_string()],
                vec!["b".to_string(), "c".to_string()],
                vec!["a".to_string()],
            ],
            vec![Value::Int(1), Value::Int(2), Value::Int(3)],
        );
        assert_eq!(path.get("b"), Some(Value::Int(2)));
        assert_eq!(path.get("c"), Some(Value::Int(2)));
        assert_eq!(
            path.get("a"),
            Some(Value::List(vec![Value::Int(1), Value::Int(3)]))
        );
        assert_eq!(path.get("missing"), None);
        assert_eq!(path.to_string(), "path[1, 2, 3]");
    }

    #[test]
    fn test_path_get_malformed() {
        let path = Path::new(vec![vec!["a".to_string()]], vec![]);
        assert_eq!(path.get("a"), None);
    }

    #[test]
    fn test_token_kind_mapping() {
        for kind in [
            TokenKind::Barrier,
            TokenKind::Cardinality,
            TokenKind::Column,
            TokenKind::Direction,
            TokenKind::Operator,
            TokenKind::Order,
            TokenKind::Pick,
            TokenKind::Pop,
            TokenKind::Scope,
            TokenKind::T,
        ] {
            assert_eq!(TokenKind::from_data_type(kind.data_type()), Some(kind));
        }
        assert_eq!(TokenKind::from_data_type(DataType::Int), None);
        assert_eq!(GraphToken::t("id").to_string(), "T.id");
    }
}
