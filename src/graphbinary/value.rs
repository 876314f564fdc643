//! GraphBinary value types.

use std::fmt;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::bytecode::Bytecode;
use super::data_type::DataType;
use super::structures::{
    Binding, Edge, GraphToken, Path, Property, Traverser, Vertex, VertexProperty,
};

// ============================================================================
// Value - GraphBinary value
// ============================================================================

/// Any value that can travel over GraphBinary.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    /// Null
    #[default]
    Null,
    /// Boolean
    Boolean(bool),
    /// 8-bit integer
    Byte(i8),
    /// 16-bit integer
    Short(i16),
    /// 32-bit integer
    Int(i32),
    /// 64-bit integer
    Long(i64),
    /// 32-bit float
    Float(f32),
    /// 64-bit float
    Double(f64),
    /// UTF-8 string
    String(String),
    /// UUID
    Uuid(Uuid),
    /// Arbitrary precision integer
    BigInteger(BigInteger),
    /// Date
    Date(DateTime<Utc>),
    /// Timestamp
    Timestamp(DateTime<Utc>),
    /// Raw bytes
    Bytes(Vec<u8>),
    /// Ordered list
    List(Vec<Value>),
    /// Set; build with [`Value::set`] to drop duplicates
    Set(Vec<Value>),
    /// Map with arbitrary keys
    Map(GraphMap),
    /// Vertex
    Vertex(Vertex),
    /// Edge
    Edge(Edge),
    /// Property
    Property(Property),
    /// Vertex property
    VertexProperty(VertexProperty),
    /// Path
    Path(Path),
    /// Traverser
    Traverser(Traverser),
    /// Bytecode program
    Bytecode(Bytecode),
    /// Binding
    Binding(Binding),
    /// Enum token (`T.id`, `Direction.OUT`, ...)
    Token(GraphToken),
}

impl Value {
    /// Build a set, keeping the first occurrence of each element.
    pub fn set(items: Vec<Value>) -> Self {
        Value::Set(dedup(items))
    }

    /// Null check
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// GraphBinary type of this value
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Null => DataType::Null,
            Value::Boolean(_) => DataType::Boolean,
            Value::Byte(_) => DataType::Byte,
            Value::Short(_) => DataType::Short,
            Value::Int(_) => DataType::Int,
            Value::Long(_) => DataType::Long,
            Value::Float(_) => DataType::Float,
            Value::Double(_) => DataType::Double,
            Value::String(_) => DataType::String,
            Value::Uuid(_) => DataType::Uuid,
            Value::BigInteger(_) => DataType::BigInteger,
            Value::Date(_) => DataType::Date,
            Value::Timestamp(_) => DataType::Timestamp,
            Value::Bytes(_) => DataType::ByteBuffer,
            Value::List(_) => DataType::List,
            Value::Set(_) => DataType::Set,
            Value::Map(_) => DataType::Map,
            Value::Vertex(_) => DataType::Vertex,
            Value::Edge(_) => DataType::Edge,
            Value::Property(_) => DataType::Property,
            Value::VertexProperty(_) => DataType::VertexProperty,
            Value::Path(_) => DataType::Path,
            Value::Traverser(_) => DataType::Traverser,
            Value::Bytecode(_) => DataType::Bytecode,
            Value::Binding(_) => DataType::Binding,
            Value::Token(token) => token.kind.data_type(),
        }
    }

    /// Type name
    pub fn type_name(&self) -> &'static str {
        self.data_type().name()
    }

    /// As boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// As i64, widening any fixed-width integer
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Byte(v) => Some(*v as i64),
            Value::Short(v) => Some(*v as i64),
            Value::Int(v) => Some(*v as i64),
            Value::Long(v) => Some(*v),
            _ => None,
        }
    }

    /// As f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            _ => self.as_i64().map(|v| v as f64),
        }
    }

    /// As string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// As UUID
    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Value::Uuid(u) => Some(*u),
            _ => None,
        }
    }

    /// As list (lists and sets)
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) | Value::Set(l) => Some(l),
            _ => None,
        }
    }

    /// As map
    pub fn as_map(&self) -> Option<&GraphMap> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// As vertex
    pub fn as_vertex(&self) -> Option<&Vertex> {
        match self {
            Value::Vertex(v) => Some(v),
            _ => None,
        }
    }

    /// As edge
    pub fn as_edge(&self) -> Option<&Edge> {
        match self {
            Value::Edge(e) => Some(e),
            _ => None,
        }
    }

    /// As path
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Value::Path(p) => Some(p),
            _ => None,
        }
    }

    /// As traverser
    pub fn as_traverser(&self) -> Option<&Traverser> {
        match self {
            Value::Traverser(t) => Some(t),
            _ => None,
        }
    }
}

fn dedup(items: Vec<Value>) -> Vec<Value> {
    let mut unique: Vec<Value> = Vec::with_capacity(items.len());
    for item in items {
        if !unique.contains(&item) {
            unique.push(item);
        }
    }
    unique
}

fn write_joined(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(v) => write!(f, "{}", v),
            Value::Byte(v) => write!(f, "{}", v),
            Value::Short(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Long(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "{}", v),
            Value::Uuid(v) => write!(f, "{}", v),
            Value::BigInteger(v) => write!(f, "{}", v),
            Value::Date(v) | Value::Timestamp(v) => write!(f, "{}", v.to_rfc3339()),
            Value::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            Value::List(items) | Value::Set(items) => {
                write!(f, "[")?;
                write_joined(f, items)?;
                write!(f, "]")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}={}", k, v)?;
                }
                write!(f, "}}")
            }
            Value::Vertex(v) => write!(f, "{}", v),
            Value::Edge(e) => write!(f, "{}", e),
            Value::Property(p) => write!(f, "{}", p),
            Value::VertexProperty(vp) => write!(f, "{}", vp),
            Value::Path(p) => write!(f, "{}", p),
            Value::Traverser(t) => write!(f, "{}", t.value),
            Value::Bytecode(b) => write!(f, "{}", b),
            Value::Binding(b) => write!(f, "binding[{}={}]", b.key, b.value),
            Value::Token(t) => write!(f, "{}", t),
        }
    }
}

// ============================================================================
// From implementations
// ============================================================================

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),+ $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )+
    };
}

impl_from! {
    bool => Boolean,
    i8 => Byte,
    i16 => Short,
    i32 => Int,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    String => String,
    Uuid => Uuid,
    BigInteger => BigInteger,
    Vec<Value> => List,
    GraphMap => Map,
    Vertex => Vertex,
    Edge => Edge,
    Property => Property,
    VertexProperty => VertexProperty,
    Path => Path,
    Traverser => Traverser,
    Bytecode => Bytecode,
    Binding => Binding,
    GraphToken => Token,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

// ============================================================================
// GraphMap - map with arbitrary value keys
// ============================================================================

/// Map whose keys are arbitrary [`Value`]s.
///
/// Keys are compared structurally, so lists, maps and graph elements are
/// valid keys. Entries keep insertion order; equality ignores it.
#[derive(Debug, Clone, Default)]
pub struct GraphMap {
    entries: Vec<(Value, Value)>,
}

impl GraphMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty map with room for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Insert an entry, returning the previous value of an equal key.
    pub fn insert(&mut self, key: impl Into<Value>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Value for `key`.
    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Value for a string key.
    pub fn get_str(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k.as_str() == Some(key))
            .map(|(_, v)| v)
    }

    /// Whether an equal key exists.
    pub fn contains_key(&self, key: &Value) -> bool {
        self.get(key).is_some()
    }

    /// Remove an entry.
    pub fn remove(&mut self, key: &Value) -> Option<Value> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    /// Iterate keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(k, _)| k)
    }
}

impl PartialEq for GraphMap {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .entries
                .iter()
                .all(|(k, v)| other.get(k).map_or(false, |o| o == v))
    }
}

impl<K: Into<Value>, V: Into<Value>> FromIterator<(K, V)> for GraphMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = GraphMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl IntoIterator for GraphMap {
    type Item = (Value, Value);
    type IntoIter = std::vec::IntoIter<(Value, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

// ============================================================================
// BigInteger - arbitrary precision integer
// ============================================================================

/// Arbitrary precision integer stored as minimal big-endian two's-complement
/// bytes, the same layout GraphBinary uses on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BigInteger {
    bytes: Vec<u8>,
}

impl BigInteger {
    /// Zero
    pub fn zero() -> Self {
        Self { bytes: vec![0] }
    }

    /// Build from big-endian two's-complement bytes. Empty input is zero.
    pub fn from_signed_bytes_be(bytes: &[u8]) -> Self {
        Self {
            bytes: normalize(bytes),
        }
    }

    /// Minimal big-endian two's-complement bytes.
    pub fn to_signed_bytes_be(&self) -> &[u8] {
        &self.bytes
    }

    /// Sign check
    pub fn is_negative(&self) -> bool {
        self.bytes[0] & 0x80 != 0
    }

    /// Convert to `i128` when the value fits.
    pub fn to_i128(&self) -> Option<i128> {
        if self.bytes.len() > 16 {
            return None;
        }
        let fill = if self.is_negative() { 0xFF } else { 0x00 };
        let mut buf = [fill; 16];
        buf[16 - self.bytes.len()..].copy_from_slice(&self.bytes);
        Some(i128::from_be_bytes(buf))
    }
}

/// Strip redundant sign-extension bytes.
fn normalize(bytes: &[u8]) -> Vec<u8> {
    if bytes.is_empty() {
        return vec![0];
    }
    let mut start = 0;
    while start + 1 < bytes.len() {
        let (head, next) = (bytes[start], bytes[start + 1]);
        let redundant = (head == 0x00 && next & 0x80 == 0) || (head == 0xFF && next & 0x80 != 0);
        if !redundant {
            break;
        }
        start += 1;
    }
    bytes[start..].to_vec()
}

impl From<i128> for BigInteger {
    fn from(v: i128) -> Self {
        Self::from_signed_bytes_be(&v.to_be_bytes())
    }
}

impl From<i64> for BigInteger {
    fn from(v: i64) -> Self {
        Self::from(v as i128)
    }
}

impl From<u64> for BigInteger {
    fn from(v: u64) -> Self {
        Self::from(v as i128)
    }
}

impl fmt::Display for BigInteger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_i128() {
            Some(v) => write!(f, "{}", v),
            None => {
                write!(f, "0x")?;
                for b in &self.bytes {
                    write!(f, "{:02x}", b)?;
                }
                Ok(())
            }
        }
    }
}
