//! GraphBinary type codes.
//!
//! Each fully-qualified value is prefixed with a type code byte that tells
//! the reader which payload layout follows.

use std::fmt;

/// Value flag for a present value
pub const VALUE_FLAG_NONE: u8 = 0x00;

/// Value flag for a null value
pub const VALUE_FLAG_NULL: u8 = 0x01;

/// Fully-qualified untyped null: null type code followed by the null flag
pub const NULL_BYTES: [u8; 2] = [0xFE, VALUE_FLAG_NULL];

/// GraphBinary data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DataType {
    /// 32-bit signed integer
    Int = 0x01,
    /// 64-bit signed integer
    Long = 0x02,
    /// UTF-8 string
    String = 0x03,
    /// Date (epoch millis)
    Date = 0x04,
    /// Timestamp (epoch millis)
    Timestamp = 0x05,
    /// 64-bit float
    Double = 0x07,
    /// 32-bit float
    Float = 0x08,
    /// List
    List = 0x09,
    /// Map
    Map = 0x0A,
    /// Set
    Set = 0x0B,
    /// UUID
    Uuid = 0x0C,
    /// Edge
    Edge = 0x0D,
    /// Path
    Path = 0x0E,
    /// Property
    Property = 0x0F,
    /// Vertex
    Vertex = 0x11,
    /// Vertex property
    VertexProperty = 0x12,
    /// Barrier token
    Barrier = 0x13,
    /// Binding
    Binding = 0x14,
    /// Bytecode
    Bytecode = 0x15,
    /// Cardinality token
    Cardinality = 0x16,
    /// Column token
    Column = 0x17,
    /// Direction token
    Direction = 0x18,
    /// Operator token
    Operator = 0x19,
    /// Order token
    Order = 0x1A,
    /// Pick token
    Pick = 0x1B,
    /// Pop token
    Pop = 0x1C,
    /// Scope token
    Scope = 0x1F,
    /// T token
    T = 0x20,
    /// Traverser
    Traverser = 0x21,
    /// Arbitrary precision integer
    BigInteger = 0x23,
    /// 8-bit signed integer
    Byte = 0x24,
    /// Raw bytes
    ByteBuffer = 0x25,
    /// 16-bit signed integer
    Short = 0x26,
    /// Boolean
    Boolean = 0x27,
    /// Bulk set (read only)
    BulkSet = 0x2A,
    /// Untyped null
    Null = 0xFE,
}

impl DataType {
    /// Wire code of this type.
    #[inline]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Look up a type by its wire code.
    pub fn from_code(code: u8) -> Option<Self> {
        let data_type = match code {
            0x01 => DataType::Int,
            0x02 => DataType::Long,
            0x03 => DataType::String,
            0x04 => DataType::Date,
            0x05 => DataType::Timestamp,
            0x07 => DataType::Double,
            0x08 => DataType::Float,
            0x09 => DataType::List,
            0x0A => DataType::Map,
            0x0B => DataType::Set,
            0x0C => DataType::Uuid,
            0x0D => DataType::Edge,
            0x0E => DataType::Path,
            0x0F => DataType::Property,
            0x11 => DataType::Vertex,
            0x12 => DataType::VertexProperty,
            0x13 => DataType::Barrier,
            0x14 => DataType::Binding,
            0x15 => DataType::Bytecode,
            0x16 => DataType::Cardinality,
            0x17 => DataType::Column,
            0x18 => DataType::Direction,
            0x19 => DataType::Operator,
            0x1A => DataType::Order,
            0x1B => DataType::Pick,
            0x1C => DataType::Pop,
            0x1F => DataType::Scope,
            0x20 => DataType::T,
            0x21 => DataType::Traverser,
            0x23 => DataType::BigInteger,
            0x24 => DataType::Byte,
            0x25 => DataType::ByteBuffer,
            0x26 => DataType::Short,
            0x27 => DataType::Boolean,
            0x2A => DataType::BulkSet,
            0xFE => DataType::Null,
            _ => return None,
        };
        Some(data_type)
    }

    /// Human readable type name.
    pub fn name(self) -> &'static str {
        match self {
            DataType::Int => "int",
            DataType::Long => "long",
            DataType::String => "string",
            DataType::Date => "date",
            DataType::Timestamp => "timestamp",
            DataType::Double => "double",
            DataType::Float => "float",
            DataType::List => "list",
            DataType::Map => "map",
            DataType::Set => "set",
            DataType::Uuid => "uuid",
            DataType::Edge => "edge",
            DataType::Path => "path",
            DataType::Property => "property",
            DataType::Vertex => "vertex",
            DataType::VertexProperty => "vertexproperty",
            DataType::Barrier => "barrier",
            DataType::Binding => "binding",
            DataType::Bytecode => "bytecode",
            DataType::Cardinality => "cardinality",
            DataType::Column => "column",
            DataType::Direction => "direction",
            DataType::Operator => "operator",
            DataType::Order => "order",
            DataType::Pick => "pick",
            DataType::Pop => "pop",
            DataType::Scope => "scope",
            DataType::T => "t",
            DataType::Traverser => "traverser",
            DataType::BigInteger => "biginteger",
            DataType::Byte => "byte",
            DataType::ByteBuffer => "bytebuffer",
            DataType::Short => "short",
            DataType::Boolean => "boolean",
            DataType::BulkSet => "bulkset",
            DataType::Null => "null",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
