//! GraphBinary serialization format.
//!
//! GraphBinary is the type-tagged binary format spoken between a Gremlin
//! client and server. Every fully-qualified value starts with a one byte
//! type code, followed by a value flag (`0x00` present, `0x01` null) and the
//! type specific payload. All multi-byte numbers are big-endian.
//!
//! # Supported Types
//!
//! - **Primitives**: boolean, byte, short, int, long, float, double
//! - **String**: `i32` length prefix followed by UTF-8 bytes
//! - **UUID**: 16 raw bytes
//! - **BigInteger**: `i32` length prefix followed by two's-complement bytes
//! - **Date / Timestamp**: milliseconds since the Unix epoch
//! - **ByteBuffer**: `i32` length prefix followed by raw bytes
//! - **Collections**: list, set, map (keys are arbitrary values)
//!
//! # Graph Structures
//!
//! - **Vertex**, **Edge**, **Property**, **VertexProperty**, **Path**
//! - **Traverser**: bulk count plus value
//! - **Bytecode**: the instruction program of a traversal
//! - **Binding** and enum tokens (`T`, `Direction`, `Order`, ...)
//!
//! # Messages
//!
//! [`message`] builds request frames and parses response frames;
//! [`codec`] adapts both to `tokio_util` framing.

pub mod bytecode;
pub mod codec;
pub mod data_type;
pub mod decoder;
pub mod encoder;
pub mod message;
pub mod structures;
pub mod value;

pub use bytecode::{Bytecode, Instruction};
pub use codec::GraphBinaryMessageCodec;
pub use data_type::{DataType, NULL_BYTES, VALUE_FLAG_NONE, VALUE_FLAG_NULL};
pub use decoder::{decode, GraphBinaryReader, DEFAULT_MAX_BULK_ITEMS, DEFAULT_MAX_DEPTH};
pub use encoder::{encode, GraphBinaryWriter};
pub use message::{Request, Response, ResponseResult, ResponseStatus};
pub use structures::{
    Binding, Edge, GraphToken, Path, Property, TokenKind, Traverser, Vertex, VertexProperty,
};
pub use value::{BigInteger, GraphMap, Value};

use std::fmt;
use std::io;

/// GraphBinary errors.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphBinaryError {
    /// Unexpected end of input
    UnexpectedEof,
    /// Unknown type code
    UnknownType(u8),
    /// The type code read differs from the one the caller expected
    TypeMismatch {
        /// Expected type
        expected: DataType,
        /// Type found on the wire
        actual: DataType,
    },
    /// Null found where a non-nullable value was required
    UnexpectedNull,
    /// Invalid UTF-8 in string
    InvalidUtf8(String),
    /// Map key that must be a string was not
    InvalidMapKey,
    /// Value too large to encode
    ValueTooLarge(&'static str, usize),
    /// Composite values nested deeper than the reader allows
    NestingTooDeep(usize),
    /// Malformed frame or payload
    InvalidFrame(String),
    /// I/O error raised by the framing layer
    Io(String),
}

impl fmt::Display for GraphBinaryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphBinaryError::UnexpectedEof => write!(f, "Unexpected end of GraphBinary data"),
            GraphBinaryError::UnknownType(code) => {
                write!(f, "Unknown GraphBinary type code: 0x{:02X}", code)
            }
            GraphBinaryError::TypeMismatch { expected, actual } => {
                write!(f, "Type mismatch: expected {}, found {}", expected, actual)
            }
            GraphBinaryError::UnexpectedNull => {
                write!(f, "Unexpected null value for a non-nullable field")
            }
            GraphBinaryError::InvalidUtf8(e) => write!(f, "Invalid UTF-8 in string: {}", e),
            GraphBinaryError::InvalidMapKey => write!(f, "Map keys must be strings"),
            GraphBinaryError::ValueTooLarge(t, s) => write!(f, "{} too large: {} bytes", t, s),
            GraphBinaryError::NestingTooDeep(max) => {
                write!(f, "Values nested deeper than {} levels", max)
            }
            GraphBinaryError::InvalidFrame(msg) => write!(f, "Invalid frame: {}", msg),
            GraphBinaryError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for GraphBinaryError {}

impl From<io::Error> for GraphBinaryError {
    fn from(err: io::Error) -> Self {
        GraphBinaryError::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn roundtrip(value: Value) {
        let bytes = encode(&value).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(value, decoded, "roundtrip failed for {:?}", value);
    }

    #[test]
    fn test_roundtrip_null() {
        roundtrip(Value::Null);
    }

    #[test]
    fn test_roundtrip_numbers() {
        for v in [0i32, 1, -1, i32::MAX, i32::MIN] {
            roundtrip(Value::Int(v));
        }
        for v in [0i64, 42, -42, i64::MAX, i64::MIN] {
            roundtrip(Value::Long(v));
        }
        roundtrip(Value::Byte(-7));
        roundtrip(Value::Short(1234));
        roundtrip(Value::Float(1.5));
        roundtrip(Value::Double(-2.25));
        roundtrip(Value::Boolean(true));
        roundtrip(Value::Boolean(false));
    }

    #[test]
    fn test_roundtrip_strings_and_uuid() {
        roundtrip(Value::from(""));
        roundtrip(Value::from("hello world"));
        roundtrip(Value::from("그래프"));
        roundtrip(Value::Uuid(Uuid::new_v4()));
    }

    #[test]
    fn test_roundtrip_big_integers() {
        let two_pow_64: i128 = 1 << 64;
        for v in [
            0i128,
            1,
            -1,
            127,
            128,
            -128,
            -129,
            two_pow_64,
            -two_pow_64,
            i64::MAX as i128,
            i64::MIN as i128,
            i128::MAX,
            i128::MIN,
        ] {
            roundtrip(Value::BigInteger(BigInteger::from(v)));
        }
    }

    #[test]
    fn test_roundtrip_temporal() {
        let instant = Utc.timestamp_millis_opt(1_650_000_000_123).unwrap();
        roundtrip(Value::Date(instant));
        roundtrip(Value::Timestamp(instant));
    }

    #[test]
    fn test_roundtrip_collections() {
        roundtrip(Value::List(vec![]));
        roundtrip(Value::List(vec![
            Value::Int(1),
            Value::Null,
            Value::from("x"),
            Value::List(vec![Value::Long(2)]),
        ]));
        roundtrip(Value::set(vec![Value::Int(1), Value::Int(2)]));
        roundtrip(Value::Bytes(vec![0, 1, 2, 255]));

        let mut map = GraphMap::new();
        map.insert("name", "marko");
        map.insert(Value::Int(1), Value::List(vec![Value::Null]));
        map.insert(Value::List(vec![Value::Int(1)]), true);
        roundtrip(Value::Map(map));
    }

    #[test]
    fn test_roundtrip_graph_elements() {
        let marko = Vertex::new(1i32, "person");
        let lop = Vertex::new(3i32, "software");
        roundtrip(Value::Vertex(marko.clone()));
        roundtrip(Value::Edge(Edge::new(9i32, "created", lop.clone(), marko.clone())));
        roundtrip(Value::Property(Property::new("weight", 0.4f64)));
        roundtrip(Value::VertexProperty(VertexProperty::new(
            Value::Long(11),
            "name",
            "marko",
        )));
        roundtrip(Value::Path(Path::new(
            vec![vec!["a".to_string()], vec![]],
            vec![Value::Vertex(marko), Value::Vertex(lop)],
        )));
        roundtrip(Value::Traverser(Traverser::new(3, "x")));
        roundtrip(Value::Binding(Binding::new("x", 1i32)));
        roundtrip(Value::Token(GraphToken::t("id")));
        roundtrip(Value::Token(GraphToken::direction("OUT")));
    }

    #[test]
    fn test_roundtrip_bytecode() {
        let mut bytecode = Bytecode::new();
        bytecode.add_source("withStrategies", vec![]);
        bytecode.add_step("V", vec![]);
        bytecode.add_step("has", vec![Value::from("name"), Value::from("marko")]);
        bytecode.add_step("limit", vec![Value::Long(10)]);
        roundtrip(Value::Bytecode(bytecode));
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            GraphBinaryError::UnknownType(0x99).to_string(),
            "Unknown GraphBinary type code: 0x99"
        );
        assert_eq!(
            GraphBinaryError::TypeMismatch {
                expected: DataType::Int,
                actual: DataType::String
            }
            .to_string(),
            "Type mismatch: expected int, found string"
        );
    }
}
