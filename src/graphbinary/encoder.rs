//! GraphBinary encoder.

use bytes::{BufMut, BytesMut};

use super::bytecode::Instruction;
use super::data_type::{DataType, NULL_BYTES, VALUE_FLAG_NONE, VALUE_FLAG_NULL};
use super::value::{GraphMap, Value};
use super::GraphBinaryError;

/// GraphBinary writer that appends values to a byte buffer.
///
/// A failed write leaves the buffer exactly as it was before the call.
pub struct GraphBinaryWriter {
    buffer: BytesMut,
}

impl GraphBinaryWriter {
    /// Create a new writer with default buffer capacity.
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    /// Create a new writer with specified buffer capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    /// Get the current buffer length.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Consume the writer and return the bytes.
    pub fn into_bytes(self) -> BytesMut {
        self.buffer
    }

    /// Get the bytes as a slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Write raw bytes (frame headers).
    pub fn put_raw(&mut self, bytes: &[u8]) {
        self.buffer.put_slice(bytes);
    }

    /// Write a fully-qualified value: `{type}{flag}{payload}`.
    ///
    /// `Value::Null` is written as the untyped null `0xFE 0x01`.
    pub fn write(&mut self, value: &Value) -> Result<(), GraphBinaryError> {
        let start = self.buffer.len();
        self.write_qualified(value).inspect_err(|_| self.buffer.truncate(start))
    }

    /// Write a value without its type code.
    ///
    /// With `nullable` the value flag is written first; without it a null
    /// value is rejected with [`GraphBinaryError::UnexpectedNull`] and nothing
    /// is written.
    pub fn write_value(&mut self, value: &Value, nullable: bool) -> Result<(), GraphBinaryError> {
        let start = self.buffer.len();
        self.write_bare(value, nullable)
            .inspect_err(|_| self.buffer.truncate(start))
    }

    /// Write a map whose keys are strings, as the payload of a non-nullable map.
    pub fn write_string_map<'a, I>(&mut self, entries: I, len: usize) -> Result<(), GraphBinaryError>
    where
        I: IntoIterator<Item = (&'a str, &'a Value)>,
    {
        let start = self.buffer.len();
        self.write_string_entries(entries, len)
            .inspect_err(|_| self.buffer.truncate(start))
    }

    fn write_string_entries<'a, I>(&mut self, entries: I, len: usize) -> Result<(), GraphBinaryError>
    where
        I: IntoIterator<Item = (&'a str, &'a Value)>,
    {
        self.write_length("map", len)?;
        for (key, value) in entries {
            self.write_qualified_string(key)?;
            self.write_qualified(value)?;
        }
        Ok(())
    }

    fn write_qualified(&mut self, value: &Value) -> Result<(), GraphBinaryError> {
        if value.is_null() {
            self.buffer.put_slice(&NULL_BYTES);
            return Ok(());
        }
        self.buffer.put_u8(value.data_type().code());
        self.write_bare(value, true)
    }

    fn write_bare(&mut self, value: &Value, nullable: bool) -> Result<(), GraphBinaryError> {
        if value.is_null() {
            if !nullable {
                return Err(GraphBinaryError::UnexpectedNull);
            }
            self.buffer.put_u8(VALUE_FLAG_NULL);
            return Ok(());
        }
        if nullable {
            self.buffer.put_u8(VALUE_FLAG_NONE);
        }
        self.write_payload(value)
    }

    fn write_payload(&mut self, value: &Value) -> Result<(), GraphBinaryError> {
        match value {
            Value::Null => Err(GraphBinaryError::UnexpectedNull),
            Value::Boolean(b) => {
                self.buffer.put_u8(u8::from(*b));
                Ok(())
            }
            Value::Byte(v) => {
                self.buffer.put_i8(*v);
                Ok(())
            }
            Value::Short(v) => {
                self.buffer.put_i16(*v);
                Ok(())
            }
            Value::Int(v) => {
                self.buffer.put_i32(*v);
                Ok(())
            }
            Value::Long(v) => {
                self.buffer.put_i64(*v);
                Ok(())
            }
            Value::Float(v) => {
                self.buffer.put_f32(*v);
                Ok(())
            }
            Value::Double(v) => {
                self.buffer.put_f64(*v);
                Ok(())
            }
            Value::String(s) => self.write_string(s),
            Value::Uuid(u) => {
                self.buffer.put_slice(u.as_bytes());
                Ok(())
            }
            Value::BigInteger(v) => self.write_bytes("biginteger", v.to_signed_bytes_be()),
            Value::Date(dt) | Value::Timestamp(dt) => {
                self.buffer.put_i64(dt.timestamp_millis());
                Ok(())
            }
            Value::Bytes(b) => self.write_bytes("bytebuffer", b),
            Value::List(items) | Value::Set(items) => self.write_list(items),
            Value::Map(map) => self.write_map(map),
            Value::Vertex(v) => {
                self.write_qualified(&v.id)?;
                self.write_string(&v.label)?;
                self.buffer.put_slice(&NULL_BYTES);
                Ok(())
            }
            Value::Edge(e) => {
                self.write_qualified(&e.id)?;
                self.write_string(&e.label)?;
                self.write_qualified(&e.in_v.id)?;
                self.write_string(&e.in_v.label)?;
                self.write_qualified(&e.out_v.id)?;
                self.write_string(&e.out_v.label)?;
                // parent, properties
                self.buffer.put_slice(&NULL_BYTES);
                self.buffer.put_slice(&NULL_BYTES);
                Ok(())
            }
            Value::Property(p) => {
                self.write_string(&p.key)?;
                self.write_qualified(&p.value)?;
                self.buffer.put_slice(&NULL_BYTES);
                Ok(())
            }
            Value::VertexProperty(vp) => {
                self.write_qualified(&vp.id)?;
                self.write_string(&vp.label)?;
                self.write_qualified(&vp.value)?;
                self.buffer.put_slice(&NULL_BYTES);
                self.buffer.put_slice(&NULL_BYTES);
                Ok(())
            }
            Value::Path(p) => {
                let labels = p
                    .labels
                    .iter()
                    .map(|set| Value::Set(set.iter().map(|l| Value::from(l.as_str())).collect()))
                    .collect();
                self.write_qualified(&Value::List(labels))?;
                self.buffer.put_u8(DataType::List.code());
                self.buffer.put_u8(VALUE_FLAG_NONE);
                self.write_list(&p.objects)
            }
            Value::Traverser(t) => {
                self.buffer.put_i64(t.bulk);
                self.write_qualified(&t.value)
            }
            Value::Bytecode(b) => {
                self.write_instructions(&b.steps)?;
                self.write_instructions(&b.sources)
            }
            Value::Binding(b) => {
                self.write_string(&b.key)?;
                self.write_qualified(&b.value)
            }
            Value::Token(token) => self.write_qualified_string(&token.value),
        }
    }

    fn write_length(&mut self, kind: &'static str, len: usize) -> Result<(), GraphBinaryError> {
        let len = i32::try_from(len).map_err(|_| GraphBinaryError::ValueTooLarge(kind, len))?;
        self.buffer.put_i32(len);
        Ok(())
    }

    fn write_string(&mut self, value: &str) -> Result<(), GraphBinaryError> {
        self.write_bytes("string", value.as_bytes())
    }

    fn write_qualified_string(&mut self, value: &str) -> Result<(), GraphBinaryError> {
        self.buffer.put_u8(DataType::String.code());
        self.buffer.put_u8(VALUE_FLAG_NONE);
        self.write_string(value)
    }

    fn write_bytes(&mut self, kind: &'static str, bytes: &[u8]) -> Result<(), GraphBinaryError> {
        self.write_length(kind, bytes.len())?;
        self.buffer.put_slice(bytes);
        Ok(())
    }

    fn write_list(&mut self, items: &[Value]) -> Result<(), GraphBinaryError> {
        self.write_length("list", items.len())?;
        for item in items {
            // Elements are always fully qualified, so null elements are fine.
            self.write_qualified(item)?;
        }
        Ok(())
    }

    fn write_map(&mut self, map: &GraphMap) -> Result<(), GraphBinaryError> {
        self.write_length("map", map.len())?;
        for (key, value) in map.iter() {
            self.write_qualified(key)?;
            self.write_qualified(value)?;
        }
        Ok(())
    }

    fn write_instructions(&mut self, instructions: &[Instruction]) -> Result<(), GraphBinaryError> {
        self.write_length("bytecode", instructions.len())?;
        for instruction in instructions {
            self.write_string(&instruction.operator)?;
            self.write_list(&instruction.arguments)?;
        }
        Ok(())
    }
}

impl Default for GraphBinaryWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience function to encode a single fully-qualified value to bytes.
pub fn encode(value: &Value) -> Result<BytesMut, GraphBinaryError> {
    let mut writer = GraphBinaryWriter::new();
    writer.write(value)?;
    Ok(writer.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphbinary::{Bytecode, Edge, Traverser, Vertex};
    use uuid::Uuid;

    fn bytes_of(value: &Value) -> Vec<u8> {
        encode(value).unwrap().to_vec()
    }

    #[test]
    fn test_encode_null() {
        assert_eq!(bytes_of(&Value::Null), vec![0xFE, 0x01]);
    }

    #[test]
    fn test_encode_int_and_long() {
        assert_eq!(bytes_of(&Value::Int(1)), vec![0x01, 0x00, 0, 0, 0, 1]);
        assert_eq!(
            bytes_of(&Value::Long(-1)),
            vec![0x02, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]
        );
    }

    #[test]
    fn test_encode_string() {
        assert_eq!(
            bytes_of(&Value::from("abc")),
            vec![0x03, 0x00, 0, 0, 0, 3, b'a', b'b', b'c']
        );
        assert_eq!(bytes_of(&Value::from("")), vec![0x03, 0x00, 0, 0, 0, 0]);
    }

    #[test]
    fn test_encode_uuid() {
        let id = Uuid::from_bytes([7; 16]);
        let mut expected = vec![0x0C, 0x00];
        expected.extend_from_slice(&[7; 16]);
        assert_eq!(bytes_of(&Value::Uuid(id)), expected);
    }

    #[test]
    fn test_encode_empty_collections() {
        assert_eq!(bytes_of(&Value::List(vec![])), vec![0x09, 0x00, 0, 0, 0, 0]);
        assert_eq!(
            bytes_of(&Value::Map(GraphMap::new())),
            vec![0x0A, 0x00, 0, 0, 0, 0]
        );
        assert_eq!(bytes_of(&Value::set(vec![])), vec![0x0B, 0x00, 0, 0, 0, 0]);
    }

    #[test]
    fn test_encode_list_with_null_element() {
        assert_eq!(
            bytes_of(&Value::List(vec![Value::Null])),
            vec![0x09, 0x00, 0, 0, 0, 1, 0xFE, 0x01]
        );
    }

    #[test]
    fn test_encode_empty_bytecode() {
        assert_eq!(
            bytes_of(&Value::Bytecode(Bytecode::new())),
            vec![0x15, 0x00, 0, 0, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn test_encode_bytecode_step() {
        let bytecode = Bytecode::new().with_step("V", vec![Value::Int(1)]);
        assert_eq!(
            bytes_of(&Value::Bytecode(bytecode)),
            vec![
                0x15, 0x00, // type, flag
                0, 0, 0, 1, // steps
                0, 0, 0, 1, b'V', // name
                0, 0, 0, 1, // args
                0x01, 0x00, 0, 0, 0, 1, // int 1
                0, 0, 0, 0, // sources
            ]
        );
    }

    #[test]
    fn test_encode_traverser() {
        assert_eq!(
            bytes_of(&Value::Traverser(Traverser::new(2, 1i32))),
            vec![0x21, 0x00, 0, 0, 0, 0, 0, 0, 0, 2, 0x01, 0x00, 0, 0, 0, 1]
        );
    }

    #[test]
    fn test_encode_edge_trailing_nulls() {
        let edge = Edge::new(
            1i32,
            "e",
            Vertex::new(2i32, "in"),
            Vertex::new(3i32, "out"),
        );
        let bytes = bytes_of(&Value::Edge(edge));
        assert_eq!(&bytes[bytes.len() - 4..], &[0xFE, 0x01, 0xFE, 0x01]);
    }

    #[test]
    fn test_write_value_without_type() {
        let mut writer = GraphBinaryWriter::new();
        writer.write_value(&Value::Int(5), false).unwrap();
        assert_eq!(writer.as_bytes(), &[0, 0, 0, 5]);

        let mut writer = GraphBinaryWriter::new();
        writer.write_value(&Value::Int(5), true).unwrap();
        assert_eq!(writer.as_bytes(), &[0x00, 0, 0, 0, 5]);

        let mut writer = GraphBinaryWriter::new();
        writer.write_value(&Value::Null, true).unwrap();
        assert_eq!(writer.as_bytes(), &[0x01]);
    }

    #[test]
    fn test_write_value_non_nullable_null_writes_nothing() {
        let mut writer = GraphBinaryWriter::new();
        writer.put_raw(&[0xAA]);
        let err = writer.write_value(&Value::Null, false).unwrap_err();
        assert_eq!(err, GraphBinaryError::UnexpectedNull);
        assert_eq!(writer.as_bytes(), &[0xAA]);
    }

    #[test]
    fn test_write_string_map() {
        let value = Value::from("x");
        let mut writer = GraphBinaryWriter::new();
        writer
            .write_string_map(vec![("k", &value)], 1)
            .unwrap();
        assert_eq!(
            writer.as_bytes(),
            &[
                0, 0, 0, 1, // count
                0x03, 0x00, 0, 0, 0, 1, b'k', // key
                0x03, 0x00, 0, 0, 0, 1, b'x', // value
            ]
        );
    }
}
