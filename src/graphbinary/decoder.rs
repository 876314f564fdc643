//! GraphBinary decoder.

use bytes::Buf;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::bytecode::{Bytecode, Instruction};
use super::data_type::{DataType, VALUE_FLAG_NULL};
use super::structures::{
    Binding, Edge, GraphToken, Path, Property, TokenKind, Traverser, Vertex, VertexProperty,
};
use super::value::{BigInteger, GraphMap, Value};
use super::GraphBinaryError;

/// Default limit on how deeply composite values may nest
pub const DEFAULT_MAX_DEPTH: usize = 128;

/// Default limit on the number of items a bulk set may expand into
pub const DEFAULT_MAX_BULK_ITEMS: usize = 1 << 20;

/// GraphBinary reader that decodes values from a byte slice.
pub struct GraphBinaryReader<'a> {
    data: &'a [u8],
    pos: usize,
    depth: usize,
    max_depth: usize,
    max_bulk_items: usize,
}

impl<'a> GraphBinaryReader<'a> {
    /// Create a new reader for the given bytes.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            depth: 0,
            max_depth: DEFAULT_MAX_DEPTH,
            max_bulk_items: DEFAULT_MAX_BULK_ITEMS,
        }
    }

    /// Set the nesting limit for composite values.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set how many items a single bulk set may expand into.
    pub fn with_max_bulk_items(mut self, max_bulk_items: usize) -> Self {
        self.max_bulk_items = max_bulk_items;
        self
    }

    /// Get the current position.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Get remaining bytes count.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Check if all data has been consumed.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Read a fully-qualified value: `{type}{flag}{payload}`.
    pub fn read(&mut self) -> Result<Value, GraphBinaryError> {
        let code = self.read_u8()?;
        let data_type = DataType::from_code(code).ok_or(GraphBinaryError::UnknownType(code))?;
        if data_type == DataType::Null {
            self.read_u8()?;
            return Ok(Value::Null);
        }
        self.read_nullable_payload(data_type)
    }

    /// Read a fully-qualified value whose type code must be `expected`.
    ///
    /// When `nullable`, a null of any type is returned as `Value::Null`;
    /// otherwise a null is [`GraphBinaryError::UnexpectedNull`].
    pub fn read_typed(&mut self, expected: DataType, nullable: bool) -> Result<Value, GraphBinaryError> {
        let code = self.read_u8()?;
        let actual = DataType::from_code(code).ok_or(GraphBinaryError::UnknownType(code))?;
        let value = if actual == DataType::Null {
            self.read_u8()?;
            Value::Null
        } else if actual != expected {
            return Err(GraphBinaryError::TypeMismatch { expected, actual });
        } else {
            self.read_nullable_payload(actual)?
        };
        if !nullable && value.is_null() {
            return Err(GraphBinaryError::UnexpectedNull);
        }
        Ok(value)
    }

    /// Read a value whose type is known by the caller, so no type code is on
    /// the wire. The value flag is present only when `nullable`.
    pub fn read_value(&mut self, data_type: DataType, nullable: bool) -> Result<Value, GraphBinaryError> {
        if nullable {
            self.read_nullable_payload(data_type)
        } else {
            self.read_payload(data_type)
        }
    }

    /// Read a map whose keys must all be strings (frame attribute maps).
    pub fn read_string_keyed_map(&mut self) -> Result<GraphMap, GraphBinaryError> {
        let len = self.read_length()?;
        let mut map = GraphMap::with_capacity(len.min(1024));
        for _ in 0..len {
            let key = match self.read()? {
                Value::String(s) => s,
                _ => return Err(GraphBinaryError::InvalidMapKey),
            };
            let value = self.read()?;
            map.insert(key, value);
        }
        Ok(map)
    }

    fn read_nullable_payload(&mut self, data_type: DataType) -> Result<Value, GraphBinaryError> {
        let flag = self.read_u8()?;
        if flag & VALUE_FLAG_NULL != 0 {
            return Ok(Value::Null);
        }
        self.read_payload(data_type)
    }

    fn read_payload(&mut self, data_type: DataType) -> Result<Value, GraphBinaryError> {
        if self.depth >= self.max_depth {
            return Err(GraphBinaryError::NestingTooDeep(self.max_depth));
        }
        self.depth += 1;
        let value = self.decode_payload(data_type);
        self.depth -= 1;
        value
    }

    fn decode_payload(&mut self, data_type: DataType) -> Result<Value, GraphBinaryError> {
        match data_type {
            DataType::Null => Err(GraphBinaryError::UnexpectedNull),
            DataType::Boolean => Ok(Value::Boolean(self.read_u8()? != 0)),
            DataType::Byte => Ok(Value::Byte(self.read_u8()? as i8)),
            DataType::Short => Ok(Value::Short(self.read_i16()?)),
            DataType::Int => Ok(Value::Int(self.read_i32()?)),
            DataType::Long => Ok(Value::Long(self.read_i64()?)),
            DataType::Float => Ok(Value::Float(self.read_f32()?)),
            DataType::Double => Ok(Value::Double(self.read_f64()?)),
            DataType::String => Ok(Value::String(self.read_string()?)),
            DataType::Uuid => Ok(Value::Uuid(self.read_uuid()?)),
            DataType::BigInteger => {
                let len = self.read_length()?;
                let bytes = self.read_bytes(len)?;
                Ok(Value::BigInteger(BigInteger::from_signed_bytes_be(bytes)))
            }
            DataType::Date => Ok(Value::Date(self.read_instant()?)),
            DataType::Timestamp => Ok(Value::Timestamp(self.read_instant()?)),
            DataType::ByteBuffer => {
                let len = self.read_length()?;
                Ok(Value::Bytes(self.read_bytes(len)?.to_vec()))
            }
            DataType::List => Ok(Value::List(self.read_list()?)),
            DataType::Set => Ok(Value::set(self.read_list()?)),
            DataType::Map => {
                let len = self.read_length()?;
                let mut map = GraphMap::with_capacity(len.min(1024));
                for _ in 0..len {
                    let key = self.read()?;
                    let value = self.read()?;
                    map.insert(key, value);
                }
                Ok(Value::Map(map))
            }
            DataType::BulkSet => {
                let len = self.read_length()?;
                let mut items = Vec::with_capacity(len.min(1024));
                for _ in 0..len {
                    let item = self.read()?;
                    let bulk = self.read_i64()?;
                    let bulk = usize::try_from(bulk)
                        .map_err(|_| GraphBinaryError::InvalidFrame(format!("negative bulk: {}", bulk)))?;
                    if bulk > self.max_bulk_items - items.len() {
                        return Err(GraphBinaryError::InvalidFrame(format!(
                            "bulk set expands past {} items",
                            self.max_bulk_items
                        )));
                    }
                    items.extend(std::iter::repeat(item).take(bulk));
                }
                Ok(Value::List(items))
            }
            DataType::Vertex => Ok(Value::Vertex(self.read_vertex()?)),
            DataType::Edge => {
                let id = self.read()?;
                let label = self.read_string()?;
                let in_v = self.read_vertex_reference()?;
                let out_v = self.read_vertex_reference()?;
                self.skip_detached()?; // parent
                self.skip_detached()?; // properties
                Ok(Value::Edge(Edge::new(id, label, in_v, out_v)))
            }
            DataType::Property => {
                let key = self.read_string()?;
                let value = self.read()?;
                self.skip_detached()?;
                Ok(Value::Property(Property::new(key, value)))
            }
            DataType::VertexProperty => {
                let id = self.read()?;
                let label = self.read_string()?;
                let value = self.read()?;
                self.skip_detached()?;
                self.skip_detached()?;
                Ok(Value::VertexProperty(VertexProperty::new(id, label, value)))
            }
            DataType::Path => Ok(Value::Path(self.read_path()?)),
            DataType::Traverser => {
                let bulk = self.read_i64()?;
                let value = self.read()?;
                Ok(Value::Traverser(Traverser::new(bulk, value)))
            }
            DataType::Bytecode => {
                let steps = self.read_instructions()?;
                let sources = self.read_instructions()?;
                Ok(Value::Bytecode(Bytecode { sources, steps }))
            }
            DataType::Binding => {
                let key = self.read_string()?;
                let value = self.read()?;
                Ok(Value::Binding(Binding::new(key, value)))
            }
            DataType::Barrier
            | DataType::Cardinality
            | DataType::Column
            | DataType::Direction
            | DataType::Operator
            | DataType::Order
            | DataType::Pick
            | DataType::Pop
            | DataType::Scope
            | DataType::T => {
                let kind = TokenKind::from_data_type(data_type)
                    .ok_or(GraphBinaryError::UnknownType(data_type.code()))?;
                match self.read_typed(DataType::String, false)? {
                    Value::String(name) => Ok(Value::Token(GraphToken::new(kind, name))),
                    _ => Err(GraphBinaryError::UnexpectedNull),
                }
            }
        }
    }

    fn read_vertex(&mut self) -> Result<Vertex, GraphBinaryError> {
        let id = self.read()?;
        let label = self.read_string()?;
        self.skip_detached()?;
        Ok(Vertex::new(id, label))
    }

    /// Edge endpoints carry only id and label.
    fn read_vertex_reference(&mut self) -> Result<Vertex, GraphBinaryError> {
        let id = self.read()?;
        let label = self.read_string()?;
        Ok(Vertex::new(id, label))
    }

    /// Parent and property slots of detached elements; always null in
    /// practice but read as a full value so non-null content is consumed.
    fn skip_detached(&mut self) -> Result<(), GraphBinaryError> {
        self.read().map(|_| ())
    }

    fn read_path(&mut self) -> Result<Path, GraphBinaryError> {
        let labels = match self.read_typed(DataType::List, false)? {
            Value::List(sets) => sets
                .into_iter()
                .map(|set| match set {
                    Value::Set(items) | Value::List(items) => items
                        .into_iter()
                        .map(|label| match label {
                            Value::String(s) => Ok(s),
                            other => Err(GraphBinaryError::TypeMismatch {
                                expected: DataType::String,
                                actual: other.data_type(),
                            }),
                        })
                        .collect::<Result<Vec<_>, _>>(),
                    other => Err(GraphBinaryError::TypeMismatch {
                        expected: DataType::Set,
                        actual: other.data_type(),
                    }),
                })
                .collect::<Result<Vec<_>, _>>()?,
            _ => return Err(GraphBinaryError::UnexpectedNull),
        };
        let objects = match self.read_typed(DataType::List, false)? {
            Value::List(objects) => objects,
            _ => return Err(GraphBinaryError::UnexpectedNull),
        };
        Ok(Path::new(labels, objects))
    }

    fn read_instructions(&mut self) -> Result<Vec<Instruction>, GraphBinaryError> {
        let len = self.read_length()?;
        let mut instructions = Vec::with_capacity(len.min(64));
        for _ in 0..len {
            let operator = self.read_string()?;
            let arguments = self.read_list()?;
            instructions.push(Instruction::new(operator, arguments));
        }
        Ok(instructions)
    }

    fn read_list(&mut self) -> Result<Vec<Value>, GraphBinaryError> {
        let len = self.read_length()?;
        let mut items = Vec::with_capacity(len.min(1024));
        for _ in 0..len {
            items.push(self.read()?);
        }
        Ok(items)
    }

    fn read_string(&mut self) -> Result<String, GraphBinaryError> {
        let len = self.read_length()?;
        let bytes = self.read_bytes(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|e| GraphBinaryError::InvalidUtf8(e.to_string()))
    }

    fn read_uuid(&mut self) -> Result<Uuid, GraphBinaryError> {
        let bytes = self.read_bytes(16)?;
        Uuid::from_slice(bytes).map_err(|e| GraphBinaryError::InvalidFrame(e.to_string()))
    }

    fn read_instant(&mut self) -> Result<DateTime<Utc>, GraphBinaryError> {
        let millis = self.read_i64()?;
        DateTime::from_timestamp_millis(millis)
            .ok_or_else(|| GraphBinaryError::InvalidFrame(format!("timestamp out of range: {}", millis)))
    }

    // Low-level read methods

    fn read_length(&mut self) -> Result<usize, GraphBinaryError> {
        let len = self.read_i32()?;
        usize::try_from(len)
            .map_err(|_| GraphBinaryError::InvalidFrame(format!("negative length: {}", len)))
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, GraphBinaryError> {
        if self.remaining() < 1 {
            return Err(GraphBinaryError::UnexpectedEof);
        }
        let value = self.data[self.pos];
        self.pos += 1;
        Ok(value)
    }

    fn read_i16(&mut self) -> Result<i16, GraphBinaryError> {
        if self.remaining() < 2 {
            return Err(GraphBinaryError::UnexpectedEof);
        }
        let value = (&self.data[self.pos..]).get_i16();
        self.pos += 2;
        Ok(value)
    }

    fn read_i32(&mut self) -> Result<i32, GraphBinaryError> {
        if self.remaining() < 4 {
            return Err(GraphBinaryError::UnexpectedEof);
        }
        let value = (&self.data[self.pos..]).get_i32();
        self.pos += 4;
        Ok(value)
    }

    fn read_i64(&mut self) -> Result<i64, GraphBinaryError> {
        if self.remaining() < 8 {
            return Err(GraphBinaryError::UnexpectedEof);
        }
        let value = (&self.data[self.pos..]).get_i64();
        self.pos += 8;
        Ok(value)
    }

    fn read_f32(&mut self) -> Result<f32, GraphBinaryError> {
        if self.remaining() < 4 {
            return Err(GraphBinaryError::UnexpectedEof);
        }
        let value = (&self.data[self.pos..]).get_f32();
        self.pos += 4;
        Ok(value)
    }

    fn read_f64(&mut self) -> Result<f64, GraphBinaryError> {
        if self.remaining() < 8 {
            return Err(GraphBinaryError::UnexpectedEof);
        }
        let value = (&self.data[self.pos..]).get_f64();
        self.pos += 8;
        Ok(value)
    }

    pub(crate) fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], GraphBinaryError> {
        if self.remaining() < len {
            return Err(GraphBinaryError::UnexpectedEof);
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }
}

/// Convenience function to decode a single fully-qualified value from bytes.
pub fn decode(data: &[u8]) -> Result<Value, GraphBinaryError> {
    let mut reader = GraphBinaryReader::new(data);
    reader.read()
}
