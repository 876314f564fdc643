//! Request and response frames.
//!
//! Request frame:
//!
//! ```text
//! {mime length: u8}{mime type}{0x81}{request id: uuid}{op: string}{processor: string}{args: map}
//! ```
//!
//! Response frame:
//!
//! ```text
//! {0x81}{request id: nullable uuid}{status code: int}{status message: nullable string}
//! {status attributes: map}{result meta: map}{result data: fully-qualified value}
//! ```

use bytes::BytesMut;
use uuid::Uuid;

use super::bytecode::Bytecode;
use super::data_type::DataType;
use super::decoder::GraphBinaryReader;
use super::encoder::GraphBinaryWriter;
use super::value::{GraphMap, Value};
use super::GraphBinaryError;

/// Default mime type announced in every request frame.
pub const DEFAULT_MIME_TYPE: &str = "application/vnd.graphbinary-v1.0";

/// Protocol version byte.
pub const PROTOCOL_VERSION: u8 = 0x81;

/// Final response carrying data.
pub const STATUS_SUCCESS: i32 = 200;
/// Final response without data.
pub const STATUS_NO_CONTENT: i32 = 204;
/// Partial response, more frames follow.
pub const STATUS_PARTIAL_CONTENT: i32 = 206;
/// Server requests authentication.
pub const STATUS_AUTHENTICATE: i32 = 407;

/// Default value of the `aggregateTo` meta entry.
pub const DEFAULT_AGGREGATE_TO: &str = "list";

// ============================================================================
// Request
// ============================================================================

/// Request message sent to the server.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Request id; responses are correlated by it
    pub request_id: Uuid,
    /// Operation (`eval`, `bytecode`, `close`, ...)
    pub op: String,
    /// Processor (`""`, `traversal`, `session`)
    pub processor: String,
    /// Arguments in insertion order
    pub args: Vec<(String, Value)>,
}

impl Request {
    /// Create a request with a fresh random id and no arguments.
    pub fn new(op: impl Into<String>, processor: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            op: op.into(),
            processor: processor.into(),
            args: Vec::new(),
        }
    }

    /// Set an argument, replacing a previous one with the same name.
    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_arg(key, value);
        self
    }

    /// Set an argument in place.
    pub fn set_arg(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match self.args.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.args.push((key, value)),
        }
    }

    /// Look up an argument.
    pub fn arg(&self, key: &str) -> Option<&Value> {
        self.args.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Script evaluation request.
    pub fn eval(gremlin: impl Into<String>, traversal_source: &str) -> Self {
        Self::new("eval", "")
            .with_arg("gremlin", gremlin.into())
            .with_arg("aliases", aliases(traversal_source))
    }

    /// Bytecode traversal request.
    pub fn bytecode(bytecode: &Bytecode, traversal_source: &str) -> Self {
        Self::new("bytecode", "traversal")
            .with_arg("gremlin", bytecode.clone())
            .with_arg("aliases", aliases(traversal_source))
    }

    /// Request closing a server-side session.
    pub fn close_session(session: &str) -> Self {
        Self::new("close", "session").with_arg("session", session)
    }

    /// Bind the request to a server-side session.
    pub fn in_session(mut self, session: &str) -> Self {
        self.processor = "session".to_string();
        self.set_arg("session", session);
        self
    }
}

fn aliases(traversal_source: &str) -> Value {
    let mut map = GraphMap::with_capacity(1);
    map.insert("g", traversal_source);
    Value::Map(map)
}

/// Serialize a request frame.
pub fn serialize_request(request: &Request, mime_type: &str) -> Result<BytesMut, GraphBinaryError> {
    let mime = mime_type.as_bytes();
    let mime_len = u8::try_from(mime.len())
        .map_err(|_| GraphBinaryError::ValueTooLarge("mime type", mime.len()))?;

    let mut writer = GraphBinaryWriter::with_capacity(64 + mime.len());
    writer.put_raw(&[mime_len]);
    writer.put_raw(mime);
    writer.put_raw(&[PROTOCOL_VERSION]);
    writer.write_value(&Value::Uuid(request.request_id), false)?;
    writer.write_value(&Value::String(request.op.clone()), false)?;
    writer.write_value(&Value::String(request.processor.clone()), false)?;
    writer.write_string_map(
        request.args.iter().map(|(k, v)| (k.as_str(), v)),
        request.args.len(),
    )?;
    Ok(writer.into_bytes())
}

/// Deserialize a request frame. Used by server-side tooling and tests.
pub fn deserialize_request(data: &[u8]) -> Result<(String, Request), GraphBinaryError> {
    let mut reader = GraphBinaryReader::new(data);
    let mime_len = reader.read_u8()? as usize;
    let mime = std::str::from_utf8(reader.read_bytes(mime_len)?)
        .map_err(|e| GraphBinaryError::InvalidUtf8(e.to_string()))?
        .to_string();
    read_version(&mut reader)?;

    let request_id = match reader.read_value(DataType::Uuid, false)? {
        Value::Uuid(id) => id,
        _ => return Err(GraphBinaryError::UnexpectedNull),
    };
    let op = read_string(&mut reader)?;
    let processor = read_string(&mut reader)?;
    let args = reader
        .read_string_keyed_map()?
        .into_iter()
        .filter_map(|(k, v)| match k {
            Value::String(k) => Some((k, v)),
            _ => None,
        })
        .collect();

    Ok((
        mime,
        Request {
            request_id,
            op,
            processor,
            args,
        },
    ))
}

// ============================================================================
// Response
// ============================================================================

/// Response status block.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResponseStatus {
    /// Status code
    pub code: i32,
    /// Optional status message
    pub message: Option<String>,
    /// Status attributes
    pub attributes: GraphMap,
}

/// Response result block.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResponseResult {
    /// Result meta data
    pub meta: GraphMap,
    /// Result data
    pub data: Value,
}

/// Response message received from the server.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Id of the request this answers; `None` for server-initiated messages
    pub request_id: Option<Uuid>,
    /// Status block
    pub status: ResponseStatus,
    /// Result block
    pub result: ResponseResult,
}

impl Response {
    /// Value of the `aggregateTo` meta entry, `"list"` when absent.
    pub fn aggregate_to(&self) -> &str {
        self.result
            .meta
            .get_str("aggregateTo")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_AGGREGATE_TO)
    }
}

/// Read one response frame from the reader.
pub fn read_response(reader: &mut GraphBinaryReader<'_>) -> Result<Response, GraphBinaryError> {
    read_version(reader)?;

    let request_id = match reader.read_value(DataType::Uuid, true)? {
        Value::Uuid(id) => Some(id),
        _ => None,
    };
    let code = match reader.read_value(DataType::Int, false)? {
        Value::Int(code) => code,
        _ => return Err(GraphBinaryError::UnexpectedNull),
    };
    let message = match reader.read_value(DataType::String, true)? {
        Value::String(message) => Some(message),
        _ => None,
    };
    let attributes = reader.read_string_keyed_map()?;
    let meta = reader.read_string_keyed_map()?;
    let data = reader.read()?;

    Ok(Response {
        request_id,
        status: ResponseStatus {
            code,
            message,
            attributes,
        },
        result: ResponseResult { meta, data },
    })
}

/// Deserialize a complete response frame.
pub fn deserialize_response(data: &[u8]) -> Result<Response, GraphBinaryError> {
    let mut reader = GraphBinaryReader::new(data);
    read_response(&mut reader)
}

/// Serialize a response frame. Used by server-side tooling and tests.
pub fn serialize_response(response: &Response) -> Result<BytesMut, GraphBinaryError> {
    let mut writer = GraphBinaryWriter::new();
    writer.put_raw(&[PROTOCOL_VERSION]);
    writer.write_value(&Value::from(response.request_id), true)?;
    writer.write_value(&Value::Int(response.status.code), false)?;
    writer.write_value(&Value::from(response.status.message.clone()), true)?;
    writer.write_value(&Value::Map(response.status.attributes.clone()), false)?;
    writer.write_value(&Value::Map(response.result.meta.clone()), false)?;
    writer.write(&response.result.data)?;
    Ok(writer.into_bytes())
}

fn read_version(reader: &mut GraphBinaryReader<'_>) -> Result<(), GraphBinaryError> {
    let version = reader.read_u8()?;
    if version != PROTOCOL_VERSION {
        return Err(GraphBinaryError::InvalidFrame(format!(
            "unsupported protocol version: 0x{:02X}",
            version
        )));
    }
    Ok(())
}

fn read_string(reader: &mut GraphBinaryReader<'_>) -> Result<String, GraphBinaryError> {
    match reader.read_value(DataType::String, false)? {
        Value::String(s) => Ok(s),
        _ => Err(GraphBinaryError::UnexpectedNull),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_layout() {
        let mut request = Request::new("eval", "");
        request.request_id = Uuid::from_u128(0x0102030405060708090A0B0C0D0E0F10);
        let request = request.with_arg("gremlin", "g.V()");

        let bytes = serialize_request(&request, DEFAULT_MIME_TYPE).unwrap();
        let mime_len = DEFAULT_MIME_TYPE.len();
        assert_eq!(bytes[0] as usize, mime_len);
        assert_eq!(&bytes[1..1 + mime_len], DEFAULT_MIME_TYPE.as_bytes());

        let rest = &bytes[1 + mime_len..];
        assert_eq!(rest[0], 0x81);
        assert_eq!(&rest[1..17], request.request_id.as_bytes());
        // op "eval"
        assert_eq!(&rest[17..25], &[0, 0, 0, 4, b'e', b'v', b'a', b'l']);
        // processor ""
        assert_eq!(&rest[25..29], &[0, 0, 0, 0]);
        // one arg, key fully qualified
        assert_eq!(&rest[29..33], &[0, 0, 0, 1]);
        assert_eq!(&rest[33..35], &[0x03, 0x00]);
    }

    #[test]
    fn test_request_roundtrip() {
        let bytecode = Bytecode::new().with_step("V", vec![]).with_step("count", vec![]);
        let request = Request::bytecode(&bytecode, "g").in_session("abc");

        let bytes = serialize_request(&request, DEFAULT_MIME_TYPE).unwrap();
        let (mime, decoded) = deserialize_request(&bytes).unwrap();
        assert_eq!(mime, DEFAULT_MIME_TYPE);
        assert_eq!(decoded, request);
        assert_eq!(decoded.processor, "session");
        assert_eq!(decoded.arg("session"), Some(&Value::from("abc")));
        assert_eq!(decoded.arg("gremlin"), Some(&Value::Bytecode(bytecode)));
    }

    #[test]
    fn test_request_helpers() {
        let eval = Request::eval("g.V().count()", "gmodern");
        assert_eq!(eval.op, "eval");
        assert_eq!(eval.processor, "");
        let aliases = eval.arg("aliases").and_then(Value::as_map).unwrap();
        assert_eq!(aliases.get_str("g"), Some(&Value::from("gmodern")));

        let close = Request::close_session("s1");
        assert_eq!(close.op, "close");
        assert_eq!(close.processor, "session");
        assert_eq!(close.arg("session"), Some(&Value::from("s1")));

        let replaced = Request::new("eval", "").with_arg("a", 1i32).with_arg("a", 2i32);
        assert_eq!(replaced.args.len(), 1);
        assert_eq!(replaced.arg("a"), Some(&Value::Int(2)));
    }

    #[test]
    fn test_mime_type_too_long() {
        let request = Request::new("eval", "");
        let mime = "x".repeat(300);
        assert!(matches!(
            serialize_request(&request, &mime),
            Err(GraphBinaryError::ValueTooLarge(_, 300))
        ));
    }

    #[test]
    fn test_response_roundtrip() {
        let mut meta = GraphMap::new();
        meta.insert("aggregateTo", "map");
        let mut attributes = GraphMap::new();
        attributes.insert("host", "localhost");
        let response = Response {
            request_id: Some(Uuid::new_v4()),
            status: ResponseStatus {
                code: STATUS_SUCCESS,
                message: None,
                attributes,
            },
            result: ResponseResult {
                meta,
                data: Value::List(vec![Value::Int(1), Value::Int(2)]),
            },
        };

        let bytes = serialize_response(&response).unwrap();
        let decoded = deserialize_response(&bytes).unwrap();
        assert_eq!(decoded, response);
        assert_eq!(decoded.aggregate_to(), "map");
    }

    #[test]
    fn test_response_layout() {
        let data = [
            0x81, // version
            0x01, // null request id
            0, 0, 0, 204, // status code
            0x00, 0, 0, 0, 2, b'o', b'k', // message
            0, 0, 0, 0, // attributes
            0, 0, 0, 0, // meta
            0xFE, 0x01, // data
        ];
        let response = deserialize_response(&data).unwrap();
        assert_eq!(response.request_id, None);
        assert_eq!(response.status.code, STATUS_NO_CONTENT);
        assert_eq!(response.status.message.as_deref(), Some("ok"));
        assert_eq!(response.result.data, Value::Null);
        assert_eq!(response.aggregate_to(), "list");
    }

    #[test]
    fn test_response_rejects_non_string_attribute_keys() {
        let data = [
            0x81, 0x01, 0, 0, 0, 200, 0x01, // header
            0, 0, 0, 1, // one attribute
            0x01, 0x00, 0, 0, 0, 1, // int key
            0xFE, 0x01, // value
            0, 0, 0, 0, 0xFE, 0x01,
        ];
        assert_eq!(
            deserialize_response(&data).unwrap_err(),
            GraphBinaryError::InvalidMapKey
        );
    }

    #[test]
    fn test_response_bad_version() {
        assert!(matches!(
            deserialize_response(&[0x80]).unwrap_err(),
            GraphBinaryError::InvalidFrame(_)
        ));
    }
}
