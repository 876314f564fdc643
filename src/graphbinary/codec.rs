//! GraphBinary message codec for tokio_util.
//!
//! Response frames carry no length prefix, so a frame is complete once it
//! decodes without running out of input.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::decoder::GraphBinaryReader;
use super::message::{read_response, serialize_request, Request, Response, DEFAULT_MIME_TYPE};
use super::GraphBinaryError;

/// Default maximum response frame size (64MB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

/// Codec decoding response frames and encoding request frames.
#[derive(Debug, Clone)]
pub struct GraphBinaryMessageCodec {
    mime_type: String,
    max_frame_size: usize,
}

impl GraphBinaryMessageCodec {
    /// Create a codec announcing the default mime type.
    pub fn new() -> Self {
        Self::with_mime_type(DEFAULT_MIME_TYPE)
    }

    /// Create a codec announcing a custom mime type.
    pub fn with_mime_type(mime_type: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Set the maximum buffered frame size.
    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    /// Mime type written into request frames.
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }
}

impl Default for GraphBinaryMessageCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for GraphBinaryMessageCodec {
    type Item = Response;
    type Error = GraphBinaryError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        let mut reader = GraphBinaryReader::new(&src[..]);
        match read_response(&mut reader) {
            Ok(response) => {
                let consumed = reader.position();
                src.advance(consumed);
                Ok(Some(response))
            }
            Err(GraphBinaryError::UnexpectedEof) => {
                if src.len() > self.max_frame_size {
                    return Err(GraphBinaryError::ValueTooLarge("frame", src.len()));
                }
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

impl Encoder<&Request> for GraphBinaryMessageCodec {
    type Error = GraphBinaryError;

    fn encode(&mut self, item: &Request, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let frame = serialize_request(item, &self.mime_type)?;
        dst.extend_from_slice(&frame);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphbinary::message::{
        deserialize_request, serialize_response, ResponseResult, ResponseStatus, STATUS_SUCCESS,
    };
    use crate::graphbinary::Value;
    use uuid::Uuid;

    fn response(data: Value) -> Response {
        Response {
            request_id: Some(Uuid::new_v4()),
            status: ResponseStatus {
                code: STATUS_SUCCESS,
                ..Default::default()
            },
            result: ResponseResult {
                data,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_decode_partial_then_complete() {
        let mut codec = GraphBinaryMessageCodec::new();
        let expected = response(Value::from("hello"));
        let frame = serialize_response(&expected).unwrap();

        let mut buf = BytesMut::from(&frame[..frame.len() - 2]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), frame.len() - 2);

        buf.extend_from_slice(&frame[frame.len() - 2..]);
        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, expected);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_two_frames() {
        let mut codec = GraphBinaryMessageCodec::new();
        let first = response(Value::Int(1));
        let second = response(Value::Int(2));

        let mut buf = BytesMut::new();
        buf.extend_from_slice(&serialize_response(&first).unwrap());
        buf.extend_from_slice(&serialize_response(&second).unwrap());

        assert_eq!(codec.decode(&mut buf).unwrap(), Some(first));
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(second));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_decode_frame_too_large() {
        let mut codec = GraphBinaryMessageCodec::new().with_max_frame_size(4);
        let frame = serialize_response(&response(Value::from("payload"))).unwrap();
        let mut buf = BytesMut::from(&frame[..frame.len() - 1]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(GraphBinaryError::ValueTooLarge("frame", _))
        ));
    }

    #[test]
    fn test_decode_eof_rejects_truncated_message() {
        let mut codec = GraphBinaryMessageCodec::new();
        let mut buf = BytesMut::from(&[0x81u8][..]);
        assert!(matches!(codec.decode_eof(&mut buf), Err(GraphBinaryError::Io(_))));

        let expected = response(Value::Int(7));
        let mut buf = BytesMut::from(&serialize_response(&expected).unwrap()[..]);
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), Some(expected));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_encode_request() {
        let mut codec = GraphBinaryMessageCodec::with_mime_type("application/custom");
        let request = Request::eval("g.V()", "g");
        let mut buf = BytesMut::new();
        codec.encode(&request, &mut buf).unwrap();

        let (mime, decoded) = deserialize_request(&buf).unwrap();
        assert_eq!(mime, "application/custom");
        assert_eq!(decoded, request);
    }
}
