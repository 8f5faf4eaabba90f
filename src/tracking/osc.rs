//! Minimal OSC 1.0 codec for tracking packets.
//!
//! Decodes messages and (nested) bundles. All fields are big-endian and every
//! string/blob is padded to a 4-byte boundary. Only the argument types a head
//! tracker can plausibly send are understood; anything else fails the packet.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Marker that starts every bundle.
const BUNDLE_TAG: &[u8; 8] = b"#bundle\0";

/// Bundles nested deeper than this are rejected.
pub const MAX_BUNDLE_DEPTH: usize = 8;

/// Errors raised while decoding a packet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OscError {
    #[error("packet truncated")]
    Truncated,

    #[error("packet length {0} is not a multiple of 4")]
    Misaligned(usize),

    #[error("address must start with '/'")]
    InvalidAddress,

    #[error("string is not terminated")]
    UnterminatedString,

    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    #[error("type tag string missing")]
    MissingTypeTags,

    #[error("unsupported argument type '{0}'")]
    UnsupportedType(char),

    #[error("invalid bundle element size {0}")]
    InvalidElementSize(i32),

    #[error("bundles nested too deeply")]
    TooDeep,
}

/// One message argument.
#[derive(Debug, Clone, PartialEq)]
pub enum OscArg {
    Int(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Str(String),
    Blob(Bytes),
    Bool(bool),
    Nil,
    Impulse,
}

impl OscArg {
    /// Numeric value as `f32`, coercing integers and doubles.
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            OscArg::Int(v) => Some(*v as f32),
            OscArg::Float(v) => Some(*v),
            OscArg::Long(v) => Some(*v as f32),
            OscArg::Double(v) => Some(*v as f32),
            _ => None,
        }
    }

    fn type_tag(&self) -> u8 {
        match self {
            OscArg::Int(_) => b'i',
            OscArg::Float(_) => b'f',
            OscArg::Long(_) => b'h',
            OscArg::Double(_) => b'd',
            OscArg::Str(_) => b's',
            OscArg::Blob(_) => b'b',
            OscArg::Bool(true) => b'T',
            OscArg::Bool(false) => b'F',
            OscArg::Nil => b'N',
            OscArg::Impulse => b'I',
        }
    }
}

/// An address plus its arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct OscMessage {
    pub address: String,
    pub args: Vec<OscArg>,
}

impl OscMessage {
    pub fn new(address: impl Into<String>, args: Vec<OscArg>) -> Self {
        Self {
            address: address.into(),
            args,
        }
    }
}

/// A decoded datagram.
#[derive(Debug, Clone, PartialEq)]
pub enum OscPacket {
    Message(OscMessage),
    Bundle {
        /// NTP timestamp; `1` means "immediately"
        timetag: u64,
        content: Vec<OscPacket>,
    },
}

impl OscPacket {
    /// Decode one datagram.
    pub fn decode(data: Bytes) -> Result<Self, OscError> {
        decode_packet(data, 0)
    }

    /// Every message in the packet, bundles flattened in order.
    pub fn into_messages(self) -> Vec<OscMessage> {
        let mut out = Vec::new();
        self.collect_messages(&mut out);
        out
    }

    fn collect_messages(self, out: &mut Vec<OscMessage>) {
        match self {
            OscPacket::Message(message) => out.push(message),
            OscPacket::Bundle { content, .. } => {
                for packet in content {
                    packet.collect_messages(out);
                }
            }
        }
    }

    /// Encode to wire format.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode_into(&mut buf);
        buf.freeze()
    }

    fn encode_into(&self, buf: &mut BytesMut) {
        match self {
            OscPacket::Message(message) => encode_message(message, buf),
            OscPacket::Bundle { timetag, content } => {
                buf.put_slice(BUNDLE_TAG);
                buf.put_u64(*timetag);
                for packet in content {
                    let element = packet.encode();
                    buf.put_i32(element.len() as i32);
                    buf.put_slice(&element);
                }
            }
        }
    }
}

fn padded_len(len: usize) -> usize {
    (len + 3) & !3
}

fn decode_packet(data: Bytes, depth: usize) -> Result<OscPacket, OscError> {
    if data.len() % 4 != 0 {
        return Err(OscError::Misaligned(data.len()));
    }
    if data.starts_with(BUNDLE_TAG) {
        decode_bundle(data, depth)
    } else {
        decode_message(data).map(OscPacket::Message)
    }
}

fn decode_bundle(mut buf: Bytes, depth: usize) -> Result<OscPacket, OscError> {
    if depth >= MAX_BUNDLE_DEPTH {
        return Err(OscError::TooDeep);
    }

    buf.advance(BUNDLE_TAG.len());
    if buf.remaining() < 8 {
        return Err(OscError::Truncated);
    }
    let timetag = buf.get_u64();

    let mut content = Vec::new();
    while buf.has_remaining() {
        if buf.remaining() < 4 {
            return Err(OscError::Truncated);
        }
        let size = buf.get_i32();
        if size <= 0 || size % 4 != 0 {
            return Err(OscError::InvalidElementSize(size));
        }
        let size = size as usize;
        if size > buf.remaining() {
            return Err(OscError::Truncated);
        }
        content.push(decode_packet(buf.split_to(size), depth + 1)?);
    }

    Ok(OscPacket::Bundle { timetag, content })
}

fn decode_message(mut buf: Bytes) -> Result<OscMessage, OscError> {
    let address = read_string(&mut buf)?;
    if !address.starts_with('/') {
        return Err(OscError::InvalidAddress);
    }

    // Some old senders omit the type tag string entirely
    if !buf.has_remaining() {
        return Ok(OscMessage::new(address, Vec::new()));
    }
    if buf[0] != b',' {
        return Err(OscError::MissingTypeTags);
    }
    let tags = read_string(&mut buf)?;

    let mut args = Vec::with_capacity(tags.len().saturating_sub(1));
    for tag in tags.bytes().skip(1) {
        args.push(read_arg(tag, &mut buf)?);
    }

    Ok(OscMessage::new(address, args))
}

fn read_arg(tag: u8, buf: &mut Bytes) -> Result<OscArg, OscError> {
    let arg = match tag {
        b'i' => {
            ensure(buf, 4)?;
            OscArg::Int(buf.get_i32())
        }
        b'f' => {
            ensure(buf, 4)?;
            OscArg::Float(buf.get_f32())
        }
        b'h' => {
            ensure(buf, 8)?;
            OscArg::Long(buf.get_i64())
        }
        b'd' => {
            ensure(buf, 8)?;
            OscArg::Double(buf.get_f64())
        }
        b's' | b'S' => OscArg::Str(read_string(buf)?),
        b'b' => {
            ensure(buf, 4)?;
            let size = buf.get_i32();
            if size < 0 {
                return Err(OscError::InvalidElementSize(size));
            }
            let size = size as usize;
            ensure(buf, padded_len(size))?;
            let blob = buf.split_to(size);
            buf.advance(padded_len(size) - size);
            OscArg::Blob(blob)
        }
        b'T' => OscArg::Bool(true),
        b'F' => OscArg::Bool(false),
        b'N' => OscArg::Nil,
        b'I' => OscArg::Impulse,
        other => return Err(OscError::UnsupportedType(other as char)),
    };
    Ok(arg)
}

fn ensure(buf: &Bytes, len: usize) -> Result<(), OscError> {
    if buf.remaining() < len {
        return Err(OscError::Truncated);
    }
    Ok(())
}

fn read_string(buf: &mut Bytes) -> Result<String, OscError> {
    let end = buf
        .iter()
        .position(|&b| b == 0)
        .ok_or(OscError::UnterminatedString)?;
    let total = padded_len(end + 1);
    if total > buf.remaining() {
        return Err(OscError::Truncated);
    }
    let text = std::str::from_utf8(&buf[..end])
        .map_err(|_| OscError::InvalidUtf8)?
        .to_string();
    buf.advance(total);
    Ok(text)
}

fn write_string(text: &str, buf: &mut BytesMut) {
    buf.put_slice(text.as_bytes());
    let padding = padded_len(text.len() + 1) - text.len();
    buf.put_bytes(0, padding);
}

fn encode_message(message: &OscMessage, buf: &mut BytesMut) {
    write_string(&message.address, buf);

    let mut tags = String::with_capacity(message.args.len() + 1);
    tags.push(',');
    tags.extend(message.args.iter().map(|arg| arg.type_tag() as char));
    write_string(&tags, buf);

    for arg in &message.args {
        match arg {
            OscArg::Int(v) => buf.put_i32(*v),
            OscArg::Float(v) => buf.put_f32(*v),
            OscArg::Long(v) => buf.put_i64(*v),
            OscArg::Double(v) => buf.put_f64(*v),
            OscArg::Str(s) => write_string(s, buf),
            OscArg::Blob(data) => {
                buf.put_i32(data.len() as i32);
                buf.put_slice(data);
                buf.put_bytes(0, padded_len(data.len()) - data.len());
            }
            OscArg::Bool(_) | OscArg::Nil | OscArg::Impulse => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn head(x: f32, y: f32, z: f32) -> OscMessage {
        OscMessage::new(
            "/head",
            vec![OscArg::Float(x), OscArg::Float(y), OscArg::Float(z)],
        )
    }

    #[test]
    fn test_decode_float_message() {
        // "/head" + ",fff" + three floats
        let mut raw = BytesMut::new();
        raw.put_slice(b"/head\0\0\0,fff\0\0\0\0");
        raw.put_f32(0.25);
        raw.put_f32(-1.5);
        raw.put_f32(2.0);

        let packet = OscPacket::decode(raw.freeze()).unwrap();
        assert_eq!(packet, OscPacket::Message(head(0.25, -1.5, 2.0)));
    }

    #[test]
    fn test_encoded_message_is_aligned() {
        let bytes = OscPacket::Message(head(1.0, 2.0, 3.0)).encode();
        assert_eq!(bytes.len(), 8 + 8 + 12);
        assert_eq!(&bytes[..8], b"/head\0\0\0");
    }

    #[test]
    fn test_mixed_numeric_args_coerce() {
        let message = OscMessage::new(
            "/head",
            vec![OscArg::Int(2), OscArg::Double(0.5), OscArg::Long(-3)],
        );
        let decoded = OscPacket::decode(OscPacket::Message(message).encode()).unwrap();
        let OscPacket::Message(message) = decoded else {
            panic!("expected a message");
        };
        let values: Vec<_> = message.args.iter().filter_map(OscArg::as_f32).collect();
        assert_eq!(values, vec![2.0, 0.5, -3.0]);
        assert_eq!(OscArg::Str("x".into()).as_f32(), None);
    }

    #[test]
    fn test_nested_bundles_flatten_in_order() {
        let inner = OscPacket::Bundle {
            timetag: 1,
            content: vec![OscPacket::Message(head(2.0, 0.0, 0.0))],
        };
        let outer = OscPacket::Bundle {
            timetag: 1,
            content: vec![
                OscPacket::Message(head(1.0, 0.0, 0.0)),
                inner,
                OscPacket::Message(OscMessage::new("/hand", vec![OscArg::Nil])),
            ],
        };

        let messages = OscPacket::decode(outer.encode()).unwrap().into_messages();
        let addresses: Vec<_> = messages.iter().map(|m| m.address.as_str()).collect();
        assert_eq!(addresses, vec!["/head", "/head", "/hand"]);
        assert_eq!(messages[1].args[0], OscArg::Float(2.0));
    }

    #[test]
    fn test_strings_and_blobs() {
        let message = OscMessage::new(
            "/meta",
            vec![
                OscArg::Str("kinect".into()),
                OscArg::Blob(Bytes::from_static(&[1, 2, 3, 4, 5])),
                OscArg::Bool(true),
            ],
        );
        let decoded = OscPacket::decode(OscPacket::Message(message.clone()).encode()).unwrap();
        assert_eq!(decoded, OscPacket::Message(message));
    }

    #[test]
    fn test_truncated_packets_fail() {
        let bytes = OscPacket::Message(head(1.0, 2.0, 3.0)).encode();
        assert_eq!(
            OscPacket::decode(bytes.slice(..bytes.len() - 4)),
            Err(OscError::Truncated)
        );
        assert_eq!(
            OscPacket::decode(Bytes::from_static(b"/hea")),
            Err(OscError::UnterminatedString)
        );
        assert_eq!(
            OscPacket::decode(Bytes::from_static(b"/head")),
            Err(OscError::Misaligned(5))
        );
    }

    #[test]
    fn test_malformed_packets_fail() {
        assert_eq!(
            OscPacket::decode(Bytes::from_static(b"head\0\0\0\0")),
            Err(OscError::InvalidAddress)
        );
        assert_eq!(
            OscPacket::decode(Bytes::from_static(b"/a\0\0,x\0\0")),
            Err(OscError::UnsupportedType('x'))
        );
        assert_eq!(
            OscPacket::decode(Bytes::from_static(b"/a\0\0fff\0")),
            Err(OscError::MissingTypeTags)
        );

        let mut bundle = BytesMut::new();
        bundle.put_slice(BUNDLE_TAG);
        bundle.put_u64(1);
        bundle.put_i32(6);
        bundle.put_slice(&[0; 8]);
        assert_eq!(
            OscPacket::decode(bundle.freeze()),
            Err(OscError::InvalidElementSize(6))
        );
    }

    #[test]
    fn test_excessive_nesting_rejected() {
        let mut packet = OscPacket::Message(head(0.0, 0.0, 0.0));
        for _ in 0..=MAX_BUNDLE_DEPTH {
            packet = OscPacket::Bundle {
                timetag: 1,
                content: vec![packet],
            };
        }
        assert_eq!(OscPacket::decode(packet.encode()), Err(OscError::TooDeep));
    }
}
