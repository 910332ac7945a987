//! End-of-Message and chunked framing codec.

use std::collections::VecDeque;
use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{trace, warn};

use crate::{CodecError, CodecResult};

/// Delimiter used by `base:1.0` framing.
pub const END_OF_MESSAGE_MARKER: &[u8] = b"]]>]]>";

/// Terminator of a chunked message.
pub const END_OF_CHUNKS_MARKER: &[u8] = b"\n##\n";

/// Default ceiling for a single inbound message (64 MiB).
///
/// YANG Library replies and schema texts from large devices run to several
/// megabytes, so the ceiling is generous.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

/// Largest chunk size permitted by RFC 6242.
const MAX_CHUNK_SIZE: u64 = 4_294_967_295;

/// `4294967295` has ten digits.
const MAX_CHUNK_DIGITS: usize = 10;

/// The framing discipline in force on a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FramingMode {
    /// `]]>]]>`-terminated messages (`base:1.0`, and always for `<hello>`).
    #[default]
    EndOfMessage,
    /// Length-prefixed chunks (`base:1.1`).
    Chunked,
}

impl fmt::Display for FramingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EndOfMessage => write!(f, "end-of-message"),
            Self::Chunked => write!(f, "chunked"),
        }
    }
}

/// Frame one outgoing message in the given mode.
///
/// The chunk length is the UTF-8 byte length of `message`, not its character
/// count.
pub fn encode_frame(mode: FramingMode, message: &str) -> Bytes {
    let mut dst = BytesMut::with_capacity(message.len() + 16);
    put_frame(mode, message, &mut dst);
    dst.freeze()
}

fn put_frame(mode: FramingMode, message: &str, dst: &mut BytesMut) {
    match mode {
        FramingMode::EndOfMessage => {
            dst.put_slice(message.as_bytes());
            dst.put_slice(END_OF_MESSAGE_MARKER);
        }
        FramingMode::Chunked => {
            dst.put_slice(format!("\n#{}\n", message.len()).as_bytes());
            dst.put_slice(message.as_bytes());
            dst.put_slice(END_OF_CHUNKS_MARKER);
        }
    }
}

/// What sits at the front of a chunked stream.
#[derive(Debug, PartialEq, Eq)]
enum ChunkHeader {
    /// Not enough bytes to tell yet.
    Incomplete,
    /// `\n##\n`
    EndOfChunks,
    /// `\n#<size>\n`, `header_len` bytes long.
    Chunk { header_len: usize, size: usize },
}

fn parse_chunk_header(bytes: &[u8]) -> CodecResult<ChunkHeader> {
    let Some(&first) = bytes.first() else {
        return Ok(ChunkHeader::Incomplete);
    };
    if first != b'\n' {
        return Err(CodecError::invalid_header(bytes));
    }
    match bytes.get(1) {
        None => return Ok(ChunkHeader::Incomplete),
        Some(b'#') => {}
        Some(_) => return Err(CodecError::invalid_header(bytes)),
    }
    match bytes.get(2) {
        None => Ok(ChunkHeader::Incomplete),
        Some(b'#') => match bytes.get(3) {
            None => Ok(ChunkHeader::Incomplete),
            Some(b'\n') => Ok(ChunkHeader::EndOfChunks),
            Some(_) => Err(CodecError::invalid_header(bytes)),
        },
        Some(b'1'..=b'9') => {
            let mut size: u64 = 0;
            for (i, &byte) in bytes[2..].iter().enumerate() {
                match byte {
                    b'0'..=b'9' => {
                        if i >= MAX_CHUNK_DIGITS {
                            return Err(CodecError::invalid_header(bytes));
                        }
                        size = size * 10 + u64::from(byte - b'0');
                    }
                    b'\n' => {
                        if size > MAX_CHUNK_SIZE {
                            return Err(CodecError::InvalidChunkSize { size });
                        }
                        return Ok(ChunkHeader::Chunk {
                            header_len: 2 + i + 1,
                            size: size as usize,
                        });
                    }
                    _ => return Err(CodecError::invalid_header(bytes)),
                }
            }
            Ok(ChunkHeader::Incomplete)
        }
        Some(_) => Err(CodecError::invalid_header(bytes)),
    }
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).rposition(|w| w == needle)
}

fn trim_ascii_whitespace(bytes: Bytes) -> Bytes {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    bytes.slice(start..end)
}

/// Stateful RFC 6242 decoder/encoder.
///
/// The codec owns the partially assembled chunked message; the caller owns the
/// raw inbound buffer and hands it to [`NetconfCodec::decode_all`] (or the
/// [`Decoder`] impl) after every read. Bytes that do not yet form a complete
/// frame are left in the caller's buffer untouched.
#[derive(Debug)]
pub struct NetconfCodec {
    mode: FramingMode,
    max_message_size: usize,
    /// End-of-message segments already split off the buffer.
    pending: VecDeque<Bytes>,
    /// Chunk payloads of the message being assembled.
    message: BytesMut,
    /// Leading bytes of the buffer already searched for a marker.
    scanned: usize,
}

impl Default for NetconfCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl NetconfCodec {
    /// Create a codec in End-of-Message mode.
    pub fn new() -> Self {
        Self::with_mode(FramingMode::EndOfMessage)
    }

    /// Create a codec in the given mode.
    pub fn with_mode(mode: FramingMode) -> Self {
        Self {
            mode,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            pending: VecDeque::new(),
            message: BytesMut::new(),
            scanned: 0,
        }
    }

    /// Set the inbound message ceiling.
    pub fn with_max_message_size(mut self, max: usize) -> Self {
        self.max_message_size = max;
        self
    }

    /// Current framing mode
    pub fn mode(&self) -> FramingMode {
        self.mode
    }

    /// Switch framing mode.
    ///
    /// Messages already split out of the buffer are still returned by the next
    /// decode calls; a partially assembled chunked message is discarded.
    pub fn set_mode(&mut self, mode: FramingMode) {
        if mode != self.mode {
            trace!(from = %self.mode, to = %mode, "switching framing mode");
            self.message.clear();
            self.scanned = 0;
            self.mode = mode;
        }
    }

    /// Return to the initial End-of-Message state, dropping all partial data.
    pub fn reset(&mut self) {
        self.mode = FramingMode::EndOfMessage;
        self.pending.clear();
        self.message.clear();
        self.scanned = 0;
    }

    /// Whether a chunked message is partially assembled.
    pub fn has_partial_message(&self) -> bool {
        !self.message.is_empty()
    }

    /// Frame `message` in the current mode.
    pub fn encode_message(&self, message: &str) -> Bytes {
        encode_frame(self.mode, message)
    }

    /// Decode every complete message currently in `buffer`.
    ///
    /// Consumed bytes are removed from `buffer`; the remainder stays for the
    /// next call.
    pub fn decode_all(&mut self, buffer: &mut BytesMut) -> CodecResult<Vec<Bytes>> {
        let mut messages = Vec::new();
        while let Some(message) = self.decode(buffer)? {
            messages.push(message);
        }
        Ok(messages)
    }

    fn decode_end_of_message(&mut self, buffer: &mut BytesMut) -> CodecResult<Option<Bytes>> {
        // Only bytes that arrived since the last search can hold a new marker,
        // plus a marker-sized overlap for one split across reads.
        let start = self.scanned.min(buffer.len());
        let Some(last) = rfind(&buffer[start..], END_OF_MESSAGE_MARKER).map(|pos| start + pos)
        else {
            self.scanned = buffer.len().saturating_sub(END_OF_MESSAGE_MARKER.len() - 1);
            if buffer.len() > self.max_message_size {
                return Err(CodecError::MessageTooLarge {
                    size: buffer.len(),
                    max: self.max_message_size,
                });
            }
            return Ok(None);
        };

        // Everything up to the rightmost marker is settled; later arrivals
        // can no longer change where these boundaries are.
        let settled = buffer.split_to(last + END_OF_MESSAGE_MARKER.len()).freeze();
        self.scanned = 0;
        let mut body = settled.slice(..last);
        loop {
            let (segment, rest) = match body
                .windows(END_OF_MESSAGE_MARKER.len())
                .position(|w| w == END_OF_MESSAGE_MARKER)
            {
                Some(pos) => (
                    body.slice(..pos),
                    Some(body.slice(pos + END_OF_MESSAGE_MARKER.len()..)),
                ),
                None => (body.clone(), None),
            };
            let segment = trim_ascii_whitespace(segment);
            if !segment.is_empty() {
                self.pending.push_back(segment);
            }
            match rest {
                Some(rest) => body = rest,
                None => break,
            }
        }
        Ok(self.pending.pop_front())
    }

    fn decode_chunked(&mut self, buffer: &mut BytesMut) -> CodecResult<Option<Bytes>> {
        loop {
            match parse_chunk_header(buffer)? {
                ChunkHeader::Incomplete => return Ok(None),
                ChunkHeader::EndOfChunks => {
                    buffer.advance(END_OF_CHUNKS_MARKER.len());
                    if self.message.is_empty() {
                        warn!("end-of-chunks marker without chunk data, ignoring");
                        continue;
                    }
                    return Ok(Some(self.message.split().freeze()));
                }
                ChunkHeader::Chunk { header_len, size } => {
                    let assembled = self.message.len() + size;
                    if assembled > self.max_message_size {
                        return Err(CodecError::MessageTooLarge {
                            size: assembled,
                            max: self.max_message_size,
                        });
                    }
                    let needed = header_len + size;
                    if buffer.len() < needed {
                        // Announced but not yet delivered: leave it all in place.
                        buffer.reserve(needed - buffer.len());
                        return Ok(None);
                    }
                    buffer.advance(header_len);
                    let payload = buffer.split_to(size);
                    self.message.extend_from_slice(&payload);
                }
            }
        }
    }
}

impl Decoder for NetconfCodec {
    type Item = Bytes;
    type Error = CodecError;

    fn decode(&mut self, buffer: &mut BytesMut) -> Result<Option<Bytes>, CodecError> {
        if let Some(message) = self.pending.pop_front() {
            return Ok(Some(message));
        }
        match self.mode {
            FramingMode::EndOfMessage => self.decode_end_of_message(buffer),
            FramingMode::Chunked => self.decode_chunked(buffer),
        }
    }
}

impl Encoder<&str> for NetconfCodec {
    type Error = CodecError;

    fn encode(&mut self, message: &str, dst: &mut BytesMut) -> Result<(), CodecError> {
        put_frame(self.mode, message, dst);
        Ok(())
    }
}

impl Encoder<String> for NetconfCodec {
    type Error = CodecError;

    fn encode(&mut self, message: String, dst: &mut BytesMut) -> Result<(), CodecError> {
        put_frame(self.mode, &message, dst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn buf(bytes: &[u8]) -> BytesMut {
        BytesMut::from(bytes)
    }

    #[test]
    fn test_eom_single_message() {
        let mut codec = NetconfCodec::new();
        let mut buffer = buf(b"<hello/>]]>]]>");
        let messages = codec.decode_all(&mut buffer).unwrap();
        assert_eq!(messages, vec![Bytes::from_static(b"<hello/>")]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_eom_multiple_messages_and_remainder() {
        let mut codec = NetconfCodec::new();
        let mut buffer = buf(b"<a/>]]>]]>\n<b/>]]>]]>\n<c>partial");
        let messages = codec.decode_all(&mut buffer).unwrap();
        assert_eq!(
            messages,
            vec![Bytes::from_static(b"<a/>"), Bytes::from_static(b"<b/>")]
        );
        assert_eq!(&buffer[..], b"\n<c>partial");
    }

    #[test]
    fn test_eom_marker_split_across_reads() {
        let mut codec = NetconfCodec::new();
        let mut buffer = buf(b"<a/>]]>]");
        assert!(codec.decode_all(&mut buffer).unwrap().is_empty());
        assert_eq!(&buffer[..], b"<a/>]]>]");

        buffer.extend_from_slice(b"]>");
        let messages = codec.decode_all(&mut buffer).unwrap();
        assert_eq!(messages, vec![Bytes::from_static(b"<a/>")]);
    }

    #[test]
    fn test_eom_message_trickling_in_byte_by_byte() {
        let mut codec = NetconfCodec::new();
        let mut buffer = BytesMut::new();
        let stream = b"<a>]]></a>]]>]]><b/>]]>]]>";
        let mut messages = Vec::new();
        for byte in stream {
            buffer.extend_from_slice(&[*byte]);
            messages.extend(codec.decode_all(&mut buffer).unwrap());
            assert!(codec.scanned <= buffer.len());
        }
        assert_eq!(
            messages,
            vec![Bytes::from_static(b"<a>]]></a>"), Bytes::from_static(b"<b/>")]
        );
        assert!(buffer.is_empty());
        assert_eq!(codec.scanned, 0);
    }

    #[test]
    fn test_eom_search_resumes_after_scanned_prefix() {
        let mut codec = NetconfCodec::new();
        let mut buffer = buf(b"<rpc-reply>");
        assert!(codec.decode_all(&mut buffer).unwrap().is_empty());
        assert_eq!(codec.scanned, buffer.len() - (END_OF_MESSAGE_MARKER.len() - 1));

        buffer.extend_from_slice(b"<data/></rpc-reply>]]>");
        assert!(codec.decode_all(&mut buffer).unwrap().is_empty());
        buffer.extend_from_slice(b"]]>");
        let messages = codec.decode_all(&mut buffer).unwrap();
        assert_eq!(
            messages,
            vec![Bytes::from_static(b"<rpc-reply><data/></rpc-reply>")]
        );
    }

    #[test]
    fn test_eom_half_marker_inside_message_is_not_a_boundary() {
        let mut codec = NetconfCodec::new();
        let mut buffer = buf(b"<data><![CDATA[x]]></data>]]>]]>");
        let messages = codec.decode_all(&mut buffer).unwrap();
        assert_eq!(
            messages,
            vec![Bytes::from_static(b"<data><![CDATA[x]]></data>")]
        );
    }

    #[test]
    fn test_eom_whitespace_only_segments_skipped() {
        let mut codec = NetconfCodec::new();
        let mut buffer = buf(b"  \n]]>]]><a/>]]>]]>");
        let messages = codec.decode_all(&mut buffer).unwrap();
        assert_eq!(messages, vec![Bytes::from_static(b"<a/>")]);
    }

    #[test]
    fn test_chunked_single_chunk() {
        let mut codec = NetconfCodec::with_mode(FramingMode::Chunked);
        let mut buffer = buf(b"\n#4\n<a/>\n##\n");
        let messages = codec.decode_all(&mut buffer).unwrap();
        assert_eq!(messages, vec![Bytes::from_static(b"<a/>")]);
        assert!(buffer.is_empty());
        assert!(!codec.has_partial_message());
    }

    #[test]
    fn test_chunked_message_spanning_chunks() {
        let mut codec = NetconfCodec::with_mode(FramingMode::Chunked);
        let mut buffer = buf(b"\n#3\n<rp\n#8\nc-reply/\n#1\n>\n##\n");
        let messages = codec.decode_all(&mut buffer).unwrap();
        assert_eq!(messages, vec![Bytes::from_static(b"<rpc-reply/>")]);
    }

    #[test]
    fn test_chunked_incomplete_payload_left_untouched() {
        let mut codec = NetconfCodec::with_mode(FramingMode::Chunked);
        let mut buffer = buf(b"\n#10\n<rpc-re");
        assert!(codec.decode_all(&mut buffer).unwrap().is_empty());
        assert_eq!(&buffer[..], b"\n#10\n<rpc-re");
        assert!(!codec.has_partial_message());

        buffer.extend_from_slice(b"ply\n##\n");
        let messages = codec.decode_all(&mut buffer).unwrap();
        assert_eq!(messages, vec![Bytes::from_static(b"<rpc-reply")]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_chunked_incomplete_header_left_untouched() {
        let mut codec = NetconfCodec::with_mode(FramingMode::Chunked);
        for partial in [&b"\n"[..], b"\n#", b"\n#1", b"\n#12", b"\n##"] {
            let mut buffer = buf(partial);
            assert!(codec.decode_all(&mut buffer).unwrap().is_empty());
            assert_eq!(&buffer[..], partial);
        }
    }

    #[test]
    fn test_chunked_garbage_is_framing_error() {
        for garbage in [
            &b"<rpc-reply/>"[..],
            b"\n<",
            b"\n#x\n",
            b"\n#0\n",
            b"\n#4x\n",
            b"\n##x",
            b"\n#12345678901\n",
        ] {
            let mut codec = NetconfCodec::with_mode(FramingMode::Chunked);
            let mut buffer = buf(garbage);
            let err = codec.decode_all(&mut buffer).unwrap_err();
            assert!(err.is_framing_error(), "{:?} gave {:?}", garbage, err);
        }
    }

    #[test]
    fn test_chunked_size_above_rfc_limit() {
        let mut codec = NetconfCodec::with_mode(FramingMode::Chunked);
        let mut buffer = buf(b"\n#4294967296\n");
        assert!(matches!(
            codec.decode_all(&mut buffer),
            Err(CodecError::InvalidChunkSize { size: 4_294_967_296 })
        ));
    }

    #[test]
    fn test_chunked_message_ceiling() {
        let mut codec = NetconfCodec::with_mode(FramingMode::Chunked).with_max_message_size(8);
        let mut buffer = buf(b"\n#6\nabcdef\n#6\nghijkl\n##\n");
        assert!(matches!(
            codec.decode_all(&mut buffer),
            Err(CodecError::MessageTooLarge { size: 12, max: 8 })
        ));
    }

    #[test]
    fn test_eom_message_ceiling() {
        let mut codec = NetconfCodec::new().with_max_message_size(4);
        let mut buffer = buf(b"<abcdef");
        assert!(matches!(
            codec.decode_all(&mut buffer),
            Err(CodecError::MessageTooLarge { .. })
        ));
    }

    #[test]
    fn test_encode_uses_byte_length() {
        let frame = encode_frame(FramingMode::Chunked, "<a>é</a>");
        assert_eq!(&frame[..], "\n#9\n<a>é</a>\n##\n".as_bytes());
    }

    #[test]
    fn test_encode_end_of_message() {
        let mut codec = NetconfCodec::new();
        let mut dst = BytesMut::new();
        codec.encode("<hello/>", &mut dst).unwrap();
        assert_eq!(&dst[..], b"<hello/>]]>]]>");
    }

    #[test]
    fn test_mode_switch_after_hello() {
        let mut codec = NetconfCodec::new();
        let mut buffer = buf(b"<hello/>]]>]]>");
        assert_eq!(codec.decode_all(&mut buffer).unwrap().len(), 1);

        codec.set_mode(FramingMode::Chunked);
        buffer.extend_from_slice(b"\n#4\n<a/>\n##\n");
        let messages = codec.decode_all(&mut buffer).unwrap();
        assert_eq!(messages, vec![Bytes::from_static(b"<a/>")]);
    }

    #[test]
    fn test_reset_returns_to_end_of_message() {
        let mut codec = NetconfCodec::with_mode(FramingMode::Chunked);
        let mut buffer = buf(b"\n#3\nabc");
        codec.decode_all(&mut buffer).unwrap();
        codec.reset();
        assert_eq!(codec.mode(), FramingMode::EndOfMessage);
        assert!(!codec.has_partial_message());
    }
}
