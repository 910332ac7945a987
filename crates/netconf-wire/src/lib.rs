//! # NETCONF Wire Framing
//!
//! This crate implements the message framing layer of NETCONF over SSH
//! (RFC 6242). A NETCONF session is one unbounded byte stream; the framing
//! layer decides where one XML document ends and the next begins.
//!
//! Two mutually exclusive disciplines exist:
//!
//! - **End-of-Message** (`base:1.0`): every message is terminated by the
//!   literal marker `]]>]]>`.
//! - **Chunked** (`base:1.1`): every message is a sequence of
//!   `\n#<len>\n<payload>` chunks followed by the `\n##\n` terminator.
//!
//! The hello exchange always uses End-of-Message; the negotiated mode applies
//! to every message after it.
//!
//! ## Usage
//!
//! ```rust
//! use bytes::BytesMut;
//! use netconf_wire::{FramingMode, NetconfCodec, encode_frame};
//!
//! let mut codec = NetconfCodec::with_mode(FramingMode::Chunked);
//! let mut buffer = BytesMut::new();
//! buffer.extend_from_slice(&encode_frame(FramingMode::Chunked, "<rpc-reply/>"));
//!
//! let messages = codec.decode_all(&mut buffer).unwrap();
//! assert_eq!(&messages[0][..], b"<rpc-reply/>");
//! assert!(buffer.is_empty());
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod codec;

pub use codec::{
    DEFAULT_MAX_MESSAGE_SIZE, END_OF_CHUNKS_MARKER, END_OF_MESSAGE_MARKER, FramingMode,
    NetconfCodec, encode_frame,
};

/// Errors raised while framing or de-framing a NETCONF byte stream.
///
/// Every decode error means byte alignment with the peer has been lost; the
/// connection cannot be trusted afterwards.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CodecError {
    /// Bytes at a chunk boundary were neither a chunk header nor the
    /// end-of-chunks marker.
    #[error("invalid chunk header near {found:?}")]
    InvalidChunkHeader {
        /// Escaped preview of the offending bytes
        found: String,
    },

    /// A chunk header announced a size outside `1..=4294967295`.
    #[error("chunk size {size} is outside the allowed range")]
    InvalidChunkSize {
        /// The announced size
        size: u64,
    },

    /// A message grew beyond the configured ceiling.
    #[error("message of {size} bytes exceeds maximum allowed ({max} bytes)")]
    MessageTooLarge {
        /// Bytes buffered so far
        size: usize,
        /// Configured ceiling
        max: usize,
    },

    /// An underlying I/O error (required by `tokio_util::codec`).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CodecError {
    pub(crate) fn invalid_header(bytes: &[u8]) -> Self {
        let preview = &bytes[..bytes.len().min(16)];
        Self::InvalidChunkHeader {
            found: preview.escape_ascii().to_string(),
        }
    }

    /// Whether this error means the stream lost byte alignment.
    pub fn is_framing_error(&self) -> bool {
        !matches!(self, Self::Io(_))
    }
}

/// Result type for codec operations
pub type CodecResult<T> = Result<T, CodecError>;
