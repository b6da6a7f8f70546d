use thiserror::Error;

/// Errors produced while decoding a server query reply.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum A2sError {
    /// The packet ended before the field being read.
    #[error("unexpected end of packet while reading {field}")]
    UnexpectedEof { field: &'static str },

    /// The packet does not start with a known header.
    #[error("invalid packet header: {0:#010x}")]
    InvalidHeader(u32),

    /// The reply is split across several packets.
    #[error("split replies are not supported for A2S_INFO")]
    SplitPacket,

    /// The reply type byte is not one this codec understands.
    #[error("unexpected reply type: {0:#04x}")]
    UnexpectedReply(u8),

    /// A string field was not terminated by a NUL byte.
    #[error("unterminated string in field {field}")]
    UnterminatedString { field: &'static str },
}
