//! Steam server query protocol (A2S_INFO).
//!
//! Only the wire format lives here: building the request datagram and
//! decoding the reply. Sockets, timeouts and retries belong to the caller.
//!
//! ```
//! use a2s::{decode_info_reply, encode_info_request, InfoReply};
//!
//! let request = encode_info_request(None);
//! assert_eq!(request[4], a2s::A2S_INFO_REQUEST);
//!
//! let reply = decode_info_reply(&[0xFF, 0xFF, 0xFF, 0xFF, 0x41, 1, 2, 3, 4]).unwrap();
//! assert_eq!(reply, InfoReply::Challenge([1, 2, 3, 4]));
//! ```

mod error;
mod info;
mod packet;
mod reader;

pub use error::A2sError;
pub use info::{Environment, ExtraData, ServerInfo, ServerType};
pub use packet::{
    A2S_INFO_REPLY, A2S_INFO_REQUEST, InfoReply, S2C_CHALLENGE, SINGLE_PACKET_HEADER,
    SPLIT_PACKET_HEADER, decode_info_reply, encode_info_request,
};
pub use reader::PacketReader;

/// Largest datagram a server sends without splitting.
pub const MAX_PACKET_SIZE: usize = 1400;
