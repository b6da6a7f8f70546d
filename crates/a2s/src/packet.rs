use bytes::{BufMut, Bytes, BytesMut};

use super::{A2sError, PacketReader, ServerInfo};

/// Header of a reply that fits in one packet.
pub const SINGLE_PACKET_HEADER: u32 = 0xFFFF_FFFF;
/// Header of a reply split across packets.
pub const SPLIT_PACKET_HEADER: u32 = 0xFFFF_FFFE;

/// A2S_INFO request type byte.
pub const A2S_INFO_REQUEST: u8 = 0x54;
/// S2C_CHALLENGE reply type byte.
pub const S2C_CHALLENGE: u8 = 0x41;
/// A2S_INFO reply type byte.
pub const A2S_INFO_REPLY: u8 = 0x49;

const INFO_PAYLOAD: &[u8] = b"Source Engine Query\0";

/// Encode an A2S_INFO request, optionally carrying the challenge from a
/// previous `S2C_CHALLENGE` reply.
pub fn encode_info_request(challenge: Option<[u8; 4]>) -> Bytes {
    let mut buf = BytesMut::with_capacity(4 + 1 + INFO_PAYLOAD.len() + 4);
    buf.put_u32_le(SINGLE_PACKET_HEADER);
    buf.put_u8(A2S_INFO_REQUEST);
    buf.put_slice(INFO_PAYLOAD);
    if let Some(challenge) = challenge {
        buf.put_slice(&challenge);
    }
    buf.freeze()
}

/// A reply to an A2S_INFO request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InfoReply {
    /// The server wants the request repeated with this challenge.
    Challenge([u8; 4]),
    /// The server's info block.
    Info(Box<ServerInfo>),
}

/// Decode one datagram received in answer to an A2S_INFO request.
pub fn decode_info_reply(packet: &[u8]) -> Result<InfoReply, A2sError> {
    let mut reader = PacketReader::new(packet);

    let header = reader.read_u32_le("header")?;
    match header {
        SINGLE_PACKET_HEADER => {}
        SPLIT_PACKET_HEADER => return Err(A2sError::SplitPacket),
        other => return Err(A2sError::InvalidHeader(other)),
    }

    match reader.read_u8("reply_type")? {
        S2C_CHALLENGE => Ok(InfoReply::Challenge(reader.read_array4("challenge")?)),
        A2S_INFO_REPLY => Ok(InfoReply::Info(Box::new(ServerInfo::decode(&mut reader)?))),
        other => Err(A2sError::UnexpectedReply(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Environment, ExtraData, ServerType};

    fn info_packet(players: u8, max_players: u8, with_edf: bool) -> Vec<u8> {
        let mut p = vec![0xFF, 0xFF, 0xFF, 0xFF, A2S_INFO_REPLY, 0x11];
        p.extend_from_slice(b"My Unturned Server\0");
        p.extend_from_slice(b"PEI\0");
        p.extend_from_slice(b"unturned\0");
        p.extend_from_slice(b"Unturned\0");
        p.extend_from_slice(&0u16.to_le_bytes());
        p.extend_from_slice(&[players, max_players, 0, b'd', b'w', 0, 1]);
        p.extend_from_slice(b"3.23.15.0\0");
        if with_edf {
            p.push(0x80 | 0x20);
            p.extend_from_slice(&27015u16.to_le_bytes());
            p.extend_from_slice(b"PVE,hard\0");
        }
        p
    }

    #[test]
    fn test_encode_request_without_challenge() {
        let req = encode_info_request(None);
        assert_eq!(&req[..5], &[0xFF, 0xFF, 0xFF, 0xFF, 0x54]);
        assert!(req.ends_with(b"Source Engine Query\0"));
    }

    #[test]
    fn test_encode_request_with_challenge() {
        let req = encode_info_request(Some([1, 2, 3, 4]));
        assert!(req.ends_with(&[0x00, 1, 2, 3, 4]));
        assert_eq!(req.len(), 5 + INFO_PAYLOAD.len() + 4);
    }

    #[test]
    fn test_decode_challenge() {
        let reply = decode_info_reply(&[0xFF, 0xFF, 0xFF, 0xFF, 0x41, 9, 8, 7, 6]).unwrap();
        assert_eq!(reply, InfoReply::Challenge([9, 8, 7, 6]));
    }

    #[test]
    fn test_decode_info() {
        let reply = decode_info_reply(&info_packet(12, 24, true)).unwrap();
        let InfoReply::Info(info) = reply else {
            panic!("expected info reply");
        };

        assert_eq!(info.name, "My Unturned Server");
        assert_eq!(info.map, "PEI");
        assert_eq!(info.players, 12);
        assert_eq!(info.max_players, 24);
        assert_eq!(info.server_type, ServerType::Dedicated);
        assert_eq!(info.environment, Environment::Windows);
        assert!(info.vac);
        assert_eq!(info.version, "3.23.15.0");
        assert_eq!(info.extra.port, Some(27015));
        assert_eq!(info.extra.keywords.as_deref(), Some("PVE,hard"));
    }

    #[test]
    fn test_decode_info_without_edf() {
        let InfoReply::Info(info) = decode_info_reply(&info_packet(0, 8, false)).unwrap() else {
            panic!("expected info reply");
        };
        assert_eq!(info.extra, ExtraData::default());
    }

    #[test]
    fn test_decode_truncated_info() {
        let mut packet = info_packet(1, 2, false);
        packet.truncate(20);
        assert!(decode_info_reply(&packet).is_err());
    }

    #[test]
    fn test_decode_split_packet_rejected() {
        let err = decode_info_reply(&[0xFE, 0xFF, 0xFF, 0xFF, 0x00]).unwrap_err();
        assert_eq!(err, A2sError::SplitPacket);
    }

    #[test]
    fn test_decode_unknown_reply_type() {
        let err = decode_info_reply(&[0xFF, 0xFF, 0xFF, 0xFF, 0x6D]).unwrap_err();
        assert_eq!(err, A2sError::UnexpectedReply(0x6D));
    }
}
