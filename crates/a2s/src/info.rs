use serde::{Deserialize, Serialize};

use super::{A2sError, PacketReader};

/// App id of "The Ship", which carries three extra bytes before the version.
const THE_SHIP_APP_ID: u16 = 2400;

/// Extra data flag bits.
const EDF_PORT: u8 = 0x80;
const EDF_STEAM_ID: u8 = 0x10;
const EDF_SOURCE_TV: u8 = 0x40;
const EDF_KEYWORDS: u8 = 0x20;
const EDF_GAME_ID: u8 = 0x01;

/// Server type reported in an A2S_INFO reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerType {
    Dedicated,
    NonDedicated,
    SourceTv,
    Unknown(u8),
}

impl From<u8> for ServerType {
    fn from(value: u8) -> Self {
        match value {
            b'd' | b'D' => Self::Dedicated,
            b'l' | b'L' => Self::NonDedicated,
            b'p' | b'P' => Self::SourceTv,
            other => Self::Unknown(other),
        }
    }
}

/// Operating system of the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Linux,
    Windows,
    Mac,
    Unknown(u8),
}

impl From<u8> for Environment {
    fn from(value: u8) -> Self {
        match value {
            b'l' | b'L' => Self::Linux,
            b'w' | b'W' => Self::Windows,
            b'm' | b'M' | b'o' | b'O' => Self::Mac,
            other => Self::Unknown(other),
        }
    }
}

/// Optional trailing fields announced by the extra data flag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraData {
    pub port: Option<u16>,
    pub steam_id: Option<u64>,
    pub source_tv: Option<(u16, String)>,
    pub keywords: Option<String>,
    pub game_id: Option<u64>,
}

/// Decoded A2S_INFO reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub protocol: u8,
    pub name: String,
    pub map: String,
    pub folder: String,
    pub game: String,
    pub app_id: u16,
    pub players: u8,
    pub max_players: u8,
    pub bots: u8,
    pub server_type: ServerType,
    pub environment: Environment,
    /// Whether the server requires a password.
    pub visibility: bool,
    pub vac: bool,
    pub version: String,
    pub extra: ExtraData,
}

impl ServerInfo {
    /// Decode the payload that follows the `0x49` reply byte.
    pub fn decode(reader: &mut PacketReader<'_>) -> Result<Self, A2sError> {
        let protocol = reader.read_u8("protocol")?;
        let name = reader.read_cstring("name")?;
        let map = reader.read_cstring("map")?;
        let folder = reader.read_cstring("folder")?;
        let game = reader.read_cstring("game")?;
        let app_id = reader.read_u16_le("app_id")?;
        let players = reader.read_u8("players")?;
        let max_players = reader.read_u8("max_players")?;
        let bots = reader.read_u8("bots")?;
        let server_type = ServerType::from(reader.read_u8("server_type")?);
        let environment = Environment::from(reader.read_u8("environment")?);
        let visibility = reader.read_u8("visibility")? != 0;
        let vac = reader.read_u8("vac")? != 0;

        if app_id == THE_SHIP_APP_ID {
            // mode, witnesses, duration
            reader.read_u8("ship_mode")?;
            reader.read_u8("ship_witnesses")?;
            reader.read_u8("ship_duration")?;
        }

        let version = reader.read_cstring("version")?;

        let extra = if reader.is_empty() {
            ExtraData::default()
        } else {
            Self::decode_extra(reader)?
        };

        Ok(Self {
            protocol,
            name,
            map,
            folder,
            game,
            app_id,
            players,
            max_players,
            bots,
            server_type,
            environment,
            visibility,
            vac,
            version,
            extra,
        })
    }

    fn decode_extra(reader: &mut PacketReader<'_>) -> Result<ExtraData, A2sError> {
        let flags = reader.read_u8("edf")?;
        let mut extra = ExtraData::default();

        if flags & EDF_PORT != 0 {
            extra.port = Some(reader.read_u16_le("edf_port")?);
        }
        if flags & EDF_STEAM_ID != 0 {
            extra.steam_id = Some(reader.read_u64_le("edf_steam_id")?);
        }
        if flags & EDF_SOURCE_TV != 0 {
            let port = reader.read_u16_le("edf_tv_port")?;
            let name = reader.read_cstring("edf_tv_name")?;
            extra.source_tv = Some((port, name));
        }
        if flags & EDF_KEYWORDS != 0 {
            extra.keywords = Some(reader.read_cstring("edf_keywords")?);
        }
        if flags & EDF_GAME_ID != 0 {
            extra.game_id = Some(reader.read_u64_le("edf_game_id")?);
        }

        Ok(extra)
    }

    /// Number of human players, bots excluded.
    pub fn human_players(&self) -> u8 {
        self.players.saturating_sub(self.bots)
    }
}
