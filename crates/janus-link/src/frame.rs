use janus_codec::{Reader, WireWrite};

use crate::LinkError;

mod opcode {
    pub const SEND_PACKET: u8 = 0x01;
    pub const OPEN_SESSION: u8 = 0x02;
    pub const CLOSE_SESSION: u8 = 0x03;
    pub const ENABLE_ENCRYPTION: u8 = 0x04;
    pub const SET_COMPRESSION: u8 = 0x05;
    pub const SET_OPTION: u8 = 0x06;
    pub const RECV_PACKET: u8 = 0x07;
    pub const SHUTDOWN: u8 = 0xFE;
    pub const EMERGENCY_SHUTDOWN: u8 = 0xFF;
}

/// One message crossing the main↔network thread boundary.
///
/// Frames travel encoded; only byte vectors are ever handed to the queue, so
/// neither thread can observe the other's mutable state. A frame carrying a
/// session id may refer to a session that is already gone on the receiving
/// side; that is a no-op, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Main → network: write this packet body to the session's socket.
    SendPacket { session: u32, body: Vec<u8> },
    /// Network → main: a connection was accepted.
    OpenSession {
        session: u32,
        address: String,
        port: u16,
    },
    /// Either direction: the session is gone (command or notification).
    CloseSession { session: u32 },
    /// Main → network: start ciphering the session with this shared secret.
    EnableEncryption { session: u32, secret: Vec<u8> },
    /// Main → network: enable compression framing above `threshold` bytes.
    /// A negative threshold disables compression.
    SetCompression { session: u32, threshold: i32 },
    /// Main → network: out-of-band option update, value is JSON.
    SetOption { name: String, value: Vec<u8> },
    /// Network → main: a complete decoded packet body from a session.
    RecvPacket { session: u32, body: Vec<u8> },
    /// Main → network: close everything, tear down the listener, exit.
    Shutdown,
    /// Main → network: exit the loop without teardown.
    EmergencyShutdown,
}

impl Frame {
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            Self::SendPacket { session, body } => {
                out.put_u8(opcode::SEND_PACKET);
                out.put_i32(*session as i32);
                out.extend_from_slice(body);
            }
            Self::OpenSession {
                session,
                address,
                port,
            } => {
                out.put_u8(opcode::OPEN_SESSION);
                out.put_i32(*session as i32);
                out.put_u8(address.len() as u8);
                out.extend_from_slice(address.as_bytes());
                out.put_u16(*port);
            }
            Self::CloseSession { session } => {
                out.put_u8(opcode::CLOSE_SESSION);
                out.put_i32(*session as i32);
            }
            Self::EnableEncryption { session, secret } => {
                out.put_u8(opcode::ENABLE_ENCRYPTION);
                out.put_i32(*session as i32);
                out.extend_from_slice(secret);
            }
            Self::SetCompression { session, threshold } => {
                out.put_u8(opcode::SET_COMPRESSION);
                out.put_i32(*session as i32);
                out.put_i32(*threshold);
            }
            Self::SetOption { name, value } => {
                out.put_u8(opcode::SET_OPTION);
                out.put_u8(name.len() as u8);
                out.extend_from_slice(name.as_bytes());
                out.extend_from_slice(value);
            }
            Self::RecvPacket { session, body } => {
                out.put_u8(opcode::RECV_PACKET);
                out.put_i32(*session as i32);
                out.extend_from_slice(body);
            }
            Self::Shutdown => out.put_u8(opcode::SHUTDOWN),
            Self::EmergencyShutdown => out.put_u8(opcode::EMERGENCY_SHUTDOWN),
        }
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Self, LinkError> {
        let mut reader = Reader::new(buf);
        let op = reader.get_u8()?;
        let frame = match op {
            opcode::SEND_PACKET => Self::SendPacket {
                session: reader.get_i32()? as u32,
                body: reader.take_rest().to_vec(),
            },
            opcode::OPEN_SESSION => {
                let session = reader.get_i32()? as u32;
                let len = reader.get_u8()? as usize;
                let address = std::str::from_utf8(reader.take(len)?)
                    .map_err(|_| LinkError::MalformedFrame)?
                    .to_owned();
                let port = reader.get_u16()?;
                Self::OpenSession {
                    session,
                    address,
                    port,
                }
            }
            opcode::CLOSE_SESSION => Self::CloseSession {
                session: reader.get_i32()? as u32,
            },
            opcode::ENABLE_ENCRYPTION => Self::EnableEncryption {
                session: reader.get_i32()? as u32,
                secret: reader.take_rest().to_vec(),
            },
            opcode::SET_COMPRESSION => Self::SetCompression {
                session: reader.get_i32()? as u32,
                threshold: reader.get_i32()?,
            },
            opcode::SET_OPTION => {
                let len = reader.get_u8()? as usize;
                let name = std::str::from_utf8(reader.take(len)?)
                    .map_err(|_| LinkError::MalformedFrame)?
                    .to_owned();
                Self::SetOption {
                    name,
                    value: reader.take_rest().to_vec(),
                }
            }
            opcode::RECV_PACKET => Self::RecvPacket {
                session: reader.get_i32()? as u32,
                body: reader.take_rest().to_vec(),
            },
            opcode::SHUTDOWN => Self::Shutdown,
            opcode::EMERGENCY_SHUTDOWN => Self::EmergencyShutdown,
            other => return Err(LinkError::UnknownOpcode(other)),
        };
        Ok(frame)
    }
}
