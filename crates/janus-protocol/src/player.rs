use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use janus_link::{Frame, MainLink};
use janus_text::Text;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::ProtocolError;
use crate::bridge::HostBridge;
use crate::gateway::Settings;
use crate::packets::{login, play};

/// Spawn block advertised in the compass/spawn packet.
const SPAWN_BLOCK: (i32, i32, i32) = (0, 64, 0);

/// Where the player actually stands, centered on the spawn chunk and one
/// block above the stone floor.
const SPAWN_POINT: (f64, f64, f64) = (8.0, 65.0, 8.0);

/// Chunk columns sent around the spawn chunk, so a 5x5 square.
const VIEW_RADIUS: i32 = 2;

/// Identity derived from a username alone, for servers that consult no
/// external authority. Stable per name, distinct across names.
#[must_use]
pub fn offline_uuid(username: &str) -> Uuid {
    Uuid::new_v3(
        &Uuid::NAMESPACE_URL,
        format!("OfflinePlayer:{username}").as_bytes(),
    )
}

fn epoch_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as i64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Login,
    Play,
}

/// Per-session protocol state, owned by the gateway on the main thread.
pub struct Player {
    session: u32,
    phase: Phase,
    username: String,
    uuid: Uuid,
    last_keep_alive_id: i64,
    last_heard: Instant,
    next_teleport_id: u32,
}

impl Player {
    #[must_use]
    pub fn new(session: u32) -> Self {
        Self {
            session,
            phase: Phase::Login,
            username: String::new(),
            uuid: Uuid::nil(),
            last_keep_alive_id: 0,
            last_heard: Instant::now(),
            next_teleport_id: 0,
        }
    }

    #[must_use]
    pub const fn session(&self) -> u32 {
        self.session
    }

    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Whether the client has gone quiet past the keep-alive timeout.
    /// Login-phase sessions are not held to the timeout.
    #[must_use]
    pub fn is_stale(&self, timeout: Duration) -> bool {
        self.phase == Phase::Play && self.last_heard.elapsed() > timeout
    }

    /// Dispatches one decoded packet body by phase and id.
    pub fn handle_packet(
        &mut self,
        body: &[u8],
        link: &MainLink,
        bridge: &dyn HostBridge,
        settings: &Settings,
    ) -> Result<(), ProtocolError> {
        let mut reader = janus_codec::Reader::new(body);
        let id = reader.get_varint()?;
        match self.phase {
            Phase::Login => self.handle_login(id, &mut reader, link, settings),
            Phase::Play => self.handle_play(id, &mut reader, link, bridge),
        }
    }

    fn handle_login(
        &mut self,
        id: u32,
        reader: &mut janus_codec::Reader<'_>,
        link: &MainLink,
        settings: &Settings,
    ) -> Result<(), ProtocolError> {
        if id != login::serverbound::LOGIN_START {
            return Err(ProtocolError::UnexpectedLogin { id });
        }
        self.username = reader.get_str()?.to_owned();
        self.uuid = offline_uuid(&self.username);
        debug!(
            session = self.session,
            "{} logging in as {}", self.username, self.uuid
        );

        // The client must learn the threshold before the session starts
        // compressed framing, so the wire packet goes out first.
        self.send(link, login::set_compression(settings.compression_threshold));
        link.send(&Frame::SetCompression {
            session: self.session,
            threshold: settings.compression_threshold,
        });

        self.send(link, login::success(&self.uuid, &self.username));
        self.phase = Phase::Play;

        self.send(
            link,
            play::join_game(self.session as i32, settings.max_players.min(255) as u8),
        );
        self.send(link, play::brand(&settings.brand));
        self.send(link, play::difficulty());
        let (sx, sy, sz) = SPAWN_BLOCK;
        self.send(link, play::spawn_position(sx, sy, sz));
        self.send(link, play::abilities());

        for x in -VIEW_RADIUS..=VIEW_RADIUS {
            for z in -VIEW_RADIUS..=VIEW_RADIUS {
                self.send(link, play::chunk_data(x, z));
            }
        }

        // Position goes out after the terrain so the client is never stood
        // on unloaded chunks.
        self.next_teleport_id += 1;
        let (px, py, pz) = SPAWN_POINT;
        self.send(link, play::position_look(px, py, pz, self.next_teleport_id));
        self.queue_keep_alive(link);
        Ok(())
    }

    fn handle_play(
        &mut self,
        id: u32,
        reader: &mut janus_codec::Reader<'_>,
        link: &MainLink,
        bridge: &dyn HostBridge,
    ) -> Result<(), ProtocolError> {
        match id {
            play::serverbound::KEEP_ALIVE => {
                let echoed = reader.get_i64()?;
                trace!(session = self.session, echoed, "keep-alive response");
                self.last_heard = Instant::now();
                self.queue_keep_alive(link);
            }
            play::serverbound::CHAT => {
                let message = reader.get_str()?.to_owned();
                let line = format!("<{}> {}", self.username, message);
                self.send_chat(link, &Text::from_legacy(&line));
                bridge.broadcast_chat(&self.username, &message);
            }
            play::serverbound::TELEPORT_CONFIRM => {
                let teleport_id = reader.get_varint()?;
                trace!(session = self.session, teleport_id, "teleport confirmed");
            }
            other => trace!(session = self.session, "ignoring packet {other:#04x}"),
        }
        Ok(())
    }

    /// Queues the next keep-alive with a strictly increasing id.
    fn queue_keep_alive(&mut self, link: &MainLink) {
        self.last_keep_alive_id = epoch_millis().max(self.last_keep_alive_id + 1);
        self.send(link, play::keep_alive(self.last_keep_alive_id));
    }

    pub fn send_chat(&self, link: &MainLink, text: &Text) {
        self.send(link, play::chat(text));
    }

    /// Sends the phase-appropriate disconnect packet. Closing the session
    /// is the gateway's job.
    pub fn kick(&self, link: &MainLink, reason: &Text) {
        let body = match self.phase {
            Phase::Login => login::disconnect(reason),
            Phase::Play => play::disconnect(reason),
        };
        self.send(link, body);
    }

    fn send(&self, link: &MainLink, body: Vec<u8>) {
        link.send(&Frame::SendPacket {
            session: self.session,
            body,
        });
    }
}
