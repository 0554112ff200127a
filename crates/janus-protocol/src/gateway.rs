use std::time::Duration;

use janus_link::{Frame, MainLink};
use janus_text::Text;
use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};

use crate::bridge::HostBridge;
use crate::player::Player;

/// Protocol knobs handed to the gateway at construction.
#[derive(Debug, Clone)]
pub struct Settings {
    pub compression_threshold: i32,
    pub max_players: u32,
    pub keep_alive_timeout: Duration,
    pub brand: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            compression_threshold: 256,
            max_players: 20,
            keep_alive_timeout: Duration::from_secs(20),
            brand: "janus".to_owned(),
        }
    }
}

/// Main-thread driver of every player state machine.
///
/// Owns the main end of the transport link and the session-id-keyed player
/// map. `tick` is the only entry point the simulation loop needs to call;
/// it drains the link without blocking and sweeps stale players.
pub struct Gateway<B> {
    link: MainLink,
    players: FxHashMap<u32, Player>,
    bridge: B,
    settings: Settings,
}

impl<B: HostBridge> Gateway<B> {
    pub fn new(link: MainLink, bridge: B, settings: Settings) -> Self {
        Self {
            link,
            players: FxHashMap::default(),
            bridge,
            settings,
        }
    }

    #[must_use]
    pub fn online(&self) -> usize {
        self.players.len()
    }

    /// Drains pending frames and applies the keep-alive timeout. Called
    /// once per simulation tick; never blocks.
    pub fn tick(&mut self) {
        while let Some(result) = self.link.poll() {
            match result {
                Ok(frame) => self.handle_frame(frame),
                Err(e) => warn!("dropping malformed frame from network thread: {e}"),
            }
        }
        self.sweep_stale();
    }

    fn handle_frame(&mut self, frame: Frame) {
        match frame {
            Frame::OpenSession {
                session,
                address,
                port,
            } => {
                info!(session, "connection from {address}:{port}");
                self.players.insert(session, Player::new(session));
                self.update_player_list();
            }
            Frame::CloseSession { session } => {
                if let Some(player) = self.players.remove(&session) {
                    info!(session, "{} disconnected", player.username());
                    self.update_player_list();
                }
            }
            Frame::RecvPacket { session, body } => {
                let Some(player) = self.players.get_mut(&session) else {
                    debug!(session, "packet for unknown session");
                    return;
                };
                if let Err(e) =
                    player.handle_packet(&body, &self.link, &self.bridge, &self.settings)
                {
                    warn!(session, "closing session: {e}");
                    player.kick(&self.link, &Text::plain("Malformed packet"));
                    self.drop_player(session);
                }
            }
            other => warn!("unexpected frame from network thread: {other:?}"),
        }
    }

    fn sweep_stale(&mut self) {
        let timeout = self.settings.keep_alive_timeout;
        let stale: Vec<u32> = self
            .players
            .values()
            .filter(|p| p.is_stale(timeout))
            .map(Player::session)
            .collect();
        for session in stale {
            if let Some(player) = self.players.get(&session) {
                warn!(session, "{} timed out", player.username());
                player.kick(&self.link, &Text::plain("Timed out"));
            }
            self.drop_player(session);
        }
    }

    fn drop_player(&mut self, session: u32) {
        self.players.remove(&session);
        self.link.send(&Frame::CloseSession { session });
        self.update_player_list();
    }

    /// Pushes a chat line to every connected client.
    pub fn broadcast_chat(&self, message: &str) {
        let text = Text::from_legacy(message);
        for player in self.players.values() {
            player.send_chat(&self.link, &text);
        }
    }

    /// Advertises player counts to the network thread.
    fn update_player_list(&self) {
        let value = serde_json::json!({
            "max_players": self.settings.max_players,
            "online_players": self.players.len(),
        });
        self.link.send(&Frame::SetOption {
            name: "list".to_owned(),
            value: value.to_string().into_bytes(),
        });
    }

    /// First half of the two-phase shutdown; follow with the network
    /// service join.
    pub fn shutdown(&self) {
        info!("shutting down, {} players online", self.players.len());
        self.link.send(&Frame::Shutdown);
    }
}
