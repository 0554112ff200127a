//! The network thread: a `mio` poll loop multiplexing every client socket.
//!
//! One dedicated OS thread owns the listener and all session sockets. It
//! alternates between draining command frames from the main thread and
//! servicing socket readiness, waking at least every 50ms so queued commands
//! never sit longer than one tick. Sessions are known to the outside world
//! only by their u32 ids; the socket, buffers, and cipher state never leave
//! this thread.

mod session;

use std::io;
use std::net::SocketAddr;
use std::thread::JoinHandle;
use std::time::Duration;

use janus_link::{Frame, NetLink};
use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Token};
use rustc_hash::FxHashMap;
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::session::Session;

pub use crate::session::SessionError;

const LISTENER: Token = Token(0);
const POLL_TIMEOUT: Duration = Duration::from_millis(50);
const EVENT_CAPACITY: usize = 256;

/// Server list data pushed from the main thread via the `list` option.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerData {
    #[serde(default = "default_max_players")]
    pub max_players: u32,
    #[serde(default)]
    pub online_players: u32,
}

const fn default_max_players() -> u32 {
    20
}

/// Handle to the running network thread.
pub struct NetworkService {
    thread: Option<JoinHandle<()>>,
    local_addr: SocketAddr,
}

impl NetworkService {
    /// Binds the listener and spawns the network thread.
    ///
    /// Binding happens on the caller's thread so address-in-use and
    /// permission errors surface here instead of killing the thread later.
    pub fn spawn(addr: SocketAddr, link: NetLink) -> io::Result<Self> {
        let mut listener = TcpListener::bind(addr)?;
        let local_addr = listener.local_addr()?;

        let poll = Poll::new()?;
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)?;

        let thread = std::thread::Builder::new()
            .name("janus-net".to_owned())
            .spawn(move || {
                let mut mux = Multiplexer::new(poll, listener, link);
                if let Err(e) = mux.run() {
                    error!("network thread exited with error: {e}");
                }
            })?;

        info!("listening on {local_addr}");
        Ok(Self {
            thread: Some(thread),
            local_addr,
        })
    }

    /// The bound address, with the real port when `addr` asked for port 0.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Waits for the network thread to exit. Send [`Frame::Shutdown`] or
    /// [`Frame::EmergencyShutdown`] over the link first.
    pub fn join(mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("network thread panicked");
            }
        }
    }
}

struct Multiplexer {
    poll: Poll,
    listener: TcpListener,
    link: NetLink,
    sessions: FxHashMap<u32, Session>,
    next_session: u32,
    server_data: ServerData,
    shutdown: bool,
}

impl Multiplexer {
    fn new(poll: Poll, listener: TcpListener, link: NetLink) -> Self {
        Self {
            poll,
            listener,
            link,
            sessions: FxHashMap::default(),
            next_session: 0,
            server_data: ServerData::default(),
            shutdown: false,
        }
    }

    fn run(&mut self) -> io::Result<()> {
        let mut events = Events::with_capacity(EVENT_CAPACITY);
        while !self.shutdown {
            while let Some(result) = self.link.poll() {
                match result {
                    Ok(frame) => self.handle_frame(frame)?,
                    Err(e) => warn!("dropping malformed command frame: {e}"),
                }
                if self.shutdown {
                    return Ok(());
                }
            }

            if let Err(e) = self.poll.poll(&mut events, Some(POLL_TIMEOUT)) {
                if e.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(e);
            }

            for event in &events {
                match event.token() {
                    LISTENER => self.accept_pending()?,
                    Token(id) => {
                        self.service_session(id as u32, event.is_readable(), event.is_writable());
                    }
                }
            }
        }
        Ok(())
    }

    fn handle_frame(&mut self, frame: Frame) -> io::Result<()> {
        match frame {
            Frame::SendPacket { session, body } => {
                self.with_session(session, |s| s.write_packet(&body));
            }
            Frame::EnableEncryption { session, secret } => {
                self.with_session(session, |s| s.enable_encryption(&secret));
            }
            Frame::SetCompression { session, threshold } => {
                self.with_session(session, |s| {
                    s.set_compression(threshold);
                    Ok(())
                });
            }
            Frame::CloseSession { session } => {
                // Echo unconditionally so the main thread can retire the id
                // even when the peer already hung up.
                self.drop_session(session);
                self.notify_closed(session);
            }
            Frame::SetOption { name, value } => match name.as_str() {
                "list" => match serde_json::from_slice(&value) {
                    Ok(data) => self.server_data = data,
                    Err(e) => warn!("ignoring malformed list option: {e}"),
                },
                other => debug!("ignoring unknown option {other:?}"),
            },
            Frame::Shutdown => {
                info!(
                    online = self.server_data.online_players,
                    "shutting down, closing {} sessions",
                    self.sessions.len()
                );
                let ids: Vec<u32> = self.sessions.keys().copied().collect();
                for id in ids {
                    self.drop_session(id);
                    self.notify_closed(id);
                }
                self.poll.registry().deregister(&mut self.listener)?;
                self.shutdown = true;
            }
            Frame::EmergencyShutdown => {
                self.shutdown = true;
            }
            Frame::OpenSession { session, .. } | Frame::RecvPacket { session, .. } => {
                warn!("unexpected inbound-direction frame for session {session}");
            }
        }
        Ok(())
    }

    /// Runs a command against a session. A command for an id that no longer
    /// exists answers with a close notification so the main thread converges.
    fn with_session<F>(&mut self, id: u32, f: F)
    where
        F: FnOnce(&mut Session) -> Result<(), SessionError>,
    {
        let Some(session) = self.sessions.get_mut(&id) else {
            self.notify_closed(id);
            return;
        };
        if let Err(e) = f(session) {
            debug!("session {id} failed: {e}");
            self.close_session(id);
        }
    }

    fn accept_pending(&mut self) -> io::Result<()> {
        loop {
            match self.listener.accept() {
                Ok((mut stream, addr)) => {
                    self.next_session += 1;
                    let id = self.next_session;
                    self.poll.registry().register(
                        &mut stream,
                        Token(id as usize),
                        Interest::READABLE | Interest::WRITABLE,
                    )?;
                    self.sessions.insert(id, Session::new(stream));
                    debug!("session {id} opened from {addr}");
                    self.link.send(&Frame::OpenSession {
                        session: id,
                        address: addr.ip().to_string(),
                        port: addr.port(),
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
    }

    fn service_session(&mut self, id: u32, readable: bool, writable: bool) {
        let mut packets = Vec::new();
        let mut peer_closed = false;
        let mut failure = None;

        {
            let Some(session) = self.sessions.get_mut(&id) else {
                return;
            };
            if writable {
                if let Err(e) = session.flush() {
                    failure = Some(e);
                }
            }
            if readable && failure.is_none() {
                match session.receive() {
                    Ok(outcome) => {
                        packets = outcome.packets;
                        peer_closed = outcome.closed;
                    }
                    Err(e) => failure = Some(e),
                }
            }
        }

        for body in packets {
            self.link.send(&Frame::RecvPacket { session: id, body });
        }

        if let Some(e) = failure {
            debug!("session {id} failed: {e}");
            self.close_session(id);
        } else if peer_closed {
            debug!("session {id} closed by peer");
            self.close_session(id);
        }
    }

    fn close_session(&mut self, id: u32) {
        if self.drop_session(id) {
            self.notify_closed(id);
        }
    }

    /// Removes and deregisters the session. Returns whether it existed.
    fn drop_session(&mut self, id: u32) -> bool {
        let Some(mut session) = self.sessions.remove(&id) else {
            return false;
        };
        if let Err(e) = session.deregister(self.poll.registry()) {
            debug!("deregistering session {id} failed: {e}");
        }
        true
    }

    fn notify_closed(&self, id: u32) {
        self.link.send(&Frame::CloseSession { session: id });
    }
}
