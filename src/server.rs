use std::fmt::Display;
use std::io::{ErrorKind, Read};
use std::net::{Shutdown, SocketAddr, TcpListener};

use super::config::Config;
use super::constants::*;
use super::epm_header::TransferFrameHeader;
use super::error::ServerError;
use super::source::{create_packet_source, PacketSource};

/// Where the server is in the life of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Listening,
    Accepted,
    AwaitingConnect,
    Streaming,
}

impl Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Listening => write!(f, "Listening"),
            SessionState::Accepted => write!(f, "Accepted"),
            SessionState::AwaitingConnect => write!(f, "AwaitingConnect"),
            SessionState::Streaming => write!(f, "Streaming"),
        }
    }
}

/// The ground software unit that asked for the stream. Only reported, it does not change behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoftwareUnit {
    Primary,
    Alternate,
    Unrecognized(u8),
}

impl From<u8> for SoftwareUnit {
    fn from(value: u8) -> Self {
        match value {
            GRIP_MMI_SOFTWARE_UNIT_ID => SoftwareUnit::Primary,
            GRIP_MMI_SOFTWARE_ALT_UNIT_ID => SoftwareUnit::Alternate,
            _ => SoftwareUnit::Unrecognized(value),
        }
    }
}

impl Display for SoftwareUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SoftwareUnit::Primary => write!(f, "PRIMARY ({})", GRIP_MMI_SOFTWARE_UNIT_ID),
            SoftwareUnit::Alternate => write!(f, "ALTERNATE ({})", GRIP_MMI_SOFTWARE_ALT_UNIT_ID),
            SoftwareUnit::Unrecognized(id) => write!(f, "UNRECOGNIZED ({})", id),
        }
    }
}

/// How one pass through the session cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    Disconnected,
    Streamed { unit: SoftwareUnit, packets_sent: u64 },
}

/// Wait for a Connect frame. Full buffers are overruns and other sizes are noise; both are logged and skipped.
/// Returns None if the client closes or the read fails first.
pub fn await_connect<R: Read>(reader: &mut R) -> Option<SoftwareUnit> {
    let mut buffer = vec![0u8; EPM_BUFFER_LENGTH];
    loop {
        let bytes_read = match reader.read(&mut buffer) {
            Ok(0) => {
                log::info!("Client closed the connection before sending Connect");
                return None;
            }
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                log::warn!("Read failed while waiting for Connect: {}", e);
                return None;
            }
        };

        if bytes_read == EPM_BUFFER_LENGTH {
            //nothing the client sends should fill a whole buffer, so we are behind
            log::info!("Bytes received: {} - flushing (overrun)", bytes_read);
        } else if bytes_read == CONNECT_FRAME_LENGTH {
            match TransferFrameHeader::read_from_buffer(&buffer[..bytes_read]) {
                Ok(frame) if frame.is_connect() => {
                    let unit = SoftwareUnit::from(frame.software_unit_id);
                    log::info!("Connect received from {} software unit", unit);
                    return Some(unit);
                }
                Ok(frame) => log::info!("Unexpected packet type ({:#06x}) while waiting for Connect", frame.packet_type),
                Err(e) => log::warn!("Could not decode frame while waiting for Connect: {}", e),
            }
        } else {
            log::info!("Unexpected packet size ({}) while waiting for Connect", bytes_read);
        }
    }
}

/// # SessionServer
/// Serves one client at a time: accept, wait for Connect, stream until the client goes away,
/// half-close, and listen again. The packet source is chosen once, when the server is built.
pub struct SessionServer {
    listener: TcpListener,
    source: Box<dyn PacketSource>,
    state: SessionState,
}

impl SessionServer {

    /// Bind the listening socket and build the configured packet source
    pub fn new(config: &Config) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(config.get_listen_address())?;
        Ok(Self::from_listener(listener, create_packet_source(config)))
    }

    pub fn from_listener(listener: TcpListener, source: Box<dyn PacketSource>) -> Self {
        SessionServer { listener, source, state: SessionState::Listening }
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    #[allow(dead_code)]
    pub fn get_state(&self) -> SessionState {
        self.state
    }

    fn transition(&mut self, next: SessionState) {
        log::debug!("Session state {} -> {}", self.state, next);
        self.state = next;
    }

    /// Run one full session cycle. Socket trouble during streaming ends the session, not the server;
    /// a failed accept or a failing packet source is returned to the caller.
    pub fn serve_session(&mut self) -> Result<SessionOutcome, ServerError> {
        self.transition(SessionState::Listening);
        log::info!("Listening for a connection on {} ...", self.local_addr()?);
        let (mut stream, peer) = self.listener.accept()?;
        self.transition(SessionState::Accepted);
        log::info!("Client connected from {}", peer);

        self.transition(SessionState::AwaitingConnect);
        let unit = match await_connect(&mut stream) {
            Some(unit) => unit,
            None => {
                self.transition(SessionState::Listening);
                return Ok(SessionOutcome::Disconnected);
            }
        };

        self.transition(SessionState::Streaming);
        log::info!("Streaming {} to {}", self.source.describe(), peer);
        let result = self.source.stream(&mut stream);
        self.transition(SessionState::Listening);
        let packets_sent = result?;

        if let Err(e) = stream.shutdown(Shutdown::Write) {
            log::warn!("Could not shut down the connection to {}: {}", peer, e);
        }
        log::info!("Total packets sent: {}", packets_sent);

        Ok(SessionOutcome::Streamed { unit, packets_sent })
    }

    /// Serve sessions until something fatal happens
    pub fn run(&mut self) -> Result<(), ServerError> {
        loop {
            self.serve_session()?;
        }
    }
}
