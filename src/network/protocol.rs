//! Protocol Messages
//!
//! Wire format for client-server communication over TCP.
//! Every message is one JSON envelope per line. The envelope's payload is
//! itself a JSON document carried as a string, decoded a second time
//! according to the kind.

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::core::id::SessionId;
use crate::game::input::ControlState;
use crate::game::state::WorldSnapshot;

/// Payload carried by PONG.
pub const PONG_PAYLOAD: &str = "OK";

/// Protocol errors.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Line could not be decoded into a message for this direction.
    #[error("Malformed message: {0}")]
    MalformedMessage(String),
}

impl ProtocolError {
    fn malformed(context: &str, err: impl std::fmt::Display) -> Self {
        ProtocolError::MalformedMessage(format!("{}: {}", context, err))
    }
}

// =============================================================================
// ENVELOPE
// =============================================================================

/// Message kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    /// Server tells a client its id.
    ClientId,
    /// Client control flags.
    Input,
    /// Client liveness probe.
    Ping,
    /// Reply to PING.
    Pong,
    /// Authoritative world snapshot.
    GameState,
}

/// Outer wire wrapper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Message kind
    pub kind: MessageKind,
    /// JSON document encoded as text
    #[serde(default)]
    pub payload: String,
}

impl Envelope {
    /// Wrap a payload value, encoding it to text.
    pub fn wrap<T: Serialize>(kind: MessageKind, payload: &T) -> Result<Self, serde_json::Error> {
        Ok(Self {
            kind,
            payload: serde_json::to_string(payload)?,
        })
    }

    /// Serialize as one newline-terminated line.
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    /// Parse one line (without its terminator).
    pub fn from_line(line: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(line).map_err(|e| ProtocolError::malformed("envelope", e))
    }

    /// Parse one raw line. Invalid UTF-8 is malformed.
    pub fn from_bytes(line: &[u8]) -> Result<Self, ProtocolError> {
        let text = std::str::from_utf8(line).map_err(|e| ProtocolError::malformed("line", e))?;
        Self::from_line(text)
    }

    fn decode_payload<T: for<'de> Deserialize<'de>>(&self) -> Result<T, ProtocolError> {
        serde_json::from_str(&self.payload)
            .map_err(|e| ProtocolError::malformed(&format!("{:?} payload", self.kind), e))
    }
}

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// Latest control flags.
    Input(ControlState),
    /// Liveness probe.
    Ping,
}

impl ClientMessage {
    /// Convert to an envelope.
    pub fn to_envelope(&self) -> Result<Envelope, serde_json::Error> {
        match self {
            ClientMessage::Input(controls) => Envelope::wrap(MessageKind::Input, controls),
            ClientMessage::Ping => Ok(Envelope {
                kind: MessageKind::Ping,
                payload: String::new(),
            }),
        }
    }

    /// Interpret an envelope received by the server.
    pub fn from_envelope(envelope: &Envelope) -> Result<Self, ProtocolError> {
        match envelope.kind {
            MessageKind::Input => Ok(ClientMessage::Input(envelope.decode_payload()?)),
            // PING carries no state
            MessageKind::Ping => Ok(ClientMessage::Ping),
            other => Err(ProtocolError::MalformedMessage(format!(
                "{:?} is not a client message",
                other
            ))),
        }
    }

    /// Serialize as one newline-terminated line.
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        self.to_envelope()?.to_line()
    }

    /// Parse one line.
    pub fn from_line(line: &str) -> Result<Self, ProtocolError> {
        Self::from_envelope(&Envelope::from_line(line)?)
    }

    /// Parse one raw line as read off the socket.
    pub fn from_bytes(line: &[u8]) -> Result<Self, ProtocolError> {
        Self::from_envelope(&Envelope::from_bytes(line)?)
    }
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    /// The id assigned to this connection.
    ClientId(SessionId),
    /// Reply to PING.
    Pong,
    /// World snapshot for one tick.
    GameState(WorldSnapshot),
}

impl ServerMessage {
    /// Convert to an envelope.
    pub fn to_envelope(&self) -> Result<Envelope, serde_json::Error> {
        match self {
            ServerMessage::ClientId(id) => Envelope::wrap(MessageKind::ClientId, id),
            ServerMessage::Pong => Envelope::wrap(MessageKind::Pong, &PONG_PAYLOAD),
            ServerMessage::GameState(snapshot) => Envelope::wrap(MessageKind::GameState, snapshot),
        }
    }

    /// Interpret an envelope received by a client.
    pub fn from_envelope(envelope: &Envelope) -> Result<Self, ProtocolError> {
        match envelope.kind {
            MessageKind::ClientId => Ok(ServerMessage::ClientId(envelope.decode_payload()?)),
            MessageKind::Pong => Ok(ServerMessage::Pong),
            MessageKind::GameState => Ok(ServerMessage::GameState(envelope.decode_payload()?)),
            other => Err(ProtocolError::MalformedMessage(format!(
                "{:?} is not a server message",
                other
            ))),
        }
    }

    /// Serialize as one newline-terminated line.
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        self.to_envelope()?.to_line()
    }

    /// Parse one line.
    pub fn from_line(line: &str) -> Result<Self, ProtocolError> {
        Self::from_envelope(&Envelope::from_line(line)?)
    }
}
