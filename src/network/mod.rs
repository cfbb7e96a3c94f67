//! Network Layer
//!
//! TCP server, line framing and the JSON wire protocol.
//! Nothing here touches the world directly; all of it goes through the
//! state store.

pub mod protocol;
pub mod framing;
pub mod registry;
pub mod session;
pub mod broadcast;
pub mod server;

pub use protocol::{ClientMessage, Envelope, MessageKind, ProtocolError, ServerMessage};
pub use framing::{FramingError, LineFramer};
pub use registry::{Registry, Session, SessionListener};
pub use session::SessionError;
pub use broadcast::BroadcastReport;
pub use server::{GameServer, ServerConfig, ServerError, ServerHandle};
