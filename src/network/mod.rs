pub mod broadcast;
pub mod discovery;
pub(crate) mod events;
pub mod listener;
pub mod message;
pub mod peer;
pub mod reader;
pub mod registry;
pub mod transport;

pub use broadcast::broadcast_message;
pub use discovery::{classify_announce, is_self, AnnounceDecision, LocalInterfaces, StaticInterfaces, SystemInterfaces};
pub use listener::{accept_handshake, HandshakeOutcome};
pub use message::{format_chat_line, Announce, Handshake};
pub use peer::PeerIdentity;
pub use registry::{ConnectionRegistry, FanOutReport, ReservationSet};
pub use transport::connect_to_peer;
