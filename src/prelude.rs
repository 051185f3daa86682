//! peerchat public prelude (curated stable-intent exports).
//! Import with: `use peerchat::prelude::*;`

pub use crate::config::Config;
pub use crate::error::{ChatError, Result};
pub use crate::history::HistoryStore;
pub use crate::network::message::{Announce, Handshake};
pub use crate::network::peer::PeerIdentity;
pub use crate::node::{ChatNode, NodeContext, NodeSettings, ShutdownSignal};
