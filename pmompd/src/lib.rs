//! # pmompd
//!
//! Remote control of a Music Player Daemon server.
//!
//! - [`MpdConnection`] is a blocking session speaking the MPD line protocol:
//!   library queries, playlist edits, playback control, server status.
//! - [`MpdBridge`] runs one session on a worker thread, serializes every
//!   command, caches entity lists and polls the player to publish
//!   [`PlayerEvent`]s.
//!
//! ```no_run
//! use pmompd::{MpdBridge, MpdConfig, EntityType};
//!
//! let config = MpdConfig::load(None)?;
//! let bridge = MpdBridge::new(&config)?;
//! bridge.initialize()?;
//! bridge.entities_for_type(EntityType::Albums, |albums| {
//!     if let Ok(albums) = albums {
//!         println!("{} albums", albums.len());
//!     }
//! });
//! # Ok::<(), anyhow::Error>(())
//! ```

mod cache;
mod watcher;

pub mod bridge;
pub mod config;
pub mod connection;
pub mod errors;
pub mod events;
pub mod model;
pub mod protocol;

#[cfg(test)]
mod testutil;

pub use bridge::{MpdBridge, WorkItem};
pub use config::{BridgeConfig, MpdConfig};
pub use connection::{AlbumResolver, MpdConnection};
pub use errors::{ErrorKind, MpdConnectionError, ProtocolError};
pub use events::{PlayerEvent, PlayerEventBus};
pub use model::{
    Album, AlbumMetadata, Artist, AudioOutput, DirectoryEntry, DirectoryEntryKind, EntityList,
    EntityType, Genre, PlayerInfo, PlayerState, PlayerStatus, Playlist, ServerDescriptor,
    ServerStats, ServerStatus, Track,
};
pub use protocol::{Connector, TcpConnector, Transport};
