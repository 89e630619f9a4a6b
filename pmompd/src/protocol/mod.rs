//! Minimal MPD line codec.
//!
//! MPD speaks a line-based request/response protocol: the client writes one
//! command per line, the server answers with `key: value` lines terminated by
//! `OK`, or by a single `ACK [code@index] {command} message` line on error.
//! Binary payloads (`albumart`) are announced by a `binary: <len>` pair and
//! followed by the raw bytes and a newline.
//!
//! This module only covers what [`MpdConnection`](crate::MpdConnection)
//! needs: framing, error text, song records and the search request flow.

mod command;
mod link;
mod search;
mod song;
mod tcp;

use std::io::{self, Read, Write};
use std::time::Duration;

use crate::model::ServerDescriptor;

pub use command::Command;
pub use link::Link;
pub use search::Search;
pub use song::{Entity, Song};
pub use tcp::TcpConnector;

/// One `key: value` line of a response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pair {
    pub key: String,
    pub value: String,
}

impl Pair {
    pub fn new(key: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

/// Byte stream to an MPD server.
pub trait Transport: Read + Write + Send {
    /// Bounds blocking reads and writes; `None` blocks indefinitely.
    fn set_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        let _ = timeout;
        Ok(())
    }

    fn shutdown(&mut self) {}
}

/// Opens transports. Injected into the session so tests can swap the network
/// for a scripted server.
pub trait Connector: Send + Sync {
    fn connect(
        &self,
        server: &ServerDescriptor,
        timeout: Duration,
    ) -> io::Result<Box<dyn Transport>>;
}
