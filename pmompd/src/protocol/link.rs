use std::io::{BufRead, BufReader, Read, Write};

use tracing::{debug, trace};

use super::command::Command;
use super::search::Search;
use super::song::{Entity, Song, is_entity_start};
use super::{Pair, Transport};
use crate::errors::ProtocolError;

const GREETING_PREFIX: &str = "OK MPD ";

/// An open MPD protocol stream.
///
/// A `Link` tracks whether a response is still being read, keeps the text of
/// the last `ACK` the server sent and holds at most one search being built.
/// Everything is blocking; the only timeout is the one the transport was
/// opened with, which covers the greeting and is then cleared.
pub struct Link {
    reader: BufReader<Box<dyn Transport>>,
    pushback: Option<Pair>,
    in_response: bool,
    search: Option<Search>,
    version: String,
}

impl Link {
    /// Reads the server greeting and switches the transport to blocking mode.
    pub fn open(transport: Box<dyn Transport>) -> Result<Self, ProtocolError> {
        let mut link = Self {
            reader: BufReader::new(transport),
            pushback: None,
            in_response: false,
            search: None,
            version: String::new(),
        };

        let greeting = link.read_line()?;
        let Some(version) = greeting.strip_prefix(GREETING_PREFIX) else {
            return Err(ProtocolError::Malformed(format!(
                "unexpected greeting: {greeting}"
            )));
        };
        link.version = version.trim().to_string();
        link.reader.get_mut().set_timeout(None)?;
        debug!("MPD protocol version {}", link.version);
        Ok(link)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// True when no response is being read and no search is pending.
    pub fn is_idle(&self) -> bool {
        !self.in_response && self.search.is_none()
    }

    pub fn close(&mut self) {
        self.search = None;
        self.pushback = None;
        self.in_response = false;
        self.reader.get_mut().shutdown();
    }

    /// Writes one command. A response left unread by the previous command is
    /// drained first.
    pub fn send(&mut self, command: &Command) -> Result<(), ProtocolError> {
        if self.search.is_some() {
            return Err(ProtocolError::SearchInProgress);
        }
        if self.in_response {
            self.finish()?;
        }
        trace!("MPD <- {}", command);
        let mut line = command.to_line();
        line.push('\n');
        let transport = self.reader.get_mut();
        transport.write_all(line.as_bytes())?;
        transport.flush()?;
        self.in_response = true;
        Ok(())
    }

    /// Next `key: value` pair of the current response, `None` at `OK`.
    pub fn recv_pair(&mut self) -> Result<Option<Pair>, ProtocolError> {
        if let Some(pair) = self.pushback.take() {
            return Ok(Some(pair));
        }
        if !self.in_response {
            return Ok(None);
        }

        loop {
            let line = self.read_line()?;
            if line == "OK" {
                self.in_response = false;
                return Ok(None);
            }
            if line == "list_OK" {
                continue;
            }
            if line.starts_with("ACK ") {
                self.in_response = false;
                return Err(parse_ack(&line));
            }
            return match line.split_once(": ") {
                Some((key, value)) => Ok(Some(Pair::new(key, value))),
                None => Err(ProtocolError::Malformed(line)),
            };
        }
    }

    /// Puts a pair back so the next [`Link::recv_pair`] returns it.
    pub fn unread(&mut self, pair: Pair) {
        self.pushback = Some(pair);
    }

    /// Skips pairs until one named `key` (case-insensitive) shows up.
    pub fn recv_pair_named(&mut self, key: &str) -> Result<Option<Pair>, ProtocolError> {
        while let Some(pair) = self.recv_pair()? {
            if pair.key.eq_ignore_ascii_case(key) {
                return Ok(Some(pair));
            }
        }
        Ok(None)
    }

    /// Discards the rest of the current response.
    pub fn finish(&mut self) -> Result<(), ProtocolError> {
        self.pushback = None;
        while self.recv_pair()?.is_some() {}
        Ok(())
    }

    /// Sends a command and collects its whole response.
    pub fn run(&mut self, command: &Command) -> Result<Vec<Pair>, ProtocolError> {
        self.send(command)?;
        let mut pairs = Vec::new();
        while let Some(pair) = self.recv_pair()? {
            pairs.push(pair);
        }
        Ok(pairs)
    }

    /// Sends a command whose response carries nothing of interest.
    pub fn run_ok(&mut self, command: &Command) -> Result<(), ProtocolError> {
        self.send(command)?;
        self.finish()
    }

    /// Reads one binary chunk announced by a `binary: <len>` pair.
    ///
    /// Returns the total size advertised by the server (`size`) and the chunk
    /// bytes, or `None` when the response has no binary payload. The closing
    /// `OK` is left for [`Link::finish`].
    pub fn recv_binary(&mut self) -> Result<Option<(u64, Vec<u8>)>, ProtocolError> {
        let mut total = None;
        while let Some(pair) = self.recv_pair()? {
            if pair.key == "size" {
                total = pair.value.parse::<u64>().ok();
                continue;
            }
            if pair.key != "binary" {
                continue;
            }
            let len: usize = pair
                .value
                .parse()
                .map_err(|_| ProtocolError::Malformed(format!("binary: {}", pair.value)))?;
            let mut data = vec![0u8; len];
            self.reader.read_exact(&mut data)?;
            let mut newline = [0u8; 1];
            self.reader.read_exact(&mut newline)?;
            if newline[0] != b'\n' {
                return Err(ProtocolError::Malformed(
                    "binary chunk not terminated by newline".to_string(),
                ));
            }
            return Ok(Some((total.unwrap_or(len as u64), data)));
        }
        Ok(None)
    }

    /// Next song record of the current response.
    pub fn recv_song(&mut self) -> Result<Option<Song>, ProtocolError> {
        let Some(first) = self.recv_pair_named("file")? else {
            return Ok(None);
        };
        let mut song = Song::new(first.value);
        self.read_attributes(|pair| song.push(pair))?;
        Ok(Some(song))
    }

    /// Next entity (directory, song or playlist) of a listing response.
    pub fn recv_entity(&mut self) -> Result<Option<Entity>, ProtocolError> {
        loop {
            let Some(first) = self.recv_pair()? else {
                return Ok(None);
            };
            match first.key.as_str() {
                "file" => {
                    let mut song = Song::new(first.value);
                    self.read_attributes(|pair| song.push(pair))?;
                    return Ok(Some(Entity::Song(song)));
                }
                "directory" => {
                    self.read_attributes(|_| {})?;
                    return Ok(Some(Entity::Directory(first.value)));
                }
                "playlist" => {
                    self.read_attributes(|_| {})?;
                    return Ok(Some(Entity::Playlist(first.value)));
                }
                _ => continue,
            }
        }
    }

    // Search

    pub fn search_db_songs(&mut self, exact: bool) -> Result<(), ProtocolError> {
        self.begin_search(Search::songs(exact))
    }

    pub fn search_db_tags(&mut self, tag: &str) -> Result<(), ProtocolError> {
        self.begin_search(Search::tags(tag))
    }

    pub fn search_add_tag_constraint(&mut self, tag: &str, value: &str) -> Result<(), ProtocolError> {
        let search = self.search.as_mut().ok_or(ProtocolError::NoSearch)?;
        search.add_tag_constraint(tag, value);
        Ok(())
    }

    pub fn search_add_uri_constraint(&mut self, uri: &str) -> Result<(), ProtocolError> {
        let search = self.search.as_mut().ok_or(ProtocolError::NoSearch)?;
        search.add_uri_constraint(uri);
        Ok(())
    }

    /// Sends the pending search; its results are then read like any response.
    pub fn search_commit(&mut self) -> Result<(), ProtocolError> {
        let search = self.search.take().ok_or(ProtocolError::NoSearch)?;
        self.send(&search.to_command())
    }

    /// Drops a search that has not been committed yet.
    pub fn search_cancel(&mut self) {
        if self.search.take().is_some() {
            debug!("Pending MPD search discarded");
        }
    }

    fn begin_search(&mut self, search: Search) -> Result<(), ProtocolError> {
        if self.search.is_some() {
            return Err(ProtocolError::SearchInProgress);
        }
        if self.in_response {
            self.finish()?;
        }
        self.search = Some(search);
        Ok(())
    }

    /// Feeds pairs to `push` until the next entity starts (left unread) or
    /// the response ends.
    fn read_attributes(&mut self, mut push: impl FnMut(Pair)) -> Result<(), ProtocolError> {
        while let Some(pair) = self.recv_pair()? {
            if is_entity_start(&pair.key) {
                self.unread(pair);
                break;
            }
            push(pair);
        }
        Ok(())
    }

    fn read_line(&mut self) -> Result<String, ProtocolError> {
        let mut line = String::new();
        let n = self.reader.read_line(&mut line)?;
        if n == 0 {
            self.in_response = false;
            return Err(ProtocolError::Closed);
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        trace!("MPD -> {}", line);
        Ok(line)
    }
}

/// Parses `ACK [code@index] {command} message`.
fn parse_ack(line: &str) -> ProtocolError {
    let malformed = || ProtocolError::Malformed(line.to_string());

    let Some(rest) = line.strip_prefix("ACK [") else {
        return malformed();
    };
    let Some((location, rest)) = rest.split_once("] {") else {
        return malformed();
    };
    let Some((command, message)) = rest.split_once('}') else {
        return malformed();
    };
    let (code, index) = location.split_once('@').unwrap_or((location, "0"));

    ProtocolError::Ack {
        code: code.parse().unwrap_or(0),
        command_index: index.parse().unwrap_or(0),
        command: command.to_string(),
        message: message.trim_start().to_string(),
    }
}
