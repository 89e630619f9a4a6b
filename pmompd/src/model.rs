use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Characters ignored at both ends of entity names when sorting lists.
const SORT_TRIM_CHARS: &[char] = &['.', '?', '!', ':', ';', '/', '+', '=', '-', '*', '\'', '"'];

/// Characters stripped from album names when building cover identifiers.
const IDENTIFIER_STRIP_CHARS: &str = "\"'\\/?!<>|+*=&()[]{}$:";

/// Where to reach an MPD server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerDescriptor {
    pub hostname: String,
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl ServerDescriptor {
    pub fn new(hostname: impl Into<String>, port: u16) -> Self {
        Self {
            hostname: hostname.into(),
            port,
            password: None,
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Empty passwords are treated as "no password".
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref().filter(|p| !p.is_empty())
    }

    pub fn is_valid(&self) -> bool {
        !self.hostname.trim().is_empty() && self.port != 0
    }
}

impl fmt::Display for ServerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.hostname, self.port)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Track {
    pub name: String,
    pub artist: String,
    pub duration: Duration,
    pub track_number: u32,
    pub uri: String,
    /// Position in the play queue.
    pub position: u32,
}

impl Track {
    /// Two tracks are the same queue entry when both URI and queue position
    /// match. Used by the poller to detect track changes.
    pub fn same_entry(&self, other: &Track) -> bool {
        self.uri == other.uri && self.position == other.position
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Album {
    pub name: String,
    pub artist: String,
    pub genre: String,
    pub year: String,
    /// Directory holding the album files, relative to the music root.
    pub path: Option<String>,
    pub tracks: Option<Vec<Track>>,
}

impl Album {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_artist(name: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            artist: artist.into(),
            ..Default::default()
        }
    }

    /// Stable identifier used to name cover files.
    ///
    /// Once the album path is known the identifier combines a sanitized name
    /// with a hash of the path, so two albums sharing a name do not collide.
    pub fn unique_identifier(&self) -> String {
        match &self.path {
            Some(path) => {
                let cleaned: String = self
                    .name
                    .chars()
                    .filter(|c| !IDENTIFIER_STRIP_CHARS.contains(*c))
                    .collect();
                format!("{}_{}", cleaned.to_lowercase(), sha256_hex(path))
            }
            None => sha256_hex(&self.name),
        }
    }

    /// Location of the cover image for this album inside `covers_dir`.
    pub fn cover_path(&self, covers_dir: &Path) -> PathBuf {
        covers_dir.join(format!("{}.jpg", self.unique_identifier()))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Artist {
    pub name: String,
    pub albums: Option<Vec<Album>>,
}

impl Artist {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            albums: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Genre {
    pub name: String,
    pub albums: Option<Vec<Album>>,
}

impl Genre {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            albums: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Playlist {
    pub name: String,
    pub tracks: Option<Vec<Track>>,
}

impl Playlist {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tracks: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityType {
    Albums,
    Artists,
    AlbumArtists,
    Genres,
    Playlists,
}

impl EntityType {
    pub const CACHED: [EntityType; 4] = [
        EntityType::Albums,
        EntityType::Artists,
        EntityType::AlbumArtists,
        EntityType::Genres,
    ];

    /// MPD tag listed for this entity type. Playlists are not a tag.
    pub fn tag(&self) -> Option<&'static str> {
        match self {
            EntityType::Albums => Some("album"),
            EntityType::Artists => Some("artist"),
            EntityType::AlbumArtists => Some("albumartist"),
            EntityType::Genres => Some("genre"),
            EntityType::Playlists => None,
        }
    }
}

/// A homogeneous list of entities as returned by a listing query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntityList {
    Albums(Vec<Album>),
    Artists(Vec<Artist>),
    Genres(Vec<Genre>),
    Playlists(Vec<Playlist>),
}

impl EntityList {
    pub fn len(&self) -> usize {
        match self {
            EntityList::Albums(v) => v.len(),
            EntityList::Artists(v) => v.len(),
            EntityList::Genres(v) => v.len(),
            EntityList::Playlists(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn names(&self) -> Vec<&str> {
        match self {
            EntityList::Albums(v) => v.iter().map(|e| e.name.as_str()).collect(),
            EntityList::Artists(v) => v.iter().map(|e| e.name.as_str()).collect(),
            EntityList::Genres(v) => v.iter().map(|e| e.name.as_str()).collect(),
            EntityList::Playlists(v) => v.iter().map(|e| e.name.as_str()).collect(),
        }
    }

    /// Sorts by name, ignoring leading/trailing punctuation.
    pub fn sort_by_name(&mut self) {
        match self {
            EntityList::Albums(v) => sort_by_name(v, |e| &e.name),
            EntityList::Artists(v) => sort_by_name(v, |e| &e.name),
            EntityList::Genres(v) => sort_by_name(v, |e| &e.name),
            EntityList::Playlists(v) => sort_by_name(v, |e| &e.name),
        }
    }
}

pub(crate) fn sort_by_name<T>(items: &mut [T], name: impl Fn(&T) -> &str) {
    items.sort_by(|a, b| sort_key(name(a)).cmp(sort_key(name(b))));
}

fn sort_key(name: &str) -> &str {
    name.trim_matches(SORT_TRIM_CHARS)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PlayerStatus {
    Playing,
    Paused,
    Stopped,
    #[default]
    Unknown,
}

impl PlayerStatus {
    pub(crate) fn from_state(state: &str) -> Self {
        match state {
            "play" => PlayerStatus::Playing,
            "pause" => PlayerStatus::Paused,
            "stop" => PlayerStatus::Stopped,
            _ => PlayerStatus::Unknown,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlayerState {
    pub status: PlayerStatus,
    pub is_random: bool,
    pub is_repeat: bool,
}

/// Snapshot of what the server is playing, built from `currentsong` and
/// `status`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlayerInfo {
    pub track: Track,
    pub album: Album,
    pub status: PlayerStatus,
    /// Elapsed time in the current track, in seconds.
    pub elapsed: u32,
    /// -1 when the server has no mixer.
    pub volume: i32,
    pub is_random: bool,
    pub is_repeat: bool,
}

impl PlayerInfo {
    pub fn state(&self) -> PlayerState {
        PlayerState {
            status: self.status,
            is_random: self.is_random,
            is_repeat: self.is_repeat,
        }
    }
}

/// Raw fields of the `status` command that the client cares about.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ServerStatus {
    pub volume: i32,
    pub is_random: bool,
    pub is_repeat: bool,
    pub status: PlayerStatus,
    pub elapsed: f64,
    pub queue_length: u32,
    pub song_position: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioOutput {
    pub id: u32,
    pub name: String,
    pub enabled: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServerStats {
    pub albums: u64,
    pub artists: u64,
    pub songs: u64,
    pub db_playtime: u64,
    pub uptime: u64,
    pub playtime: u64,
    /// UNIX timestamp of the last database update.
    pub db_update: u64,
}

/// Album attributes looked up with tag listings constrained on the album name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AlbumMetadata {
    pub artist: Option<String>,
    pub year: Option<String>,
    pub genre: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DirectoryEntryKind {
    Directory,
    Song,
    Playlist,
    Image,
    Unknown,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub name: String,
    pub kind: DirectoryEntryKind,
}

impl DirectoryEntry {
    pub(crate) fn song(uri: String) -> Self {
        let kind = if is_image_name(&uri) {
            DirectoryEntryKind::Image
        } else {
            DirectoryEntryKind::Song
        };
        Self { name: uri, kind }
    }
}

fn is_image_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    [".jpg", ".jpeg", ".png", ".gif", ".bmp", ".webp"]
        .iter()
        .any(|ext| lower.ends_with(ext))
}

fn sha256_hex(input: &str) -> String {
    format!("{:x}", Sha256::digest(input.as_bytes()))
}
