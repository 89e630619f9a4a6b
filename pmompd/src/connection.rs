//! Blocking MPD session.
//!
//! [`MpdConnection`] owns one protocol link and exposes the command set the
//! remote needs as typed operations. Every call is a blocking round trip and
//! nothing is retried; [`MpdBridge`](crate::MpdBridge) is the piece that
//! serializes calls and decides what to do on failure.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, error, info, warn};

use crate::errors::{ErrorKind, MpdConnectionError, ProtocolError};
use crate::model::{
    Album, AlbumMetadata, Artist, AudioOutput, DirectoryEntry, DirectoryEntryKind, EntityList,
    EntityType, Genre, PlayerInfo, PlayerStatus, Playlist, ServerDescriptor, ServerStats,
    ServerStatus, Track,
};
use crate::protocol::{Command, Connector, Entity, Link, Pair, Song, TcpConnector};

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Looks an album up by name. The bridge installs one backed by its album
/// cache so that queries return the cached, enriched albums.
pub type AlbumResolver = Arc<dyn Fn(&str) -> Option<Album> + Send + Sync>;

type Result<T> = std::result::Result<T, MpdConnectionError>;

pub struct MpdConnection {
    server: ServerDescriptor,
    connector: Arc<dyn Connector>,
    connect_timeout: Duration,
    link: Option<Link>,
    album_resolver: Option<AlbumResolver>,
}

impl MpdConnection {
    pub fn new(server: ServerDescriptor) -> Self {
        Self::with_connector(server, Arc::new(TcpConnector))
    }

    pub fn with_connector(server: ServerDescriptor, connector: Arc<dyn Connector>) -> Self {
        Self {
            server,
            connector,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            link: None,
            album_resolver: None,
        }
    }

    pub fn set_connect_timeout(&mut self, timeout: Duration) {
        self.connect_timeout = timeout;
    }

    pub fn server(&self) -> &ServerDescriptor {
        &self.server
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    /// Protocol version announced by the server, if connected.
    pub fn server_version(&self) -> Option<&str> {
        self.link.as_ref().map(|l| l.version())
    }

    pub fn set_album_resolver(&mut self, resolver: Option<AlbumResolver>) {
        self.album_resolver = resolver;
    }

    /// True when no response is pending and no search is half-built.
    pub fn is_idle(&self) -> bool {
        self.link.as_ref().is_none_or(|l| l.is_idle())
    }

    // Connection

    pub fn connect(&mut self) -> Result<()> {
        if !self.server.is_valid() {
            return Err(MpdConnectionError::new(
                ErrorKind::InvalidServerParameters,
                format!("Invalid server parameters: {}", self.server),
            ));
        }
        self.disconnect();

        let transport = self
            .connector
            .connect(&self.server, self.connect_timeout)
            .map_err(|err| connect_error(&self.server, err))?;

        let mut link = Link::open(transport).map_err(|err| match err {
            ProtocolError::Io(io_err) => connect_error(&self.server, io_err),
            other => MpdConnectionError::from_protocol(ErrorKind::ConnectionFailure, &other),
        })?;

        if let Some(password) = self.server.password() {
            if let Err(err) = link.run_ok(&Command::new("password").arg(password)) {
                link.close();
                return Err(MpdConnectionError::from_protocol(
                    ErrorKind::InvalidPassword,
                    &err,
                ));
            }
        }

        info!(
            "Connected to MPD {} (protocol {})",
            self.server,
            link.version()
        );
        self.link = Some(link);
        Ok(())
    }

    pub fn disconnect(&mut self) {
        if let Some(mut link) = self.link.take() {
            link.close();
            debug!("Disconnected from MPD {}", self.server);
        }
    }

    // Entity listings

    pub fn list_entities(&mut self, entity_type: EntityType) -> Result<EntityList> {
        let Some(tag) = entity_type.tag() else {
            return self.playlists().map(EntityList::Playlists);
        };

        let names = self.with_link(ErrorKind::SearchError, |link| {
            link.search_db_tags(tag)?;
            link.search_commit()?;
            collect_values(link, tag)
        })?;

        Ok(match entity_type {
            EntityType::Albums => EntityList::Albums(names.into_iter().map(Album::new).collect()),
            EntityType::Genres => EntityList::Genres(names.into_iter().map(Genre::new).collect()),
            _ => EntityList::Artists(names.into_iter().map(Artist::new).collect()),
        })
    }

    pub fn albums_for_artist(&mut self, artist: &Artist, is_album_artist: bool) -> Result<Vec<Album>> {
        let constraint = if is_album_artist { "albumartist" } else { "artist" };
        let names = self.with_link(ErrorKind::SearchError, |link| {
            link.search_db_tags("album")?;
            link.search_add_tag_constraint(constraint, &artist.name)?;
            link.search_commit()?;
            collect_values(link, "album")
        })?;
        Ok(self.resolve_albums(names, false))
    }

    /// Albums tagged with `genre`; `first_only` stops at the first album the
    /// resolver knows, which is enough to pick a genre cover.
    pub fn albums_for_genre(&mut self, genre: &Genre, first_only: bool) -> Result<Vec<Album>> {
        let names = self.with_link(ErrorKind::SearchError, |link| {
            link.search_db_tags("album")?;
            link.search_add_tag_constraint("genre", &genre.name)?;
            link.search_commit()?;
            collect_values(link, "album")
        })?;
        Ok(self.resolve_albums(names, first_only))
    }

    pub fn artists_for_genre(&mut self, genre: &Genre, is_album_artist: bool) -> Result<Vec<Artist>> {
        let tag = if is_album_artist { "albumartist" } else { "artist" };
        let names = self.with_link(ErrorKind::SearchError, |link| {
            link.search_db_tags(tag)?;
            link.search_add_tag_constraint("genre", &genre.name)?;
            link.search_commit()?;
            collect_values(link, tag)
        })?;
        Ok(names.into_iter().map(Artist::new).collect())
    }

    /// Directory of the first song of the album, `None` when the album has no
    /// song.
    pub fn path_for_album(&mut self, album: &Album) -> Result<Option<String>> {
        self.path_for_album_cancellable(album, &|| false)
    }

    /// Same as [`MpdConnection::path_for_album`], checking `is_cancelled`
    /// before every step. Returns `Ok(None)` once cancelled; the link is left
    /// idle either way.
    pub(crate) fn path_for_album_cancellable(
        &mut self,
        album: &Album,
        is_cancelled: &dyn Fn() -> bool,
    ) -> Result<Option<String>> {
        self.with_link(ErrorKind::SearchError, |link| {
            if is_cancelled() {
                return Ok(None);
            }
            link.search_db_songs(true)?;
            if is_cancelled() {
                link.search_cancel();
                return Ok(None);
            }
            link.search_add_tag_constraint("album", &album.name)?;
            if is_cancelled() {
                link.search_cancel();
                return Ok(None);
            }
            link.search_commit()?;
            if is_cancelled() {
                link.finish()?;
                return Ok(None);
            }
            let song = link.recv_song()?;
            link.finish()?;
            if is_cancelled() {
                return Ok(None);
            }
            Ok(song.map(|s| parent_directory(&s.uri).to_string()))
        })
    }

    /// Tracks of an album, constrained on the album artist when it is known.
    pub fn tracks_for_album(&mut self, album: &Album) -> Result<Vec<Track>> {
        self.with_link(ErrorKind::SearchError, |link| {
            link.search_db_songs(true)?;
            link.search_add_tag_constraint("album", &album.name)?;
            if !album.artist.is_empty() {
                link.search_add_tag_constraint("albumartist", &album.artist)?;
            }
            link.search_commit()?;
            collect_tracks(link)
        })
    }

    /// Tracks of a stored playlist, numbered from 1 in playlist order, then
    /// completed one by one with a database lookup on their URI.
    pub fn tracks_for_playlist(&mut self, playlist: &Playlist) -> Result<Vec<Track>> {
        self.with_link(ErrorKind::SearchError, |link| {
            link.send(&Command::new("listplaylist").arg(&playlist.name))?;
            let mut tracks = Vec::new();
            while let Some(entity) = link.recv_entity()? {
                if let Entity::Song(song) = entity {
                    let mut track = track_from_song(&song);
                    track.track_number = tracks.len() as u32 + 1;
                    tracks.push(track);
                }
            }

            for track in tracks.iter_mut() {
                let started = link
                    .search_db_songs(true)
                    .and_then(|_| link.search_add_uri_constraint(&track.uri))
                    .and_then(|_| link.search_commit());
                if let Err(err) = started {
                    link.search_cancel();
                    error!("Lookup of playlist entry {} failed: {}", track.uri, err);
                    continue;
                }
                while let Some(song) = link.recv_song()? {
                    let found = track_from_song(&song);
                    track.artist = found.artist;
                    track.duration = found.duration;
                    track.position = found.position;
                    track.name = found.name;
                }
            }
            Ok(tracks)
        })
    }

    /// Album artist, year and genre looked up with three tag listings. A
    /// failure while reading the genre is only logged.
    pub fn metadata_for_album(&mut self, album: &Album) -> Result<AlbumMetadata> {
        self.with_link(ErrorKind::SearchError, |link| {
            let mut metadata = AlbumMetadata {
                artist: first_tag_for_album(link, "albumartist", &album.name)?,
                year: first_tag_for_album(link, "date", &album.name)?
                    .map(|date| date.chars().take(4).collect()),
                genre: None,
            };

            link.search_db_tags("genre")?;
            link.search_add_tag_constraint("album", &album.name)?;
            link.search_commit()?;
            let genre = link
                .recv_pair_named("genre")
                .and_then(|pair| link.finish().map(|_| pair));
            match genre {
                Ok(pair) => metadata.genre = pair.map(|p| p.value),
                Err(err) => error!("Genre lookup for album {} failed: {}", album.name, err),
            }
            Ok(metadata)
        })
    }

    // Playlists

    pub fn playlists(&mut self) -> Result<Vec<Playlist>> {
        self.with_link(ErrorKind::SearchError, |link| {
            let pairs = link.run(&Command::new("listplaylists"))?;
            Ok(pairs
                .into_iter()
                .filter(|p| p.key == "playlist")
                .map(|p| Playlist::new(p.value))
                .collect())
        })
    }

    /// Saves the current queue as `name` then empties the new playlist, which
    /// leaves an empty stored playlist behind.
    pub fn create_playlist(&mut self, name: &str) -> Result<()> {
        self.with_link(ErrorKind::CreatePlaylistError, |link| {
            link.run_ok(&Command::new("save").arg(name))?;
            if let Err(err) = link.run_ok(&Command::new("playlistclear").arg(name)) {
                warn!("Could not clear new playlist {}: {}", name, err);
            }
            Ok(())
        })
    }

    pub fn delete_playlist(&mut self, name: &str) -> Result<()> {
        self.run_ok(ErrorKind::DeletePlaylistError, Command::new("rm").arg(name))
    }

    pub fn rename_playlist(&mut self, playlist: &Playlist, new_name: &str) -> Result<()> {
        self.run_ok(
            ErrorKind::RenamePlaylistError,
            Command::new("rename").arg(&playlist.name).arg(new_name),
        )
    }

    pub fn add_track_to_playlist(&mut self, track: &Track, playlist: &Playlist) -> Result<()> {
        self.run_ok(
            ErrorKind::AddError,
            Command::new("playlistadd").arg(&playlist.name).arg(&track.uri),
        )
    }

    /// Playlist tracks are numbered from 1, so the entry removed is at
    /// `track_number - 1`.
    pub fn remove_track_from_playlist(&mut self, track: &Track, playlist: &Playlist) -> Result<()> {
        self.run_ok(
            ErrorKind::RemoveError,
            Command::new("playlistdelete")
                .arg(&playlist.name)
                .raw(track.track_number.saturating_sub(1)),
        )
    }

    // Queue

    pub fn current_queue_songs(&mut self) -> Result<Vec<Track>> {
        self.with_link(ErrorKind::SearchError, |link| {
            link.send(&Command::new("playlistinfo"))?;
            collect_tracks(link)
        })
    }

    /// Replaces the queue with `tracks` and starts playing, at a random
    /// position when shuffling.
    pub fn play_tracks(&mut self, tracks: &[Track], shuffle: bool, repeat: bool) -> Result<()> {
        self.run_ok(ErrorKind::ClearError, Command::new("clear"))?;
        self.apply_modes(shuffle, repeat);

        for track in tracks {
            self.run_ok(ErrorKind::AddError, Command::new("add").arg(&track.uri))?;
        }

        let position = if shuffle && !tracks.is_empty() {
            rand::rng().random_range(0..tracks.len() as u32)
        } else {
            0
        };
        self.play_track_at_position(position)
    }

    pub fn play_album(&mut self, album: &Album, shuffle: bool, repeat: bool) -> Result<()> {
        match &album.tracks {
            Some(tracks) => self.play_tracks(tracks, shuffle, repeat),
            None => {
                let tracks = self.tracks_for_album(album)?;
                self.play_tracks(&tracks, shuffle, repeat)
            }
        }
    }

    pub fn play_playlist(
        &mut self,
        playlist: &Playlist,
        shuffle: bool,
        repeat: bool,
        position: u32,
    ) -> Result<()> {
        self.run_ok(ErrorKind::ClearError, Command::new("clear"))?;
        self.apply_modes(shuffle, repeat);
        self.run_ok(
            ErrorKind::LoadPlaylistError,
            Command::new("load").arg(&playlist.name),
        )?;
        self.play_track_at_position(position)
    }

    pub fn add_album_to_queue(&mut self, album: &Album) -> Result<()> {
        let fetched;
        let tracks = match &album.tracks {
            Some(tracks) => tracks,
            None => {
                fetched = self.tracks_for_album(album)?;
                &fetched
            }
        };
        for track in tracks {
            self.run_ok(ErrorKind::AddError, Command::new("add").arg(&track.uri))?;
        }
        Ok(())
    }

    // Playback

    pub fn play(&mut self) -> Result<()> {
        self.run_ok(ErrorKind::PlayError, Command::new("play"))
    }

    pub fn play_track_at_position(&mut self, position: u32) -> Result<()> {
        self.run_ok(ErrorKind::PlayError, Command::new("play").raw(position))
    }

    pub fn toggle_pause(&mut self) -> Result<()> {
        self.run_ok(ErrorKind::TogglePlayPauseError, Command::new("pause"))
    }

    pub fn stop(&mut self) -> Result<()> {
        self.run_ok(ErrorKind::PlayError, Command::new("stop"))
    }

    pub fn next_track(&mut self) -> Result<()> {
        self.run_ok(ErrorKind::ChangeTrackError, Command::new("next"))
    }

    pub fn previous_track(&mut self) -> Result<()> {
        self.run_ok(ErrorKind::ChangeTrackError, Command::new("previous"))
    }

    pub fn set_random(&mut self, random: bool) -> Result<()> {
        self.run_ok(
            ErrorKind::ToggleRandomError,
            Command::new("random").raw(u8::from(random)),
        )
    }

    pub fn set_repeat(&mut self, repeat: bool) -> Result<()> {
        self.run_ok(
            ErrorKind::ToggleRepeatError,
            Command::new("repeat").raw(u8::from(repeat)),
        )
    }

    /// Volume in percent, clamped to 100.
    pub fn set_volume(&mut self, volume: u32) -> Result<()> {
        self.run_ok(
            ErrorKind::ChangeVolumeError,
            Command::new("setvol").raw(volume.min(100)),
        )
    }

    /// Seeks to `seconds` in the song at queue position `track_position`.
    pub fn set_track_position(&mut self, seconds: u32, track_position: u32) -> Result<()> {
        self.run_ok(
            ErrorKind::ChangePositionError,
            Command::new("seek").raw(track_position).raw(seconds),
        )
    }

    // Status

    pub fn status(&mut self) -> Result<ServerStatus> {
        let pairs = self.with_link(ErrorKind::GetStatusError, |link| {
            link.run(&Command::new("status"))
        })?;
        Ok(parse_status(&pairs))
    }

    /// Current volume, -1 when the server has no mixer.
    pub fn volume(&mut self) -> Result<i32> {
        self.status().map(|s| s.volume)
    }

    /// What is playing right now, `None` when nothing is.
    ///
    /// With `match_album` the album tag must be known to the album resolver;
    /// otherwise a bare album is built from the tag.
    pub fn player_info(&mut self, match_album: bool) -> Result<Option<PlayerInfo>> {
        let song = self.with_link(ErrorKind::GetStatusError, |link| {
            link.send(&Command::new("currentsong"))?;
            let song = link.recv_song()?;
            link.finish()?;
            Ok(song)
        })?;
        let Some(song) = song else {
            return Ok(None);
        };
        let status = self.status()?;

        let track = track_from_song(&song);
        let Some(album_name) = song.tag("album") else {
            return Err(MpdConnectionError::new(
                ErrorKind::GetStatusError,
                format!("No album tag for {}", song.uri),
            ));
        };

        let album = if match_album {
            self.album_resolver
                .as_ref()
                .and_then(|resolve| resolve(album_name))
                .ok_or_else(|| {
                    MpdConnectionError::new(ErrorKind::GetStatusError, "No matching album found.")
                })?
        } else {
            Album::new(album_name)
        };

        Ok(Some(PlayerInfo {
            track,
            album,
            status: status.status,
            elapsed: status.elapsed.max(0.0) as u32,
            volume: status.volume,
            is_random: status.is_random,
            is_repeat: status.is_repeat,
        }))
    }

    // Outputs

    pub fn available_outputs(&mut self) -> Result<Vec<AudioOutput>> {
        let pairs = self.with_link(ErrorKind::GetOutputsError, |link| {
            link.run(&Command::new("outputs"))
        })?;
        Ok(parse_outputs(&pairs))
    }

    pub fn toggle_output(&mut self, output: &AudioOutput) -> Result<()> {
        let name = if output.enabled { "disableoutput" } else { "enableoutput" };
        self.run_ok(ErrorKind::ToggleOutputError, Command::new(name).raw(output.id))
    }

    // Database

    pub fn update_database(&mut self) -> Result<()> {
        let pairs = self.with_link(ErrorKind::UpdateError, |link| {
            link.run(&Command::new("update"))
        })?;
        if let Some(job) = pairs.iter().find(|p| p.key == "updating_db") {
            info!("MPD database update started (job {})", job.value);
        }
        Ok(())
    }

    pub fn stats(&mut self) -> Result<ServerStats> {
        let pairs = self.with_link(ErrorKind::GetStatsError, |link| {
            link.run(&Command::new("stats"))
        })?;
        Ok(parse_stats(&pairs))
    }

    /// Content of a music directory; `None` lists the root.
    pub fn directory_list(&mut self, path: Option<&str>) -> Result<Vec<DirectoryEntry>> {
        self.with_link(ErrorKind::GetDirectoryListError, |link| {
            let mut cmd = Command::new("lsinfo");
            if let Some(path) = path {
                cmd = cmd.arg(path);
            }
            link.send(&cmd)?;

            let mut entries = Vec::new();
            while let Some(entity) = link.recv_entity()? {
                match entity {
                    Entity::Directory(name) => entries.push(DirectoryEntry {
                        name,
                        kind: DirectoryEntryKind::Directory,
                    }),
                    Entity::Song(song) => {
                        if file_name(&song.uri) != ".DS_Store" {
                            entries.push(DirectoryEntry::song(song.uri));
                        }
                    }
                    Entity::Playlist(name) => entries.push(DirectoryEntry {
                        name,
                        kind: DirectoryEntryKind::Playlist,
                    }),
                }
            }
            Ok(entries)
        })
    }

    /// Raw cover image stored next to the songs of `path`, fetched in chunks.
    pub fn cover_for_directory(&mut self, path: &str) -> Result<Vec<u8>> {
        self.with_link(ErrorKind::GetDirectoryCoverError, |link| {
            let mut data = Vec::new();
            loop {
                link.send(&Command::new("albumart").arg(path).raw(data.len()))?;
                let chunk = link.recv_binary()?;
                link.finish()?;
                let Some((total, bytes)) = chunk else {
                    break;
                };
                if bytes.is_empty() {
                    break;
                }
                data.extend_from_slice(&bytes);
                if data.len() as u64 >= total {
                    break;
                }
            }
            Ok(data)
        })
    }

    // Internals

    fn with_link<T>(
        &mut self,
        kind: ErrorKind,
        op: impl FnOnce(&mut Link) -> std::result::Result<T, ProtocolError>,
    ) -> Result<T> {
        let link = self
            .link
            .as_mut()
            .ok_or_else(MpdConnectionError::not_connected)?;
        op(link).map_err(|err| {
            link.search_cancel();
            if err.is_connection_lost() {
                warn!("MPD link failure ({}): {}", kind, err);
            } else {
                debug!("MPD command failed ({}): {}", kind, err);
            }
            MpdConnectionError::from_protocol(kind, &err)
        })
    }

    fn run_ok(&mut self, kind: ErrorKind, command: Command) -> Result<()> {
        self.with_link(kind, |link| link.run_ok(&command))
    }

    /// Random and repeat are best effort when starting playback.
    fn apply_modes(&mut self, shuffle: bool, repeat: bool) {
        if let Err(err) = self.set_random(shuffle) {
            warn!("Could not set random mode: {}", err);
        }
        if let Err(err) = self.set_repeat(repeat) {
            warn!("Could not set repeat mode: {}", err);
        }
    }

    fn resolve_albums(&self, names: Vec<String>, first_only: bool) -> Vec<Album> {
        let limit = if first_only { 1 } else { usize::MAX };
        match &self.album_resolver {
            Some(resolve) => names
                .into_iter()
                .filter_map(|n| resolve(&n))
                .take(limit)
                .collect(),
            None => names.into_iter().map(Album::new).take(limit).collect(),
        }
    }
}

impl Drop for MpdConnection {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn connect_error(server: &ServerDescriptor, err: io::Error) -> MpdConnectionError {
    if err.kind() == io::ErrorKind::OutOfMemory {
        return MpdConnectionError::new(ErrorKind::OutOfMemory, "Out of memory");
    }
    let mut failure = MpdConnectionError::from_protocol(
        ErrorKind::ConnectionFailure,
        &ProtocolError::Io(err),
    );
    failure.message = format!("Failed to connect to {}: {}", server, failure.message);
    failure
}

/// Values of every `tag` pair until the end of the response.
fn collect_values(link: &mut Link, tag: &str) -> std::result::Result<Vec<String>, ProtocolError> {
    let mut values = Vec::new();
    while let Some(pair) = link.recv_pair_named(tag)? {
        values.push(pair.value);
    }
    Ok(values)
}

fn collect_tracks(link: &mut Link) -> std::result::Result<Vec<Track>, ProtocolError> {
    let mut tracks = Vec::new();
    while let Some(song) = link.recv_song()? {
        tracks.push(track_from_song(&song));
    }
    Ok(tracks)
}

fn first_tag_for_album(
    link: &mut Link,
    tag: &str,
    album: &str,
) -> std::result::Result<Option<String>, ProtocolError> {
    link.search_db_tags(tag)?;
    link.search_add_tag_constraint("album", album)?;
    link.search_commit()?;
    let value = link.recv_pair_named(tag)?.map(|p| p.value);
    link.finish()?;
    Ok(value)
}

pub(crate) fn track_from_song(song: &Song) -> Track {
    let name = match song.tag("title") {
        Some(title) => title.to_string(),
        None => file_name(&song.uri)
            .split('.')
            .next()
            .unwrap_or_default()
            .to_string(),
    };
    let track_number = match song.tag("track") {
        Some(value) => value
            .split('/')
            .next()
            .and_then(|n| n.trim().parse().ok())
            .unwrap_or(1),
        None => 0,
    };

    Track {
        name,
        artist: song.tag("artist").unwrap_or_default().to_string(),
        duration: song.duration(),
        track_number,
        uri: song.uri.clone(),
        position: song.position(),
    }
}

fn file_name(uri: &str) -> &str {
    uri.rsplit('/').next().unwrap_or(uri)
}

fn parent_directory(uri: &str) -> &str {
    uri.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

fn flag(value: &str) -> bool {
    value == "1"
}

fn parse_status(pairs: &[Pair]) -> ServerStatus {
    let mut status = ServerStatus {
        volume: -1,
        ..Default::default()
    };
    for pair in pairs {
        let value = pair.value.as_str();
        match pair.key.as_str() {
            "volume" => status.volume = value.parse().unwrap_or(-1),
            "random" => status.is_random = flag(value),
            "repeat" => status.is_repeat = flag(value),
            "state" => status.status = PlayerStatus::from_state(value),
            "elapsed" => status.elapsed = value.parse().unwrap_or(0.0),
            "playlistlength" => status.queue_length = value.parse().unwrap_or(0),
            "song" => status.song_position = value.parse().ok(),
            _ => {}
        }
    }
    status
}

fn parse_outputs(pairs: &[Pair]) -> Vec<AudioOutput> {
    let mut outputs: Vec<AudioOutput> = Vec::new();
    for pair in pairs {
        match pair.key.as_str() {
            "outputid" => outputs.push(AudioOutput {
                id: pair.value.parse().unwrap_or(0),
                name: String::new(),
                enabled: false,
            }),
            "outputname" => {
                if let Some(output) = outputs.last_mut() {
                    output.name = pair.value.clone();
                }
            }
            "outputenabled" => {
                if let Some(output) = outputs.last_mut() {
                    output.enabled = flag(&pair.value);
                }
            }
            _ => {}
        }
    }
    outputs.retain(|o| !o.name.is_empty());
    outputs
}

fn parse_stats(pairs: &[Pair]) -> ServerStats {
    let mut stats = ServerStats::default();
    for pair in pairs {
        let value = pair.value.parse().unwrap_or(0);
        match pair.key.as_str() {
            "albums" => stats.albums = value,
            "artists" => stats.artists = value,
            "songs" => stats.songs = value,
            "db_playtime" => stats.db_playtime = value,
            "uptime" => stats.uptime = value,
            "playtime" => stats.playtime = value,
            "db_update" => stats.db_update = value,
            _ => {}
        }
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::FakeMpd;

    fn connected(fake: &FakeMpd) -> MpdConnection {
        let mut cnx = MpdConnection::with_connector(
            ServerDescriptor::new("mpd.local", 6600),
            Arc::new(fake.clone()),
        );
        cnx.connect().unwrap();
        cnx
    }

    fn song(uri: &str, pairs: &[(&str, &str)]) -> Song {
        let mut song = Song::new(uri);
        for (k, v) in pairs {
            song.push(Pair::new(k, v));
        }
        song
    }

    #[test]
    fn test_track_title_falls_back_to_file_stem() {
        let track = track_from_song(&song("Jazz/Blue/01.So What.flac", &[]));
        assert_eq!(track.name, "01");
        assert_eq!(track.track_number, 0);

        let track = track_from_song(&song("x.flac", &[("Title", "So What")]));
        assert_eq!(track.name, "So What");
    }

    #[test]
    fn test_track_number_parsing() {
        let n = |v: &str| track_from_song(&song("a.mp3", &[("Track", v)])).track_number;
        assert_eq!(n("3/12"), 3);
        assert_eq!(n("7"), 7);
        assert_eq!(n("A-side"), 1);
    }

    #[test]
    fn test_invalid_parameters() {
        let mut cnx = MpdConnection::with_connector(
            ServerDescriptor::new("", 6600),
            Arc::new(FakeMpd::new()),
        );
        let err = cnx.connect().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidServerParameters);
        assert!(!cnx.is_connected());
    }

    #[test]
    fn test_refused_connection() {
        let fake = FakeMpd::new();
        fake.refuse_connections(true);
        let mut cnx = MpdConnection::with_connector(
            ServerDescriptor::new("mpd.local", 6600),
            Arc::new(fake),
        );
        let err = cnx.connect().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConnectionFailure);
        assert!(!err.message.is_empty());
    }

    #[test]
    fn test_password_rejected() {
        let fake = FakeMpd::new();
        fake.fail("password \"bad\"", "incorrect password");
        let mut cnx = MpdConnection::with_connector(
            ServerDescriptor::new("mpd.local", 6600).with_password("bad"),
            Arc::new(fake.clone()),
        );
        let err = cnx.connect().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPassword);
        assert_eq!(err.message, "incorrect password");
        assert!(!cnx.is_connected());
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let fake = FakeMpd::new();
        let mut cnx = connected(&fake);
        assert_eq!(cnx.server_version(), Some("0.23.5"));
        cnx.disconnect();
        cnx.disconnect();
        assert!(!cnx.is_connected());
        let err = cnx.play().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConnectionFailure);
    }

    #[test]
    fn test_list_entities() {
        let fake = FakeMpd::new();
        fake.respond("list genre", "Genre: Rock\nGenre: Jazz\n");
        fake.respond("listplaylists", "playlist: Road\nLast-Modified: 2021-01-01\n");
        let mut cnx = connected(&fake);

        let genres = cnx.list_entities(EntityType::Genres).unwrap();
        assert_eq!(genres.names(), vec!["Rock", "Jazz"]);
        let playlists = cnx.list_entities(EntityType::Playlists).unwrap();
        assert_eq!(playlists, EntityList::Playlists(vec![Playlist::new("Road")]));
    }

    #[test]
    fn test_search_error_carries_server_text() {
        let fake = FakeMpd::new();
        fake.fail("list album", "unknown tag");
        let mut cnx = connected(&fake);
        let err = cnx.list_entities(EntityType::Albums).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SearchError);
        assert_eq!(err.message, "unknown tag");
        assert!(!err.connection_lost());
        assert!(cnx.is_idle());
    }

    #[test]
    fn test_albums_for_artist_uses_resolver() {
        let fake = FakeMpd::new();
        fake.respond(
            "list album albumartist \"Miles Davis\"",
            "Album: Kind of Blue\nAlbum: Unknown\n",
        );
        let mut cnx = connected(&fake);
        cnx.set_album_resolver(Some(Arc::new(|name: &str| {
            (name == "Kind of Blue").then(|| Album::with_artist(name, "Miles Davis"))
        })));

        let albums = cnx
            .albums_for_artist(&Artist::new("Miles Davis"), true)
            .unwrap();
        assert_eq!(albums, vec![Album::with_artist("Kind of Blue", "Miles Davis")]);
    }

    #[test]
    fn test_albums_for_genre_first_only() {
        let fake = FakeMpd::new();
        fake.respond("list album genre \"Jazz\"", "Album: A\nAlbum: B\n");
        let mut cnx = connected(&fake);
        let albums = cnx.albums_for_genre(&Genre::new("Jazz"), true).unwrap();
        assert_eq!(albums.len(), 1);
        assert_eq!(albums[0].name, "A");
    }

    #[test]
    fn test_path_for_album() {
        let fake = FakeMpd::new();
        fake.respond(
            "find album \"Blue\"",
            "file: Jazz/Blue/01.flac\nTitle: One\nfile: Jazz/Blue/02.flac\n",
        );
        let mut cnx = connected(&fake);
        let path = cnx.path_for_album(&Album::new("Blue")).unwrap();
        assert_eq!(path.as_deref(), Some("Jazz/Blue"));
        assert_eq!(cnx.path_for_album(&Album::new("None")).unwrap(), None);
    }

    #[test]
    fn test_cancelled_path_resolution_leaves_link_idle() {
        let fake = FakeMpd::new();
        let mut cnx = connected(&fake);
        let path = cnx
            .path_for_album_cancellable(&Album::new("Blue"), &|| true)
            .unwrap();
        assert_eq!(path, None);
        assert!(cnx.is_idle());
        assert!(fake.commands().is_empty());
    }

    #[test]
    fn test_tracks_for_album_constrains_album_artist() {
        let fake = FakeMpd::new();
        fake.respond(
            "find album \"Blue\" albumartist \"Joni\"",
            "file: b/1.mp3\nTitle: All I Want\nTrack: 1/10\nTime: 215\n",
        );
        let mut cnx = connected(&fake);
        let tracks = cnx
            .tracks_for_album(&Album::with_artist("Blue", "Joni"))
            .unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].track_number, 1);
        assert_eq!(tracks[0].duration, Duration::from_secs(215));
    }

    #[test]
    fn test_tracks_for_playlist_are_numbered_and_enriched() {
        let fake = FakeMpd::new();
        fake.respond("listplaylist \"Road\"", "file: a.mp3\nfile: b.mp3\n");
        fake.respond("find file \"a.mp3\"", "file: a.mp3\nTitle: Alpha\nArtist: X\nTime: 100\n");
        let mut cnx = connected(&fake);

        let tracks = cnx.tracks_for_playlist(&Playlist::new("Road")).unwrap();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].track_number, 1);
        assert_eq!(tracks[0].name, "Alpha");
        assert_eq!(tracks[0].artist, "X");
        assert_eq!(tracks[1].track_number, 2);
        assert_eq!(tracks[1].name, "b");
        assert_eq!(fake.count("find file \"b.mp3\""), 1);
    }

    #[test]
    fn test_metadata_for_album() {
        let fake = FakeMpd::new();
        fake.respond("list albumartist album \"Blue\"", "AlbumArtist: Joni Mitchell\n");
        fake.respond("list date album \"Blue\"", "Date: 1971-06-22\n");
        fake.fail("list genre album \"Blue\"", "boom");
        let mut cnx = connected(&fake);

        let meta = cnx.metadata_for_album(&Album::new("Blue")).unwrap();
        assert_eq!(meta.artist.as_deref(), Some("Joni Mitchell"));
        assert_eq!(meta.year.as_deref(), Some("1971"));
        assert_eq!(meta.genre, None);
    }

    #[test]
    fn test_create_playlist_saves_then_clears() {
        let fake = FakeMpd::new();
        let mut cnx = connected(&fake);
        cnx.create_playlist("New").unwrap();
        assert_eq!(
            fake.commands(),
            vec!["save \"New\"", "playlistclear \"New\""]
        );

        fake.fail("save \"Dup\"", "Playlist already exists");
        let err = cnx.create_playlist("Dup").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CreatePlaylistError);
    }

    #[test]
    fn test_remove_track_uses_zero_based_position() {
        let fake = FakeMpd::new();
        let mut cnx = connected(&fake);
        let mut track = track_from_song(&song("a.mp3", &[]));
        track.track_number = 3;
        cnx.remove_track_from_playlist(&track, &Playlist::new("Road"))
            .unwrap();
        assert_eq!(fake.commands(), vec!["playlistdelete \"Road\" 2"]);
    }

    #[test]
    fn test_play_tracks_sequence() {
        let fake = FakeMpd::new();
        let mut cnx = connected(&fake);
        let tracks = vec![
            track_from_song(&song("a.mp3", &[])),
            track_from_song(&song("b.mp3", &[])),
        ];
        cnx.play_tracks(&tracks, false, true).unwrap();
        assert_eq!(
            fake.commands(),
            vec![
                "clear",
                "random 0",
                "repeat 1",
                "add \"a.mp3\"",
                "add \"b.mp3\"",
                "play 0"
            ]
        );
    }

    #[test]
    fn test_play_tracks_stops_on_add_error() {
        let fake = FakeMpd::new();
        fake.fail("add \"a.mp3\"", "No such song");
        let mut cnx = connected(&fake);
        let err = cnx
            .play_tracks(&[track_from_song(&song("a.mp3", &[]))], true, false)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AddError);
        assert_eq!(fake.count("play 0"), 0);
    }

    #[test]
    fn test_set_volume_error_kind() {
        let fake = FakeMpd::new();
        fake.fail("setvol 100", "problems setting volume");
        let mut cnx = connected(&fake);
        let err = cnx.set_volume(150).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ChangeVolumeError);
    }

    #[test]
    fn test_play_playlist_sequence() {
        let fake = FakeMpd::new();
        let mut cnx = connected(&fake);
        cnx.play_playlist(&Playlist::new("Road"), true, false, 4)
            .unwrap();
        assert_eq!(
            fake.commands(),
            vec!["clear", "random 1", "repeat 0", "load \"Road\"", "play 4"]
        );
    }

    #[test]
    fn test_play_playlist_error_kinds() {
        let fake = FakeMpd::new();
        fake.fail("load \"Gone\"", "No such playlist");
        let mut cnx = connected(&fake);
        let err = cnx
            .play_playlist(&Playlist::new("Gone"), false, false, 0)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LoadPlaylistError);
        assert_eq!(err.message, "No such playlist");
        assert_eq!(fake.count("play 0"), 0);

        fake.fail("clear", "Not allowed");
        let err = cnx
            .play_playlist(&Playlist::new("Road"), false, false, 0)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ClearError);
        assert_eq!(fake.count("load \"Road\""), 0);
    }

    #[test]
    fn test_stored_playlist_edits() {
        let fake = FakeMpd::new();
        let mut cnx = connected(&fake);
        let road = Playlist::new("Road");
        let track = track_from_song(&song("Joni/Blue/01.flac", &[]));

        cnx.delete_playlist("Old").unwrap();
        cnx.rename_playlist(&road, "Road Trip").unwrap();
        cnx.add_track_to_playlist(&track, &road).unwrap();
        assert_eq!(
            fake.commands(),
            vec![
                "rm \"Old\"",
                "rename \"Road\" \"Road Trip\"",
                "playlistadd \"Road\" \"Joni/Blue/01.flac\"",
            ]
        );
    }

    #[test]
    fn test_stored_playlist_error_kinds() {
        let fake = FakeMpd::new();
        fake.fail("rm \"Old\"", "No such playlist");
        fake.fail("rename \"Road\" \"Home\"", "Playlist already exists");
        fake.fail("playlistadd \"Road\" \"x.flac\"", "No such song");
        let mut cnx = connected(&fake);
        let road = Playlist::new("Road");

        let err = cnx.delete_playlist("Old").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeletePlaylistError);
        let err = cnx.rename_playlist(&road, "Home").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RenamePlaylistError);
        let err = cnx
            .add_track_to_playlist(&track_from_song(&song("x.flac", &[])), &road)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AddError);
        assert!(!err.connection_lost());
    }

    #[test]
    fn test_update_database() {
        let fake = FakeMpd::new();
        fake.respond("update", "updating_db: 7\n");
        let mut cnx = connected(&fake);
        cnx.update_database().unwrap();
        assert_eq!(fake.commands(), vec!["update"]);

        fake.fail("update", "Already updating");
        let err = cnx.update_database().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpdateError);
    }

    #[test]
    fn test_artists_for_genre() {
        let fake = FakeMpd::new();
        fake.respond(
            "list albumartist genre \"Folk\"",
            "AlbumArtist: Nick Drake\nAlbumArtist: Joni Mitchell\n",
        );
        let mut cnx = connected(&fake);
        let artists = cnx.artists_for_genre(&Genre::new("Folk"), true).unwrap();
        let names: Vec<_> = artists.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Nick Drake", "Joni Mitchell"]);

        cnx.artists_for_genre(&Genre::new("Folk"), false).unwrap();
        assert_eq!(
            fake.commands(),
            vec!["list albumartist genre \"Folk\"", "list artist genre \"Folk\""]
        );

        fake.fail("list artist genre \"Folk\"", "incorrect arguments");
        let err = cnx.artists_for_genre(&Genre::new("Folk"), false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SearchError);
    }

    #[test]
    fn test_player_info() {
        let fake = FakeMpd::new();
        fake.respond(
            "currentsong",
            "file: Jazz/Blue/01.flac\nTitle: One\nAlbum: Blue\nPos: 4\n",
        );
        fake.respond(
            "status",
            "volume: 55\nrepeat: 1\nrandom: 0\nstate: play\nelapsed: 12.800\n",
        );
        let mut cnx = connected(&fake);

        let info = cnx.player_info(false).unwrap().unwrap();
        assert_eq!(info.album.name, "Blue");
        assert_eq!(info.status, PlayerStatus::Playing);
        assert_eq!(info.elapsed, 12);
        assert_eq!(info.volume, 55);
        assert!(info.is_repeat);
        assert_eq!(info.track.position, 4);

        let err = cnx.player_info(true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::GetStatusError);
        assert_eq!(err.message, "No matching album found.");
    }

    #[test]
    fn test_player_info_nothing_playing() {
        let fake = FakeMpd::new();
        let mut cnx = connected(&fake);
        assert_eq!(cnx.player_info(false).unwrap(), None);
    }

    #[test]
    fn test_outputs_and_toggle() {
        let fake = FakeMpd::new();
        fake.respond(
            "outputs",
            "outputid: 0\noutputname: ALSA\noutputenabled: 1\noutputid: 1\noutputname: HTTP\noutputenabled: 0\n",
        );
        let mut cnx = connected(&fake);
        let outputs = cnx.available_outputs().unwrap();
        assert_eq!(outputs.len(), 2);
        assert!(outputs[0].enabled);
        cnx.toggle_output(&outputs[0]).unwrap();
        cnx.toggle_output(&outputs[1]).unwrap();
        assert!(fake.commands().ends_with(&[
            "disableoutput 0".to_string(),
            "enableoutput 1".to_string()
        ]));
    }

    #[test]
    fn test_stats() {
        let fake = FakeMpd::new();
        fake.respond(
            "stats",
            "artists: 10\nalbums: 20\nsongs: 300\nuptime: 5\ndb_playtime: 9999\ndb_update: 1700000000\nplaytime: 42\n",
        );
        let mut cnx = connected(&fake);
        let stats = cnx.stats().unwrap();
        assert_eq!(stats.albums, 20);
        assert_eq!(stats.db_update, 1_700_000_000);
    }

    #[test]
    fn test_directory_list() {
        let fake = FakeMpd::new();
        fake.respond(
            "lsinfo \"Jazz\"",
            "directory: Jazz/Blue\nfile: Jazz/.DS_Store\nfile: Jazz/cover.jpg\nfile: Jazz/x.flac\n",
        );
        let mut cnx = connected(&fake);
        let entries = cnx.directory_list(Some("Jazz")).unwrap();
        let kinds: Vec<_> = entries.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                DirectoryEntryKind::Directory,
                DirectoryEntryKind::Image,
                DirectoryEntryKind::Song
            ]
        );
    }

    #[test]
    fn test_cover_is_fetched_in_chunks() {
        let fake = FakeMpd::new();
        let chunk = |bytes: &[u8]| {
            let mut raw = format!("size: 4\nbinary: {}\n", bytes.len()).into_bytes();
            raw.extend_from_slice(bytes);
            raw.extend_from_slice(b"\nOK\n");
            raw
        };
        fake.respond_raw("albumart \"Jazz/Blue\" 0", chunk(&[1, 2]));
        fake.respond_raw("albumart \"Jazz/Blue\" 2", chunk(&[3, 4]));
        let mut cnx = connected(&fake);
        assert_eq!(cnx.cover_for_directory("Jazz/Blue").unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_lost_link_is_flagged() {
        let fake = FakeMpd::new();
        let mut cnx = connected(&fake);
        fake.drop_connection();
        let err = cnx.metadata_for_album(&Album::new("Blue")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SearchError);
        assert!(err.connection_lost());
    }
}
