//! Serial command bridge over one MPD session.
//!
//! [`MpdBridge`] owns the [`MpdConnection`] on a dedicated worker thread.
//! Every public operation is turned into a job pushed on the worker's
//! channel, so commands never overlap on the wire. The player poller runs on
//! the same worker: a `crossbeam_channel::tick` receiver is selected next to
//! the job channel while connected.
//!
//! Callbacks are invoked on the worker thread. Player events are delivered
//! through [`PlayerEventBus`] receivers, on whatever thread reads them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Instant;

use anyhow::Context;
use crossbeam_channel::{Receiver, Sender, bounded, never, select, tick, unbounded};
use tracing::{debug, info, warn};

use crate::cache::EntityCache;
use crate::config::{BridgeConfig, MpdConfig};
use crate::connection::{AlbumResolver, MpdConnection};
use crate::errors::{ErrorKind, MpdConnectionError};
use crate::events::{PlayerEvent, PlayerEventBus};
use crate::model::{
    Album, Artist, AudioOutput, DirectoryEntry, EntityList, EntityType, Genre, PlayerState,
    Playlist, ServerDescriptor, ServerStats, Track, sort_by_name,
};
use crate::protocol::{Connector, TcpConnector};
use crate::watcher::PlaybackTracker;

type Result<T> = std::result::Result<T, MpdConnectionError>;
type Job = Box<dyn FnOnce(&mut BridgeState) + Send>;
type Reply<T> = Option<Sender<T>>;

enum Message {
    Job(Job),
    Initialize(Reply<Result<()>>),
    Deinitialize(Reply<()>),
    Reinitialize(Reply<Result<()>>),
    SetServer(ServerDescriptor, Reply<Result<()>>),
    /// Reinitialize requested by a failed job, tagged with the lifecycle
    /// generation it was requested in.
    Recover(u64),
    Shutdown,
}

/// Handle on a queued album path resolution.
///
/// Cancelling is cooperative: the job checks the flag before each protocol
/// step and reports `None` once it sees it. The handle stays valid after
/// the bridge reinitializes or is dropped.
#[derive(Clone, Debug, Default)]
pub struct WorkItem {
    cancelled: Arc<AtomicBool>,
}

impl WorkItem {
    fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Everything the worker owns.
struct BridgeState {
    connection: Option<MpdConnection>,
    server: Option<ServerDescriptor>,
    connector: Arc<dyn Connector>,
    config: BridgeConfig,
    cache: Arc<Mutex<EntityCache>>,
    tracker: PlaybackTracker,
    queue_tracks: Vec<Track>,
    ticker: Receiver<Instant>,
    connected: Arc<AtomicBool>,
    events: PlayerEventBus,
    requeue: Sender<Message>,
    /// Bumped by every deinitialize.
    generation: u64,
}

impl BridgeState {
    fn initialize(&mut self) -> Result<()> {
        if self.connection.as_ref().is_some_and(|c| c.is_connected()) {
            return Ok(());
        }
        let Some(server) = self.server.clone() else {
            return Err(MpdConnectionError::new(
                ErrorKind::InvalidServerParameters,
                "No MPD server configured",
            ));
        };

        let mut connection = MpdConnection::with_connector(server, Arc::clone(&self.connector));
        connection.set_connect_timeout(self.config.connect_timeout());
        if let Err(err) = connection.connect() {
            warn!("Bridge initialization failed: {}", err);
            return Err(err);
        }

        let cache = Arc::clone(&self.cache);
        let resolver: AlbumResolver = Arc::new(move |name: &str| {
            cache
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .album_named(name)
        });
        connection.set_album_resolver(Some(resolver));

        self.connection = Some(connection);
        self.ticker = tick(self.config.poll_interval());
        self.connected.store(true, Ordering::SeqCst);
        info!(
            interval_ms = self.config.poll_interval_ms,
            "MPD bridge connected, polling started"
        );
        Ok(())
    }

    fn deinitialize(&mut self) {
        self.generation += 1;
        self.ticker = never();
        self.connected.store(false, Ordering::SeqCst);
        if let Some(mut connection) = self.connection.take() {
            connection.set_album_resolver(None);
            connection.disconnect();
            info!("MPD bridge disconnected");
        }
    }

    fn reinitialize(&mut self) -> Result<()> {
        self.deinitialize();
        {
            let mut cache = self.cache();
            if !cache.is_empty() {
                debug!("Dropping cached entity lists");
                cache.clear();
            }
        }
        self.initialize()
    }

    fn set_server(&mut self, server: ServerDescriptor) -> Result<()> {
        info!("MPD server set to {}", server);
        self.server = Some(server);
        self.tracker.reset();
        self.queue_tracks.clear();
        self.reinitialize()
    }

    fn session(&mut self) -> Result<&mut MpdConnection> {
        self.connection
            .as_mut()
            .ok_or_else(MpdConnectionError::not_connected)
    }

    fn cache(&self) -> MutexGuard<'_, EntityCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues a reinitialize behind the jobs already waiting.
    fn request_reinitialize(&self, reason: &str) {
        warn!("Scheduling MPD bridge reinitialization: {}", reason);
        let _ = self.requeue.send(Message::Recover(self.generation));
    }

    fn poll(&mut self) {
        let match_album = !self.config.directory_based;
        let Some(connection) = self.connection.as_mut() else {
            return;
        };
        match connection.player_info(match_album) {
            Ok(Some(info)) => {
                for event in self.tracker.observe(info) {
                    self.events.broadcast(event);
                }
            }
            Ok(None) => {}
            Err(err) if match_album => debug!("Player poll failed: {}", err),
            Err(_) => {}
        }
    }

    fn handle(&mut self, message: Message) -> bool {
        match message {
            Message::Job(job) => job(self),
            Message::Initialize(reply) => respond(reply, self.initialize()),
            Message::Deinitialize(reply) => {
                self.deinitialize();
                respond(reply, ());
            }
            Message::Reinitialize(reply) => respond(reply, self.reinitialize()),
            Message::SetServer(server, reply) => respond(reply, self.set_server(server)),
            Message::Recover(generation) if generation == self.generation => {
                if let Err(err) = self.reinitialize() {
                    warn!("MPD bridge recovery failed: {}", err);
                }
            }
            Message::Recover(_) => {
                debug!("Bridge was deinitialized since recovery was requested, skipping");
            }
            Message::Shutdown => return false,
        }
        true
    }

    fn run(mut self, jobs: Receiver<Message>) {
        loop {
            let ticker = self.ticker.clone();
            select! {
                recv(jobs) -> message => match message {
                    Ok(message) => {
                        if !self.handle(message) {
                            break;
                        }
                    }
                    Err(_) => break,
                },
                recv(ticker) -> _ => self.poll(),
            }
        }
        self.deinitialize();
        debug!("MPD bridge worker stopped");
    }
}

fn respond<T>(reply: Reply<T>, value: T) {
    if let Some(reply) = reply {
        let _ = reply.send(value);
    }
}

/// Asynchronous front end of an MPD session.
pub struct MpdBridge {
    tx: Sender<Message>,
    connected: Arc<AtomicBool>,
    events: PlayerEventBus,
    worker: Option<JoinHandle<()>>,
    worker_id: ThreadId,
}

impl MpdBridge {
    pub fn new(config: &MpdConfig) -> anyhow::Result<Self> {
        Self::with_connector(config, Arc::new(TcpConnector))
    }

    /// Starts the worker. The bridge is not connected until
    /// [`MpdBridge::initialize`] succeeds.
    pub fn with_connector(config: &MpdConfig, connector: Arc<dyn Connector>) -> anyhow::Result<Self> {
        let (tx, rx) = unbounded();
        let connected = Arc::new(AtomicBool::new(false));
        let events = PlayerEventBus::new();

        let state = BridgeState {
            connection: None,
            server: config.server.clone(),
            connector,
            config: config.bridge.clone(),
            cache: Arc::new(Mutex::new(EntityCache::new())),
            tracker: PlaybackTracker::new(),
            queue_tracks: Vec::new(),
            ticker: never(),
            connected: Arc::clone(&connected),
            events: events.clone(),
            requeue: tx.clone(),
            generation: 0,
        };

        let worker = thread::Builder::new()
            .name("pmompd-bridge".into())
            .spawn(move || state.run(rx))
            .context("Failed to spawn MPD bridge worker")?;
        let worker_id = worker.thread().id();

        Ok(Self {
            tx,
            connected,
            events,
            worker: Some(worker),
            worker_id,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> Receiver<PlayerEvent> {
        self.events.subscribe()
    }

    // Lifecycle

    /// Connects and starts polling. Succeeds immediately when already
    /// connected.
    pub fn initialize(&self) -> Result<()> {
        self.lifecycle(Message::Initialize)
    }

    pub fn deinitialize(&self) {
        if self.on_worker() {
            let _ = self.tx.send(Message::Deinitialize(None));
            return;
        }
        let (tx, rx) = bounded(1);
        if self.tx.send(Message::Deinitialize(Some(tx))).is_ok() {
            let _ = rx.recv();
        }
    }

    /// Disconnects, drops every cached list and connects again.
    pub fn reinitialize(&self) -> Result<()> {
        self.lifecycle(Message::Reinitialize)
    }

    /// Switches to another server; the bridge reinitializes against it.
    pub fn set_server(&self, server: ServerDescriptor) -> Result<()> {
        self.lifecycle(|reply| Message::SetServer(server, reply))
    }

    pub fn enter_background(&self) {
        self.deinitialize();
    }

    pub fn enter_foreground(&self) -> Result<()> {
        self.reinitialize()
    }

    // Sync getters

    pub fn current_track(&self) -> Option<Track> {
        self.query("current_track", |state| state.tracker.current_track().cloned())
    }

    pub fn current_album(&self) -> Option<Album> {
        self.query("current_album", |state| state.tracker.current_album().cloned())
    }

    pub fn current_state(&self) -> PlayerState {
        self.query("current_state", |state| state.tracker.current_state())
    }

    /// Queue content as of the last [`MpdBridge::refresh_queue`].
    pub fn tracks_in_queue(&self) -> Vec<Track> {
        self.query("tracks_in_queue", |state| state.queue_tracks.clone())
    }

    // Entities

    /// Cached list when there is one, otherwise fetched, sorted and cached.
    /// Playlists are always fetched.
    pub fn entities_for_type<F>(&self, entity_type: EntityType, callback: F)
    where
        F: FnOnce(Result<EntityList>) + Send + 'static,
    {
        self.dispatch(move |state| callback(fetch_entities(state, entity_type)));
    }

    /// Fills every cacheable list that is not cached yet.
    pub fn prefetch_all_entities<F>(&self, callback: F)
    where
        F: FnOnce(Result<()>) + Send + 'static,
    {
        self.dispatch(move |state| {
            let mut outcome = Ok(());
            for entity_type in EntityType::CACHED {
                if let Err(err) = fetch_entities(state, entity_type) {
                    outcome = Err(err);
                    break;
                }
            }
            callback(outcome)
        });
    }

    pub fn albums_for_artist<F>(&self, artist: Artist, is_album_artist: bool, callback: F)
    where
        F: FnOnce(Result<Vec<Album>>) + Send + 'static,
    {
        self.dispatch(move |state| {
            let result = state
                .session()
                .and_then(|c| c.albums_for_artist(&artist, is_album_artist))
                .map(sorted_albums);
            if let Ok(albums) = &result {
                let mut artist = artist;
                artist.albums = Some(albums.clone());
                state.cache().update_artist(&artist, is_album_artist);
            }
            callback(result)
        });
    }

    pub fn albums_for_genre<F>(&self, genre: Genre, first_only: bool, callback: F)
    where
        F: FnOnce(Result<Vec<Album>>) + Send + 'static,
    {
        self.dispatch(move |state| {
            let result = state
                .session()
                .and_then(|c| c.albums_for_genre(&genre, first_only))
                .map(sorted_albums);
            // A first-only answer is a sample, not the genre's album list.
            if let (Ok(albums), false) = (&result, first_only) {
                let mut genre = genre;
                genre.albums = Some(albums.clone());
                state.cache().update_genre(&genre);
            }
            callback(result)
        });
    }

    pub fn artists_for_genre<F>(&self, genre: Genre, is_album_artist: bool, callback: F)
    where
        F: FnOnce(Result<Vec<Artist>>) + Send + 'static,
    {
        self.dispatch(move |state| {
            let result = state
                .session()
                .and_then(|c| c.artists_for_genre(&genre, is_album_artist))
                .map(|mut artists| {
                    sort_by_name(&mut artists, |a| &a.name);
                    artists
                });
            callback(result)
        });
    }

    /// Looks up the album directory and hands back the updated album.
    pub fn path_for_album<F>(&self, album: Album, callback: F)
    where
        F: FnOnce(Result<Album>) + Send + 'static,
    {
        self.dispatch(move |state| {
            let result = state.session().and_then(|c| c.path_for_album(&album));
            callback(result.map(|path| {
                let mut album = album;
                album.path = path;
                state.cache().update_album(&album);
                album
            }))
        });
    }

    /// Cancellable variant of [`MpdBridge::path_for_album`]. The callback
    /// receives `None` when the item was cancelled or the path is unknown.
    pub fn resolve_album_path<F>(&self, album: Album, callback: F) -> Option<WorkItem>
    where
        F: FnOnce(Option<String>) + Send + 'static,
    {
        let item = WorkItem::new();
        let flag = item.clone();
        let queued = self.dispatch(move |state| {
            if flag.is_cancelled() {
                debug!("Path resolution for {} cancelled before start", album.name);
                callback(None);
                return;
            }
            let result = match state.connection.as_mut() {
                Some(c) => c.path_for_album_cancellable(&album, &|| flag.is_cancelled()),
                None => Ok(None),
            };
            match result {
                Ok(Some(path)) => {
                    let mut album = album;
                    album.path = Some(path.clone());
                    state.cache().update_album(&album);
                    callback(Some(path));
                }
                Ok(None) => {
                    if flag.is_cancelled() {
                        debug!("Path resolution for {} cancelled", album.name);
                    }
                    callback(None);
                }
                Err(err) => {
                    debug!("Path resolution for {} failed: {}", album.name, err);
                    callback(None);
                }
            }
        });
        queued.then_some(item)
    }

    /// Fetches the tracks of each album in turn; the callback runs once per
    /// album with the album carrying its tracks.
    pub fn tracks_for_albums<F>(&self, albums: Vec<Album>, mut callback: F)
    where
        F: FnMut(Result<Album>) + Send + 'static,
    {
        self.dispatch(move |state| {
            for mut album in albums {
                let result = state.session().and_then(|c| c.tracks_for_album(&album));
                match result {
                    Ok(tracks) => {
                        album.tracks = Some(tracks);
                        state.cache().update_album(&album);
                        callback(Ok(album));
                    }
                    Err(err) => {
                        album.tracks = None;
                        state.cache().update_album(&album);
                        callback(Err(err));
                    }
                }
            }
        });
    }

    pub fn tracks_for_playlist<F>(&self, playlist: Playlist, callback: F)
    where
        F: FnOnce(Result<Playlist>) + Send + 'static,
    {
        self.dispatch(move |state| {
            let result = state.session().and_then(|c| c.tracks_for_playlist(&playlist));
            callback(result.map(|tracks| {
                let mut playlist = playlist;
                playlist.tracks = Some(tracks);
                playlist
            }))
        });
    }

    /// Fills artist, year and genre of the album. A lost link schedules a
    /// reinitialize before the callback runs.
    pub fn metadata_for_album<F>(&self, album: Album, callback: F)
    where
        F: FnOnce(Result<Album>) + Send + 'static,
    {
        self.dispatch(move |state| {
            let result = state.session().and_then(|c| c.metadata_for_album(&album));
            match result {
                Ok(metadata) => {
                    let mut album = album;
                    if let Some(artist) = metadata.artist {
                        album.artist = artist;
                    }
                    if let Some(year) = metadata.year {
                        album.year = year;
                    }
                    if let Some(genre) = metadata.genre {
                        album.genre = genre;
                    }
                    state.cache().update_album(&album);
                    callback(Ok(album));
                }
                Err(err) => {
                    if err.connection_lost() {
                        state.request_reinitialize("metadata lookup lost the connection");
                    }
                    callback(Err(err));
                }
            }
        });
    }

    pub fn directory_list<F>(&self, path: Option<String>, callback: F)
    where
        F: FnOnce(Result<Vec<DirectoryEntry>>) + Send + 'static,
    {
        self.run(
            move |c| {
                let mut entries = c.directory_list(path.as_deref())?;
                sort_by_name(&mut entries, |e| &e.name);
                Ok(entries)
            },
            callback,
        );
    }

    pub fn cover_for_directory<F>(&self, path: String, callback: F)
    where
        F: FnOnce(Result<Vec<u8>>) + Send + 'static,
    {
        self.run(move |c| c.cover_for_directory(&path), callback);
    }

    // Playlists

    /// A failed creation schedules a reinitialize before the callback runs.
    pub fn create_playlist<F>(&self, name: String, callback: F)
    where
        F: FnOnce(Result<()>) + Send + 'static,
    {
        self.dispatch(move |state| {
            let result = state.session().and_then(|c| c.create_playlist(&name));
            if result.is_err() {
                state.request_reinitialize("playlist creation failed");
            }
            callback(result)
        });
    }

    pub fn delete_playlist<F>(&self, name: String, callback: F)
    where
        F: FnOnce(Result<()>) + Send + 'static,
    {
        self.run(move |c| c.delete_playlist(&name), callback);
    }

    pub fn rename_playlist<F>(&self, playlist: Playlist, new_name: String, callback: F)
    where
        F: FnOnce(Result<()>) + Send + 'static,
    {
        self.run(move |c| c.rename_playlist(&playlist, &new_name), callback);
    }

    pub fn add_track_to_playlist<F>(&self, track: Track, playlist: Playlist, callback: F)
    where
        F: FnOnce(Result<()>) + Send + 'static,
    {
        self.run(move |c| c.add_track_to_playlist(&track, &playlist), callback);
    }

    pub fn remove_track_from_playlist<F>(&self, track: Track, playlist: Playlist, callback: F)
    where
        F: FnOnce(Result<()>) + Send + 'static,
    {
        self.run(move |c| c.remove_track_from_playlist(&track, &playlist), callback);
    }

    // Queue and playback

    /// Reloads the queue content returned by [`MpdBridge::tracks_in_queue`].
    pub fn refresh_queue<F>(&self, callback: F)
    where
        F: FnOnce(Result<Vec<Track>>) + Send + 'static,
    {
        self.dispatch(move |state| {
            let result = state.session().and_then(|c| c.current_queue_songs());
            if let Ok(tracks) = &result {
                state.queue_tracks = tracks.clone();
            }
            callback(result)
        });
    }

    pub fn play_album(&self, album: Album, shuffle: bool, repeat: bool) {
        self.fire("play_album", move |c| c.play_album(&album, shuffle, repeat));
    }

    pub fn play_tracks(&self, tracks: Vec<Track>, shuffle: bool, repeat: bool) {
        self.fire("play_tracks", move |c| c.play_tracks(&tracks, shuffle, repeat));
    }

    pub fn play_playlist(&self, playlist: Playlist, shuffle: bool, repeat: bool, position: u32) {
        self.fire("play_playlist", move |c| {
            c.play_playlist(&playlist, shuffle, repeat, position)
        });
    }

    pub fn play_track_at_position(&self, position: u32) {
        self.fire("play_track_at_position", move |c| {
            c.play_track_at_position(position)
        });
    }

    pub fn add_album_to_queue(&self, album: Album) {
        self.fire("add_album_to_queue", move |c| c.add_album_to_queue(&album));
    }

    pub fn play(&self) {
        self.fire("play", |c| c.play());
    }

    pub fn toggle_pause(&self) {
        self.fire("toggle_pause", |c| c.toggle_pause());
    }

    pub fn stop(&self) {
        self.fire("stop", |c| c.stop());
    }

    pub fn next_track(&self) {
        self.fire("next_track", |c| c.next_track());
    }

    pub fn previous_track(&self) {
        self.fire("previous_track", |c| c.previous_track());
    }

    pub fn set_random(&self, random: bool) {
        self.fire("set_random", move |c| c.set_random(random));
    }

    pub fn set_repeat(&self, repeat: bool) {
        self.fire("set_repeat", move |c| c.set_repeat(repeat));
    }

    pub fn set_track_position(&self, seconds: u32, track_position: u32) {
        self.fire("set_track_position", move |c| {
            c.set_track_position(seconds, track_position)
        });
    }

    pub fn set_volume<F>(&self, volume: u32, callback: F)
    where
        F: FnOnce(Result<()>) + Send + 'static,
    {
        self.run(move |c| c.set_volume(volume), callback);
    }

    pub fn volume<F>(&self, callback: F)
    where
        F: FnOnce(Result<i32>) + Send + 'static,
    {
        self.run(|c| c.volume(), callback);
    }

    // Server

    pub fn update_database<F>(&self, callback: F)
    where
        F: FnOnce(Result<()>) + Send + 'static,
    {
        self.run(|c| c.update_database(), callback);
    }

    pub fn stats<F>(&self, callback: F)
    where
        F: FnOnce(Result<ServerStats>) + Send + 'static,
    {
        self.run(|c| c.stats(), callback);
    }

    pub fn available_outputs<F>(&self, callback: F)
    where
        F: FnOnce(Result<Vec<AudioOutput>>) + Send + 'static,
    {
        self.run(|c| c.available_outputs(), callback);
    }

    pub fn toggle_output<F>(&self, output: AudioOutput, callback: F)
    where
        F: FnOnce(Result<()>) + Send + 'static,
    {
        self.run(move |c| c.toggle_output(&output), callback);
    }

    // Plumbing

    fn on_worker(&self) -> bool {
        thread::current().id() == self.worker_id
    }

    /// Queues a job unless the bridge is disconnected. Returns whether the
    /// job was queued.
    fn dispatch<F>(&self, job: F) -> bool
    where
        F: FnOnce(&mut BridgeState) + Send + 'static,
    {
        if !self.is_connected() {
            debug!("MPD bridge not connected, operation dropped");
            return false;
        }
        if self.tx.send(Message::Job(Box::new(job))).is_err() {
            warn!("MPD bridge worker is gone, operation dropped");
            return false;
        }
        true
    }

    /// One session call whose result goes to the callback.
    fn run<T, Op, F>(&self, op: Op, callback: F)
    where
        T: 'static,
        Op: FnOnce(&mut MpdConnection) -> Result<T> + Send + 'static,
        F: FnOnce(Result<T>) + Send + 'static,
    {
        self.dispatch(move |state| callback(state.session().and_then(op)));
    }

    /// One session call whose failure is only logged.
    fn fire<Op>(&self, what: &'static str, op: Op)
    where
        Op: FnOnce(&mut MpdConnection) -> Result<()> + Send + 'static,
    {
        self.dispatch(move |state| {
            if let Err(err) = state.session().and_then(op) {
                warn!(operation = what, "MPD command failed: {}", err);
            }
        });
    }

    /// Runs `read` on the worker and waits for the answer. From the worker
    /// itself (inside a callback) this would deadlock, so the default is
    /// returned instead.
    fn query<T, R>(&self, what: &str, read: R) -> T
    where
        T: Default + Send + 'static,
        R: FnOnce(&BridgeState) -> T + Send + 'static,
    {
        if self.on_worker() {
            warn!("{} called from the bridge worker, returning default", what);
            return T::default();
        }
        let (tx, rx) = bounded(1);
        let job: Job = Box::new(move |state| {
            let _ = tx.send(read(state));
        });
        if self.tx.send(Message::Job(job)).is_err() {
            return T::default();
        }
        rx.recv().unwrap_or_default()
    }

    fn lifecycle(&self, make: impl FnOnce(Reply<Result<()>>) -> Message) -> Result<()> {
        let gone = || MpdConnectionError::new(ErrorKind::ConnectionFailure, "MPD bridge worker is gone");
        if self.on_worker() {
            return self.tx.send(make(None)).map_err(|_| gone());
        }
        let (tx, rx) = bounded(1);
        self.tx.send(make(Some(tx))).map_err(|_| gone())?;
        rx.recv().map_err(|_| gone())?
    }
}

impl Drop for MpdBridge {
    fn drop(&mut self) {
        let _ = self.tx.send(Message::Shutdown);
        if let Some(worker) = self.worker.take() {
            if self.on_worker() {
                return;
            }
            let _ = worker.join();
        }
    }
}

fn fetch_entities(state: &mut BridgeState, entity_type: EntityType) -> Result<EntityList> {
    if let Some(list) = state.cache().get(entity_type) {
        return Ok(list);
    }
    let mut list = state.session()?.list_entities(entity_type)?;
    list.sort_by_name();
    state.cache().set(entity_type, list.clone());
    debug!(
        entity_type = ?entity_type,
        count = list.len(),
        "Fetched entity list"
    );
    Ok(list)
}

fn sorted_albums(mut albums: Vec<Album>) -> Vec<Album> {
    sort_by_name(&mut albums, |a| &a.name);
    albums
}
