//! Playback change detection for the bridge poller.
//!
//! MPD is polled, not subscribed to: every tick the bridge fetches a
//! [`PlayerInfo`] and hands it to a [`PlaybackTracker`], which compares it
//! with what was seen on the previous tick and returns the events to publish.
//!
//! The first observation only establishes the baseline. Nothing "changed"
//! yet at that point, so it yields a single `NowPlaying`.

use crate::events::PlayerEvent;
use crate::model::{Album, PlayerInfo, PlayerState, PlayerStatus, Track};

/// Last known playback state, kept between ticks.
#[derive(Clone, Default, Debug)]
pub struct PlaybackTracker {
    track: Option<Track>,
    album: Option<Album>,
    state: PlayerState,
}

impl PlaybackTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.track.as_ref()
    }

    pub fn current_album(&self) -> Option<&Album> {
        self.album.as_ref()
    }

    pub fn current_state(&self) -> PlayerState {
        self.state
    }

    /// Records a tick and returns the events it produces, in publishing
    /// order: `TrackChanged`, then `StatusChanged`, then `NowPlaying`.
    pub fn observe(&mut self, info: PlayerInfo) -> Vec<PlayerEvent> {
        let mut events = Vec::with_capacity(3);

        if let Some(previous) = &self.track {
            if track_changed(previous, &info.track) {
                events.push(PlayerEvent::TrackChanged(info.clone()));
            }
            if status_changed(self.state.status, info.status) {
                events.push(PlayerEvent::StatusChanged(info.clone()));
            }
        }

        self.state = info.state();
        self.track = Some(info.track.clone());
        self.album = Some(info.album.clone());
        events.push(PlayerEvent::NowPlaying(info));
        events
    }

    /// Forgets everything, the next tick becomes a new baseline.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Queue entries are identified by URI and position, so replaying the same
/// file from another queue slot counts as a change.
pub fn track_changed(previous: &Track, current: &Track) -> bool {
    !previous.same_entry(current)
}

pub fn status_changed(previous: PlayerStatus, current: PlayerStatus) -> bool {
    previous != current
}
