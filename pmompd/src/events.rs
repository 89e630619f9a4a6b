use std::sync::{Arc, Mutex};

use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::model::PlayerInfo;

/// Notifications published by the bridge poller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlayerEvent {
    /// The playing queue entry is not the one seen on the previous tick.
    TrackChanged(PlayerInfo),
    /// Playing / paused / stopped changed since the previous tick.
    StatusChanged(PlayerInfo),
    /// Published on every successful tick.
    NowPlaying(PlayerInfo),
}

impl PlayerEvent {
    pub fn info(&self) -> &PlayerInfo {
        match self {
            PlayerEvent::TrackChanged(info)
            | PlayerEvent::StatusChanged(info)
            | PlayerEvent::NowPlaying(info) => info,
        }
    }
}

/// Fan-out of [`PlayerEvent`]s. Each subscriber gets its own unbounded
/// receiver; dropped receivers are pruned on the next broadcast.
#[derive(Clone, Default)]
pub struct PlayerEventBus {
    subscribers: Arc<Mutex<Vec<Sender<PlayerEvent>>>>,
}

impl PlayerEventBus {
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn subscribe(&self) -> Receiver<PlayerEvent> {
        let (tx, rx) = unbounded::<PlayerEvent>();
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.push(tx);
        }
        rx
    }

    pub(crate) fn broadcast(&self, event: PlayerEvent) {
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        }
    }
}
