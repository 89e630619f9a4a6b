use std::fmt;
use std::io;

use thiserror::Error;

/// What went wrong, grouped by the operation that failed.
///
/// The first four variants are connection-level failures; the others are
/// produced by exactly one kind of session operation so callers can tell
/// failure causes apart without parsing messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    // Connection
    InvalidServerParameters,
    InvalidPassword,
    ConnectionFailure,
    OutOfMemory,
    // Operations
    SearchError,
    ClearError,
    AddError,
    RemoveError,
    PlayError,
    CreatePlaylistError,
    DeletePlaylistError,
    RenamePlaylistError,
    LoadPlaylistError,
    TogglePlayPauseError,
    ToggleRandomError,
    ToggleRepeatError,
    ChangeTrackError,
    ChangePositionError,
    ChangeVolumeError,
    GetStatusError,
    UpdateError,
    NotPlaying,
    GetOutputsError,
    ToggleOutputError,
    GetStatsError,
    GetDirectoryListError,
    GetDirectoryCoverError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidServerParameters => "invalid server parameters",
            ErrorKind::InvalidPassword => "invalid password",
            ErrorKind::ConnectionFailure => "connection failure",
            ErrorKind::OutOfMemory => "out of memory",
            ErrorKind::SearchError => "search error",
            ErrorKind::ClearError => "clear error",
            ErrorKind::AddError => "add error",
            ErrorKind::RemoveError => "remove error",
            ErrorKind::PlayError => "play error",
            ErrorKind::CreatePlaylistError => "create playlist error",
            ErrorKind::DeletePlaylistError => "delete playlist error",
            ErrorKind::RenamePlaylistError => "rename playlist error",
            ErrorKind::LoadPlaylistError => "load playlist error",
            ErrorKind::TogglePlayPauseError => "toggle play/pause error",
            ErrorKind::ToggleRandomError => "toggle random error",
            ErrorKind::ToggleRepeatError => "toggle repeat error",
            ErrorKind::ChangeTrackError => "change track error",
            ErrorKind::ChangePositionError => "change position error",
            ErrorKind::ChangeVolumeError => "change volume error",
            ErrorKind::GetStatusError => "get status error",
            ErrorKind::UpdateError => "update error",
            ErrorKind::NotPlaying => "not playing",
            ErrorKind::GetOutputsError => "get outputs error",
            ErrorKind::ToggleOutputError => "toggle output error",
            ErrorKind::GetStatsError => "get stats error",
            ErrorKind::GetDirectoryListError => "get directory list error",
            ErrorKind::GetDirectoryCoverError => "get directory cover error",
        }
    }

    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            ErrorKind::InvalidServerParameters
                | ErrorKind::InvalidPassword
                | ErrorKind::ConnectionFailure
                | ErrorKind::OutOfMemory
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by every [`MpdConnection`](crate::MpdConnection) operation.
///
/// `message` is the server's last error text when there is one, otherwise a
/// description of the local failure.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct MpdConnectionError {
    pub kind: ErrorKind,
    pub message: String,
    connection_lost: bool,
}

impl MpdConnectionError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            connection_lost: false,
        }
    }

    /// Builds an error from a codec failure, keeping track of whether the
    /// link itself is gone.
    pub(crate) fn from_protocol(kind: ErrorKind, err: &ProtocolError) -> Self {
        Self {
            kind,
            message: err.to_string(),
            connection_lost: err.is_connection_lost(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// True when the transport failed (I/O error, EOF, garbled framing)
    /// rather than the server rejecting the command.
    pub fn connection_lost(&self) -> bool {
        self.connection_lost
    }

    pub(crate) fn not_connected() -> Self {
        Self {
            kind: ErrorKind::ConnectionFailure,
            message: "No connection to MPD".to_string(),
            connection_lost: true,
        }
    }
}

/// Low-level failures of the MPD line codec.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("connection closed by server")]
    Closed,
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("{message}")]
    Ack {
        code: u32,
        command_index: u32,
        command: String,
        message: String,
    },
    #[error("a search is already in progress")]
    SearchInProgress,
    #[error("no search in progress")]
    NoSearch,
}

impl ProtocolError {
    pub fn is_connection_lost(&self) -> bool {
        matches!(
            self,
            ProtocolError::Io(_)
                | ProtocolError::Closed
                | ProtocolError::Malformed(_)
        )
    }
}
