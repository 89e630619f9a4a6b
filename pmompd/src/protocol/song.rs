use std::time::Duration;

use super::Pair;

/// A song record as sent by the server: the `file` line followed by its tags.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Song {
    pub uri: String,
    attributes: Vec<Pair>,
}

impl Song {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            attributes: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, pair: Pair) {
        self.attributes.push(pair);
    }

    /// First value of the given tag, compared case-insensitively.
    pub fn tag(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|p| p.key.eq_ignore_ascii_case(name))
            .map(|p| p.value.as_str())
    }

    /// `duration` (float seconds) when present, else the legacy `Time` field.
    pub fn duration(&self) -> Duration {
        if let Some(secs) = self.tag("duration").and_then(|v| v.parse::<f64>().ok()) {
            if secs.is_finite() && secs >= 0.0 {
                return Duration::from_secs_f64(secs);
            }
        }
        self.tag("Time")
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or_default()
    }

    /// Queue position, 0 for songs outside the queue.
    pub fn position(&self) -> u32 {
        self.tag("Pos").and_then(|v| v.parse().ok()).unwrap_or(0)
    }
}

/// Entries of a directory or stored playlist listing.
#[derive(Clone, Debug, PartialEq)]
pub enum Entity {
    Directory(String),
    Song(Song),
    Playlist(String),
}

pub(crate) fn is_entity_start(key: &str) -> bool {
    matches!(key, "file" | "directory" | "playlist")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song_with(pairs: &[(&str, &str)]) -> Song {
        let mut song = Song::new("music/a.flac");
        for (k, v) in pairs {
            song.push(Pair::new(k, v));
        }
        song
    }

    #[test]
    fn test_tag_lookup_is_case_insensitive() {
        let song = song_with(&[("Title", "Blue"), ("AlbumArtist", "Miles")]);
        assert_eq!(song.tag("title"), Some("Blue"));
        assert_eq!(song.tag("albumartist"), Some("Miles"));
        assert_eq!(song.tag("genre"), None);
    }

    #[test]
    fn test_duration_prefers_float_field() {
        let song = song_with(&[("Time", "200"), ("duration", "199.500")]);
        assert_eq!(song.duration(), Duration::from_millis(199_500));

        let legacy = song_with(&[("Time", "42")]);
        assert_eq!(legacy.duration(), Duration::from_secs(42));

        assert_eq!(song_with(&[]).duration(), Duration::ZERO);
    }

    #[test]
    fn test_position_defaults_to_zero() {
        assert_eq!(song_with(&[("Pos", "7")]).position(), 7);
        assert_eq!(song_with(&[]).position(), 0);
    }
}
