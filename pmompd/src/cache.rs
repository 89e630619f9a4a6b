use tracing::warn;

use crate::model::{Album, Artist, EntityList, EntityType, Genre};

/// Per-type entity lists kept by the bridge.
///
/// Lists are replaced wholesale when fetched. Albums, artists and genres are
/// then enriched in place as lazy lookups complete (paths, tracks, metadata,
/// album lists), so later queries see what earlier ones learned. Playlists
/// are never cached since they change from the client side.
#[derive(Clone, Debug, Default)]
pub struct EntityCache {
    albums: Option<Vec<Album>>,
    artists: Option<Vec<Artist>>,
    album_artists: Option<Vec<Artist>>,
    genres: Option<Vec<Genre>>,
}

impl EntityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, entity_type: EntityType) -> Option<EntityList> {
        match entity_type {
            EntityType::Albums => self.albums.clone().map(EntityList::Albums),
            EntityType::Artists => self.artists.clone().map(EntityList::Artists),
            EntityType::AlbumArtists => self.album_artists.clone().map(EntityList::Artists),
            EntityType::Genres => self.genres.clone().map(EntityList::Genres),
            EntityType::Playlists => None,
        }
    }

    pub fn contains(&self, entity_type: EntityType) -> bool {
        match entity_type {
            EntityType::Albums => self.albums.is_some(),
            EntityType::Artists => self.artists.is_some(),
            EntityType::AlbumArtists => self.album_artists.is_some(),
            EntityType::Genres => self.genres.is_some(),
            EntityType::Playlists => false,
        }
    }

    /// Stores a freshly fetched list. Lists that do not match the entity type
    /// (and playlists) are ignored.
    pub fn set(&mut self, entity_type: EntityType, list: EntityList) {
        match (entity_type, list) {
            (EntityType::Albums, EntityList::Albums(v)) => self.albums = Some(v),
            (EntityType::Artists, EntityList::Artists(v)) => self.artists = Some(v),
            (EntityType::AlbumArtists, EntityList::Artists(v)) => self.album_artists = Some(v),
            (EntityType::Genres, EntityList::Genres(v)) => self.genres = Some(v),
            (EntityType::Playlists, _) => {}
            (entity_type, list) => {
                warn!(
                    "Refusing to cache {} entries under {:?}",
                    list.len(),
                    entity_type
                );
            }
        }
    }

    /// First cached album with that exact name.
    pub fn album_named(&self, name: &str) -> Option<Album> {
        self.albums
            .as_ref()
            .and_then(|albums| albums.iter().find(|a| a.name == name))
            .cloned()
    }

    /// Replaces the cached album with the same name (and artist, when the
    /// cached entry has one).
    pub fn update_album(&mut self, album: &Album) {
        let Some(albums) = self.albums.as_mut() else {
            return;
        };
        if let Some(slot) = albums
            .iter_mut()
            .find(|a| a.name == album.name && (a.artist.is_empty() || a.artist == album.artist))
        {
            *slot = album.clone();
        }
    }

    pub fn update_artist(&mut self, artist: &Artist, is_album_artist: bool) {
        let list = if is_album_artist {
            self.album_artists.as_mut()
        } else {
            self.artists.as_mut()
        };
        if let Some(slot) = list.and_then(|l| l.iter_mut().find(|a| a.name == artist.name)) {
            *slot = artist.clone();
        }
    }

    pub fn update_genre(&mut self, genre: &Genre) {
        if let Some(slot) = self
            .genres
            .as_mut()
            .and_then(|l| l.iter_mut().find(|g| g.name == genre.name))
        {
            *slot = genre.clone();
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_empty(&self) -> bool {
        EntityType::CACHED.iter().all(|t| !self.contains(*t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Playlist;

    #[test]
    fn test_cache_starts_empty() {
        let cache = EntityCache::new();
        assert!(cache.is_empty());
        assert_eq!(cache.get(EntityType::Albums), None);
    }

    #[test]
    fn test_playlists_are_never_cached() {
        let mut cache = EntityCache::new();
        cache.set(
            EntityType::Playlists,
            EntityList::Playlists(vec![Playlist::new("Road")]),
        );
        assert!(!cache.contains(EntityType::Playlists));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_mismatched_list_is_ignored() {
        let mut cache = EntityCache::new();
        cache.set(EntityType::Albums, EntityList::Genres(vec![Genre::new("Jazz")]));
        assert!(!cache.contains(EntityType::Albums));
    }

    #[test]
    fn test_artists_and_album_artists_are_separate() {
        let mut cache = EntityCache::new();
        cache.set(EntityType::Artists, EntityList::Artists(vec![Artist::new("A")]));
        assert!(cache.contains(EntityType::Artists));
        assert!(!cache.contains(EntityType::AlbumArtists));
    }

    #[test]
    fn test_update_album_in_place() {
        let mut cache = EntityCache::new();
        cache.set(
            EntityType::Albums,
            EntityList::Albums(vec![Album::new("Blue"), Album::new("Hejira")]),
        );
        let mut blue = Album::new("Blue");
        blue.path = Some("Joni/Blue".to_string());
        blue.artist = "Joni Mitchell".to_string();
        cache.update_album(&blue);

        assert_eq!(cache.album_named("Blue"), Some(blue));
        assert_eq!(cache.album_named("Hejira").and_then(|a| a.path), None);
    }

    #[test]
    fn test_update_artist_albums() {
        let mut cache = EntityCache::new();
        cache.set(
            EntityType::AlbumArtists,
            EntityList::Artists(vec![Artist::new("Joni")]),
        );
        let mut joni = Artist::new("Joni");
        joni.albums = Some(vec![Album::new("Blue")]);
        cache.update_artist(&joni, true);

        match cache.get(EntityType::AlbumArtists) {
            Some(EntityList::Artists(list)) => assert_eq!(list[0].albums.as_ref().map(Vec::len), Some(1)),
            other => panic!("unexpected cache content: {other:?}"),
        }
    }

    #[test]
    fn test_clear() {
        let mut cache = EntityCache::new();
        cache.set(EntityType::Genres, EntityList::Genres(vec![Genre::new("Jazz")]));
        cache.clear();
        assert!(cache.is_empty());
    }
}
