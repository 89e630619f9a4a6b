use super::command::Command;

#[derive(Clone, Debug, PartialEq, Eq)]
enum SearchKind {
    /// `find` (exact) or `search` (substring) over songs.
    Songs { exact: bool },
    /// `list <tag>`: distinct values of one tag.
    Tags { tag: String },
}

/// A search being assembled on a connection.
///
/// Mirrors the classic client-library flow: a search is started, constraints
/// are added locally, then the whole request is committed as one command.
/// Until commit nothing has been written to the socket, so cancelling only
/// discards this value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Search {
    kind: SearchKind,
    constraints: Vec<(String, String)>,
}

impl Search {
    pub fn songs(exact: bool) -> Self {
        Self {
            kind: SearchKind::Songs { exact },
            constraints: Vec::new(),
        }
    }

    pub fn tags(tag: &str) -> Self {
        Self {
            kind: SearchKind::Tags {
                tag: tag.to_string(),
            },
            constraints: Vec::new(),
        }
    }

    pub fn add_tag_constraint(&mut self, tag: &str, value: &str) {
        self.constraints.push((tag.to_string(), value.to_string()));
    }

    /// URI constraints use the special `file` tag.
    pub fn add_uri_constraint(&mut self, uri: &str) {
        self.add_tag_constraint("file", uri);
    }

    pub fn to_command(&self) -> Command {
        let mut cmd = match &self.kind {
            SearchKind::Songs { exact: true } => Command::new("find"),
            SearchKind::Songs { exact: false } => Command::new("search"),
            SearchKind::Tags { tag } => Command::new("list").raw(tag),
        };
        for (tag, value) in &self.constraints {
            cmd = cmd.raw(tag).arg(value);
        }
        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_song_search_command() {
        let mut search = Search::songs(true);
        search.add_tag_constraint("album", "Kind of Blue");
        search.add_tag_constraint("albumartist", "Miles Davis");
        assert_eq!(
            search.to_command().to_line(),
            "find album \"Kind of Blue\" albumartist \"Miles Davis\""
        );
    }

    #[test]
    fn test_tag_listing_command() {
        let mut search = Search::tags("artist");
        search.add_tag_constraint("genre", "Jazz");
        assert_eq!(search.to_command().to_line(), "list artist genre \"Jazz\"");
        assert_eq!(Search::tags("genre").to_command().to_line(), "list genre");
    }

    #[test]
    fn test_uri_constraint() {
        let mut search = Search::songs(false);
        search.add_uri_constraint("a/b.mp3");
        assert_eq!(search.to_command().to_line(), "search file \"a/b.mp3\"");
    }
}
