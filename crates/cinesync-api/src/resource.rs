//! Logical resource kinds fetched from the upstream providers.

use std::fmt;

/// Movie listing endpoint served page by page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MovieList {
    /// `discover/movie`.
    Discover,
    /// `movie/now_playing`.
    NowPlaying,
    /// `movie/upcoming`.
    Upcoming,
    /// `movie/popular`.
    Popular,
}

impl MovieList {
    /// Returns the endpoint path relative to the API base URL.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Discover => "discover/movie",
            Self::NowPlaying => "movie/now_playing",
            Self::Upcoming => "movie/upcoming",
            Self::Popular => "movie/popular",
        }
    }

    /// Whether the endpoint accepts a `region` filter.
    #[must_use]
    pub const fn accepts_region(self) -> bool {
        !matches!(self, Self::Discover)
    }

    /// Parses the config/CLI name of a list (`discover`, `now_playing`, ...).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "discover" => Some(Self::Discover),
            "now_playing" => Some(Self::NowPlaying),
            "upcoming" => Some(Self::Upcoming),
            "popular" => Some(Self::Popular),
            _ => None,
        }
    }

    /// Config/CLI name of the list.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Discover => "discover",
            Self::NowPlaying => "now_playing",
            Self::Upcoming => "upcoming",
            Self::Popular => "popular",
        }
    }
}

/// A kind of upstream resource, used to label fetches in logs and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// One page of a movie listing.
    MovieList(MovieList),
    /// Movie genre list.
    MovieGenres,
    /// TV genre list.
    TvGenres,
    /// Streaming platform list for a region.
    WatchProviderList,
    /// Streaming availability of one movie.
    MovieWatchProviders,
    /// Images of one movie.
    MovieImages,
    /// Videos of one movie.
    MovieVideos,
    /// Cast and crew of one movie.
    MovieCredits,
    /// Detail record of one movie.
    MovieDetails,
    /// Movie title search.
    SearchMovie,
    /// KOFIC daily box-office ranking.
    DailyBoxOffice,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MovieList(list) => list.path(),
            Self::MovieGenres => "genre/movie/list",
            Self::TvGenres => "genre/tv/list",
            Self::WatchProviderList => "watch/providers/movie",
            Self::MovieWatchProviders => "movie/{id}/watch/providers",
            Self::MovieImages => "movie/{id}/images",
            Self::MovieVideos => "movie/{id}/videos",
            Self::MovieCredits => "movie/{id}/credits",
            Self::MovieDetails => "movie/{id}",
            Self::SearchMovie => "search/movie",
            Self::DailyBoxOffice => "searchDailyBoxOfficeList",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_movie_list_names_roundtrip() {
        // Arrange
        let lists = [
            MovieList::Discover,
            MovieList::NowPlaying,
            MovieList::Upcoming,
            MovieList::Popular,
        ];

        // Act & Assert
        for list in lists {
            assert_eq!(MovieList::from_name(list.name()), Some(list));
        }
        assert_eq!(MovieList::from_name("trending"), None);
    }

    #[test]
    fn test_only_discover_rejects_region() {
        // Arrange & Act & Assert
        assert!(!MovieList::Discover.accepts_region());
        assert!(MovieList::Upcoming.accepts_region());
    }

    #[test]
    fn test_resource_kind_display() {
        // Arrange & Act
        let label = ResourceKind::MovieList(MovieList::NowPlaying).to_string();

        // Assert
        assert_eq!(label, "movie/now_playing");
        assert_eq!(ResourceKind::MovieCredits.to_string(), "movie/{id}/credits");
    }
}
