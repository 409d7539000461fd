use std::fmt;
use std::str::FromStr;

use rusqlite::{params_from_iter, types::Value, Connection};
use serde::{Deserialize, Serialize};

use crate::database::models::Album;
use crate::error::{StorageFault, StorageResult};
use crate::ingest::hasher;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlbumListType {
    Random,
    Newest,
    Frequent,
    Recent,
    Starred,
    AlphabeticalByName,
    AlphabeticalByArtist,
    YearRange,
    Genre,
}

impl AlbumListType {
    const ALL: [AlbumListType; 9] = [
        AlbumListType::Random,
        AlbumListType::Newest,
        AlbumListType::Frequent,
        AlbumListType::Recent,
        AlbumListType::Starred,
        AlbumListType::AlphabeticalByName,
        AlbumListType::AlphabeticalByArtist,
        AlbumListType::YearRange,
        AlbumListType::Genre,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AlbumListType::Random => "random",
            AlbumListType::Newest => "newest",
            AlbumListType::Frequent => "frequent",
            AlbumListType::Recent => "recent",
            AlbumListType::Starred => "starred",
            AlbumListType::AlphabeticalByName => "alphabetical_by_name",
            AlbumListType::AlphabeticalByArtist => "alphabetical_by_artist",
            AlbumListType::YearRange => "year_range",
            AlbumListType::Genre => "genre",
        }
    }
}

impl fmt::Display for AlbumListType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlbumListType {
    type Err = StorageFault;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AlbumListType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| StorageFault::UnknownKey(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// Logical parameters of an album listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlbumSearchQuery {
    pub list_type: AlbumListType,
    /// Inclusive; a reversed range lists newest years first.
    pub year_range: Option<(i64, i64)>,
    pub genre: Option<String>,
    #[serde(default)]
    pub sort_direction: SortDirection,
}

impl AlbumSearchQuery {
    pub fn new(list_type: AlbumListType) -> Self {
        Self {
            list_type,
            year_range: None,
            genre: None,
            sort_direction: SortDirection::Ascending,
        }
    }

    pub fn with_year_range(mut self, from: i64, to: i64) -> Self {
        self.year_range = Some((from, to));
        self
    }

    pub fn with_genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = Some(genre.into());
        self
    }

    pub fn with_sort_direction(mut self, direction: SortDirection) -> Self {
        self.sort_direction = direction;
        self
    }

    /// Stable key for the cached materialization of this query.
    ///
    /// Only parameters that matter for the list type contribute, so a stray genre on a
    /// `newest` query does not split the cache.
    pub fn strhash(&self) -> String {
        let range = match (self.list_type, self.year_range) {
            (AlbumListType::YearRange, Some((from, to))) => format!("{from}-{to}"),
            _ => String::new(),
        };
        let genre = match self.list_type {
            AlbumListType::Genre => self.genre.as_deref().unwrap_or(""),
            _ => "",
        };
        let direction = match self.sort_direction {
            SortDirection::Ascending => "asc",
            SortDirection::Descending => "desc",
        };
        hasher::hash_str(&format!(
            "type={};range={};genre={};sort={}",
            self.list_type, range, genre, direction
        ))
    }

    /// Builds the listing from whatever albums are stored locally.
    pub fn run_locally(&self, conn: &Connection) -> StorageResult<Vec<Album>> {
        let mut args: Vec<Value> = Vec::new();
        let (filter, order) = match self.list_type {
            AlbumListType::Random => ("", "RANDOM()"),
            AlbumListType::Newest => ("", "albums.created DESC"),
            AlbumListType::Frequent => ("", "albums.play_count DESC"),
            AlbumListType::Recent => ("", "albums.changed DESC"),
            AlbumListType::Starred => ("AND albums.starred = 1", "LOWER(albums.name)"),
            AlbumListType::AlphabeticalByName => ("", "LOWER(albums.name)"),
            AlbumListType::AlphabeticalByArtist => ("", "LOWER(artists.name), LOWER(albums.name)"),
            AlbumListType::YearRange => {
                let (from, to) = self.year_range.unwrap_or((i64::MIN, i64::MAX));
                args.push(Value::Integer(from.min(to)));
                args.push(Value::Integer(from.max(to)));
                if from > to {
                    ("AND albums.year BETWEEN ?1 AND ?2", "albums.year DESC, LOWER(albums.name)")
                } else {
                    ("AND albums.year BETWEEN ?1 AND ?2", "albums.year, LOWER(albums.name)")
                }
            }
            AlbumListType::Genre => {
                args.push(match &self.genre {
                    Some(genre) => Value::Text(genre.clone()),
                    None => Value::Null,
                });
                ("AND albums.genre = ?1", "LOWER(albums.name)")
            }
        };

        let sql = format!(
            "SELECT albums.* FROM albums LEFT JOIN artists ON artists.id = albums.artist_id
             WHERE albums.id NOT LIKE 'invalid:%' {filter} ORDER BY {order}"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args), Album::from_row)?;
        let mut albums = rows.collect::<rusqlite::Result<Vec<_>>>()?;

        if self.sort_direction == SortDirection::Descending {
            albums.reverse();
        }
        Ok(albums)
    }
}
