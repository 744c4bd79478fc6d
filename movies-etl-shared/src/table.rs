//! The source tables followed by the ETL.
//!
//! Every table the ETL watches is a variant of [`SourceTable`]. Each variant
//! statically describes how its changes are detected (cursor column), which
//! films they affect ([`RootLink`]) and which secondary index, if any, they
//! feed ([`SecondaryTarget`]).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::documents::{GENRES_INDEX, PERSONS_INDEX};

/// A `SELECT DISTINCT {select} FROM {table} WHERE {filter} = ANY($1)` lookup
/// through an association table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssociationLookup {
    /// Association table to read.
    pub table: &'static str,
    /// Column whose values are returned.
    pub select: &'static str,
    /// Column matched against the changed ids.
    pub filter: &'static str,
}

/// How changed ids of a table map to the films whose documents must be rebuilt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootLink {
    /// The changed ids are film ids.
    Identity,
    /// The film ids are found through an association table.
    Lookup(AssociationLookup),
}

/// Secondary indices built next to the movies index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecondaryIndex {
    /// One document per person.
    Persons,
    /// One document per genre.
    Genres,
}

impl SecondaryIndex {
    /// Name of the index in the search engine.
    pub fn index_name(&self) -> &'static str {
        match self {
            Self::Persons => PERSONS_INDEX,
            Self::Genres => GENRES_INDEX,
        }
    }
}

/// A secondary index fed by a table, and how to find its document ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecondaryTarget {
    pub index: SecondaryIndex,
    pub link: RootLink,
}

/// A table of the relational source watched for changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTable {
    Genre,
    Person,
    FilmWork,
    GenreFilmWork,
    PersonFilmWork,
}

impl SourceTable {
    /// Every table, in synchronization order.
    pub const ALL: [SourceTable; 5] = [
        SourceTable::Genre,
        SourceTable::Person,
        SourceTable::FilmWork,
        SourceTable::GenreFilmWork,
        SourceTable::PersonFilmWork,
    ];

    /// Table name in the source schema; also the state-store key.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Genre => "genre",
            Self::Person => "person",
            Self::FilmWork => "film_work",
            Self::GenreFilmWork => "genre_film_work",
            Self::PersonFilmWork => "person_film_work",
        }
    }

    /// Timestamp column used as the change cursor.
    ///
    /// Association rows are never updated in place, so their creation time is
    /// their change time.
    pub fn cursor_column(&self) -> &'static str {
        match self {
            Self::Genre | Self::Person | Self::FilmWork => "modified",
            Self::GenreFilmWork | Self::PersonFilmWork => "created",
        }
    }

    /// How changed ids of this table resolve to film ids.
    pub fn root_link(&self) -> RootLink {
        match self {
            Self::FilmWork => RootLink::Identity,
            Self::Genre => RootLink::Lookup(AssociationLookup {
                table: "genre_film_work",
                select: "film_work_id",
                filter: "genre_id",
            }),
            Self::Person => RootLink::Lookup(AssociationLookup {
                table: "person_film_work",
                select: "film_work_id",
                filter: "person_id",
            }),
            Self::GenreFilmWork => RootLink::Lookup(AssociationLookup {
                table: "genre_film_work",
                select: "film_work_id",
                filter: "id",
            }),
            Self::PersonFilmWork => RootLink::Lookup(AssociationLookup {
                table: "person_film_work",
                select: "film_work_id",
                filter: "id",
            }),
        }
    }

    /// The secondary index fed by this table, if any.
    pub fn secondary(&self) -> Option<SecondaryTarget> {
        match self {
            Self::FilmWork => None,
            Self::Genre => Some(SecondaryTarget {
                index: SecondaryIndex::Genres,
                link: RootLink::Identity,
            }),
            Self::Person => Some(SecondaryTarget {
                index: SecondaryIndex::Persons,
                link: RootLink::Identity,
            }),
            Self::GenreFilmWork => Some(SecondaryTarget {
                index: SecondaryIndex::Genres,
                link: RootLink::Lookup(AssociationLookup {
                    table: "genre_film_work",
                    select: "genre_id",
                    filter: "id",
                }),
            }),
            Self::PersonFilmWork => Some(SecondaryTarget {
                index: SecondaryIndex::Persons,
                link: RootLink::Lookup(AssociationLookup {
                    table: "person_film_work",
                    select: "person_id",
                    filter: "id",
                }),
            }),
        }
    }
}

impl fmt::Display for SourceTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_order_starts_with_entities() {
        let names: Vec<&str> = SourceTable::ALL.iter().map(|t| t.name()).collect();
        assert_eq!(
            names,
            vec!["genre", "person", "film_work", "genre_film_work", "person_film_work"]
        );
    }

    #[test]
    fn test_association_tables_follow_created() {
        assert_eq!(SourceTable::FilmWork.cursor_column(), "modified");
        assert_eq!(SourceTable::GenreFilmWork.cursor_column(), "created");
        assert_eq!(SourceTable::PersonFilmWork.cursor_column(), "created");
    }

    #[test]
    fn test_film_work_has_no_secondary_index() {
        assert_eq!(SourceTable::FilmWork.root_link(), RootLink::Identity);
        assert!(SourceTable::FilmWork.secondary().is_none());
    }

    #[test]
    fn test_person_film_work_feeds_persons() {
        let target = SourceTable::PersonFilmWork.secondary().unwrap();
        assert_eq!(target.index.index_name(), "persons");
        assert!(matches!(
            target.link,
            RootLink::Lookup(AssociationLookup { select: "person_id", .. })
        ));
    }
}
