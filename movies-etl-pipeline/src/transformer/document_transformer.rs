//! Document transformer implementation.
//!
//! Groups join rows by their root entity and merges them into one document
//! per root. Output maps are keyed by id so document order is deterministic.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashSet};

use tracing::{debug, instrument, warn};
use uuid::Uuid;

use movies_etl_shared::{
    FilmDocument, FilmJoinRow, GenreDocument, GenreJoinRow, NamedRef, PersonDocument,
    PersonJoinRow,
};

/// Which list of a film document a related entity goes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Category {
    Actor,
    Director,
    Writer,
    Genre,
}

impl Category {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "actor" => Some(Self::Actor),
            "director" => Some(Self::Director),
            "writer" => Some(Self::Writer),
            "genre" => Some(Self::Genre),
            _ => None,
        }
    }
}

/// Identity of a related entity within one list.
///
/// Entities without an id are told apart by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum DedupKey {
    Id(Uuid),
    Name(String),
}

struct FilmBuilder {
    document: FilmDocument,
    seen: HashSet<(Category, DedupKey)>,
}

impl FilmBuilder {
    /// Start a document from the film fields of `row`; `None` if it has no title.
    fn from_row(row: &FilmJoinRow) -> Option<Self> {
        let title = row.title.clone()?;
        let mut document = FilmDocument::new(row.film_id, title);
        document.description = row.description.clone();
        document.imdb_rating = row.rating;
        document.film_type = row.film_type.clone();

        Some(Self {
            document,
            seen: HashSet::new(),
        })
    }

    fn add_related(&mut self, row: &FilmJoinRow) {
        let (Some(raw_category), Some(name)) = (row.category.as_deref(), row.related_name.as_ref())
        else {
            return;
        };
        let Some(category) = Category::parse(raw_category) else {
            debug!(film_id = %row.film_id, category = raw_category, "Ignoring related row");
            return;
        };

        let key = match row.related_id {
            Some(id) => DedupKey::Id(id),
            None => DedupKey::Name(name.clone()),
        };
        if !self.seen.insert((category, key)) {
            return;
        }

        let doc = &mut self.document;
        let (names, refs) = match category {
            Category::Actor => (&mut doc.actors_names, &mut doc.actors),
            Category::Director => (&mut doc.directors_names, &mut doc.directors),
            Category::Writer => (&mut doc.writers_names, &mut doc.writers),
            Category::Genre => (&mut doc.genres_names, &mut doc.genres),
        };
        if !names.contains(name) {
            names.push(name.clone());
        }
        refs.push(NamedRef {
            id: row.related_id,
            name: name.clone(),
        });
    }
}

/// Transformer that turns source rows into search documents.
///
/// Merging is pure: the same rows always produce the same documents.
#[derive(Debug, Default)]
pub struct DocumentTransformer;

impl DocumentTransformer {
    pub fn new() -> Self {
        Self
    }

    /// Merge film join rows into one document per film.
    ///
    /// A film appears even when it has no related rows. A film whose first row
    /// has no title is skipped.
    #[instrument(skip_all)]
    pub fn merge_films(
        &self,
        rows: impl IntoIterator<Item = FilmJoinRow>,
    ) -> BTreeMap<Uuid, FilmDocument> {
        let mut builders: BTreeMap<Uuid, FilmBuilder> = BTreeMap::new();
        let mut rejected: HashSet<Uuid> = HashSet::new();

        for row in rows {
            if rejected.contains(&row.film_id) {
                continue;
            }
            let builder = match builders.entry(row.film_id) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => match FilmBuilder::from_row(&row) {
                    Some(builder) => entry.insert(builder),
                    None => {
                        warn!(film_id = %row.film_id, "Skipping film without a title");
                        rejected.insert(row.film_id);
                        continue;
                    }
                },
            };
            builder.add_related(&row);
        }

        debug!(documents = builders.len(), "Merged film rows");
        builders
            .into_iter()
            .map(|(id, builder)| (id, builder.document))
            .collect()
    }

    /// Merge person rows into one document per person with sorted roles and films.
    pub fn merge_persons(
        &self,
        rows: impl IntoIterator<Item = PersonJoinRow>,
    ) -> BTreeMap<Uuid, PersonDocument> {
        let mut merged: BTreeMap<Uuid, (String, BTreeSet<String>, BTreeSet<Uuid>)> =
            BTreeMap::new();
        let mut rejected: HashSet<Uuid> = HashSet::new();

        for row in rows {
            if rejected.contains(&row.person_id) {
                continue;
            }
            let entry = match merged.entry(row.person_id) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => match row.full_name {
                    Some(ref name) => entry.insert((name.clone(), BTreeSet::new(), BTreeSet::new())),
                    None => {
                        warn!(person_id = %row.person_id, "Skipping person without a name");
                        rejected.insert(row.person_id);
                        continue;
                    }
                },
            };
            if let Some(role) = row.role {
                entry.1.insert(role);
            }
            if let Some(film_id) = row.film_work_id {
                entry.2.insert(film_id);
            }
        }

        merged
            .into_iter()
            .map(|(id, (full_name, roles, film_ids))| {
                (
                    id,
                    PersonDocument {
                        id,
                        full_name,
                        roles: roles.into_iter().collect(),
                        film_ids: film_ids.into_iter().collect(),
                    },
                )
            })
            .collect()
    }

    /// Merge genre rows into one document per genre with its sorted films.
    pub fn merge_genres(
        &self,
        rows: impl IntoIterator<Item = GenreJoinRow>,
    ) -> BTreeMap<Uuid, GenreDocument> {
        let mut merged: BTreeMap<Uuid, (GenreDocument, BTreeSet<Uuid>)> = BTreeMap::new();
        let mut rejected: HashSet<Uuid> = HashSet::new();

        for row in rows {
            if rejected.contains(&row.genre_id) {
                continue;
            }
            let entry = match merged.entry(row.genre_id) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => match row.name {
                    Some(ref name) => entry.insert((
                        GenreDocument {
                            id: row.genre_id,
                            name: name.clone(),
                            description: row.description.clone(),
                            film_ids: Vec::new(),
                        },
                        BTreeSet::new(),
                    )),
                    None => {
                        warn!(genre_id = %row.genre_id, "Skipping genre without a name");
                        rejected.insert(row.genre_id);
                        continue;
                    }
                },
            };
            if let Some(film_id) = row.film_work_id {
                entry.1.insert(film_id);
            }
        }

        merged
            .into_iter()
            .map(|(id, (mut document, film_ids))| {
                document.film_ids = film_ids.into_iter().collect();
                (id, document)
            })
            .collect()
    }
}
