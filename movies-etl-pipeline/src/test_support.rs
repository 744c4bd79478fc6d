//! In-memory implementations of the repository traits for pipeline tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use uuid::Uuid;

use movies_etl_repository::{
    keep_whole_roots, BulkDocument, BulkItemResult, BulkSummary, ChangeCursor, IndexError,
    MovieSource, SearchIndexProvider, SourceError, StateError, StateStorage,
};
use movies_etl_shared::{
    AssociationLookup, ChangeRow, FilmJoinRow, GenreJoinRow, PersonJoinRow, SourceTable,
};

use crate::retry::RetryPolicy;

/// A policy that gives up quickly: sleeps of 1, 2 and 4 ms, then 4 attempts total.
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(Duration::from_millis(1), 2.0, Duration::from_millis(4))
        .expect("valid policy")
}

/// Timestamp `minutes` after 2024-01-01T00:00:00Z.
pub fn ts(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::minutes(minutes)
}

struct Film {
    title: Option<String>,
    description: Option<String>,
    rating: Option<f64>,
    film_type: Option<String>,
    modified: DateTime<Utc>,
}

struct Person {
    full_name: Option<String>,
    modified: DateTime<Utc>,
}

struct Genre {
    name: Option<String>,
    description: Option<String>,
    modified: DateTime<Utc>,
}

struct PersonLink {
    id: Uuid,
    film_work_id: Uuid,
    person_id: Uuid,
    role: String,
    created: DateTime<Utc>,
}

struct GenreLink {
    id: Uuid,
    film_work_id: Uuid,
    genre_id: Uuid,
    created: DateTime<Utc>,
}

#[derive(Default)]
struct Dataset {
    films: BTreeMap<Uuid, Film>,
    persons: BTreeMap<Uuid, Person>,
    genres: BTreeMap<Uuid, Genre>,
    person_links: Vec<PersonLink>,
    genre_links: Vec<GenreLink>,
}

/// An in-memory movies database answering the same questions as the
/// PostgreSQL source.
#[derive(Default)]
pub struct InMemorySource {
    data: Mutex<Dataset>,
    failing_tables: Mutex<HashMap<SourceTable, SourceError>>,
    corrupt_links: Mutex<HashSet<Uuid>>,
    transient_failures: AtomicUsize,
    pub changed_rows_calls: AtomicUsize,
    pub film_rows_calls: AtomicUsize,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_film(&self, title: &str, modified: DateTime<Utc>) -> Uuid {
        self.add_film_with(Some(title), modified)
    }

    pub fn add_film_with(&self, title: Option<&str>, modified: DateTime<Utc>) -> Uuid {
        let id = Uuid::new_v4();
        self.data.lock().unwrap().films.insert(
            id,
            Film {
                title: title.map(str::to_string),
                description: Some(format!("About {}", title.unwrap_or("nothing"))),
                rating: Some(7.5),
                film_type: Some("movie".to_string()),
                modified,
            },
        );
        id
    }

    pub fn add_person(&self, full_name: &str, modified: DateTime<Utc>) -> Uuid {
        let id = Uuid::new_v4();
        self.data.lock().unwrap().persons.insert(
            id,
            Person {
                full_name: Some(full_name.to_string()),
                modified,
            },
        );
        id
    }

    pub fn add_genre(&self, name: &str, modified: DateTime<Utc>) -> Uuid {
        let id = Uuid::new_v4();
        self.data.lock().unwrap().genres.insert(
            id,
            Genre {
                name: Some(name.to_string()),
                description: None,
                modified,
            },
        );
        id
    }

    pub fn link_person(
        &self,
        film_work_id: Uuid,
        person_id: Uuid,
        role: &str,
        created: DateTime<Utc>,
    ) -> Uuid {
        let id = Uuid::new_v4();
        self.data.lock().unwrap().person_links.push(PersonLink {
            id,
            film_work_id,
            person_id,
            role: role.to_string(),
            created,
        });
        id
    }

    pub fn link_genre(&self, film_work_id: Uuid, genre_id: Uuid, created: DateTime<Utc>) -> Uuid {
        let id = Uuid::new_v4();
        self.data.lock().unwrap().genre_links.push(GenreLink {
            id,
            film_work_id,
            genre_id,
            created,
        });
        id
    }

    pub fn rename_film(&self, id: Uuid, title: &str, modified: DateTime<Utc>) {
        if let Some(film) = self.data.lock().unwrap().films.get_mut(&id) {
            film.title = Some(title.to_string());
            film.modified = modified;
        }
    }

    pub fn remove_film(&self, id: Uuid) {
        self.data.lock().unwrap().films.remove(&id);
    }

    /// Make every change scan of `table` fail with `error`.
    pub fn fail_table(&self, table: SourceTable, error: SourceError) {
        self.failing_tables.lock().unwrap().insert(table, error);
    }

    pub fn heal_table(&self, table: SourceTable) {
        self.failing_tables.lock().unwrap().remove(&table);
    }

    /// Fail the next `count` change scans or health checks with a connection error.
    pub fn fail_next_scans(&self, count: usize) {
        self.transient_failures.store(count, Ordering::SeqCst);
    }

    /// Make every joined row produced through association `link_id` undecodable.
    pub fn corrupt_link(&self, link_id: Uuid) {
        self.corrupt_links.lock().unwrap().insert(link_id);
    }

    fn decoded<T>(&self, link_id: Uuid, root: Uuid, row: T) -> (Uuid, Result<T, SourceError>) {
        if self.corrupt_links.lock().unwrap().contains(&link_id) {
            (root, Err(SourceError::decode(format!("row for link {link_id} has an invalid column"))))
        } else {
            (root, Ok(row))
        }
    }

    fn link_column(link: &PersonLink, column: &str) -> Option<Uuid> {
        match column {
            "id" => Some(link.id),
            "film_work_id" => Some(link.film_work_id),
            "person_id" => Some(link.person_id),
            _ => None,
        }
    }

    fn genre_link_column(link: &GenreLink, column: &str) -> Option<Uuid> {
        match column {
            "id" => Some(link.id),
            "film_work_id" => Some(link.film_work_id),
            "genre_id" => Some(link.genre_id),
            _ => None,
        }
    }
}

#[async_trait]
impl MovieSource for InMemorySource {
    async fn changed_rows(
        &self,
        table: SourceTable,
        cursor: ChangeCursor,
        limit: usize,
    ) -> Result<Vec<ChangeRow>, SourceError> {
        self.changed_rows_calls.fetch_add(1, Ordering::SeqCst);

        let pending = self.transient_failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.transient_failures.store(pending - 1, Ordering::SeqCst);
            return Err(SourceError::connection("connection reset by peer"));
        }
        if let Some(err) = self.failing_tables.lock().unwrap().get(&table) {
            return Err(err.clone());
        }

        let data = self.data.lock().unwrap();
        let mut rows: Vec<ChangeRow> = match table {
            SourceTable::FilmWork => data
                .films
                .iter()
                .map(|(id, f)| ChangeRow::new(*id, f.modified))
                .collect(),
            SourceTable::Person => data
                .persons
                .iter()
                .map(|(id, p)| ChangeRow::new(*id, p.modified))
                .collect(),
            SourceTable::Genre => data
                .genres
                .iter()
                .map(|(id, g)| ChangeRow::new(*id, g.modified))
                .collect(),
            SourceTable::PersonFilmWork => data
                .person_links
                .iter()
                .map(|l| ChangeRow::new(l.id, l.created))
                .collect(),
            SourceTable::GenreFilmWork => data
                .genre_links
                .iter()
                .map(|l| ChangeRow::new(l.id, l.created))
                .collect(),
        };

        rows.retain(|row| match cursor {
            ChangeCursor::Since(since) => row.modified >= since,
            ChangeCursor::After { modified, id } => (row.modified, row.id) > (modified, id),
        });
        rows.sort_by_key(|row| (row.modified, row.id));
        rows.truncate(limit);
        Ok(rows)
    }

    async fn lookup_ids(
        &self,
        lookup: AssociationLookup,
        ids: &[Uuid],
    ) -> Result<Vec<Uuid>, SourceError> {
        let wanted: HashSet<&Uuid> = ids.iter().collect();
        let data = self.data.lock().unwrap();

        let mut found: Vec<Uuid> = match lookup.table {
            "person_film_work" => data
                .person_links
                .iter()
                .filter(|l| {
                    Self::link_column(l, lookup.filter).map_or(false, |v| wanted.contains(&v))
                })
                .filter_map(|l| Self::link_column(l, lookup.select))
                .collect(),
            "genre_film_work" => data
                .genre_links
                .iter()
                .filter(|l| {
                    Self::genre_link_column(l, lookup.filter)
                        .map_or(false, |v| wanted.contains(&v))
                })
                .filter_map(|l| Self::genre_link_column(l, lookup.select))
                .collect(),
            other => {
                return Err(SourceError::query(format!(
                    "relation \"{other}\" does not exist"
                )))
            }
        };
        found.sort();
        found.dedup();
        Ok(found)
    }

    async fn film_rows(&self, film_ids: &[Uuid]) -> Result<Vec<FilmJoinRow>, SourceError> {
        self.film_rows_calls.fetch_add(1, Ordering::SeqCst);
        let data = self.data.lock().unwrap();
        let mut rows = Vec::new();

        for film_id in film_ids {
            let Some(film) = data.films.get(film_id) else {
                continue;
            };
            let base = FilmJoinRow {
                film_id: *film_id,
                title: film.title.clone(),
                description: film.description.clone(),
                rating: film.rating,
                film_type: film.film_type.clone(),
                category: None,
                related_id: None,
                related_name: None,
            };

            let people: Vec<&PersonLink> = data
                .person_links
                .iter()
                .filter(|l| l.film_work_id == *film_id)
                .collect();
            if people.is_empty() {
                rows.push((*film_id, Ok(base.clone())));
            }
            for link in people {
                let person = data.persons.get(&link.person_id);
                let row = FilmJoinRow {
                    category: Some(link.role.clone()),
                    related_id: person.map(|_| link.person_id),
                    related_name: person.and_then(|p| p.full_name.clone()),
                    ..base.clone()
                };
                rows.push(self.decoded(link.id, *film_id, row));
            }

            for link in data.genre_links.iter().filter(|l| l.film_work_id == *film_id) {
                if let Some(genre) = data.genres.get(&link.genre_id) {
                    let row = FilmJoinRow {
                        category: Some("genre".to_string()),
                        related_id: Some(link.genre_id),
                        related_name: genre.name.clone(),
                        ..base.clone()
                    };
                    rows.push(self.decoded(link.id, *film_id, row));
                }
            }
        }

        let mut rows = keep_whole_roots(rows, "film");
        rows.sort_by(|a, b| {
            (a.film_id, &a.category, &a.related_name, a.related_id).cmp(&(
                b.film_id,
                &b.category,
                &b.related_name,
                b.related_id,
            ))
        });
        Ok(rows)
    }

    async fn person_rows(&self, person_ids: &[Uuid]) -> Result<Vec<PersonJoinRow>, SourceError> {
        let data = self.data.lock().unwrap();
        let mut rows = Vec::new();

        for person_id in person_ids {
            let Some(person) = data.persons.get(person_id) else {
                continue;
            };
            let links: Vec<&PersonLink> = data
                .person_links
                .iter()
                .filter(|l| l.person_id == *person_id)
                .collect();
            if links.is_empty() {
                rows.push((
                    *person_id,
                    Ok(PersonJoinRow {
                        person_id: *person_id,
                        full_name: person.full_name.clone(),
                        role: None,
                        film_work_id: None,
                    }),
                ));
            }
            for link in links {
                let row = PersonJoinRow {
                    person_id: *person_id,
                    full_name: person.full_name.clone(),
                    role: Some(link.role.clone()),
                    film_work_id: Some(link.film_work_id),
                };
                rows.push(self.decoded(link.id, *person_id, row));
            }
        }
        Ok(keep_whole_roots(rows, "person"))
    }

    async fn genre_rows(&self, genre_ids: &[Uuid]) -> Result<Vec<GenreJoinRow>, SourceError> {
        let data = self.data.lock().unwrap();
        let mut rows = Vec::new();

        for genre_id in genre_ids {
            let Some(genre) = data.genres.get(genre_id) else {
                continue;
            };
            let links: Vec<&GenreLink> = data
                .genre_links
                .iter()
                .filter(|l| l.genre_id == *genre_id)
                .collect();
            if links.is_empty() {
                rows.push((
                    *genre_id,
                    Ok(GenreJoinRow {
                        genre_id: *genre_id,
                        name: genre.name.clone(),
                        description: genre.description.clone(),
                        film_work_id: None,
                    }),
                ));
            }
            for link in links {
                let row = GenreJoinRow {
                    genre_id: *genre_id,
                    name: genre.name.clone(),
                    description: genre.description.clone(),
                    film_work_id: Some(link.film_work_id),
                };
                rows.push(self.decoded(link.id, *genre_id, row));
            }
        }
        Ok(keep_whole_roots(rows, "genre"))
    }

    async fn health_check(&self) -> Result<bool, SourceError> {
        let pending = self.transient_failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.transient_failures.store(pending - 1, Ordering::SeqCst);
            return Err(SourceError::connection("connection refused"));
        }
        Ok(true)
    }
}

/// How the in-memory index answers bulk requests.
#[derive(Debug, Clone)]
pub enum IndexBehavior {
    Accept,
    /// Fail the request as a whole.
    Fail(IndexError),
    /// Accept the request but reject every item.
    RejectItems,
}

/// An in-memory search index keyed by index name then document id.
pub struct InMemoryIndex {
    documents: Mutex<HashMap<String, BTreeMap<String, Value>>>,
    behavior: Mutex<IndexBehavior>,
    pub bulk_calls: AtomicUsize,
    pub ensured: Mutex<Vec<String>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self {
            documents: Mutex::new(HashMap::new()),
            behavior: Mutex::new(IndexBehavior::Accept),
            bulk_calls: AtomicUsize::new(0),
            ensured: Mutex::new(Vec::new()),
        }
    }

    pub fn set_behavior(&self, behavior: IndexBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn document(&self, index: &str, id: Uuid) -> Option<Value> {
        self.documents
            .lock()
            .unwrap()
            .get(index)
            .and_then(|docs| docs.get(&id.to_string()))
            .cloned()
    }

    pub fn count(&self, index: &str) -> usize {
        self.documents
            .lock()
            .unwrap()
            .get(index)
            .map_or(0, BTreeMap::len)
    }

    pub fn snapshot(&self, index: &str) -> BTreeMap<String, Value> {
        self.documents
            .lock()
            .unwrap()
            .get(index)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl SearchIndexProvider for InMemoryIndex {
    async fn bulk_upsert(
        &self,
        index: &str,
        documents: &[BulkDocument],
    ) -> Result<BulkSummary, IndexError> {
        self.bulk_calls.fetch_add(1, Ordering::SeqCst);

        match self.behavior.lock().unwrap().clone() {
            IndexBehavior::Fail(err) => Err(err),
            IndexBehavior::RejectItems => Ok(BulkSummary::from_results(
                documents
                    .iter()
                    .map(|doc| BulkItemResult {
                        id: doc.id.clone(),
                        success: false,
                        status: 400,
                        error: Some("mapper_parsing_exception".to_string()),
                    })
                    .collect(),
            )),
            IndexBehavior::Accept => {
                let mut all = self.documents.lock().unwrap();
                let docs = all.entry(index.to_string()).or_default();
                let results = documents
                    .iter()
                    .map(|doc| {
                        let created = docs.insert(doc.id.clone(), doc.source.clone()).is_none();
                        BulkItemResult {
                            id: doc.id.clone(),
                            success: true,
                            status: if created { 201 } else { 200 },
                            error: None,
                        }
                    })
                    .collect();
                Ok(BulkSummary::from_results(results))
            }
        }
    }

    async fn ensure_index(&self, index: &str, _body: &Value) -> Result<(), IndexError> {
        self.ensured.lock().unwrap().push(index.to_string());
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, IndexError> {
        match &*self.behavior.lock().unwrap() {
            IndexBehavior::Fail(err) => Err(err.clone()),
            _ => Ok(true),
        }
    }
}

/// In-memory key-value state storage.
#[derive(Default)]
pub struct InMemoryState {
    values: Mutex<HashMap<String, String>>,
    failure: Mutex<Option<StateError>>,
    pub saves: AtomicUsize,
}

impl InMemoryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: &str, value: &str) {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().get(key).cloned()
    }

    /// Make every call fail with `error` until cleared with `None`.
    pub fn set_failure(&self, error: Option<StateError>) {
        *self.failure.lock().unwrap() = error;
    }
}

#[async_trait]
impl StateStorage for InMemoryState {
    async fn retrieve(&self, key: &str) -> Result<Option<String>, StateError> {
        if let Some(err) = self.failure.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(self.raw(key))
    }

    async fn save(&self, key: &str, value: &str) -> Result<(), StateError> {
        if let Some(err) = self.failure.lock().unwrap().clone() {
            return Err(err);
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.insert(key, value);
        Ok(())
    }
}
