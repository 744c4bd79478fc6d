//! Rows read from the relational source.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A row reported by a change scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeRow {
    pub id: Uuid,
    pub modified: DateTime<Utc>,
}

impl ChangeRow {
    pub fn new(id: Uuid, modified: DateTime<Utc>) -> Self {
        Self { id, modified }
    }
}

/// One film joined with at most one related person or genre.
///
/// The film fields are repeated on every row of the same film. `category` is
/// the person's role (`actor`, `director`, `writer`, ...) or `genre`; all
/// three related fields are `None` for a film without relations.
#[derive(Debug, Clone, PartialEq)]
pub struct FilmJoinRow {
    pub film_id: Uuid,
    pub title: Option<String>,
    pub description: Option<String>,
    pub rating: Option<f64>,
    pub film_type: Option<String>,
    pub category: Option<String>,
    pub related_id: Option<Uuid>,
    pub related_name: Option<String>,
}

impl FilmJoinRow {
    /// A row carrying only film fields.
    pub fn bare(film_id: Uuid, title: impl Into<String>) -> Self {
        Self {
            film_id,
            title: Some(title.into()),
            description: None,
            rating: None,
            film_type: None,
            category: None,
            related_id: None,
            related_name: None,
        }
    }

    /// Attach a related entity to the row.
    pub fn with_related(
        mut self,
        category: impl Into<String>,
        related_id: Option<Uuid>,
        related_name: impl Into<String>,
    ) -> Self {
        self.category = Some(category.into());
        self.related_id = related_id;
        self.related_name = Some(related_name.into());
        self
    }
}

/// One person joined with at most one of their film roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonJoinRow {
    pub person_id: Uuid,
    pub full_name: Option<String>,
    pub role: Option<String>,
    pub film_work_id: Option<Uuid>,
}

/// One genre joined with at most one of its films.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenreJoinRow {
    pub genre_id: Uuid,
    pub name: Option<String>,
    pub description: Option<String>,
    pub film_work_id: Option<Uuid>,
}
