//! Documents written to the search indices.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Index holding one document per film.
pub const MOVIES_INDEX: &str = "movies";

/// Index holding one document per person.
pub const PERSONS_INDEX: &str = "persons";

/// Index holding one document per genre.
pub const GENRES_INDEX: &str = "genres";

/// A document that can be bulk-upserted into an index.
///
/// The document id is stable across cycles, so re-indexing the same entity
/// overwrites the previous version.
pub trait IndexDocument: Serialize {
    /// The `_id` under which the document is stored.
    fn document_id(&self) -> String;
}

/// A related entity embedded in a film document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedRef {
    pub id: Option<Uuid>,
    pub name: String,
}

/// A film with its genres and people, denormalized for search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilmDocument {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub imdb_rating: Option<f64>,
    #[serde(rename = "type")]
    pub film_type: Option<String>,
    pub genres_names: Vec<String>,
    pub genres: Vec<NamedRef>,
    pub directors_names: Vec<String>,
    pub directors: Vec<NamedRef>,
    pub actors_names: Vec<String>,
    pub actors: Vec<NamedRef>,
    pub writers_names: Vec<String>,
    pub writers: Vec<NamedRef>,
}

impl FilmDocument {
    /// A film document with no related entities.
    pub fn new(id: Uuid, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            description: None,
            imdb_rating: None,
            film_type: None,
            genres_names: Vec::new(),
            genres: Vec::new(),
            directors_names: Vec::new(),
            directors: Vec::new(),
            actors_names: Vec::new(),
            actors: Vec::new(),
            writers_names: Vec::new(),
            writers: Vec::new(),
        }
    }
}

impl IndexDocument for FilmDocument {
    fn document_id(&self) -> String {
        self.id.to_string()
    }
}

/// A person with the roles they played and the films they appear in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonDocument {
    pub id: Uuid,
    pub full_name: String,
    pub roles: Vec<String>,
    pub film_ids: Vec<Uuid>,
}

impl IndexDocument for PersonDocument {
    fn document_id(&self) -> String {
        self.id.to_string()
    }
}

/// A genre with the films it is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenreDocument {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub film_ids: Vec<Uuid>,
}

impl IndexDocument for GenreDocument {
    fn document_id(&self) -> String {
        self.id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_film_type_serialized_as_type() {
        let mut doc = FilmDocument::new(Uuid::nil(), "Star Wars");
        doc.film_type = Some("movie".to_string());

        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["type"], "movie");
        assert!(value.get("film_type").is_none());
        assert_eq!(doc.document_id(), "00000000-0000-0000-0000-000000000000");
    }
}
