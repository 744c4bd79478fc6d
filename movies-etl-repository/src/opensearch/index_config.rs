//! Index settings and mappings for the movies, persons and genres indices.

use serde_json::{json, Value};

use movies_etl_shared::{GENRES_INDEX, MOVIES_INDEX, PERSONS_INDEX};

/// Shared analysis settings: English and Russian stemming with stop words.
fn analysis_settings() -> Value {
    json!({
        "refresh_interval": "1s",
        "analysis": {
            "filter": {
                "english_stop": { "type": "stop", "stopwords": "_english_" },
                "english_stemmer": { "type": "stemmer", "language": "english" },
                "english_possessive_stemmer": { "type": "stemmer", "language": "possessive_english" },
                "russian_stop": { "type": "stop", "stopwords": "_russian_" },
                "russian_stemmer": { "type": "stemmer", "language": "russian" }
            },
            "analyzer": {
                "ru_en": {
                    "tokenizer": "standard",
                    "filter": [
                        "lowercase",
                        "english_stop",
                        "english_stemmer",
                        "english_possessive_stemmer",
                        "russian_stop",
                        "russian_stemmer"
                    ]
                }
            }
        }
    })
}

fn named_refs() -> Value {
    json!({
        "type": "nested",
        "dynamic": "strict",
        "properties": {
            "id": { "type": "keyword" },
            "name": { "type": "text", "analyzer": "ru_en" }
        }
    })
}

fn movies_mappings() -> Value {
    json!({
        "dynamic": "strict",
        "properties": {
            "id": { "type": "keyword" },
            "imdb_rating": { "type": "float" },
            "type": { "type": "keyword" },
            "title": {
                "type": "text",
                "analyzer": "ru_en",
                "fields": { "raw": { "type": "keyword" } }
            },
            "description": { "type": "text", "analyzer": "ru_en" },
            "genres_names": { "type": "keyword" },
            "genres": named_refs(),
            "directors_names": { "type": "text", "analyzer": "ru_en" },
            "directors": named_refs(),
            "actors_names": { "type": "text", "analyzer": "ru_en" },
            "actors": named_refs(),
            "writers_names": { "type": "text", "analyzer": "ru_en" },
            "writers": named_refs()
        }
    })
}

fn persons_mappings() -> Value {
    json!({
        "dynamic": "strict",
        "properties": {
            "id": { "type": "keyword" },
            "full_name": {
                "type": "text",
                "analyzer": "ru_en",
                "fields": { "raw": { "type": "keyword" } }
            },
            "roles": { "type": "keyword" },
            "film_ids": { "type": "keyword" }
        }
    })
}

fn genres_mappings() -> Value {
    json!({
        "dynamic": "strict",
        "properties": {
            "id": { "type": "keyword" },
            "name": {
                "type": "text",
                "analyzer": "ru_en",
                "fields": { "raw": { "type": "keyword" } }
            },
            "description": { "type": "text", "analyzer": "ru_en" },
            "film_ids": { "type": "keyword" }
        }
    })
}

/// Get the create-index body (settings and mappings) for a known index.
///
/// Returns `None` for an index this crate does not manage.
pub fn index_body(index: &str) -> Option<Value> {
    let mappings = match index {
        MOVIES_INDEX => movies_mappings(),
        PERSONS_INDEX => persons_mappings(),
        GENRES_INDEX => genres_mappings(),
        _ => return None,
    };

    Some(json!({
        "settings": analysis_settings(),
        "mappings": mappings
    }))
}
