//! PostgreSQL implementation of [`MovieSource`].

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::PostgresConfig;
use crate::decode::keep_whole_roots;
use crate::errors::SourceError;
use crate::interfaces::MovieSource;
use crate::postgres::queries;
use crate::types::ChangeCursor;
use movies_etl_shared::{
    AssociationLookup, ChangeRow, FilmJoinRow, GenreJoinRow, PersonJoinRow, SourceTable,
};

/// Reads the movies schema of a PostgreSQL database.
///
/// Holds a single pooled connection that is tested before every use and
/// re-established when it has dropped.
pub struct PostgresMovieSource {
    pool: PgPool,
    schema: String,
}

impl PostgresMovieSource {
    /// Connect to the database described by `config`.
    pub async fn connect(config: &PostgresConfig) -> Result<Self, SourceError> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .test_before_acquire(true)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(config.connect_options())
            .await?;

        info!(
            host = %config.host,
            port = config.port,
            database = %config.database,
            schema = %config.schema,
            "Connected to PostgreSQL"
        );

        Ok(Self {
            pool,
            schema: config.schema.clone(),
        })
    }

    /// Close the connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Decode the rows of a change scan.
    ///
    /// Any undecodable row fails the whole page; skipping it would let the
    /// watermark move past an unseen change.
    fn decode_changes(rows: &[PgRow]) -> Result<Vec<ChangeRow>, SourceError> {
        rows.iter()
            .map(|row| Self::decode_change_row(row).map_err(SourceError::from))
            .collect::<Result<Vec<_>, _>>()
            .inspect_err(|e| warn!(error = %e, "Change scan returned an undecodable row"))
    }

    /// Decode rows grouped by the uuid in `root_column`.
    ///
    /// A root whose id cannot be read fails the call. Any other decode failure
    /// rejects only the root the row belongs to.
    fn decode_roots<T>(
        rows: &[PgRow],
        root_column: &'static str,
        kind: &'static str,
        decode: fn(&PgRow) -> Result<T, sqlx::Error>,
    ) -> Result<Vec<T>, SourceError> {
        let decoded = rows
            .iter()
            .map(|row| {
                let root: Uuid = row.try_get(root_column)?;
                Ok((root, decode(row).map_err(SourceError::from)))
            })
            .collect::<Result<Vec<_>, SourceError>>()?;
        Ok(keep_whole_roots(decoded, kind))
    }

    fn decode_change_row(row: &PgRow) -> Result<ChangeRow, sqlx::Error> {
        Ok(ChangeRow {
            id: row.try_get("id")?,
            modified: row.try_get::<DateTime<Utc>, _>("changed_at")?,
        })
    }

    fn decode_film_row(row: &PgRow) -> Result<FilmJoinRow, sqlx::Error> {
        Ok(FilmJoinRow {
            film_id: row.try_get("film_id")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            rating: row.try_get("rating")?,
            film_type: row.try_get("film_type")?,
            category: row.try_get("category")?,
            related_id: row.try_get("related_id")?,
            related_name: row.try_get("related_name")?,
        })
    }

    fn decode_person_row(row: &PgRow) -> Result<PersonJoinRow, sqlx::Error> {
        Ok(PersonJoinRow {
            person_id: row.try_get("person_id")?,
            full_name: row.try_get("full_name")?,
            role: row.try_get("role")?,
            film_work_id: row.try_get("film_work_id")?,
        })
    }

    fn decode_genre_row(row: &PgRow) -> Result<GenreJoinRow, sqlx::Error> {
        Ok(GenreJoinRow {
            genre_id: row.try_get("genre_id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            film_work_id: row.try_get("film_work_id")?,
        })
    }

    async fn fetch_by_ids(&self, sql: &str, ids: &[Uuid]) -> Result<Vec<PgRow>, SourceError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(sql).bind(ids).fetch_all(&self.pool).await?;
        Ok(rows)
    }
}

#[async_trait]
impl MovieSource for PostgresMovieSource {
    #[instrument(skip(self), fields(table = %table))]
    async fn changed_rows(
        &self,
        table: SourceTable,
        cursor: ChangeCursor,
        limit: usize,
    ) -> Result<Vec<ChangeRow>, SourceError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let rows = match cursor {
            ChangeCursor::Since(since) => {
                let sql = queries::changed_rows_since(&self.schema, table);
                sqlx::query(&sql)
                    .bind(since)
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await?
            }
            ChangeCursor::After { modified, id } => {
                let sql = queries::changed_rows_after(&self.schema, table);
                sqlx::query(&sql)
                    .bind(modified)
                    .bind(id)
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        debug!(count = rows.len(), "Fetched changed rows");
        Self::decode_changes(&rows)
    }

    async fn lookup_ids(
        &self,
        lookup: AssociationLookup,
        ids: &[Uuid],
    ) -> Result<Vec<Uuid>, SourceError> {
        let sql = queries::association_lookup(&self.schema, lookup);
        let rows = self.fetch_by_ids(&sql, ids).await?;

        rows.iter()
            .map(|row| row.try_get::<Uuid, _>("id").map_err(SourceError::from))
            .collect()
    }

    async fn film_rows(&self, film_ids: &[Uuid]) -> Result<Vec<FilmJoinRow>, SourceError> {
        let rows = self
            .fetch_by_ids(&queries::film_rows(&self.schema), film_ids)
            .await?;
        Self::decode_roots(&rows, "film_id", "film", Self::decode_film_row)
    }

    async fn person_rows(&self, person_ids: &[Uuid]) -> Result<Vec<PersonJoinRow>, SourceError> {
        let rows = self
            .fetch_by_ids(&queries::person_rows(&self.schema), person_ids)
            .await?;
        Self::decode_roots(&rows, "person_id", "person", Self::decode_person_row)
    }

    async fn genre_rows(&self, genre_ids: &[Uuid]) -> Result<Vec<GenreJoinRow>, SourceError> {
        let rows = self
            .fetch_by_ids(&queries::genre_rows(&self.schema), genre_ids)
            .await?;
        Self::decode_roots(&rows, "genre_id", "genre", Self::decode_genre_row)
    }

    async fn health_check(&self) -> Result<bool, SourceError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(true)
    }
}
