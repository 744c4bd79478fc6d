//! Extractor module for the movies ETL pipeline.
//!
//! Finds rows changed since a watermark, resolves them to the films (and
//! secondary entities) whose documents must be rebuilt, and fetches the join
//! rows those documents are built from.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};
use tracing::{debug, instrument};
use uuid::Uuid;

use movies_etl_repository::{ChangeCursor, MovieSource};
use movies_etl_shared::{
    ChangeRow, FilmJoinRow, GenreJoinRow, PersonJoinRow, RootLink, SourceTable, Watermark,
};

use crate::errors::PipelineError;
use crate::retry::RetryPolicy;

/// Reads the relational source in batches of at most `batch_size` ids.
pub struct Extractor {
    source: Arc<dyn MovieSource>,
    retry: RetryPolicy,
    batch_size: usize,
}

impl Extractor {
    pub fn new(
        source: Arc<dyn MovieSource>,
        retry: RetryPolicy,
        batch_size: usize,
    ) -> Result<Self, PipelineError> {
        if batch_size == 0 {
            return Err(PipelineError::config("batch size must be positive"));
        }
        Ok(Self {
            source,
            retry,
            batch_size,
        })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Stream the rows of `table` changed at or after `watermark`, one page
    /// at a time, ordered by change timestamp then id.
    ///
    /// Pages are keyset-paginated on `(timestamp, id)`, so rows sharing a
    /// timestamp are never skipped across a page boundary. The stream ends
    /// at the first empty page.
    pub fn changed_ids(
        &self,
        table: SourceTable,
        watermark: &Watermark,
    ) -> BoxStream<'_, Result<Vec<ChangeRow>, PipelineError>> {
        let first = ChangeCursor::from_watermark(watermark);
        stream::try_unfold(Some(first), move |cursor| self.next_page(table, cursor)).boxed()
    }

    async fn next_page(
        &self,
        table: SourceTable,
        cursor: Option<ChangeCursor>,
    ) -> Result<Option<(Vec<ChangeRow>, Option<ChangeCursor>)>, PipelineError> {
        let Some(cursor) = cursor else {
            return Ok(None);
        };

        let rows = self
            .retry
            .execute("source.changed_rows", || {
                self.source.changed_rows(table, cursor, self.batch_size)
            })
            .await?;

        if rows.is_empty() {
            return Ok(None);
        }

        debug!(table = %table, rows = rows.len(), "Fetched change page");
        let next = rows.last().map(ChangeCursor::after);
        Ok(Some((rows, next)))
    }

    /// Film ids whose documents depend on the changed rows of `table`.
    pub async fn affected_roots(
        &self,
        table: SourceTable,
        changed: &[Uuid],
    ) -> Result<Vec<Uuid>, PipelineError> {
        self.resolve(table.root_link(), changed).await
    }

    /// Person or genre ids whose secondary documents depend on the changed
    /// rows of `table`. Empty for tables that feed no secondary index.
    pub async fn secondary_ids(
        &self,
        table: SourceTable,
        changed: &[Uuid],
    ) -> Result<Vec<Uuid>, PipelineError> {
        match table.secondary() {
            Some(target) => self.resolve(target.link, changed).await,
            None => Ok(Vec::new()),
        }
    }

    /// Map changed ids through `link`, returning sorted distinct ids.
    #[instrument(skip(self, changed), fields(changed = changed.len()))]
    pub async fn resolve(&self, link: RootLink, changed: &[Uuid]) -> Result<Vec<Uuid>, PipelineError> {
        let lookup = match link {
            RootLink::Identity => {
                let unique: BTreeSet<Uuid> = changed.iter().copied().collect();
                return Ok(unique.into_iter().collect());
            }
            RootLink::Lookup(lookup) => lookup,
        };

        let mut resolved = BTreeSet::new();
        for chunk in changed.chunks(self.batch_size) {
            let ids = self
                .retry
                .execute("source.lookup_ids", || self.source.lookup_ids(lookup, chunk))
                .await?;
            resolved.extend(ids);
        }

        debug!(table = lookup.table, resolved = resolved.len(), "Resolved ids");
        Ok(resolved.into_iter().collect())
    }

    /// Fetch the join rows of the given films.
    ///
    /// A film with no rows no longer exists in the source.
    pub async fn hydrate(&self, film_ids: &[Uuid]) -> Result<Vec<FilmJoinRow>, PipelineError> {
        let mut rows = Vec::new();
        for chunk in film_ids.chunks(self.batch_size) {
            let batch = self
                .retry
                .execute("source.film_rows", || self.source.film_rows(chunk))
                .await?;
            rows.extend(batch);
        }
        Ok(rows)
    }

    /// Fetch the given persons joined with their film roles.
    pub async fn hydrate_persons(
        &self,
        person_ids: &[Uuid],
    ) -> Result<Vec<PersonJoinRow>, PipelineError> {
        let mut rows = Vec::new();
        for chunk in person_ids.chunks(self.batch_size) {
            let batch = self
                .retry
                .execute("source.person_rows", || self.source.person_rows(chunk))
                .await?;
            rows.extend(batch);
        }
        Ok(rows)
    }

    /// Fetch the given genres joined with their films.
    pub async fn hydrate_genres(&self, genre_ids: &[Uuid]) -> Result<Vec<GenreJoinRow>, PipelineError> {
        let mut rows = Vec::new();
        for chunk in genre_ids.chunks(self.batch_size) {
            let batch = self
                .retry
                .execute("source.genre_rows", || self.source.genre_rows(chunk))
                .await?;
            rows.extend(batch);
        }
        Ok(rows)
    }

    /// Check that the source is reachable, retrying while it is not.
    pub async fn health_check(&self) -> Result<bool, PipelineError> {
        self.retry
            .execute("source.health_check", || self.source.health_check())
            .await
    }
}
