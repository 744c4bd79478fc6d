//! Relational source trait definition.

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::SourceError;
use crate::types::ChangeCursor;
use movies_etl_shared::{
    AssociationLookup, ChangeRow, FilmJoinRow, GenreJoinRow, PersonJoinRow, SourceTable,
};

/// Read access to the movies source needed by the ETL.
///
/// Every method performs at most one query. Paging and batching are the
/// caller's responsibility.
#[async_trait]
pub trait MovieSource: Send + Sync {
    /// Fetch up to `limit` rows of `table` changed at or after the cursor,
    /// ordered by change timestamp then id. An undecodable row fails the call.
    async fn changed_rows(
        &self,
        table: SourceTable,
        cursor: ChangeCursor,
        limit: usize,
    ) -> Result<Vec<ChangeRow>, SourceError>;

    /// Resolve ids through an association table.
    ///
    /// Returns the distinct values of `lookup.select` for rows whose
    /// `lookup.filter` is one of `ids`.
    async fn lookup_ids(
        &self,
        lookup: AssociationLookup,
        ids: &[Uuid],
    ) -> Result<Vec<Uuid>, SourceError>;

    /// Fetch the denormalized join rows of the given films.
    ///
    /// Rows are ordered by film id, category, related name and related id.
    /// A film with any undecodable row is left out entirely, as for the
    /// person and genre variants below.
    async fn film_rows(&self, film_ids: &[Uuid]) -> Result<Vec<FilmJoinRow>, SourceError>;

    /// Fetch the given persons joined with their film roles.
    async fn person_rows(&self, person_ids: &[Uuid]) -> Result<Vec<PersonJoinRow>, SourceError>;

    /// Fetch the given genres joined with their films.
    async fn genre_rows(&self, genre_ids: &[Uuid]) -> Result<Vec<GenreJoinRow>, SourceError>;

    /// Check that the source is reachable.
    async fn health_check(&self) -> Result<bool, SourceError>;
}
