//! # Movies ETL Shared
//!
//! Types shared by the repository and pipeline crates: the source tables the
//! ETL follows, the rows read from them, the documents written to the search
//! index, and the per-table watermark.

pub mod documents;
pub mod rows;
pub mod table;
pub mod watermark;

pub use documents::{
    FilmDocument, GenreDocument, IndexDocument, NamedRef, PersonDocument, GENRES_INDEX,
    MOVIES_INDEX, PERSONS_INDEX,
};
pub use rows::{ChangeRow, FilmJoinRow, GenreJoinRow, PersonJoinRow};
pub use table::{AssociationLookup, RootLink, SecondaryIndex, SecondaryTarget, SourceTable};
pub use watermark::Watermark;
