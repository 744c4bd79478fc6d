//! SQL builders for the movies source.
//!
//! Table and column names come from [`SourceTable`] and
//! [`AssociationLookup`], which are closed sets of static strings; all
//! values are bound as parameters.

use movies_etl_shared::{AssociationLookup, SourceTable};

/// First page of a change scan: `$1` = since, `$2` = limit.
pub fn changed_rows_since(schema: &str, table: SourceTable) -> String {
    let column = table.cursor_column();
    format!(
        "SELECT id, {column} AS changed_at \
         FROM {schema}.{table} \
         WHERE {column} >= $1 \
         ORDER BY {column}, id \
         LIMIT $2",
        column = column,
        schema = schema,
        table = table.name(),
    )
}

/// Following pages of a change scan: `$1` = last timestamp, `$2` = last id, `$3` = limit.
pub fn changed_rows_after(schema: &str, table: SourceTable) -> String {
    let column = table.cursor_column();
    format!(
        "SELECT id, {column} AS changed_at \
         FROM {schema}.{table} \
         WHERE ({column}, id) > ($1, $2) \
         ORDER BY {column}, id \
         LIMIT $3",
        column = column,
        schema = schema,
        table = table.name(),
    )
}

/// Distinct ids through an association table: `$1` = uuid[].
pub fn association_lookup(schema: &str, lookup: AssociationLookup) -> String {
    format!(
        "SELECT DISTINCT {select} AS id \
         FROM {schema}.{table} \
         WHERE {filter} = ANY($1) \
         ORDER BY id",
        select = lookup.select,
        schema = schema,
        table = lookup.table,
        filter = lookup.filter,
    )
}

/// Films with their people and genres: `$1` = uuid[].
///
/// People and genres are fetched by two branches of a `UNION ALL` so a film
/// with N people and M genres yields N + M rows rather than N × M. A film
/// with no people still yields one row from the first branch.
pub fn film_rows(schema: &str) -> String {
    format!(
        "SELECT fw.id AS film_id, fw.title, fw.description, fw.rating, fw.type AS film_type, \
                pfw.role AS category, p.id AS related_id, p.full_name AS related_name \
         FROM {schema}.film_work fw \
         LEFT JOIN {schema}.person_film_work pfw ON pfw.film_work_id = fw.id \
         LEFT JOIN {schema}.person p ON p.id = pfw.person_id \
         WHERE fw.id = ANY($1) \
         UNION ALL \
         SELECT fw.id, fw.title, fw.description, fw.rating, fw.type, \
                'genre', g.id, g.name \
         FROM {schema}.film_work fw \
         JOIN {schema}.genre_film_work gfw ON gfw.film_work_id = fw.id \
         JOIN {schema}.genre g ON g.id = gfw.genre_id \
         WHERE fw.id = ANY($1) \
         ORDER BY film_id, category, related_name, related_id",
        schema = schema,
    )
}

/// Persons with their roles: `$1` = uuid[].
pub fn person_rows(schema: &str) -> String {
    format!(
        "SELECT p.id AS person_id, p.full_name, pfw.role, pfw.film_work_id \
         FROM {schema}.person p \
         LEFT JOIN {schema}.person_film_work pfw ON pfw.person_id = p.id \
         WHERE p.id = ANY($1) \
         ORDER BY p.id, pfw.film_work_id, pfw.role",
        schema = schema,
    )
}

/// Genres with their films: `$1` = uuid[].
pub fn genre_rows(schema: &str) -> String {
    format!(
        "SELECT g.id AS genre_id, g.name, g.description, gfw.film_work_id \
         FROM {schema}.genre g \
         LEFT JOIN {schema}.genre_film_work gfw ON gfw.genre_id = g.id \
         WHERE g.id = ANY($1) \
         ORDER BY g.id, gfw.film_work_id",
        schema = schema,
    )
}
