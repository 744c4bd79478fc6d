//! Per-root handling of rows that fail to decode.

use std::collections::HashSet;

use tracing::warn;
use uuid::Uuid;

use crate::errors::SourceError;

/// Drop every row of a root that has at least one undecodable row.
///
/// `decoded` pairs each row's root id with its decode result. Rejected roots
/// are logged and look to callers like roots with no rows. Surviving rows
/// keep their order.
pub fn keep_whole_roots<T>(
    decoded: Vec<(Uuid, Result<T, SourceError>)>,
    kind: &'static str,
) -> Vec<T> {
    let mut rejected = HashSet::new();
    for (root, result) in &decoded {
        if let Err(e) = result {
            if rejected.insert(*root) {
                warn!(
                    kind = kind,
                    root_id = %root,
                    error = %e,
                    "Rejecting root with undecodable row"
                );
            }
        }
    }

    decoded
        .into_iter()
        .filter(|(root, _)| !rejected.contains(root))
        .filter_map(|(_, result)| result.ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_row_rejects_its_whole_root() {
        let broken = Uuid::new_v4();
        let intact = Uuid::new_v4();
        let decoded = vec![
            (broken, Ok("broken/actor")),
            (intact, Ok("intact/actor")),
            (broken, Err(SourceError::decode("column \"related_name\": invalid utf-8"))),
            (intact, Ok("intact/genre")),
            (broken, Ok("broken/genre")),
        ];

        let rows = keep_whole_roots(decoded, "film");

        assert_eq!(rows, vec!["intact/actor", "intact/genre"]);
    }

    #[test]
    fn test_clean_rows_pass_through() {
        let root = Uuid::new_v4();
        let rows = keep_whole_roots(vec![(root, Ok(1)), (root, Ok(2))], "genre");
        assert_eq!(rows, vec![1, 2]);
    }
}
