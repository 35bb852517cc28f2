//! Identifier column resolution

use crate::{GeoTable, MorphError, Result, Value};
use std::collections::HashSet;

/// How the identifier column of a table was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdSource {
    /// The column already existed and holds unique, non-null identifiers
    Existing,
    /// The column was missing and was synthesized from row positions
    Synthesized,
}

/// Resolve `column` against the table schema
///
/// If the column exists it is verified to hold unique, non-null identifiers. If it is
/// missing, a new column with identifiers `0..len` (row positions) is added. The
/// returned table is always a copy.
pub fn ensure_id_column(table: &GeoTable, column: &str) -> Result<(GeoTable, IdSource)> {
    match table.column(column) {
        Some(values) => {
            verify_unique(column, values)?;
            Ok((table.clone(), IdSource::Existing))
        }
        None => {
            tracing::debug!("Synthesizing id column '{}' for {} rows", column, table.len());
            let ids = (0..table.len()).map(Value::from).collect();
            let table = table.clone().with_column(column, ids)?;
            Ok((table, IdSource::Synthesized))
        }
    }
}

fn verify_unique(column: &str, values: &[Value]) -> Result<()> {
    let mut seen = HashSet::with_capacity(values.len());
    for (row, value) in values.iter().enumerate() {
        let key = value.id_key().ok_or_else(|| MorphError::InvalidIdColumn {
            column: column.to_string(),
            reason: format!("row {row} has no usable identifier ({value})"),
        })?;
        if !seen.insert(key) {
            return Err(MorphError::InvalidIdColumn {
                column: column.to_string(),
                reason: format!("duplicate identifier {value} at row {row}"),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::square;

    fn two_rows() -> GeoTable {
        GeoTable::new(vec![square(0.0, 0.0, 1.0), square(2.0, 0.0, 1.0)])
    }

    #[test]
    fn test_synthesized_when_missing() {
        let (table, source) = ensure_id_column(&two_rows(), "private_id").unwrap();
        assert_eq!(source, IdSource::Synthesized);
        assert_eq!(
            table.column("private_id").unwrap(),
            &[Value::Int(0), Value::Int(1)]
        );
    }

    #[test]
    fn test_existing_is_reused() {
        let input = two_rows()
            .with_column("pid", vec![Value::from("a"), Value::from("b")])
            .unwrap();
        let (table, source) = ensure_id_column(&input, "pid").unwrap();
        assert_eq!(source, IdSource::Existing);
        assert_eq!(table, input);
    }

    #[test]
    fn test_duplicates_rejected() {
        let input = two_rows()
            .with_column("pid", vec![Value::Int(1), Value::Int(1)])
            .unwrap();
        assert!(matches!(
            ensure_id_column(&input, "pid"),
            Err(MorphError::InvalidIdColumn { .. })
        ));
    }

    #[test]
    fn test_nulls_rejected() {
        let input = two_rows()
            .with_column("pid", vec![Value::Int(1), Value::Null])
            .unwrap();
        assert!(ensure_id_column(&input, "pid").is_err());
    }
}
