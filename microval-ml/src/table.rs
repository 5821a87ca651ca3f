//! Combined metadata + abundance table.
//!
//! The table is stored row by row, the way MetaPhlAn-style profiles are laid
//! out on disk: each row starts with an identifier (taxon name or metadata
//! key) followed by one cell per sample. Metadata rows and abundance rows are
//! interleaved freely; cells stay as strings until a dataset is built.

use microval_core::{MicrovalError, Result};

/// A sample-column table with string cells.
///
/// Every row holds exactly one cell per sample; the constructors enforce it
/// and the fields stay private so it cannot be broken afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct AbundanceTable {
    id_column: String,
    sample_names: Vec<String>,
    row_ids: Vec<String>,
    /// `cells[row][sample]`
    cells: Vec<Vec<String>>,
}

impl AbundanceTable {
    /// Create a table, validating that every row has one cell per sample.
    ///
    /// # Errors
    ///
    /// Returns a parse error if the number of row identifiers does not match
    /// the number of rows, or any row is ragged.
    pub fn new(
        id_column: String,
        sample_names: Vec<String>,
        row_ids: Vec<String>,
        cells: Vec<Vec<String>>,
    ) -> Result<Self> {
        if row_ids.len() != cells.len() {
            return Err(MicrovalError::Parse(format!(
                "{} row identifiers for {} rows",
                row_ids.len(),
                cells.len()
            )));
        }
        for (i, row) in cells.iter().enumerate() {
            if row.len() != sample_names.len() {
                return Err(MicrovalError::Parse(format!(
                    "row {} ('{}') has {} cells, expected {}",
                    i,
                    row_ids[i],
                    row.len(),
                    sample_names.len()
                )));
            }
        }
        Ok(Self {
            id_column,
            sample_names,
            row_ids,
            cells,
        })
    }

    /// Build a table from full records (identifier first, then sample cells).
    ///
    /// `header` is the header record including the identifier column name.
    pub fn from_records<I>(header: Vec<String>, records: I) -> Result<Self>
    where
        I: IntoIterator<Item = Vec<String>>,
    {
        let mut header = header.into_iter();
        let id_column = header
            .next()
            .ok_or_else(|| MicrovalError::Parse("empty header".into()))?;
        let sample_names: Vec<String> = header.collect();

        let mut row_ids = Vec::new();
        let mut cells = Vec::new();
        for record in records {
            let mut fields = record.into_iter();
            let Some(id) = fields.next() else {
                continue;
            };
            row_ids.push(id);
            cells.push(fields.collect());
        }

        Self::new(id_column, sample_names, row_ids, cells)
    }

    /// Name of the identifier column (first header cell).
    pub fn id_column(&self) -> &str {
        &self.id_column
    }

    /// Sample identifiers, one per data column.
    pub fn sample_names(&self) -> &[String] {
        &self.sample_names
    }

    /// Row identifiers in file order, header excluded.
    pub fn row_ids(&self) -> &[String] {
        &self.row_ids
    }

    /// `(identifier, cells)` for every row in file order.
    pub fn rows(&self) -> impl Iterator<Item = (&str, &[String])> + '_ {
        self.row_ids
            .iter()
            .zip(&self.cells)
            .map(|(id, cells)| (id.as_str(), cells.as_slice()))
    }

    /// Number of sample columns.
    pub fn n_samples(&self) -> usize {
        self.sample_names.len()
    }

    /// Number of rows (header excluded).
    pub fn n_rows(&self) -> usize {
        self.cells.len()
    }

    /// Cells of one row, or `None` if out of range.
    pub fn row(&self, idx: usize) -> Option<&[String]> {
        self.cells.get(idx).map(|r| r.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(fields: &[&str]) -> Vec<String> {
        fields.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn from_records_splits_identifier_column() {
        let table = AbundanceTable::from_records(
            rec(&["clade_name", "S1", "S2"]),
            vec![rec(&["study", "A", "B"]), rec(&["k__Bacteria", "99.5", "98.0"])],
        )
        .unwrap();
        assert_eq!(table.id_column(), "clade_name");
        assert_eq!(table.sample_names(), &["S1", "S2"]);
        assert_eq!(table.row_ids(), &["study", "k__Bacteria"]);
        assert_eq!(table.n_rows(), 2);
        assert_eq!(table.row(1).unwrap()[0], "99.5");
        assert!(table.row(2).is_none());
    }

    #[test]
    fn ragged_row_rejected() {
        let result = AbundanceTable::from_records(
            rec(&["id", "S1", "S2"]),
            vec![rec(&["taxon", "1.0"])],
        );
        assert!(matches!(result, Err(MicrovalError::Parse(_))));
    }

    #[test]
    fn row_id_count_must_match_rows() {
        let result = AbundanceTable::new(
            "id".into(),
            rec(&["S1"]),
            rec(&["a", "b"]),
            vec![rec(&["1.0"])],
        );
        assert!(matches!(result, Err(MicrovalError::Parse(_))));
    }

    #[test]
    fn rows_pair_ids_with_cells() {
        let table = AbundanceTable::new(
            "id".into(),
            rec(&["S1", "S2"]),
            rec(&["status", "taxon"]),
            vec![rec(&["CRC", "Healthy"]), rec(&["0.5", "1.5"])],
        )
        .unwrap();
        let rows: Vec<_> = table.rows().collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].0, "taxon");
        assert_eq!(rows[1].1, &["0.5", "1.5"]);
    }

    #[test]
    fn empty_header_rejected() {
        assert!(AbundanceTable::from_records(Vec::new(), Vec::new()).is_err());
    }
}
