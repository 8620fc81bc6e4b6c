use std::collections::BTreeMap;

use crate::error::SkipReason;
use crate::pipeline::ingestion::TextEncoding;
use crate::pipeline::processing::taxonomy::CountryTaxonomy;
use crate::types::{FactRow, RawTable};

pub mod adapters;
pub mod registry;

pub use adapters::{ProfileAdapter, SourceProfile};
pub use registry::AdapterRegistry;

/// Result of normalizing one raw table: the surviving rows plus per-reason drop counts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedTable {
    pub rows: Vec<FactRow>,
    pub dropped: BTreeMap<&'static str, usize>,
}

impl NormalizedTable {
    pub fn record_drop(&mut self, reason: &'static str) {
        *self.dropped.entry(reason).or_insert(0) += 1;
    }

    pub fn dropped_total(&self) -> usize {
        self.dropped.values().sum()
    }
}

/// Labels for rows dropped inside an otherwise valid table
pub const DROP_UNRESOLVED_COUNTRY: &str = "unresolved_country";
pub const DROP_EMPTY_VALUE: &str = "empty_value";
pub const DROP_EMPTY_PERIOD: &str = "empty_period";
pub const DROP_EMPTY_DATASET_KEY: &str = "empty_dataset_key";

/// Maps one source's raw tables into canonical [`FactRow`]s.
///
/// Implementations are pure over their inputs, so a table can be normalized
/// again at any time with the same result. A table that cannot be used at all
/// is reported as a [`SkipReason`]; individual bad rows are dropped and counted
/// in [`NormalizedTable::dropped`].
pub trait SourceAdapter: Send + Sync {
    fn source_id(&self) -> &str;

    /// Folder under `copper/statistics/` holding this source's extracts
    fn copper_folder(&self) -> &str;

    fn encoding(&self) -> TextEncoding {
        TextEncoding::Utf8
    }

    /// File name of the source's own concept table, when it has one
    fn concept_file(&self) -> Option<&str> {
        None
    }

    /// Whether a file in the source folder carries observations
    fn is_data_table(&self, file_name: &str) -> bool {
        Some(file_name) != self.concept_file()
    }

    fn normalize(
        &self,
        table: &RawTable,
        taxonomy: &CountryTaxonomy,
        concepts: Option<&ConceptTable>,
    ) -> Result<NormalizedTable, SkipReason>;
}

/// A source's own metadata table, keyed by series concept id.
#[derive(Debug, Clone, Default)]
pub struct ConceptTable {
    table: RawTable,
    key_index: Option<usize>,
}

pub const CONCEPT_KEY_COLUMN: &str = "concept";

impl ConceptTable {
    pub fn new(table: RawTable) -> Self {
        let key_index = table.column_index(CONCEPT_KEY_COLUMN);
        Self { table, key_index }
    }

    pub fn len(&self) -> usize {
        self.table.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.rows.is_empty()
    }

    /// The single row describing `concept`. Zero or several matches is a skip.
    pub fn lookup(&self, concept: &str) -> Result<ConceptRow<'_>, SkipReason> {
        let mut matches = self.key_index.into_iter().flat_map(|idx| {
            self.table
                .rows
                .iter()
                .filter(move |row| self.table.cell(row, idx) == concept)
        });

        let first = matches.next();
        let extra = matches.count();
        match (first, extra) {
            (Some(row), 0) => Ok(ConceptRow {
                headers: &self.table.headers,
                row,
            }),
            (first, extra) => Err(SkipReason::ConceptLookup {
                concept: concept.to_string(),
                matches: first.map_or(0, |_| 1 + extra),
            }),
        }
    }
}

/// Borrowed view of one concept-table row.
#[derive(Debug, Clone, Copy)]
pub struct ConceptRow<'a> {
    headers: &'a [String],
    row: &'a [String],
}

impl<'a> ConceptRow<'a> {
    /// Field text, or `None` when the column is absent.
    pub fn get(&self, field: &str) -> Option<&'a str> {
        let idx = self.headers.iter().position(|h| h == field)?;
        Some(self.row.get(idx).map(|s| s.as_str()).unwrap_or(""))
    }
}

/// Remove thousands separators, keeping the value's string form otherwise intact.
pub fn strip_thousands(value: &str) -> String {
    value.trim().replace(',', "")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn concepts() -> ConceptTable {
        ConceptTable::new(RawTable::new(
            "ddf--concepts.csv",
            vec!["concept".into(), "name".into(), "updated".into()],
            vec![
                vec!["pop".into(), "Population".into(), "2023".into()],
                vec!["gdp".into(), "GDP".into(), "2022".into()],
                vec!["gdp".into(), "GDP (dup)".into(), "2022".into()],
            ],
        ))
    }

    #[test]
    fn test_strip_thousands() {
        assert_eq!(strip_thousands("12,300"), "12300");
        assert_eq!(strip_thousands(" 1,234,567.5 "), "1234567.5");
        assert_eq!(strip_thousands("0.25"), "0.25");
    }

    #[test]
    fn test_concept_lookup_requires_exactly_one_match() {
        let table = concepts();

        let row = table.lookup("pop").unwrap();
        assert_eq!(row.get("name"), Some("Population"));
        assert_eq!(row.get("missing"), None);

        assert_eq!(
            table.lookup("gdp").unwrap_err(),
            SkipReason::ConceptLookup { concept: "gdp".into(), matches: 2 }
        );
        assert_eq!(
            table.lookup("co2").unwrap_err(),
            SkipReason::ConceptLookup { concept: "co2".into(), matches: 0 }
        );
    }

    #[test]
    fn test_table_without_concept_column_never_matches() {
        let table = ConceptTable::new(RawTable::new("x.csv", vec!["id".into()], vec![vec!["pop".into()]]));
        assert!(table.lookup("pop").is_err());
    }
}
