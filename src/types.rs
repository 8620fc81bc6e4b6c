use serde::{Deserialize, Serialize};

/// One entry of the canonical country registry, keyed by its zero-padded M49 code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalCountry {
    pub m49: String,
    pub name: String,
    pub continent: String,
    pub un_region: String,
    pub world_bank_region: String,
    pub alpha_code: Option<String>,
}

/// A source table before normalization. Every cell is kept as text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    /// Object key or file name the table was read from
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(name: impl Into<String>, headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            name: name.into(),
            headers,
            rows,
        }
    }

    pub fn width(&self) -> usize {
        self.headers.len()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == column)
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.column_index(column).is_some()
    }

    /// Cell text, or "" for short rows.
    pub fn cell<'a>(&'a self, row: &'a [String], index: usize) -> &'a str {
        row.get(index).map(|s| s.as_str()).unwrap_or("")
    }

    /// File name without its folder, e.g. `ddf--concepts.csv`.
    pub fn file_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

/// A normalized observation in the canonical schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FactRow {
    pub country_m49: String,
    pub country_name: String,
    pub dataset_key: String,
    pub period: String,
    /// Original string form, thousands separators removed
    pub value: String,
    pub continent: String,
    pub un_region: String,
    pub world_bank_region: String,
    pub source_citation: String,
    pub source_link: String,
    pub note: String,
}

/// The row shape of the consolidated fact table served downstream.
///
/// Citation columns are hoisted into [`DatasetMetadata`] so long text is not
/// repeated for every observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterFactRow {
    pub country_m49: String,
    pub country_name: String,
    pub period: String,
    pub dataset_key: String,
    pub value: String,
    pub continent: String,
    pub un_region: String,
    pub world_bank_region: String,
}

impl From<FactRow> for MasterFactRow {
    fn from(row: FactRow) -> Self {
        Self {
            country_m49: row.country_m49,
            country_name: row.country_name,
            period: row.period,
            dataset_key: row.dataset_key,
            value: row.value,
            continent: row.continent,
            un_region: row.un_region,
            world_bank_region: row.world_bank_region,
        }
    }
}

/// Per-dataset metadata, taken from the first fact row seen for the key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    pub dataset_key: String,
    pub source_citation: String,
    pub source_link: String,
    pub note: String,
}

impl From<&FactRow> for DatasetMetadata {
    fn from(row: &FactRow) -> Self {
        Self {
            dataset_key: row.dataset_key.clone(),
            source_citation: row.source_citation.clone(),
            source_link: row.source_link.clone(),
            note: row.note.clone(),
        }
    }
}

/// A row of the human-curated presentation catalog.
///
/// `dataset_id` is a run-local ordinal; `dataset_key` is the stable identity.
/// Several rows may share a `dataset_key` to place a dataset in more than one
/// navigation area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub dataset_id: usize,
    pub dataset_key: String,
    pub display_label: String,
    pub source_citation: String,
    pub source_link: String,
    pub variable_type: String,
    pub nav_category: String,
    pub color: String,
    pub nav_subcategory: String,
    pub note: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_table_lookups() {
        let table = RawTable::new(
            "copper/statistics/x/ddf--datapoints--pop.csv",
            vec!["geo".into(), "time".into(), "pop".into()],
            vec![vec!["aus".into(), "2020".into()]],
        );

        assert_eq!(table.column_index("time"), Some(1));
        assert!(!table.has_column("year"));
        assert_eq!(table.cell(&table.rows[0], 2), "");
        assert_eq!(table.file_name(), "ddf--datapoints--pop.csv");
    }

    #[test]
    fn test_master_row_drops_citation_fields() {
        let row = FactRow {
            country_m49: "036".into(),
            country_name: "Australia".into(),
            dataset_key: "Population".into(),
            period: "2020".into(),
            value: "25690000".into(),
            continent: "Oceania".into(),
            un_region: "Australia and New Zealand".into(),
            world_bank_region: "East Asia & Pacific".into(),
            source_citation: "Gapminder".into(),
            source_link: "https://example.org".into(),
            note: "long note".into(),
        };

        let meta = DatasetMetadata::from(&row);
        let master = MasterFactRow::from(row);

        assert_eq!(master.country_m49, "036");
        assert_eq!(master.world_bank_region, "East Asia & Pacific");
        assert_eq!(meta.note, "long note");
    }
}
