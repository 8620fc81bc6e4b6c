use super::base::{ColumnRef, CountryKey, DatasetKeyRule, SourceProfile, ValueRule};
use crate::constants;
use crate::pipeline::ingestion::TextEncoding;

/// World Bank World Development Indicators, open-numbers DDF package.
///
/// Only the continuous concepts describe datapoint series; the discrete concept
/// table is ignored along with the entity tables.
pub const WORLD_DEVELOPMENT_INDICATORS: SourceProfile = SourceProfile {
    display_name: "World Development Indicators",
    encoding: TextEncoding::Latin1,
    concept_file: Some("ddf--concepts--continuous.csv"),
    ignored_prefixes: &["ddf--concepts", "ddf--entities"],
    concept_column: Some(ColumnRef::Position(2)),
    country_column: ColumnRef::Named("geo"),
    country_key: CountryKey::Alpha,
    period_column: ColumnRef::Named("time"),
    dataset_key: DatasetKeyRule::ConceptField("name"),
    value: ValueRule::ConceptColumn,
    citation: "World Bank - World Development Indicators. Series code: {series_code}",
    link: "https://github.com/open-numbers/ddf--open_numbers--world_development_indicators",
    note: "{development_relevance} {long_definition} {statistical_concept_and_methodology} \
           {general_comments} {limitations_and_exceptions}",
    note_strip: &["\\n"],
    ..SourceProfile::base(constants::WORLD_DEVELOPMENT_INDICATORS, "world-development-indicators")
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SkipReason;
    use crate::pipeline::processing::normalize::adapters::fixtures::{table, taxonomy};
    use crate::pipeline::processing::normalize::adapters::ProfileAdapter;
    use crate::pipeline::processing::normalize::{ConceptTable, SourceAdapter};

    fn concepts() -> ConceptTable {
        ConceptTable::new(table(
            "ddf--concepts--continuous.csv",
            &[
                "concept",
                "name",
                "series_code",
                "development_relevance",
                "long_definition",
                "statistical_concept_and_methodology",
                "general_comments",
                "limitations_and_exceptions",
            ],
            &[&[
                "sp_pop_totl",
                "Population, total",
                "SP.POP.TOTL",
                "Relevance.\\n",
                "Definition.",
                "",
                "Comments.",
                "",
            ]],
        ))
    }

    #[test]
    fn test_wdi_note_concatenates_and_strips_escaped_newlines() {
        let adapter = ProfileAdapter::new(WORLD_DEVELOPMENT_INDICATORS);
        let raw = table(
            "ddf--datapoints--sp_pop_totl--by--geo--time.csv",
            &["geo", "time", "sp_pop_totl"],
            &[&["vnm", "2015", "92,677,076"]],
        );

        let out = adapter.normalize(&raw, &taxonomy(), Some(&concepts())).unwrap();
        let row = &out.rows[0];
        assert_eq!(row.country_name, "Viet Nam");
        assert_eq!(row.value, "92677076");
        assert_eq!(
            row.source_citation,
            "World Bank - World Development Indicators. Series code: SP.POP.TOTL"
        );
        assert!(row.note.starts_with("Relevance. Definition."));
        assert!(!row.note.contains("\\n"));
    }

    #[test]
    fn test_global_only_series_without_geo_is_skipped() {
        let adapter = ProfileAdapter::new(WORLD_DEVELOPMENT_INDICATORS);
        let raw = table(
            "ddf--datapoints--sp_pop_totl--by--global--time.csv",
            &["global", "time", "sp_pop_totl"],
            &[&["world", "2015", "7,000,000,000"]],
        );

        assert_eq!(
            adapter.normalize(&raw, &taxonomy(), Some(&concepts())).unwrap_err(),
            SkipReason::MissingCountryColumn
        );
    }

    #[test]
    fn test_discrete_concepts_are_ignored() {
        let adapter = ProfileAdapter::new(WORLD_DEVELOPMENT_INDICATORS);
        assert!(!adapter.is_data_table("ddf--concepts--discrete.csv"));
        assert!(!adapter.is_data_table("ddf--concepts--continuous.csv"));
    }
}
