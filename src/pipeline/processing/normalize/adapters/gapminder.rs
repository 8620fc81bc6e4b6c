use super::base::{ColumnRef, CountryKey, DatasetKeyRule, SourceProfile, ValueRule};
use crate::constants;
use crate::pipeline::ingestion::TextEncoding;

const DDF_IGNORED: &[&str] = &["ddf--concepts", "ddf--entities"];

/// Gapminder Fast Track: DDF datapoints with the country code in the first column.
pub const FAST_TRACK: SourceProfile = SourceProfile {
    display_name: "Gapminder Fast Track",
    encoding: TextEncoding::Latin1,
    concept_file: Some("ddf--concepts.csv"),
    ignored_prefixes: DDF_IGNORED,
    concept_column: Some(ColumnRef::Position(2)),
    concept_fill: "Not available",
    country_column: ColumnRef::Position(0),
    country_key: CountryKey::Alpha,
    period_column: ColumnRef::Named("time"),
    dataset_key: DatasetKeyRule::ConceptField("name"),
    value: ValueRule::ConceptColumn,
    citation: "Gapminder Fastrack Indicators. Updated {updated}",
    link: "{source_url}",
    note: "{description}",
    ..SourceProfile::base(constants::GAPMINDER_FAST_TRACK, "gapminder-fast-track")
};

/// Gapminder Systema Globalis: DDF datapoints keyed by `geo`.
pub const SYSTEMA_GLOBALIS: SourceProfile = SourceProfile {
    display_name: "Gapminder Systema Globalis",
    encoding: TextEncoding::Latin1,
    concept_file: Some("ddf--concepts.csv"),
    ignored_prefixes: DDF_IGNORED,
    concept_column: Some(ColumnRef::Position(2)),
    country_column: ColumnRef::Named("geo"),
    country_key: CountryKey::Alpha,
    period_column: ColumnRef::Named("time"),
    dataset_key: DatasetKeyRule::ConceptField("name"),
    value: ValueRule::ConceptColumn,
    citation: "Gapminder Systema Globalis Indicators.",
    link: "{source_url}",
    note: "{description} {description_long}",
    ..SourceProfile::base(constants::GAPMINDER_SYSTEMA_GLOBALIS, "gapminder-systema-globalis")
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SkipReason;
    use crate::pipeline::processing::normalize::adapters::fixtures::{table, taxonomy};
    use crate::pipeline::processing::normalize::adapters::ProfileAdapter;
    use crate::pipeline::processing::normalize::{ConceptTable, SourceAdapter, DROP_UNRESOLVED_COUNTRY};

    fn concepts() -> ConceptTable {
        ConceptTable::new(table(
            "ddf--concepts.csv",
            &["concept", "name", "updated", "source_url", "description", "description_long"],
            &[
                &["pop", "Population", "2023-01", "https://gapminder.org/pop", "People", ""],
                &["lex", "Life expectancy", "", "", "Years", "At birth"],
                &["dup", "Dup A", "", "", "", ""],
                &["dup", "Dup B", "", "", "", ""],
            ],
        ))
    }

    #[test]
    fn test_fast_track_uppercases_codes_and_builds_citation() {
        let adapter = ProfileAdapter::new(FAST_TRACK);
        let raw = table(
            "ddf--datapoints--pop--by--country--time.csv",
            &["country", "time", "pop"],
            &[
                &["aus", "2020", "25,690,000"],
                &["afg", "2020", "38,900,000"],
                &["wld", "2020", "7,800,000,000"],
            ],
        );

        let out = adapter.normalize(&raw, &taxonomy(), Some(&concepts())).unwrap();

        assert_eq!(out.rows.len(), 2);
        assert_eq!(out.dropped.get(DROP_UNRESOLVED_COUNTRY), Some(&1));
        let aus = &out.rows[0];
        assert_eq!(aus.country_m49, "036");
        assert_eq!(aus.dataset_key, "Population");
        assert_eq!(aus.value, "25690000");
        assert_eq!(aus.source_citation, "Gapminder Fastrack Indicators. Updated 2023-01");
        assert_eq!(aus.source_link, "https://gapminder.org/pop");
        assert_eq!(aus.note, "People");
    }

    #[test]
    fn test_fast_track_fills_empty_concept_fields() {
        let adapter = ProfileAdapter::new(FAST_TRACK);
        let raw = table("ddf--datapoints--lex.csv", &["geo", "time", "lex"], &[&["usa", "2019", "78.5"]]);

        let out = adapter.normalize(&raw, &taxonomy(), Some(&concepts())).unwrap();
        assert_eq!(
            out.rows[0].source_citation,
            "Gapminder Fastrack Indicators. Updated Not available"
        );
    }

    #[test]
    fn test_ambiguous_or_unknown_concept_skips_table() {
        let adapter = ProfileAdapter::new(FAST_TRACK);
        let dup = table("ddf--datapoints--dup.csv", &["geo", "time", "dup"], &[&["aus", "2020", "1"]]);
        let unknown = table("ddf--datapoints--co2.csv", &["geo", "time", "co2"], &[&["aus", "2020", "1"]]);

        assert_eq!(
            adapter.normalize(&dup, &taxonomy(), Some(&concepts())).unwrap_err(),
            SkipReason::ConceptLookup { concept: "dup".into(), matches: 2 }
        );
        assert_eq!(
            adapter.normalize(&unknown, &taxonomy(), Some(&concepts())).unwrap_err(),
            SkipReason::ConceptLookup { concept: "co2".into(), matches: 0 }
        );
    }

    #[test]
    fn test_table_without_time_column_is_skipped() {
        let adapter = ProfileAdapter::new(SYSTEMA_GLOBALIS);
        let raw = table("ddf--datapoints--pop--by--geo.csv", &["geo", "gender", "pop"], &[&["aus", "f", "1"]]);

        assert_eq!(
            adapter.normalize(&raw, &taxonomy(), Some(&concepts())).unwrap_err(),
            SkipReason::MissingPeriodColumn
        );
    }

    #[test]
    fn test_systema_globalis_joins_descriptions() {
        let adapter = ProfileAdapter::new(SYSTEMA_GLOBALIS);
        let raw = table("ddf--datapoints--lex.csv", &["geo", "time", "lex"], &[&["mmr", "2001", "60.1"]]);

        let out = adapter.normalize(&raw, &taxonomy(), Some(&concepts())).unwrap();
        let row = &out.rows[0];
        assert_eq!(row.country_name, "Myanmar");
        assert_eq!(row.note, "Years At birth");
        assert_eq!(row.source_citation, "Gapminder Systema Globalis Indicators.");
    }

    #[test]
    fn test_concept_and_entity_tables_are_not_data() {
        let adapter = ProfileAdapter::new(SYSTEMA_GLOBALIS);
        assert!(!adapter.is_data_table("ddf--concepts.csv"));
        assert!(!adapter.is_data_table("ddf--entities--geo--country.csv"));
        assert!(adapter.is_data_table("ddf--datapoints--pop--by--geo--time.csv"));
    }
}
