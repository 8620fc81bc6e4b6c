use super::base::{ColumnRef, PositionalLayout, SourceProfile};
use crate::constants;

const COLUMNS: &[&str] = &["m49_a3_country", "country", "year", "dataset_raw", "value", "note", "source"];

/// UNdata exports. Headers vary between downloads, so columns are taken by
/// position: 9-column files carry two extra columns at positions 4 and 5, and
/// any other width than 7 is not understood. The first two data rows hold
/// export metadata.
pub const UNDATA: SourceProfile = SourceProfile {
    display_name: "UNdata",
    layout: Some(PositionalLayout {
        columns: COLUMNS,
        drop_columns: Some((9, &[4, 5])),
    }),
    country_column: ColumnRef::Named("m49_a3_country"),
    link: "https://data.un.org/",
    skip_leading_rows: 2,
    ..SourceProfile::base(constants::UNDATA, "undata")
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::NOTE_NOT_AVAILABLE;
    use crate::error::SkipReason;
    use crate::pipeline::processing::normalize::adapters::fixtures::{table, taxonomy};
    use crate::pipeline::processing::normalize::adapters::ProfileAdapter;
    use crate::pipeline::processing::normalize::SourceAdapter;

    #[test]
    fn test_undata_nine_column_export() {
        let adapter = ProfileAdapter::new(UNDATA);
        let raw = table(
            "SYB66_1_Population.csv",
            &["T02", "Population", "", "", "", "", "", "", ""],
            &[
                &["Region/Country", "", "Year", "Series", "x", "y", "Value", "Footnotes", "Source"],
                &["1", "Total", "2010", "Population", "x", "y", "6,956,824", "", "UN"],
                &["4", "Afghanistan", "2010", "Population", "x", "y", "28,189", "", "UN Population Division"],
                &["36", "Australia", "2010", "Population", "x", "y", "22,163", "Estimate.", "ABS"],
            ],
        );

        let out = adapter.normalize(&raw, &taxonomy(), None).unwrap();

        assert_eq!(out.rows.len(), 2);
        let afg = &out.rows[0];
        assert_eq!(afg.country_m49, "004");
        assert_eq!(afg.country_name, "Afghanistan");
        assert_eq!(afg.period, "2010");
        assert_eq!(afg.value, "28189");
        assert_eq!(afg.source_citation, "UN Population Division");
        assert_eq!(afg.source_link, "https://data.un.org/");
        assert_eq!(afg.note, NOTE_NOT_AVAILABLE);
        assert_eq!(out.rows[1].note, "Estimate.");
    }

    #[test]
    fn test_undata_unexpected_width_is_skipped() {
        let adapter = ProfileAdapter::new(UNDATA);
        let raw = table("odd.csv", &["a", "b", "c", "d", "e", "f", "g", "h"], &[]);

        assert_eq!(
            adapter.normalize(&raw, &taxonomy(), None).unwrap_err(),
            SkipReason::UnexpectedShape { width: 8 }
        );
    }
}
