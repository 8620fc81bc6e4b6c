use super::base::{ColumnRef, DatasetKeyRule, SourceProfile, ValueRule};
use crate::constants;

/// UN SDG Indicators Database export.
pub const SDG_INDICATORS: SourceProfile = SourceProfile {
    display_name: "SDG Indicators",
    country_column: ColumnRef::Named("GeoAreaCode"),
    period_column: ColumnRef::Named("TimePeriod"),
    dataset_key: DatasetKeyRule::Column("SeriesDescription"),
    value: ValueRule::Column(ColumnRef::Named("Value")),
    citation: "United Nations Sustainable Development Goals (SDG) Indicators Database. {Source} \
               Goal {Goal} Target {Target} Indicator {Indicator} Series ID: {SeriesCode}",
    link: "https://unstats.un.org/sdgs/dataportal",
    note: "{FootNote}",
    drop_empty_values: true,
    ..SourceProfile::base(constants::SDG_INDICATORS, "sdgindicators")
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::processing::normalize::adapters::fixtures::{table, taxonomy};
    use crate::pipeline::processing::normalize::adapters::ProfileAdapter;
    use crate::pipeline::processing::normalize::{SourceAdapter, DROP_EMPTY_VALUE};

    #[test]
    fn test_sdg_citation_and_empty_values() {
        let adapter = ProfileAdapter::new(SDG_INDICATORS);
        let raw = table(
            "sdg.csv",
            &[
                "Goal", "Target", "Indicator", "SeriesCode", "SeriesDescription", "GeoAreaCode",
                "TimePeriod", "Value", "Source", "FootNote",
            ],
            &[
                &["1", "1.1", "1.1.1", "SI_POV_DAY1", "Poverty rate", "4", "2017", "54.5", "World Bank", ""],
                &["1", "1.1", "1.1.1", "SI_POV_DAY1", "Poverty rate", "36", "2017", "", "World Bank", ""],
                &["1", "1.1", "1.1.1", "SI_POV_DAY1", "Poverty rate", "840", "2017", "1.0", "World Bank", "Estimated"],
            ],
        );

        let out = adapter.normalize(&raw, &taxonomy(), None).unwrap();

        assert_eq!(out.rows.len(), 2);
        assert_eq!(out.dropped.get(DROP_EMPTY_VALUE), Some(&1));
        let afg = &out.rows[0];
        assert_eq!(afg.dataset_key, "Poverty rate");
        assert_eq!(
            afg.source_citation,
            "United Nations Sustainable Development Goals (SDG) Indicators Database. World Bank \
             Goal 1 Target 1.1 Indicator 1.1.1 Series ID: SI_POV_DAY1"
        );
        assert_eq!(out.rows[1].note, "Estimated");
    }
}
