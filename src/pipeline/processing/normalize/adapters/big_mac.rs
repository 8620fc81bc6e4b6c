use super::base::{ColumnRef, CountryKey, DatasetKeyRule, PeriodFormat, SourceProfile, ValueRule};
use crate::constants;

/// The Economist's Big Mac index, one price per country and release date.
pub const BIG_MAC_INDEX: SourceProfile = SourceProfile {
    display_name: "Big Mac Index",
    country_column: ColumnRef::Named("iso_a3"),
    country_key: CountryKey::Alpha,
    period_column: ColumnRef::Named("date"),
    period_format: PeriodFormat::DatePrefix,
    dataset_key: DatasetKeyRule::Fixed("Big mac index (US Dollars)"),
    value: ValueRule::Column(ColumnRef::Named("dollar_price")),
    citation: "The Economist Big Mac Index https://www.economist.com/big-mac-index",
    link: "https://github.com/TheEconomist/big-mac-data",
    note: "THE BIG MAC index was invented by The Economist in 1986 as a lighthearted guide to \
           whether currencies are at their correct level. It is based on the theory of \
           purchasing-power parity (PPP), the notion that in the long run exchange rates should \
           move towards the rate that would equalise the prices of an identical basket of goods \
           and services (in this case, a burger) in any two countries.",
    ..SourceProfile::base(constants::BIG_MAC_INDEX, "big-mac-index")
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::processing::normalize::adapters::fixtures::{table, taxonomy};
    use crate::pipeline::processing::normalize::adapters::ProfileAdapter;
    use crate::pipeline::processing::normalize::SourceAdapter;

    #[test]
    fn test_big_mac_year_from_date() {
        let adapter = ProfileAdapter::new(BIG_MAC_INDEX);
        let raw = table(
            "big-mac-index.csv",
            &["date", "iso_a3", "currency_code", "dollar_price"],
            &[
                &["2021-07-01", "AUS", "AUD", "4.98"],
                &["2021-07-01", "EUZ", "EUR", "5.02"],
            ],
        );

        let out = adapter.normalize(&raw, &taxonomy(), None).unwrap();

        assert_eq!(out.rows.len(), 1);
        let row = &out.rows[0];
        assert_eq!(row.period, "2021");
        assert_eq!(row.dataset_key, "Big mac index (US Dollars)");
        assert_eq!(row.value, "4.98");
        assert!(row.note.starts_with("THE BIG MAC index was invented by The Economist in 1986"));
    }
}
