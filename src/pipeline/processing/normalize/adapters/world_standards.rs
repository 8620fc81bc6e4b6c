use super::base::{ColumnRef, CountryKey, SourceProfile};
use crate::constants;
use crate::pipeline::processing::taxonomy::AliasTable;

/// Country names used by the world-standards tables, mapped to registry names.
pub const ALIASES: &AliasTable = &[
    ("Bolivia", "Bolivia (Plurin. State of)"),
    ("Bonaire", "Bonaire, St. Eustatius & Saba"),
    ("Brunei", "Brunei Darussalam"),
    ("Burma (officially Myanmar)", "Myanmar"),
    ("Myanmar (formerly Burma)", "Myanmar"),
    ("China, Peoples Republic of", "China"),
    ("Congo, Democratic Republic of the (Congo-Kinshasa)", "Dem. Rep. of the Congo"),
    ("Congo, Republic of the (Congo-Brazzaville)", "Congo"),
    ("Czechia (Czech Republic)", "Czechia"),
    ("Côte d'Ivoire (Ivory Coast)", "Côte d'Ivoire"),
    ("United Kingdom (UK)", "United Kingdom"),
    ("Falkland Islands", "Falkland Islands (Malvinas)"),
    ("Gabon (Gabonese Republic)", "Gabon"),
    ("Holland (officially the Netherlands)", "Netherlands"),
    ("Hong Kong", "China, Hong Kong SAR"),
    ("Iran", "Iran (Islamic Republic of)"),
    ("Ireland (Eire)", "Ireland"),
    ("Korea, South", "Republic of Korea"),
    ("Laos", "Lao People's Dem. Rep."),
    ("Micronesia (officially: Federated States of Micronesia)", "Micronesia (Fed. States of)"),
    ("Moldova", "Republic of Moldova"),
    ("New Caledonia (French overseas collectivity)", "New Caledonia"),
    ("Palestine", "State of Palestine"),
    ("Russia (officially the Russian Federation)", "Russian Federation"),
    ("Syria", "Syrian Arab Republic"),
    ("Suriname (Surinam)", "Suriname"),
    ("Tanzania", "United Rep. of Tanzania"),
    ("United Arab Emirates (UAE)", "United Arab Emirates"),
    ("United States of America (USA)", "United States of America"),
    ("Venezuela", "Venezuela (Boliv. Rep. of)"),
    ("Vietnam", "Viet Nam"),
];

/// Hand-collected tables from the world-standards website, joined on country name.
pub const WORLD_STANDARDS: SourceProfile = SourceProfile {
    display_name: "World Standards",
    country_column: ColumnRef::Named("country"),
    country_key: CountryKey::Name,
    aliases: ALIASES,
    ..SourceProfile::base(constants::WORLD_STANDARDS, "world-standards-unofficial-website")
};
