// Profile-driven adapter and the built-in source profiles
pub mod base;

pub mod big_mac;
pub mod gapminder;
pub mod sdg;
pub mod undata;
pub mod wdi;
pub mod world_standards;

pub use base::{
    ColumnRef, CountryKey, DatasetKeyRule, PeriodFormat, PositionalLayout, ProfileAdapter,
    SourceProfile, Template, ValueRule,
};

/// Every built-in profile, in registration order.
pub fn builtin_profiles() -> Vec<SourceProfile> {
    vec![
        gapminder::FAST_TRACK,
        gapminder::SYSTEMA_GLOBALIS,
        wdi::WORLD_DEVELOPMENT_INDICATORS,
        undata::UNDATA,
        sdg::SDG_INDICATORS,
        world_standards::WORLD_STANDARDS,
        big_mac::BIG_MAC_INDEX,
    ]
}
