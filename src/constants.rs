/// Source id constants to ensure consistency across the codebase.
/// These are the names used on the CLI, in configuration and as segment-set folders.
pub const GAPMINDER_FAST_TRACK: &str = "gapminder_fast_track";
pub const GAPMINDER_SYSTEMA_GLOBALIS: &str = "gapminder_systema_globalis";
pub const WORLD_DEVELOPMENT_INDICATORS: &str = "world_development_indicators";
pub const UNDATA: &str = "undata";
pub const SDG_INDICATORS: &str = "sdg_indicators";
pub const WORLD_STANDARDS: &str = "world_standards";
pub const BIG_MAC_INDEX: &str = "big_mac_index";

/// Get all built-in source ids, in registration order
pub fn get_supported_sources() -> Vec<&'static str> {
    vec![
        GAPMINDER_FAST_TRACK,
        GAPMINDER_SYSTEMA_GLOBALIS,
        WORLD_DEVELOPMENT_INDICATORS,
        UNDATA,
        SDG_INDICATORS,
        WORLD_STANDARDS,
        BIG_MAC_INDEX,
    ]
}

// Sentinels written into the catalog
pub const TODO_SENTINEL: &str = "TODO";
pub const NOTE_NOT_AVAILABLE: &str = "Not available.";

// Pipeline defaults
pub const DEFAULT_MIN_COUNTRIES: usize = 30;
pub const DEFAULT_BATCH_SIZE: usize = 500;
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;
pub const POWER_STATIONS_DATASET: &str = "Global power stations of the world";

// Object keys, relative to the storage root
pub const COUNTRY_LOOKUP_PATH: &str = "copper/meta/country_lookup.csv";
pub const MASTER_STATS_PATH: &str = "titanium/statistics/master_stats.csv";
pub const MASTER_META_PATH: &str = "titanium/meta/master_meta.csv";
pub const MASTER_CONFIG_PATH: &str = "titanium/meta/master_config.csv";
pub const SEGMENT_MANIFEST: &str = "_manifest.json";
