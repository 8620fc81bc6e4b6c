use std::fmt;

/// One stage of the lakehouse, analogous to a bronze/silver/gold medallion layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    /// Files exactly as downloaded
    Staging,
    /// Raw extracts in a readable tabular form
    Copper,
    /// Normalized per-source segments
    Iron,
    /// Consolidated, served artifacts
    Titanium,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Staging => "staging",
            Tier::Copper => "copper",
            Tier::Iron => "iron",
            Tier::Titanium => "titanium",
        }
    }

    /// Object key of `path` inside this tier.
    pub fn key(&self, path: &str) -> String {
        let path = path.trim_matches('/');
        if path.is_empty() {
            self.as_str().to_string()
        } else {
            format!("{}/{}", self.as_str(), path)
        }
    }

    /// Folder holding one source's raw statistics tables.
    pub fn statistics_folder(&self, folder: &str) -> String {
        self.key(&format!("statistics/{}", folder))
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Folder under the iron tier that holds one source's segment-set.
pub fn segment_folder(source_id: &str) -> String {
    Tier::Iron.statistics_folder(source_id)
}

/// Key of the `index`-th (1-based) segment of a source.
pub fn segment_key(source_id: &str, index: usize) -> String {
    format!("{}/{}_{}.csv", segment_folder(source_id), source_id, index)
}
