//! Country Taxonomy Resolver
//!
//! The canonical registry is loaded once per run and passed explicitly to every
//! adapter. Lookups never fail: an unknown code or name yields `None`, and the
//! caller drops the row.

use std::collections::HashMap;
use tracing::{info, warn};

use crate::error::{LakehouseError, Result};
use crate::pipeline::ingestion::parse_csv;
use crate::types::{CanonicalCountry, RawTable};

/// Static per-source substitutions applied to a country name before lookup.
pub type AliasTable = [(&'static str, &'static str)];

const M49_COLUMN: &str = "m49_a3_country";
const NAME_COLUMN: &str = "country";
const CONTINENT_COLUMN: &str = "continent";
const UN_REGION_COLUMN: &str = "region_un";
const WB_REGION_COLUMN: &str = "region_wb";
const ALPHA_COLUMN: &str = "su_a3";

/// Zero-pad a numeric M49 code to three digits. Non-numeric input is rejected.
pub fn pad_m49(code: &str) -> Option<String> {
    let code = code.trim();
    // Some extracts carry codes as floats, e.g. "4.0"
    let code = code.strip_suffix(".0").unwrap_or(code);
    if code.is_empty() || !code.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(format!("{:0>3}", code))
}

#[derive(Debug, Clone, Default)]
pub struct CountryTaxonomy {
    countries: Vec<CanonicalCountry>,
    by_m49: HashMap<String, usize>,
    by_alpha: HashMap<String, usize>,
    by_name: HashMap<String, usize>,
}

impl CountryTaxonomy {
    pub fn new(countries: Vec<CanonicalCountry>) -> Self {
        let mut taxonomy = CountryTaxonomy::default();
        for country in countries {
            if taxonomy.by_m49.contains_key(&country.m49) {
                warn!("Duplicate M49 code {} ({}) ignored", country.m49, country.name);
                continue;
            }
            let idx = taxonomy.countries.len();
            taxonomy.by_m49.insert(country.m49.clone(), idx);
            if let Some(alpha) = &country.alpha_code {
                taxonomy.by_alpha.entry(alpha.to_uppercase()).or_insert(idx);
            }
            taxonomy.by_name.entry(country.name.clone()).or_insert(idx);
            taxonomy.countries.push(country);
        }
        taxonomy
    }

    /// Build the registry from the country lookup table.
    pub fn from_table(table: &RawTable) -> Result<Self> {
        let column = |name: &str| {
            table.column_index(name).ok_or_else(|| {
                LakehouseError::InvalidTaxonomy(format!(
                    "country lookup '{}' has no '{}' column",
                    table.name, name
                ))
            })
        };
        let m49_idx = column(M49_COLUMN)?;
        let name_idx = column(NAME_COLUMN)?;
        let continent_idx = column(CONTINENT_COLUMN)?;
        let un_idx = column(UN_REGION_COLUMN)?;
        let wb_idx = column(WB_REGION_COLUMN)?;
        let alpha_idx = table.column_index(ALPHA_COLUMN);

        let mut countries = Vec::with_capacity(table.rows.len());
        for (line, row) in table.rows.iter().enumerate() {
            let raw_code = table.cell(row, m49_idx);
            let m49 = pad_m49(raw_code).ok_or_else(|| {
                LakehouseError::InvalidTaxonomy(format!(
                    "row {} has a non-numeric M49 code '{}'",
                    line + 1,
                    raw_code
                ))
            })?;
            let alpha_code = alpha_idx
                .map(|i| table.cell(row, i).trim())
                .filter(|s| !s.is_empty())
                .map(|s| s.to_uppercase());

            countries.push(CanonicalCountry {
                m49,
                name: table.cell(row, name_idx).trim().to_string(),
                continent: table.cell(row, continent_idx).trim().to_string(),
                un_region: table.cell(row, un_idx).trim().to_string(),
                world_bank_region: table.cell(row, wb_idx).trim().to_string(),
                alpha_code,
            });
        }

        if countries.is_empty() {
            return Err(LakehouseError::InvalidTaxonomy(format!(
                "country lookup '{}' is empty",
                table.name
            )));
        }

        let taxonomy = Self::new(countries);
        info!("Loaded {} canonical countries", taxonomy.len());
        Ok(taxonomy)
    }

    pub fn from_csv(name: &str, content: &str) -> Result<Self> {
        Self::from_table(&parse_csv(name, content)?)
    }

    pub fn len(&self) -> usize {
        self.countries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.countries.is_empty()
    }

    pub fn countries(&self) -> &[CanonicalCountry] {
        &self.countries
    }

    /// Look up by alphabetic code, case-insensitively.
    pub fn resolve_by_alpha(&self, code: &str) -> Option<&CanonicalCountry> {
        let code = code.trim().to_uppercase();
        self.by_alpha.get(&code).map(|&i| &self.countries[i])
    }

    /// Look up by M49 code. `"4"`, `"04"` and `"004"` are the same country.
    pub fn resolve_by_m49(&self, code: &str) -> Option<&CanonicalCountry> {
        let code = pad_m49(code)?;
        self.by_m49.get(&code).map(|&i| &self.countries[i])
    }

    /// Look up by canonical name after substituting `name` through `aliases`.
    pub fn resolve_by_name(&self, name: &str, aliases: &AliasTable) -> Option<&CanonicalCountry> {
        let name = name.trim();
        let canonical = aliases
            .iter()
            .find(|(alias, _)| *alias == name)
            .map(|(_, target)| *target)
            .unwrap_or(name);
        self.by_name.get(canonical).map(|&i| &self.countries[i])
    }
}
