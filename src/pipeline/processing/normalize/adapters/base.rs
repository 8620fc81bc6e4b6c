use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;

use crate::constants::NOTE_NOT_AVAILABLE;
use crate::error::SkipReason;
use crate::pipeline::ingestion::TextEncoding;
use crate::pipeline::processing::normalize::{
    strip_thousands, ConceptRow, ConceptTable, NormalizedTable, SourceAdapter,
    DROP_EMPTY_DATASET_KEY, DROP_EMPTY_PERIOD, DROP_EMPTY_VALUE, DROP_UNRESOLVED_COUNTRY,
};
use crate::pipeline::processing::taxonomy::{AliasTable, CountryTaxonomy};
use crate::types::{CanonicalCountry, FactRow, RawTable};

/// Where a column lives in a raw table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRef {
    Named(&'static str),
    /// Zero-based position, for extracts whose header names vary
    Position(usize),
}

impl ColumnRef {
    fn resolve(&self, table: &RawTable) -> Option<usize> {
        match *self {
            ColumnRef::Named(name) => table.column_index(name),
            ColumnRef::Position(idx) => (idx < table.width()).then_some(idx),
        }
    }
}

/// Which registry key a source uses to identify countries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountryKey {
    Alpha,
    M49,
    Name,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodFormat {
    Plain,
    /// The year before the first `-`, e.g. `2021-07-01` → `2021`
    DatePrefix,
}

/// Positional reshaping for sources without stable headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionalLayout {
    /// Names given to the columns once the table has the expected width
    pub columns: &'static [&'static str],
    /// Tables of this width lose the listed column positions first
    pub drop_columns: Option<(usize, &'static [usize])>,
}

/// How the dataset key of a row is found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetKeyRule {
    /// A field of the series' concept row
    ConceptField(&'static str),
    /// A column of the raw row
    Column(&'static str),
    Fixed(&'static str),
}

/// Where the observation value is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueRule {
    /// The column named after the series concept
    ConceptColumn,
    Column(ColumnRef),
}

/// Per-source configuration driving [`ProfileAdapter`].
#[derive(Debug, Clone)]
pub struct SourceProfile {
    pub source_id: &'static str,
    pub display_name: &'static str,
    pub copper_folder: &'static str,
    pub encoding: TextEncoding,
    pub concept_file: Option<&'static str>,
    /// Files starting with any of these are not observation tables
    pub ignored_prefixes: &'static [&'static str],
    pub layout: Option<PositionalLayout>,
    /// Column whose header names the series concept
    pub concept_column: Option<ColumnRef>,
    /// Text used for empty concept fields
    pub concept_fill: &'static str,
    pub country_column: ColumnRef,
    pub country_key: CountryKey,
    pub aliases: &'static AliasTable,
    pub period_column: ColumnRef,
    pub period_format: PeriodFormat,
    pub dataset_key: DatasetKeyRule,
    pub value: ValueRule,
    pub citation: &'static str,
    pub link: &'static str,
    pub note: &'static str,
    /// Literal sequences removed from the rendered note
    pub note_strip: &'static [&'static str],
    pub skip_leading_rows: usize,
    pub drop_empty_values: bool,
}

impl SourceProfile {
    /// A profile with the defaults shared by most sources. Callers override
    /// what differs with struct update syntax.
    pub const fn base(source_id: &'static str, copper_folder: &'static str) -> Self {
        Self {
            source_id,
            display_name: source_id,
            copper_folder,
            encoding: TextEncoding::Utf8,
            concept_file: None,
            ignored_prefixes: &[],
            layout: None,
            concept_column: None,
            concept_fill: "",
            country_column: ColumnRef::Position(0),
            country_key: CountryKey::M49,
            aliases: &[],
            period_column: ColumnRef::Named("year"),
            period_format: PeriodFormat::Plain,
            dataset_key: DatasetKeyRule::Column("dataset_raw"),
            value: ValueRule::Column(ColumnRef::Named("value")),
            citation: "{source}",
            link: "{link}",
            note: "{note}",
            note_strip: &[],
            skip_leading_rows: 0,
            drop_empty_values: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(String),
}

/// A `{field}` text template, parsed once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

fn placeholder_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{([A-Za-z0-9_]+)\}").ok()).as_ref()
}

impl Template {
    pub fn parse(text: &str) -> Self {
        let mut segments = Vec::new();
        let mut last = 0;
        let captures = placeholder_regex()
            .map(|re| re.captures_iter(text).collect::<Vec<_>>())
            .unwrap_or_default();
        for caps in captures {
            let (Some(whole), Some(field)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            if whole.start() > last {
                segments.push(Segment::Literal(text[last..whole.start()].to_string()));
            }
            segments.push(Segment::Field(field.as_str().to_string()));
            last = whole.end();
        }
        if last < text.len() {
            segments.push(Segment::Literal(text[last..].to_string()));
        }
        Self { segments }
    }

    pub fn is_constant(&self) -> bool {
        self.segments.iter().all(|s| matches!(s, Segment::Literal(_)))
    }

    /// Fill placeholders through `lookup`; unknown fields render as "".
    pub fn render<'a>(&self, lookup: impl Fn(&str) -> Option<Cow<'a, str>>) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(name) => {
                    if let Some(value) = lookup(name.as_str()) {
                        out.push_str(&value);
                    }
                }
            }
        }
        out.trim().to_string()
    }
}

/// The one [`SourceAdapter`] implementation, driven by a [`SourceProfile`].
#[derive(Debug, Clone)]
pub struct ProfileAdapter {
    profile: SourceProfile,
    citation: Template,
    link: Template,
    note: Template,
}

/// Column positions resolved for one table
struct Columns {
    country: usize,
    period: usize,
    value: usize,
    dataset_key: Option<usize>,
}

impl ProfileAdapter {
    pub fn new(profile: SourceProfile) -> Self {
        Self {
            citation: Template::parse(profile.citation),
            link: Template::parse(profile.link),
            note: Template::parse(profile.note),
            profile,
        }
    }

    pub fn profile(&self) -> &SourceProfile {
        &self.profile
    }

    /// Apply the positional layout, if any.
    fn reshape<'t>(&self, table: &'t RawTable) -> Result<Cow<'t, RawTable>, SkipReason> {
        let Some(layout) = self.profile.layout else {
            return Ok(Cow::Borrowed(table));
        };

        let width = table.width();
        let dropped: &[usize] = match layout.drop_columns {
            Some((w, positions)) if w == width => positions,
            _ => &[],
        };
        if width - dropped.len() != layout.columns.len() {
            return Err(SkipReason::UnexpectedShape { width });
        }

        let keep = |row: &[String]| -> Vec<String> {
            (0..width)
                .filter(|i| !dropped.contains(i))
                .map(|i| row.get(i).cloned().unwrap_or_default())
                .collect()
        };
        Ok(Cow::Owned(RawTable::new(
            table.name.clone(),
            layout.columns.iter().map(|c| c.to_string()).collect(),
            table.rows.iter().map(|r| keep(r)).collect(),
        )))
    }

    fn resolve_country<'t>(
        &self,
        taxonomy: &'t CountryTaxonomy,
        raw: &str,
    ) -> Option<&'t CanonicalCountry> {
        match self.profile.country_key {
            CountryKey::Alpha => taxonomy.resolve_by_alpha(raw),
            CountryKey::M49 => taxonomy.resolve_by_m49(raw),
            CountryKey::Name => taxonomy.resolve_by_name(raw, self.profile.aliases),
        }
    }

    fn period(&self, raw: &str) -> String {
        let raw = raw.trim();
        match self.profile.period_format {
            PeriodFormat::Plain => raw.to_string(),
            PeriodFormat::DatePrefix => raw.split('-').next().unwrap_or(raw).to_string(),
        }
    }

    fn columns(&self, table: &RawTable, concept: Option<&str>) -> Result<Columns, SkipReason> {
        let period = self
            .profile
            .period_column
            .resolve(table)
            .ok_or(SkipReason::MissingPeriodColumn)?;
        let country = self
            .profile
            .country_column
            .resolve(table)
            .ok_or(SkipReason::MissingCountryColumn)?;
        let value = match self.profile.value {
            ValueRule::ConceptColumn => concept.and_then(|c| table.column_index(c)),
            ValueRule::Column(col) => col.resolve(table),
        }
        .ok_or(SkipReason::MissingValueColumn)?;
        let dataset_key = match self.profile.dataset_key {
            DatasetKeyRule::Column(name) => {
                Some(table.column_index(name).ok_or(SkipReason::MissingValueColumn)?)
            }
            _ => None,
        };
        Ok(Columns {
            country,
            period,
            value,
            dataset_key,
        })
    }

    fn concept_field<'c>(&self, concept_row: Option<ConceptRow<'c>>, field: &str) -> Option<Cow<'c, str>> {
        let value = concept_row?.get(field)?;
        if value.trim().is_empty() {
            Some(Cow::Borrowed(self.profile.concept_fill))
        } else {
            Some(Cow::Borrowed(value))
        }
    }
}

impl SourceAdapter for ProfileAdapter {
    fn source_id(&self) -> &str {
        self.profile.source_id
    }

    fn copper_folder(&self) -> &str {
        self.profile.copper_folder
    }

    fn encoding(&self) -> TextEncoding {
        self.profile.encoding
    }

    fn concept_file(&self) -> Option<&str> {
        self.profile.concept_file
    }

    fn is_data_table(&self, file_name: &str) -> bool {
        Some(file_name) != self.profile.concept_file
            && !self
                .profile
                .ignored_prefixes
                .iter()
                .any(|prefix| file_name.starts_with(prefix))
    }

    fn normalize(
        &self,
        table: &RawTable,
        taxonomy: &CountryTaxonomy,
        concepts: Option<&ConceptTable>,
    ) -> Result<NormalizedTable, SkipReason> {
        let table = self.reshape(table)?;

        // Series concept first, then the period column
        let concept = match self.profile.concept_column {
            Some(col) => {
                let idx = col
                    .resolve(&table)
                    .ok_or(SkipReason::UnexpectedShape { width: table.width() })?;
                Some(table.headers[idx].as_str())
            }
            None => None,
        };
        let concept_row = match concept {
            Some(name) => Some(match concepts {
                Some(concepts) => concepts.lookup(name)?,
                None => {
                    return Err(SkipReason::ConceptLookup {
                        concept: name.to_string(),
                        matches: 0,
                    })
                }
            }),
            None => None,
        };
        let columns = self.columns(&table, concept)?;

        let fixed_key = match self.profile.dataset_key {
            DatasetKeyRule::Fixed(key) => Some(key.to_string()),
            DatasetKeyRule::ConceptField(field) => Some(
                self.concept_field(concept_row, field)
                    .map(|c| c.trim().to_string())
                    .unwrap_or_default(),
            ),
            DatasetKeyRule::Column(_) => None,
        };

        let mut out = NormalizedTable::default();
        for row in table.rows.iter().skip(self.profile.skip_leading_rows) {
            let Some(country) = self.resolve_country(taxonomy, table.cell(row, columns.country)) else {
                out.record_drop(DROP_UNRESOLVED_COUNTRY);
                continue;
            };

            let period = self.period(table.cell(row, columns.period));
            if period.is_empty() {
                out.record_drop(DROP_EMPTY_PERIOD);
                continue;
            }

            let value = strip_thousands(table.cell(row, columns.value));
            if value.is_empty() && self.profile.drop_empty_values {
                out.record_drop(DROP_EMPTY_VALUE);
                continue;
            }

            let dataset_key = match (&fixed_key, columns.dataset_key) {
                (Some(key), _) => key.clone(),
                (None, Some(idx)) => table.cell(row, idx).trim().to_string(),
                (None, None) => String::new(),
            };
            if dataset_key.is_empty() {
                out.record_drop(DROP_EMPTY_DATASET_KEY);
                continue;
            }

            let lookup = |field: &str| {
                self.concept_field(concept_row, field).or_else(|| {
                    table
                        .column_index(field)
                        .map(|idx| Cow::Borrowed(table.cell(row, idx).trim()))
                })
            };
            let mut note = self.note.render(lookup);
            for pattern in self.profile.note_strip {
                note = note.replace(pattern, "");
            }
            if note.trim().is_empty() {
                note = NOTE_NOT_AVAILABLE.to_string();
            }

            out.rows.push(FactRow {
                country_m49: country.m49.clone(),
                country_name: country.name.clone(),
                dataset_key,
                period,
                value,
                continent: country.continent.clone(),
                un_region: country.un_region.clone(),
                world_bank_region: country.world_bank_region.clone(),
                source_citation: self.citation.render(lookup),
                source_link: self.link.render(lookup),
                note,
            });
        }

        Ok(out)
    }
}
