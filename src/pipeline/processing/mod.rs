// Pipeline processing: taxonomy, normalization, quality gate, materialization,
// consolidation and catalog reconciliation

pub mod catalog;
pub mod materialize;
pub mod normalize;
pub mod quality_gate;
pub mod smelt;
pub mod taxonomy;

pub use catalog::ReconcileReport;
pub use smelt::SmeltSummary;
pub use taxonomy::CountryTaxonomy;
