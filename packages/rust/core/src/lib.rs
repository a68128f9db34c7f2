//! Supersedence engine for LicenseGraph.
//!
//! Turns catalog rows into products annotated with which other products make
//! them redundant, and answers queries over the result. The pipeline is
//! synchronous and in-memory; ingestion and persistence live at the edges.

pub mod catalog;
pub mod expansion;
pub mod export;
pub mod overrides;
pub mod pipeline;
pub mod query;
pub mod supersedence;

pub use catalog::{BuiltCatalog, build_catalog};
pub use expansion::{Expansion, expand_catalog};
pub use export::{ExportReceipt, read_license_data, validate_license_data, write_license_data};
pub use overrides::apply_upgrades;
pub use pipeline::{ProgressReporter, SilentProgress, generate};
pub use query::{CatalogHandle, LicenseCatalog, PlanComparison, ServicePlanUsage};
pub use supersedence::{apply_supersedence, entitlement_sets};
