//! Shared types, error model, and configuration for LicenseGraph.
//!
//! This crate is the foundation depended on by all other LicenseGraph crates.
//! It provides:
//! - [`LicenseGraphError`]: the unified error type
//! - Domain types ([`Product`], [`Catalog`], [`LicenseData`], [`RelationEdge`])
//! - Configuration ([`AppConfig`], [`GenerationConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DEFAULT_SOURCE_URL, DuplicateStringIdPolicy, GenerationConfig, GenerationSettings,
    SourceConfig, UpgradeRule, config_dir, config_file_path, default_upgrades, init_config,
    load_config, load_config_from, validate_config,
};
pub use error::{LicenseGraphError, Result};
pub use types::{
    Catalog, CatalogRow, ComparisonMode, GenerationId, LicenseData, Metadata, Product, ProductRef,
    RelationEdge, SelfReferencingPlan, ServicePlanRef,
};
