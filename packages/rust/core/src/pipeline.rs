//! End-to-end generation: rows → catalog → expansion → comparison → overrides → result.

use std::time::Instant;

use chrono::Utc;
use tracing::{info, instrument};

use licensegraph_shared::{
    CatalogRow, GenerationConfig, GenerationId, LicenseData, Metadata, Result,
};

use crate::catalog::build_catalog;
use crate::overrides::apply_upgrades;
use crate::supersedence::{apply_supersedence, entitlement_sets};

/// Recorded in every result's metadata.
pub const DESCRIPTION: &str = "Simplified O365 license structure with embedded supersedence \
     relationships. Each product includes arrays of licenses it supersedes and is superseded by.";

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when the pipeline completes.
    fn done(&self, data: &LicenseData);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn done(&self, _data: &LicenseData) {}
}

/// Run a full generation over `rows`.
///
/// 1. Build the catalog (self-reference filter)
/// 2. Compute entitlement sets for the configured mode
/// 3. Compare every pair of products
/// 4. Apply upgrade overrides
/// 5. Compute metadata
///
/// Any failure aborts the run; no partial result is returned.
#[instrument(skip_all, fields(rows = rows.len(), mode = %config.mode))]
pub fn generate(
    rows: &[CatalogRow],
    config: &GenerationConfig,
    progress: &dyn ProgressReporter,
) -> Result<LicenseData> {
    let start = Instant::now();
    let generation_id = GenerationId::new();

    info!(%generation_id, source = %config.source_url, "starting generation");

    // --- Phase 1: Catalog ---
    progress.phase("Building catalog");
    let built = build_catalog(rows)?;
    let mut catalog = built.catalog;

    // --- Phase 2: Entitlement sets ---
    progress.phase("Expanding entitlements");
    let sets = entitlement_sets(&catalog, config.mode, config.duplicate_string_ids)?;

    // --- Phase 3: Comparison ---
    progress.phase("Comparing products");
    let compared = apply_supersedence(&mut catalog, &sets);

    // --- Phase 4: Overrides ---
    progress.phase("Applying upgrade overrides");
    let overridden = apply_upgrades(&mut catalog, &config.upgrades);

    // --- Phase 5: Metadata ---
    let metadata = Metadata {
        total_products: catalog.len(),
        total_supersedence_relationships: catalog.total_supersedence_relationships(),
        source_url: config.source_url.clone(),
        generated_at: Utc::now(),
        description: DESCRIPTION.to_string(),
        generation_id,
        comparison_mode: config.mode,
        self_referencing_count: built.self_referencing.len(),
    };

    let data = LicenseData {
        products: catalog,
        metadata,
        self_referencing_plans: built.self_referencing,
    };

    progress.done(&data);

    info!(
        generation_id = %data.metadata.generation_id,
        products = data.metadata.total_products,
        relationships = data.metadata.total_supersedence_relationships,
        from_sets = compared,
        from_overrides = overridden,
        self_referencing = data.metadata.self_referencing_count,
        elapsed_ms = start.elapsed().as_millis(),
        "generation complete"
    );

    Ok(data)
}
