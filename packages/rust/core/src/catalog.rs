//! Catalog builder.
//!
//! Groups source rows by product guid into [`Product`] records and drops each
//! product's self-referencing entry (the plan named after the product's own
//! `string_id`, which stands for the base license rather than an add-on).

use std::collections::HashSet;

use tracing::{debug, instrument};

use licensegraph_shared::{
    Catalog, CatalogRow, LicenseGraphError, Product, Result, SelfReferencingPlan, ServicePlanRef,
};

/// Output of [`build_catalog`].
#[derive(Debug, Clone, Default)]
pub struct BuiltCatalog {
    /// Products in first-seen order.
    pub catalog: Catalog,
    /// One entry per product whose base-license row was filtered.
    pub self_referencing: Vec<SelfReferencingPlan>,
}

/// Build a catalog from source rows.
///
/// Rows are 1-based in error reports. Any row with a blank identifying field
/// fails the whole build; nothing partial is returned.
#[instrument(skip_all, fields(rows = rows.len()))]
pub fn build_catalog(rows: &[CatalogRow]) -> Result<BuiltCatalog> {
    let mut built = BuiltCatalog::default();
    let mut seen_self_ref: HashSet<String> = HashSet::new();

    for (i, row) in rows.iter().enumerate() {
        let row_no = i + 1;
        let guid = required(row_no, "guid", &row.guid)?;
        let string_id = required(row_no, "string_id", &row.string_id)?;
        let plan_name = required(row_no, "service_plan_name", &row.service_plan_name)?;
        let plan_id = required(row_no, "service_plan_id", &row.service_plan_id)?;

        if !built.catalog.contains(guid) {
            built.catalog.insert(Product::new(
                guid,
                string_id,
                row.product_display_name.trim(),
            ));
        }

        let Some(product) = built.catalog.get_mut(guid) else {
            continue;
        };

        // Compare against the owning product's id: the first row fixes it.
        if plan_name == product.string_id {
            if seen_self_ref.insert(product.guid.clone()) {
                built.self_referencing.push(SelfReferencingPlan {
                    product_guid: product.guid.clone(),
                    product_name: product.display_name.clone(),
                    string_id: product.string_id.clone(),
                    service_plan_id: plan_id.to_string(),
                });
            }
            continue;
        }

        product.included_service_plans.push(ServicePlanRef {
            id: plan_id.to_string(),
            name: plan_name.to_string(),
            friendly_name: row.service_plan_friendly_name.trim().to_string(),
        });
    }

    debug!(
        products = built.catalog.len(),
        self_referencing = built.self_referencing.len(),
        "catalog built"
    );

    Ok(built)
}

/// Trimmed value of a required field, or a `MalformedRow` error.
fn required<'a>(row: usize, field: &'static str, value: &'a str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(LicenseGraphError::malformed_row(row, field));
    }
    Ok(value)
}
