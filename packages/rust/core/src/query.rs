//! Read-side queries over a generated [`LicenseData`].
//!
//! [`LicenseCatalog`] borrows a finished result and answers lookups.
//! [`CatalogHandle`] is the shared, publish-on-complete slot that long-lived
//! callers hold: readers get an `Arc` snapshot of the last published result
//! and never observe one that is still being built.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use tracing::debug;

use licensegraph_shared::{
    Catalog, LicenseData, LicenseGraphError, Metadata, Product, ProductRef, RelationEdge, Result,
    SelfReferencingPlan, ServicePlanRef,
};

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// One side of a [`PlanComparison`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparedProduct {
    #[serde(flatten)]
    pub product: ProductRef,
    pub total_plans: usize,
}

/// Service-plan overlap between two products, by direct plan ids.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanComparison {
    pub first: ComparedProduct,
    pub second: ComparedProduct,
    pub common_plans: usize,
    pub only_in_first: usize,
    pub only_in_second: usize,
    /// Share of `first`'s plans also in `second`, one decimal. 0 when `first` has none.
    pub overlap_percentage_first: f64,
    pub overlap_percentage_second: f64,
}

/// A service plan and every product that includes it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServicePlanUsage {
    pub plan: ServicePlanRef,
    /// Owning product guids, in catalog order.
    pub products: Vec<String>,
}

// ---------------------------------------------------------------------------
// LicenseCatalog
// ---------------------------------------------------------------------------

/// Lookups over one generated result.
#[derive(Debug, Clone, Copy)]
pub struct LicenseCatalog<'a> {
    data: &'a LicenseData,
}

impl<'a> LicenseCatalog<'a> {
    pub fn new(data: &'a LicenseData) -> Self {
        Self { data }
    }

    pub fn get_product_by_guid(&self, guid: &str) -> Option<&'a Product> {
        self.data.products.get(guid)
    }

    /// First product in catalog order with this `string_id`.
    pub fn get_product_by_string_id(&self, string_id: &str) -> Option<&'a Product> {
        self.data.products.find_by_string_id(string_id)
    }

    /// Resolve either a guid or a `string_id`, guid first.
    pub fn resolve(&self, key: &str) -> Option<&'a Product> {
        self.get_product_by_guid(key)
            .or_else(|| self.get_product_by_string_id(key))
    }

    pub fn get_all_products(&self) -> &'a Catalog {
        &self.data.products
    }

    pub fn get_metadata(&self) -> &'a Metadata {
        &self.data.metadata
    }

    pub fn self_referencing_plans(&self) -> &'a [SelfReferencingPlan] {
        &self.data.self_referencing_plans
    }

    /// Every supersedence relation, ordered by the subset product's catalog
    /// position and then by its `superseded_by` order.
    pub fn relation_edges(&self) -> Vec<RelationEdge> {
        self.data
            .products
            .iter()
            .flat_map(|subset| {
                subset.superseded_by.iter().map(move |sup| RelationEdge {
                    subset: subset.product_ref(),
                    superset: sup.clone(),
                })
            })
            .collect()
    }

    /// Relations where both products are in `holdings`.
    ///
    /// Unknown guids are ignored. An empty or single-product holding yields no
    /// edges.
    pub fn find_overlaps_for_holdings<S: AsRef<str>>(&self, holdings: &[S]) -> Vec<RelationEdge> {
        let held: HashSet<&str> = holdings.iter().map(AsRef::as_ref).collect();

        let edges: Vec<RelationEdge> = self
            .data
            .products
            .iter()
            .filter(|p| held.contains(p.guid.as_str()))
            .flat_map(|subset| {
                subset
                    .superseded_by
                    .iter()
                    .filter(|sup| held.contains(sup.guid.as_str()))
                    .map(move |sup| RelationEdge {
                        subset: subset.product_ref(),
                        superset: sup.clone(),
                    })
            })
            .collect();

        debug!(holdings = held.len(), overlaps = edges.len(), "holdings checked");
        edges
    }

    /// Compare the direct plans of two products.
    pub fn compare_products(&self, guid1: &str, guid2: &str) -> Option<PlanComparison> {
        let first = self.get_product_by_guid(guid1)?;
        let second = self.get_product_by_guid(guid2)?;

        let plans1: HashSet<&str> = plan_ids(first);
        let plans2: HashSet<&str> = plan_ids(second);
        let common = plans1.intersection(&plans2).count();

        Some(PlanComparison {
            first: ComparedProduct {
                product: first.product_ref(),
                total_plans: plans1.len(),
            },
            second: ComparedProduct {
                product: second.product_ref(),
                total_plans: plans2.len(),
            },
            common_plans: common,
            only_in_first: plans1.len() - common,
            only_in_second: plans2.len() - common,
            overlap_percentage_first: percentage(common, plans1.len()),
            overlap_percentage_second: percentage(common, plans2.len()),
        })
    }

    /// Case-insensitive substring match on display name or `string_id`.
    pub fn search_products(&self, term: &str) -> Vec<&'a Product> {
        let needle = term.to_lowercase();
        self.data
            .products
            .iter()
            .filter(|p| {
                p.display_name.to_lowercase().contains(&needle)
                    || p.string_id.to_lowercase().contains(&needle)
            })
            .collect()
    }

    /// Service plan id → plan and the products including it.
    ///
    /// The plan record is taken from the first product listing it.
    pub fn service_plan_index(&self) -> BTreeMap<String, ServicePlanUsage> {
        let mut index: BTreeMap<String, ServicePlanUsage> = BTreeMap::new();
        for product in &self.data.products {
            for plan in &product.included_service_plans {
                let usage = index
                    .entry(plan.id.clone())
                    .or_insert_with(|| ServicePlanUsage {
                        plan: plan.clone(),
                        products: Vec::new(),
                    });
                if usage.products.last() != Some(&product.guid) {
                    usage.products.push(product.guid.clone());
                }
            }
        }
        index
    }
}

fn plan_ids(product: &Product) -> HashSet<&str> {
    product
        .included_service_plans
        .iter()
        .map(|p| p.id.as_str())
        .collect()
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (part as f64 / whole as f64 * 1000.0).round() / 10.0
}

// ---------------------------------------------------------------------------
// CatalogHandle
// ---------------------------------------------------------------------------

/// Shared slot holding the latest published result.
///
/// Cloning shares the slot. Queries made before the first [`publish`] fail
/// with [`LicenseGraphError::NotReady`]; a missing product is `Ok(None)`.
///
/// [`publish`]: CatalogHandle::publish
#[derive(Debug, Clone, Default)]
pub struct CatalogHandle {
    slot: Arc<RwLock<Option<Arc<LicenseData>>>>,
}

impl CatalogHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap in a finished result, returning the one it replaces.
    pub fn publish(&self, data: LicenseData) -> Option<Arc<LicenseData>> {
        let data = Arc::new(data);
        debug!(
            generation_id = %data.metadata.generation_id,
            products = data.metadata.total_products,
            "publishing license data"
        );
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        slot.replace(data)
    }

    pub fn is_ready(&self) -> bool {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// The current result.
    pub fn snapshot(&self) -> Result<Arc<LicenseData>> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(LicenseGraphError::NotReady)
    }

    /// Run `f` against the current result.
    pub fn with_catalog<R>(&self, f: impl FnOnce(LicenseCatalog<'_>) -> R) -> Result<R> {
        let data = self.snapshot()?;
        Ok(f(LicenseCatalog::new(&data)))
    }

    pub fn get_product_by_guid(&self, guid: &str) -> Result<Option<Product>> {
        self.with_catalog(|c| c.get_product_by_guid(guid).cloned())
    }

    pub fn get_product_by_string_id(&self, string_id: &str) -> Result<Option<Product>> {
        self.with_catalog(|c| c.get_product_by_string_id(string_id).cloned())
    }

    pub fn get_metadata(&self) -> Result<Metadata> {
        self.with_catalog(|c| c.get_metadata().clone())
    }

    pub fn find_overlaps_for_holdings<S: AsRef<str>>(
        &self,
        holdings: &[S],
    ) -> Result<Vec<RelationEdge>> {
        self.with_catalog(|c| c.find_overlaps_for_holdings(holdings))
    }
}
