//! Supersedence comparator.
//!
//! Product `B` supersedes product `A` when A's entitlement set is contained in
//! B's. Every unordered pair is compared once and both directions are decided
//! from that single comparison, so the result is symmetric:
//! `A.superseded_by ∋ B` exactly when `B.supersedes ∋ A`.
//!
//! Products with an empty set never take part. Two products with equal
//! non-empty sets supersede each other.

use std::collections::HashSet;

use tracing::{debug, instrument};

use licensegraph_shared::{Catalog, ComparisonMode, DuplicateStringIdPolicy, Result};

use crate::expansion::expand_catalog;

/// Entitlement sets for each product, in catalog order.
pub fn entitlement_sets(
    catalog: &Catalog,
    mode: ComparisonMode,
    policy: DuplicateStringIdPolicy,
) -> Result<Vec<HashSet<String>>> {
    match mode {
        ComparisonMode::Direct => Ok(direct_sets(catalog)),
        ComparisonMode::Transitive => Ok(expand_catalog(catalog, policy)?.into_sets()),
    }
}

/// Raw plan ids per product.
pub fn direct_sets(catalog: &Catalog) -> Vec<HashSet<String>> {
    catalog
        .iter()
        .map(|p| p.included_service_plans.iter().map(|s| s.id.clone()).collect())
        .collect()
}

/// Record `superset` as superseding `subset`, by catalog position.
///
/// Returns `false` for self-edges and edges already present.
pub fn add_relation(catalog: &mut Catalog, subset: usize, superset: usize) -> bool {
    if subset == superset {
        return false;
    }

    let (Some(sub), Some(sup)) = (catalog.at(subset), catalog.at(superset)) else {
        return false;
    };
    if sup.supersedes_guid(&sub.guid) {
        return false;
    }
    let sub_ref = sub.product_ref();
    let sup_ref = sup.product_ref();

    if let Some(sup) = catalog.at_mut(superset) {
        sup.supersedes.push(sub_ref);
    }
    if let Some(sub) = catalog.at_mut(subset) {
        if !sub.superseded_by_guid(&sup_ref.guid) {
            sub.superseded_by.push(sup_ref);
        }
    }
    true
}

/// Compare every pair of products and record supersedence relations.
///
/// `sets` must be aligned with catalog order. Returns the number of relations
/// added.
#[instrument(skip_all, fields(products = catalog.len()))]
pub fn apply_supersedence(catalog: &mut Catalog, sets: &[HashSet<String>]) -> usize {
    let n = catalog.len().min(sets.len());
    let step = (n / 10).max(1);
    let mut pairs: Vec<(usize, usize)> = Vec::new();

    for i in 0..n {
        let a = &sets[i];
        if !a.is_empty() {
            for (j, b) in sets.iter().enumerate().take(n).skip(i + 1) {
                if b.is_empty() {
                    continue;
                }
                match (is_subset(a, b), is_subset(b, a)) {
                    (true, true) => {
                        pairs.push((i, j));
                        pairs.push((j, i));
                    }
                    (true, false) => pairs.push((i, j)),
                    (false, true) => pairs.push((j, i)),
                    (false, false) => {}
                }
            }
        }

        if (i + 1) % step == 0 {
            debug!(
                percent = (i + 1) * 100 / n,
                compared = i + 1,
                total = n,
                "comparing products"
            );
        }
    }

    let added = pairs
        .into_iter()
        .filter(|&(subset, superset)| add_relation(catalog, subset, superset))
        .count();

    debug!(added, "supersedence relations recorded");
    added
}

fn is_subset(a: &HashSet<String>, b: &HashSet<String>) -> bool {
    a.len() <= b.len() && a.is_subset(b)
}
