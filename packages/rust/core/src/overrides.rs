//! Curated upgrade overrides.
//!
//! Some upgrade paths are not visible from entitlement sets (the premium SKU
//! renames plans, or the base carries a legacy plan). A short list of
//! `base -> upgrade` rules, keyed by `string_id`, is applied after the
//! comparator.

use tracing::{debug, instrument};

use licensegraph_shared::{Catalog, UpgradeRule};

use crate::supersedence::add_relation;

/// Apply each rule whose `base` and `upgrade` both resolve in `catalog`.
///
/// Ids are resolved to the first product in catalog order carrying them.
/// Relations already present are left alone, so applying the same rules
/// twice changes nothing. Returns the number of relations added.
#[instrument(skip_all, fields(rules = rules.len()))]
pub fn apply_upgrades(catalog: &mut Catalog, rules: &[UpgradeRule]) -> usize {
    let mut added = 0;

    for rule in rules {
        let base = catalog
            .find_by_string_id(&rule.base)
            .and_then(|p| catalog.position(&p.guid));
        let upgrade = catalog
            .find_by_string_id(&rule.upgrade)
            .and_then(|p| catalog.position(&p.guid));

        let (Some(base), Some(upgrade)) = (base, upgrade) else {
            debug!(base = %rule.base, upgrade = %rule.upgrade, "upgrade rule does not resolve, skipping");
            continue;
        };

        if add_relation(catalog, base, upgrade) {
            debug!(base = %rule.base, upgrade = %rule.upgrade, "upgrade override applied");
            added += 1;
        }
    }

    added
}
