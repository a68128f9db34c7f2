//! Entitlement expansion through name-based aliasing.
//!
//! A service plan whose name equals another product's `string_id` stands for
//! "everything that product includes". The expanded set of a product is the
//! union of its own plan ids and the plan ids of every product reachable
//! through such aliases.
//!
//! Expansion runs over the strongly-connected components of the alias graph:
//! products that alias each other (directly or through a chain) share one
//! fully expanded set, and components are resolved sinks-first so every set is
//! complete when it is read. Results do not depend on which product is asked
//! about first.

use std::collections::{HashMap, HashSet};

use tracing::{debug, instrument, warn};

use licensegraph_shared::{Catalog, DuplicateStringIdPolicy, LicenseGraphError, Result};

/// Expanded entitlement ids per product, aligned with catalog order.
#[derive(Debug, Clone, Default)]
pub struct Expansion {
    sets: Vec<HashSet<String>>,
    index: HashMap<String, usize>,
    cyclic_components: usize,
}

impl Expansion {
    /// Expanded set for `guid`.
    pub fn get(&self, guid: &str) -> Option<&HashSet<String>> {
        self.index.get(guid).map(|&i| &self.sets[i])
    }

    /// Expanded set for the product at catalog position `i`.
    pub fn at(&self, i: usize) -> Option<&HashSet<String>> {
        self.sets.get(i)
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Number of alias cycles (components with more than one product).
    pub fn cyclic_components(&self) -> usize {
        self.cyclic_components
    }

    /// Sets in catalog order.
    pub fn into_sets(self) -> Vec<HashSet<String>> {
        self.sets
    }
}

/// Map each `string_id` to the catalog position of its product.
///
/// Duplicates follow `policy`.
pub fn alias_index(
    catalog: &Catalog,
    policy: DuplicateStringIdPolicy,
) -> Result<HashMap<&str, usize>> {
    let mut aliases: HashMap<&str, usize> = HashMap::with_capacity(catalog.len());

    for (i, product) in catalog.iter().enumerate() {
        if let Some(previous) = aliases.insert(product.string_id.as_str(), i) {
            let first_guid = catalog.at(previous).map(|p| p.guid.clone()).unwrap_or_default();
            match policy {
                DuplicateStringIdPolicy::Reject => {
                    return Err(LicenseGraphError::DuplicateStringId {
                        string_id: product.string_id.clone(),
                        first_guid,
                        second_guid: product.guid.clone(),
                    });
                }
                DuplicateStringIdPolicy::LastWriteWins => {
                    warn!(
                        string_id = %product.string_id,
                        replaced = %first_guid,
                        winner = %product.guid,
                        "duplicate string_id, alias now points at later product"
                    );
                }
            }
        }
    }

    Ok(aliases)
}

/// Compute expanded entitlement sets for every product in `catalog`.
#[instrument(skip_all, fields(products = catalog.len()))]
pub fn expand_catalog(catalog: &Catalog, policy: DuplicateStringIdPolicy) -> Result<Expansion> {
    let aliases = alias_index(catalog, policy)?;
    let graph = alias_graph(catalog, &aliases);
    let components = strongly_connected_components(&graph);

    let mut component_of = vec![0usize; catalog.len()];
    for (c, members) in components.iter().enumerate() {
        for &m in members {
            component_of[m] = c;
        }
    }

    // Components arrive sinks-first, so successors are always resolved.
    let mut component_sets: Vec<HashSet<String>> = Vec::with_capacity(components.len());
    for (c, members) in components.iter().enumerate() {
        let mut set: HashSet<String> = HashSet::new();
        for &m in members {
            if let Some(product) = catalog.at(m) {
                set.extend(product.included_service_plans.iter().map(|p| p.id.clone()));
            }
            for &succ in &graph[m] {
                let sc = component_of[succ];
                if sc != c {
                    set.extend(component_sets[sc].iter().cloned());
                }
            }
        }
        component_sets.push(set);
    }

    let cyclic_components = components.iter().filter(|m| m.len() > 1).count();
    let sets: Vec<HashSet<String>> = (0..catalog.len())
        .map(|i| component_sets[component_of[i]].clone())
        .collect();
    let index = catalog
        .iter()
        .enumerate()
        .map(|(i, p)| (p.guid.clone(), i))
        .collect();

    debug!(
        aliases = graph.iter().map(Vec::len).sum::<usize>(),
        components = components.len(),
        cyclic_components,
        "entitlements expanded"
    );

    Ok(Expansion {
        sets,
        index,
        cyclic_components,
    })
}

/// Adjacency lists: `i -> j` when a plan of product `i` is named after product `j`.
fn alias_graph(catalog: &Catalog, aliases: &HashMap<&str, usize>) -> Vec<Vec<usize>> {
    catalog
        .iter()
        .enumerate()
        .map(|(i, product)| {
            let mut targets: Vec<usize> = product
                .included_service_plans
                .iter()
                .filter_map(|plan| aliases.get(plan.name.as_str()).copied())
                .filter(|&j| j != i)
                .collect();
            targets.sort_unstable();
            targets.dedup();
            targets
        })
        .collect()
}

/// Tarjan's algorithm without recursion.
///
/// Components are returned in completion order, which is a reverse
/// topological order of the condensed graph.
fn strongly_connected_components(graph: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let n = graph.len();
    let mut index: Vec<Option<usize>> = vec![None; n];
    let mut lowlink = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut stack: Vec<usize> = Vec::new();
    let mut components: Vec<Vec<usize>> = Vec::new();
    let mut next_index = 0usize;

    // (node, next edge to visit)
    let mut frames: Vec<(usize, usize)> = Vec::new();

    for root in 0..n {
        if index[root].is_some() {
            continue;
        }

        index[root] = Some(next_index);
        lowlink[root] = next_index;
        next_index += 1;
        stack.push(root);
        on_stack[root] = true;
        frames.push((root, 0));

        while let Some(frame) = frames.last_mut() {
            let v = frame.0;

            if frame.1 < graph[v].len() {
                let w = graph[v][frame.1];
                frame.1 += 1;

                match index[w] {
                    None => {
                        index[w] = Some(next_index);
                        lowlink[w] = next_index;
                        next_index += 1;
                        stack.push(w);
                        on_stack[w] = true;
                        frames.push((w, 0));
                    }
                    Some(w_index) if on_stack[w] => {
                        lowlink[v] = lowlink[v].min(w_index);
                    }
                    Some(_) => {}
                }
                continue;
            }

            frames.pop();
            if let Some(&(parent, _)) = frames.last() {
                lowlink[parent] = lowlink[parent].min(lowlink[v]);
            }

            if Some(lowlink[v]) == index[v] {
                let mut members = Vec::new();
                while let Some(w) = stack.pop() {
                    on_stack[w] = false;
                    members.push(w);
                    if w == v {
                        break;
                    }
                }
                members.sort_unstable();
                components.push(members);
            }
        }
    }

    components
}

#[cfg(test)]
mod tests {
    use super::*;
    use licensegraph_shared::{Product, ServicePlanRef};

    fn product(guid: &str, string_id: &str, plans: &[(&str, &str)]) -> Product {
        let mut p = Product::new(guid, string_id, string_id);
        p.included_service_plans = plans
            .iter()
            .map(|(name, id)| ServicePlanRef {
                id: (*id).into(),
                name: (*name).into(),
                friendly_name: String::new(),
            })
            .collect();
        p
    }

    fn ids(set: &HashSet<String>) -> Vec<&str> {
        let mut v: Vec<_> = set.iter().map(String::as_str).collect();
        v.sort_unstable();
        v
    }

    #[test]
    fn direct_plans_only_without_aliases() {
        let catalog: Catalog = [product("a", "A", &[("X", "x"), ("Y", "y")])]
            .into_iter()
            .collect();
        let expansion = expand_catalog(&catalog, DuplicateStringIdPolicy::default()).unwrap();
        assert_eq!(ids(expansion.get("a").unwrap()), ["x", "y"]);
    }

    #[test]
    fn alias_pulls_in_target_plans() {
        let catalog: Catalog = [
            product("c", "C", &[("D_CORE", "d-core"), ("C_EXTRA", "c1")]),
            product("d", "D_CORE", &[("D_ONE", "d1"), ("D_TWO", "d2")]),
        ]
        .into_iter()
        .collect();

        let expansion = expand_catalog(&catalog, DuplicateStringIdPolicy::default()).unwrap();
        assert_eq!(ids(expansion.get("c").unwrap()), ["c1", "d-core", "d1", "d2"]);
        assert_eq!(ids(expansion.get("d").unwrap()), ["d1", "d2"]);
    }

    #[test]
    fn alias_chain_is_transitive() {
        let catalog: Catalog = [
            product("a", "A", &[("B", "b-core")]),
            product("b", "B", &[("C", "c-core")]),
            product("c", "C", &[("LEAF", "leaf")]),
        ]
        .into_iter()
        .collect();

        let expansion = expand_catalog(&catalog, DuplicateStringIdPolicy::default()).unwrap();
        assert_eq!(ids(expansion.get("a").unwrap()), ["b-core", "c-core", "leaf"]);
    }

    #[test]
    fn mutual_aliasing_terminates_and_merges() {
        let catalog: Catalog = [
            product("a", "A", &[("B", "b-core"), ("A_ONLY", "a1")]),
            product("b", "B", &[("A", "a-core"), ("B_ONLY", "b1")]),
        ]
        .into_iter()
        .collect();

        let expansion = expand_catalog(&catalog, DuplicateStringIdPolicy::default()).unwrap();
        let a = expansion.get("a").unwrap();
        let b = expansion.get("b").unwrap();

        for id in ["a1", "b-core", "a-core", "b1"] {
            assert!(a.contains(id), "a missing {id}");
            assert!(b.contains(id), "b missing {id}");
        }
        assert_eq!(expansion.cyclic_components(), 1);
    }

    #[test]
    fn cycle_reached_from_outside_is_complete() {
        // x -> a <-> b; a cached partial result would drop b's plans from x.
        let catalog: Catalog = [
            product("x", "X", &[("A", "a-core")]),
            product("a", "A", &[("B", "b-core"), ("A_ONLY", "a1")]),
            product("b", "B", &[("A", "a-core"), ("B_ONLY", "b1")]),
        ]
        .into_iter()
        .collect();

        let expansion = expand_catalog(&catalog, DuplicateStringIdPolicy::default()).unwrap();
        assert_eq!(
            ids(expansion.get("x").unwrap()),
            ["a-core", "a1", "b-core", "b1"]
        );
        assert_eq!(expansion.get("a"), expansion.get("b"));
    }

    #[test]
    fn expansion_is_independent_of_catalog_order() {
        let products = vec![
            product("x", "X", &[("A", "a-core")]),
            product("a", "A", &[("B", "b-core"), ("A_ONLY", "a1")]),
            product("b", "B", &[("A", "a-core"), ("C", "c-core")]),
            product("c", "C", &[("C_ONLY", "c1")]),
        ];

        let forward: Catalog = products.iter().cloned().collect();
        let backward: Catalog = products.iter().rev().cloned().collect();

        let f = expand_catalog(&forward, DuplicateStringIdPolicy::default()).unwrap();
        let b = expand_catalog(&backward, DuplicateStringIdPolicy::default()).unwrap();

        for guid in ["x", "a", "b", "c"] {
            assert_eq!(f.get(guid), b.get(guid), "mismatch for {guid}");
        }
    }

    #[test]
    fn duplicate_string_id_last_write_wins() {
        let catalog: Catalog = [
            product("c", "C", &[("DUP", "dup-core")]),
            product("d1", "DUP", &[("FIRST", "first")]),
            product("d2", "DUP", &[("SECOND", "second")]),
        ]
        .into_iter()
        .collect();

        let expansion =
            expand_catalog(&catalog, DuplicateStringIdPolicy::LastWriteWins).unwrap();
        assert_eq!(ids(expansion.get("c").unwrap()), ["dup-core", "second"]);
    }

    #[test]
    fn duplicate_string_id_rejected() {
        let catalog: Catalog = [
            product("d1", "DUP", &[("FIRST", "first")]),
            product("d2", "DUP", &[("SECOND", "second")]),
        ]
        .into_iter()
        .collect();

        let err = expand_catalog(&catalog, DuplicateStringIdPolicy::Reject).unwrap_err();
        match err {
            LicenseGraphError::DuplicateStringId {
                string_id,
                first_guid,
                second_guid,
            } => {
                assert_eq!(string_id, "DUP");
                assert_eq!(first_guid, "d1");
                assert_eq!(second_guid, "d2");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn scc_completion_order_is_sinks_first() {
        // 0 -> 1 -> 2, 2 -> 1
        let graph = vec![vec![1], vec![2], vec![1]];
        let components = strongly_connected_components(&graph);
        assert_eq!(components, vec![vec![1, 2], vec![0]]);
    }
}
