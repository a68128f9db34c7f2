//! Core domain types for LicenseGraph catalogs.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// GenerationId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one generation run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenerationId(pub Uuid);

impl GenerationId {
    /// Generate a new time-sortable generation identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for GenerationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GenerationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for GenerationId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// ComparisonMode
// ---------------------------------------------------------------------------

/// Which entitlement sets the supersedence comparator looks at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComparisonMode {
    /// Raw `included_service_plans` ids, after self-reference filtering.
    Direct,
    /// Entitlements expanded through name-based aliasing.
    #[default]
    Transitive,
}

impl fmt::Display for ComparisonMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => f.write_str("direct"),
            Self::Transitive => f.write_str("transitive"),
        }
    }
}

// ---------------------------------------------------------------------------
// Rows and products
// ---------------------------------------------------------------------------

/// One product × entitlement row of the source catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRow {
    pub product_display_name: String,
    pub string_id: String,
    pub guid: String,
    pub service_plan_name: String,
    pub service_plan_id: String,
    pub service_plan_friendly_name: String,
}

/// One entitlement unit included in a product.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServicePlanRef {
    #[serde(rename = "service_plan_id")]
    pub id: String,
    #[serde(rename = "service_plan_name")]
    pub name: String,
    #[serde(rename = "service_plan_friendly_name")]
    pub friendly_name: String,
}

/// Non-owning cross-reference to a product, resolved through the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductRef {
    pub guid: String,
    pub string_id: String,
    #[serde(rename = "name")]
    pub display_name: String,
}

/// A license product and its supersedence relations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Unique product key.
    pub guid: String,
    /// SKU part number, also used as an aliasing key.
    pub string_id: String,
    #[serde(rename = "product_display_name")]
    pub display_name: String,
    /// Entitlements in source order, never including the product's own base entry.
    pub included_service_plans: Vec<ServicePlanRef>,
    /// Products this one makes redundant.
    #[serde(default)]
    pub supersedes: Vec<ProductRef>,
    /// Products that make this one redundant.
    #[serde(default)]
    pub superseded_by: Vec<ProductRef>,
}

impl Product {
    /// Create a product with no entitlements or relations.
    pub fn new(
        guid: impl Into<String>,
        string_id: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            guid: guid.into(),
            string_id: string_id.into(),
            display_name: display_name.into(),
            included_service_plans: Vec::new(),
            supersedes: Vec::new(),
            superseded_by: Vec::new(),
        }
    }

    /// Lightweight reference to this product.
    pub fn product_ref(&self) -> ProductRef {
        ProductRef {
            guid: self.guid.clone(),
            string_id: self.string_id.clone(),
            display_name: self.display_name.clone(),
        }
    }

    /// Whether `guid` is already listed in `supersedes`.
    pub fn supersedes_guid(&self, guid: &str) -> bool {
        self.supersedes.iter().any(|r| r.guid == guid)
    }

    /// Whether `guid` is already listed in `superseded_by`.
    pub fn superseded_by_guid(&self, guid: &str) -> bool {
        self.superseded_by.iter().any(|r| r.guid == guid)
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Products keyed by guid, iterated in first-seen order.
///
/// Serializes as a JSON object `guid -> product`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    products: Vec<Product>,
    index: HashMap<String, usize>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn contains(&self, guid: &str) -> bool {
        self.index.contains_key(guid)
    }

    /// Position of `guid` in iteration order.
    pub fn position(&self, guid: &str) -> Option<usize> {
        self.index.get(guid).copied()
    }

    pub fn get(&self, guid: &str) -> Option<&Product> {
        self.position(guid).map(|i| &self.products[i])
    }

    pub fn get_mut(&mut self, guid: &str) -> Option<&mut Product> {
        let i = self.position(guid)?;
        Some(&mut self.products[i])
    }

    /// Product at position `i` in iteration order.
    pub fn at(&self, i: usize) -> Option<&Product> {
        self.products.get(i)
    }

    pub fn at_mut(&mut self, i: usize) -> Option<&mut Product> {
        self.products.get_mut(i)
    }

    /// First product (in catalog order) carrying `string_id`.
    pub fn find_by_string_id(&self, string_id: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.string_id == string_id)
    }

    /// Insert a product, replacing any existing product with the same guid
    /// in place (its position is kept).
    pub fn insert(&mut self, product: Product) -> &mut Product {
        let i = match self.index.get(&product.guid) {
            Some(&i) => {
                self.products[i] = product;
                i
            }
            None => {
                let i = self.products.len();
                self.index.insert(product.guid.clone(), i);
                self.products.push(product);
                i
            }
        };
        &mut self.products[i]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Product> {
        self.products.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Product> {
        self.products.iter_mut()
    }

    /// Sum of all `supersedes` list lengths.
    pub fn total_supersedence_relationships(&self) -> usize {
        self.products.iter().map(|p| p.supersedes.len()).sum()
    }
}

impl<'a> IntoIterator for &'a Catalog {
    type Item = &'a Product;
    type IntoIter = std::slice::Iter<'a, Product>;

    fn into_iter(self) -> Self::IntoIter {
        self.products.iter()
    }
}

impl FromIterator<Product> for Catalog {
    fn from_iter<I: IntoIterator<Item = Product>>(iter: I) -> Self {
        let mut catalog = Catalog::new();
        for product in iter {
            catalog.insert(product);
        }
        catalog
    }
}

impl Serialize for Catalog {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.products.len()))?;
        for product in &self.products {
            map.serialize_entry(&product.guid, product)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Catalog {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct CatalogVisitor;

        impl<'de> Visitor<'de> for CatalogVisitor {
            type Value = Catalog;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of guid to product")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<Catalog, A::Error> {
                let mut catalog = Catalog::new();
                while let Some((key, product)) = access.next_entry::<String, Product>()? {
                    if key != product.guid {
                        return Err(serde::de::Error::custom(format!(
                            "product key {key} does not match guid {}",
                            product.guid
                        )));
                    }
                    catalog.insert(product);
                }
                Ok(catalog)
            }
        }

        deserializer.deserialize_map(CatalogVisitor)
    }
}

// ---------------------------------------------------------------------------
// Generation output
// ---------------------------------------------------------------------------

/// A product whose base-license entry was dropped by the self-reference filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfReferencingPlan {
    pub product_guid: String,
    pub product_name: String,
    pub string_id: String,
    pub service_plan_id: String,
}

/// Summary of one generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub total_products: usize,
    pub total_supersedence_relationships: usize,
    pub source_url: String,
    pub generated_at: DateTime<Utc>,
    pub description: String,
    pub generation_id: GenerationId,
    pub comparison_mode: ComparisonMode,
    #[serde(default)]
    pub self_referencing_count: usize,
}

/// Complete result of a generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LicenseData {
    pub products: Catalog,
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub self_referencing_plans: Vec<SelfReferencingPlan>,
}

/// `subset` is superseded by `superset`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationEdge {
    #[serde(rename = "subset_product")]
    pub subset: ProductRef,
    #[serde(rename = "superset_product")]
    pub superset: ProductRef,
}
