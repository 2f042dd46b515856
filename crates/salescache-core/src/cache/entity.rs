//! Cached entity definitions.
//!
//! Every entity the cache serves is described by an `EntityPolicy`: the
//! storage key, the shape its persisted value must have, how raw responses
//! are normalized, whether an empty response may replace cached data, and an
//! optional extra validity check on cached values.

use std::fmt;
use std::str::FromStr;

use serde_json::{json, Value};

use super::normalize::{self, ShapeMatcher, STANDARD_LIST};
use crate::settings;

/// Shape of a persisted cache value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityShape {
    /// `[...]`
    Array,
    /// `{data: [...]}`
    Enveloped,
    /// `{...}`
    Record,
}

impl EntityShape {
    pub fn empty_value(&self) -> Value {
        match self {
            EntityShape::Array => json!([]),
            EntityShape::Enveloped => json!({ "data": [] }),
            EntityShape::Record => json!({}),
        }
    }

    pub fn conforms(&self, value: &Value) -> bool {
        match self {
            EntityShape::Array => value.is_array(),
            EntityShape::Enveloped => value.get("data").is_some_and(Value::is_array),
            EntityShape::Record => value.is_object(),
        }
    }

    pub fn is_empty(&self, value: &Value) -> bool {
        match self {
            EntityShape::Array => value.as_array().map_or(true, Vec::is_empty),
            EntityShape::Enveloped => value
                .get("data")
                .and_then(Value::as_array)
                .map_or(true, Vec::is_empty),
            EntityShape::Record => value.as_object().map_or(true, |o| o.is_empty()),
        }
    }

    /// Number of records in a value of this shape.
    pub fn record_count(&self, value: &Value) -> usize {
        match self {
            EntityShape::Array => value.as_array().map_or(0, Vec::len),
            EntityShape::Enveloped => value
                .get("data")
                .and_then(Value::as_array)
                .map_or(0, Vec::len),
            EntityShape::Record => value.as_object().map_or(0, |o| o.len()),
        }
    }
}

/// Whether an empty normalized response may replace the cached value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyPolicy {
    /// Empty results are real data and overwrite the cache.
    Trusted,
    /// Empty results are treated as a backend hiccup; the cache is kept.
    Untrusted,
}

/// Everything the cache manager needs to know about one entity.
#[derive(Debug, Clone, Copy)]
pub struct EntityPolicy {
    pub key: &'static str,
    pub shape: EntityShape,
    pub matchers: &'static [ShapeMatcher],
    pub empty: EmptyPolicy,
    /// Extra check a cached value must pass to count as a hit.
    pub validity: Option<fn(&Value) -> bool>,
    pub supports_inactive: bool,
}

impl EntityPolicy {
    fn list(key: &'static str, shape: EntityShape, matchers: &'static [ShapeMatcher]) -> Self {
        Self {
            key,
            shape,
            matchers,
            empty: EmptyPolicy::Trusted,
            validity: None,
            supports_inactive: false,
        }
    }

    fn untrusted_empty(mut self) -> Self {
        self.empty = EmptyPolicy::Untrusted;
        self
    }

    fn with_validity(mut self, check: fn(&Value) -> bool) -> Self {
        self.validity = Some(check);
        self
    }

    fn with_inactive(mut self) -> Self {
        self.supports_inactive = true;
        self
    }

    /// Storage key, separate for inactive-inclusive listings.
    pub fn cache_key(&self, include_inactive: bool) -> String {
        if include_inactive && self.supports_inactive {
            format!("{}WithInactive", self.key)
        } else {
            self.key.to_string()
        }
    }

    /// Normalize a raw response into this entity's shape.
    /// Unrecognized responses become the empty value.
    pub fn normalize(&self, raw: &Value) -> Value {
        let records = || normalize::extract_records(self.matchers, raw);
        let normalized = match self.shape {
            EntityShape::Array => records().map(Value::Array),
            EntityShape::Enveloped => records().map(|r| json!({ "data": r })),
            EntityShape::Record => raw.is_object().then(|| raw.clone()),
        };
        normalized.unwrap_or_else(|| self.shape.empty_value())
    }

    pub fn is_valid_cached(&self, value: &Value) -> bool {
        self.validity.map_or(true, |check| check(value))
    }
}

/// Cached area tags and industries predate the `sort_order` column; any record
/// without it marks the whole entry as an old shape to be refetched.
pub fn has_sort_order(value: &Value) -> bool {
    value
        .as_array()
        .map_or(false, |records| records.iter().all(|r| r.get("sort_order").is_some()))
}

const PAYMENT_METHODS: [ShapeMatcher; 4] = normalize::named_field("payment_methods");
const SAFES: [ShapeMatcher; 4] = normalize::named_field("safes");
const PURCHASE_ORDERS: [ShapeMatcher; 4] = normalize::multi_envelope("purchase_orders");
const SALES_ORDERS: [ShapeMatcher; 4] = normalize::multi_envelope("sales_orders");
const SALES_RETURNS: [ShapeMatcher; 4] = normalize::multi_envelope("sales_returns");
const PURCHASE_RETURNS: [ShapeMatcher; 4] = normalize::multi_envelope("purchase_returns");
const GOODS_RECEIPTS: [ShapeMatcher; 4] = normalize::multi_envelope("goods_receipts");
const INVENTORY: [ShapeMatcher; 4] = normalize::multi_envelope("inventory");
const NOTIFICATIONS: [ShapeMatcher; 4] = normalize::multi_envelope("notifications");

/// Every entity held in the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Users,
    Clients,
    ClientAreaTags,
    ClientIndustries,
    Categories,
    Products,
    BaseUnits,
    Warehouses,
    PackagingTypes,
    Suppliers,
    PaymentMethods,
    Safes,
    PurchaseOrders,
    SalesOrders,
    SalesReturns,
    PurchaseReturns,
    GoodsReceipts,
    Inventory,
    Notifications,
    Settings,
    CategorizedSettings,
}

impl EntityKind {
    pub const ALL: [EntityKind; 21] = [
        EntityKind::Users,
        EntityKind::Clients,
        EntityKind::ClientAreaTags,
        EntityKind::ClientIndustries,
        EntityKind::Categories,
        EntityKind::Products,
        EntityKind::BaseUnits,
        EntityKind::Warehouses,
        EntityKind::PackagingTypes,
        EntityKind::Suppliers,
        EntityKind::PaymentMethods,
        EntityKind::Safes,
        EntityKind::PurchaseOrders,
        EntityKind::SalesOrders,
        EntityKind::SalesReturns,
        EntityKind::PurchaseReturns,
        EntityKind::GoodsReceipts,
        EntityKind::Inventory,
        EntityKind::Notifications,
        EntityKind::Settings,
        EntityKind::CategorizedSettings,
    ];

    pub fn policy(&self) -> EntityPolicy {
        use EntityShape::{Array, Enveloped, Record};
        match self {
            EntityKind::Users => EntityPolicy::list("appUsers", Array, STANDARD_LIST),
            EntityKind::Clients => {
                EntityPolicy::list("appClients", Array, STANDARD_LIST).with_inactive()
            }
            EntityKind::ClientAreaTags => {
                EntityPolicy::list("appClientAreaTags", Array, STANDARD_LIST)
                    .with_validity(has_sort_order)
            }
            EntityKind::ClientIndustries => {
                EntityPolicy::list("appClientIndustries", Array, STANDARD_LIST)
                    .with_validity(has_sort_order)
            }
            EntityKind::Categories => EntityPolicy::list("appCategories", Array, STANDARD_LIST),
            EntityKind::Products => {
                EntityPolicy::list("appProducts", Enveloped, STANDARD_LIST).with_inactive()
            }
            EntityKind::BaseUnits => EntityPolicy::list("appBaseUnits", Enveloped, STANDARD_LIST),
            EntityKind::Warehouses => {
                EntityPolicy::list("appWarehouses", Enveloped, STANDARD_LIST).with_inactive()
            }
            EntityKind::PackagingTypes => {
                EntityPolicy::list("appPackagingTypes", Enveloped, STANDARD_LIST)
            }
            EntityKind::Suppliers => EntityPolicy::list("appSuppliers", Enveloped, STANDARD_LIST),
            EntityKind::PaymentMethods => {
                EntityPolicy::list("appPaymentMethods", Array, &PAYMENT_METHODS)
            }
            EntityKind::Safes => EntityPolicy::list("appSafes", Array, &SAFES),
            EntityKind::PurchaseOrders => {
                EntityPolicy::list("appPurchaseOrders", Array, &PURCHASE_ORDERS).untrusted_empty()
            }
            EntityKind::SalesOrders => {
                EntityPolicy::list("appSalesOrders", Array, &SALES_ORDERS).untrusted_empty()
            }
            EntityKind::SalesReturns => {
                EntityPolicy::list("appSalesReturns", Array, &SALES_RETURNS).untrusted_empty()
            }
            EntityKind::PurchaseReturns => {
                EntityPolicy::list("appPurchaseReturns", Array, &PURCHASE_RETURNS)
                    .untrusted_empty()
            }
            EntityKind::GoodsReceipts => {
                EntityPolicy::list("appGoodsReceipts", Array, &GOODS_RECEIPTS).untrusted_empty()
            }
            EntityKind::Inventory => EntityPolicy::list("appInventory", Array, &INVENTORY),
            EntityKind::Notifications => {
                EntityPolicy::list("appNotifications", Array, &NOTIFICATIONS)
            }
            EntityKind::Settings => EntityPolicy::list("appSettings", Array, STANDARD_LIST),
            EntityKind::CategorizedSettings => {
                EntityPolicy::list("appCategorizedSettings", Record, &[])
                    .with_validity(settings::is_categorized_settings)
                    .untrusted_empty()
            }
        }
    }

    /// Path segment of the remote endpoint, relative to the company root.
    /// `None` for entities derived locally.
    pub fn endpoint(&self) -> Option<&'static str> {
        let path = match self {
            EntityKind::Users => "users",
            EntityKind::Clients => "clients",
            EntityKind::ClientAreaTags => "client-area-tags",
            EntityKind::ClientIndustries => "client-industries",
            EntityKind::Categories => "categories",
            EntityKind::Products => "products",
            EntityKind::BaseUnits => "base-units",
            EntityKind::Warehouses => "warehouses",
            EntityKind::PackagingTypes => "packaging-types",
            EntityKind::Suppliers => "suppliers",
            EntityKind::PaymentMethods => "payment-methods",
            EntityKind::Safes => "safes",
            EntityKind::PurchaseOrders => "purchase-orders",
            EntityKind::SalesOrders => "sales-orders",
            EntityKind::SalesReturns => "sales-returns",
            EntityKind::PurchaseReturns => "purchase-returns",
            EntityKind::GoodsReceipts => "goods-receipts",
            EntityKind::Inventory => "inventory",
            EntityKind::Notifications => "notifications",
            EntityKind::Settings => "settings",
            EntityKind::CategorizedSettings => return None,
        };
        Some(path)
    }

    /// Command-line name, e.g. `purchase-orders`.
    pub fn name(&self) -> &'static str {
        match self {
            EntityKind::CategorizedSettings => "categorized-settings",
            other => other.endpoint().unwrap_or("unknown"),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('_', "-");
        EntityKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.name() == wanted || kind.policy().key.eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown entity: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_unique() {
        let mut keys: Vec<&str> = EntityKind::ALL.iter().map(|k| k.policy().key).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), EntityKind::ALL.len());
    }

    #[test]
    fn test_enveloped_entities_wrap_records() {
        let policy = EntityKind::Products.policy();
        let value = policy.normalize(&json!({"data": {"data": [{"id": 3}], "pagination": {}}}));
        assert_eq!(value, json!({"data": [{"id": 3}]}));
        assert!(policy.shape.conforms(&value));
        assert_eq!(policy.normalize(&json!("garbage")), json!({"data": []}));
    }

    #[test]
    fn test_named_field_entities_unwrap_to_array() {
        let policy = EntityKind::Safes.policy();
        let value = policy.normalize(&json!({"status": "success", "data": {"safes": [{"id": 1}]}}));
        assert_eq!(value, json!([{"id": 1}]));
    }

    #[test]
    fn test_record_entities_keep_objects_only() {
        let policy = EntityKind::CategorizedSettings.policy();
        let record = json!({"company": [], "advanced": []});
        assert_eq!(policy.normalize(&record), record);
        assert_eq!(policy.normalize(&json!([{"company": []}])), json!({}));
        assert_eq!(EntityKind::Users.policy().normalize(&json!({"id": 1})), json!([]));
    }

    #[test]
    fn test_shape_conformance() {
        assert!(EntityShape::Array.conforms(&json!([])));
        assert!(!EntityShape::Array.conforms(&json!({"data": []})));
        assert!(EntityShape::Enveloped.conforms(&json!({"data": []})));
        assert!(!EntityShape::Enveloped.conforms(&json!([])));
        assert!(EntityShape::Record.conforms(&json!({})));
        assert!(!EntityShape::Record.conforms(&json!(null)));
    }

    #[test]
    fn test_has_sort_order() {
        assert!(has_sort_order(&json!([{"id": 1, "sort_order": 2}])));
        assert!(!has_sort_order(&json!([{"id": 1, "sort_order": 2}, {"id": 2}])));
        assert!(!has_sort_order(&json!([{"id": 1}])));
        assert!(has_sort_order(&json!([])));
    }

    #[test]
    fn test_inactive_variant_key() {
        assert_eq!(EntityKind::Clients.policy().cache_key(true), "appClientsWithInactive");
        assert_eq!(EntityKind::Clients.policy().cache_key(false), "appClients");
        // Entities without the option ignore it
        assert_eq!(EntityKind::Users.policy().cache_key(true), "appUsers");
    }

    #[test]
    fn test_entity_kind_from_str() {
        assert_eq!("purchase-orders".parse::<EntityKind>(), Ok(EntityKind::PurchaseOrders));
        assert_eq!("purchase_orders".parse::<EntityKind>(), Ok(EntityKind::PurchaseOrders));
        assert_eq!("appInventory".parse::<EntityKind>(), Ok(EntityKind::Inventory));
        assert!("widgets".parse::<EntityKind>().is_err());
    }
}
