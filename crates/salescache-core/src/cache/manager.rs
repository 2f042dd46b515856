use std::future::Future;

use serde_json::Value;
use tracing::{debug, warn};

use crate::api::{EntityFetcher, FetchRequest};
use crate::auth::Session;
use crate::models::DataEnvelope;
use crate::settings::{self, CategorizedSettings};

use super::entity::{EmptyPolicy, EntityKind, EntityPolicy};
use super::error::CacheError;
use super::storage::{KeyValueStore, StorageAdapter};

/// Per-call refresh options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Skip the cache hit path and always ask the API.
    pub force_refresh: bool,
    /// Include inactive records (clients, products, warehouses only).
    pub include_inactive: bool,
}

impl FetchOptions {
    pub fn refresh(force_refresh: bool) -> Self {
        Self {
            force_refresh,
            include_inactive: false,
        }
    }

    pub fn with_inactive(mut self, include_inactive: bool) -> Self {
        self.include_inactive = include_inactive;
        self
    }
}

/// Cache-aside access to every entity.
///
/// Each read returns cached data when present, otherwise asks the fetcher,
/// normalizes the response and persists it. Reads never fail: when the API
/// is unreachable the caller gets the previous cached value, or the entity's
/// empty value if nothing was cached.
pub struct CacheManager<S: KeyValueStore, F: EntityFetcher> {
    storage: StorageAdapter<S>,
    session: Session<S>,
    fetcher: F,
}

impl<S: KeyValueStore, F: EntityFetcher> CacheManager<S, F> {
    pub fn new(storage: StorageAdapter<S>, fetcher: F) -> Self {
        let session = Session::new(storage.clone());
        Self {
            storage,
            session,
            fetcher,
        }
    }

    pub fn storage(&self) -> &StorageAdapter<S> {
        &self.storage
    }

    pub fn session(&self) -> &Session<S> {
        &self.session
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Read an entity, refreshing from the API as the options and cache state require.
    pub async fn get(&self, kind: EntityKind, options: FetchOptions) -> Value {
        match kind {
            EntityKind::CategorizedSettings => self.categorized_value(options.force_refresh).await,
            _ => self.fetch_entity(kind, options).await,
        }
    }

    /// Cached value of an entity without touching the network.
    pub fn peek(&self, kind: EntityKind, include_inactive: bool) -> Option<Value> {
        let policy = kind.policy();
        self.read_cached(&policy, &policy.cache_key(include_inactive))
    }

    /// Drop an entity so the next read goes to the API.
    pub fn invalidate(&self, kind: EntityKind) {
        let policy = kind.policy();
        self.storage.remove(policy.key);
        if policy.supports_inactive {
            self.storage.remove(&policy.cache_key(true));
        }
        if kind == EntityKind::Settings {
            self.storage
                .remove(EntityKind::CategorizedSettings.policy().key);
        }
        debug!(entity = %kind, "Cache invalidated");
    }

    async fn fetch_entity(&self, kind: EntityKind, options: FetchOptions) -> Value {
        let policy = kind.policy();
        let key = policy.cache_key(options.include_inactive);
        let request = FetchRequest {
            kind,
            include_inactive: options.include_inactive && policy.supports_inactive,
            identity: self.session.identity(),
        };

        self.resolve(&policy, &key, options.force_refresh, || async {
            self.fetcher
                .fetch(&request)
                .await
                .map_err(|e| CacheError::fetch(&key, e))
        })
        .await
    }

    async fn categorized_value(&self, force_refresh: bool) -> Value {
        let policy = EntityKind::CategorizedSettings.policy();
        self.resolve(&policy, policy.key, force_refresh, || async {
            let records = self
                .fetch_entity(EntityKind::Settings, FetchOptions::refresh(force_refresh))
                .await;
            let records = records.as_array().map(Vec::as_slice).unwrap_or(&[]);
            // No settings yet: leave any previous categorization in place
            let value = if records.is_empty() {
                policy.shape.empty_value()
            } else {
                serde_json::to_value(settings::categorize_records(records))
                    .unwrap_or_else(|_| policy.shape.empty_value())
            };
            Ok::<_, CacheError>(value)
        })
        .await
    }

    /// Entries built from `key` are stale once it is rewritten.
    fn drop_derived(&self, key: &str) {
        if key == EntityKind::Settings.policy().key {
            let derived = EntityKind::CategorizedSettings.policy().key;
            self.storage.remove(derived);
            debug!(key, derived, "Dropped derived cache entry");
        }
    }

    /// Parsed, shape-conforming cached value. Anything else reads as absent.
    fn read_cached(&self, policy: &EntityPolicy, key: &str) -> Option<Value> {
        let value = self.storage.read_json(key)?;
        if policy.shape.conforms(&value) {
            Some(value)
        } else {
            debug!(key, "Ignoring cache entry with unexpected shape");
            None
        }
    }

    /// The cache-aside algorithm shared by every entity.
    async fn resolve<R, Fut>(
        &self,
        policy: &EntityPolicy,
        key: &str,
        force_refresh: bool,
        refresh: R,
    ) -> Value
    where
        R: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, CacheError>>,
    {
        let cached = self.read_cached(policy, key);

        if !force_refresh {
            match &cached {
                Some(value) if policy.is_valid_cached(value) => {
                    debug!(key, "Cache hit");
                    return value.clone();
                }
                Some(_) => debug!(key, "Cached value failed validity check, refetching"),
                None => debug!(key, "Cache miss"),
            }
        }

        match refresh().await {
            Ok(raw) => {
                let fresh = policy.normalize(&raw);
                if policy.shape.is_empty(&fresh) && policy.empty == EmptyPolicy::Untrusted {
                    debug!(key, kept = cached.is_some(), "Ignoring empty response");
                    return cached.unwrap_or_else(|| policy.shape.empty_value());
                }
                if self.storage.write_json(key, &fresh) {
                    self.drop_derived(key);
                } else {
                    warn!(key, "Fresh data could not be persisted");
                }
                fresh
            }
            Err(e @ CacheError::MissingIdentity { .. }) => {
                warn!(error = %e, "Skipping refresh");
                policy.shape.empty_value()
            }
            Err(e) => {
                warn!(error = %e, fallback = cached.is_some(), "Refresh failed, serving cache");
                cached.unwrap_or_else(|| policy.shape.empty_value())
            }
        }
    }

    async fn list(&self, kind: EntityKind, options: FetchOptions) -> Vec<Value> {
        match self.get(kind, options).await {
            Value::Array(records) => records,
            _ => Vec::new(),
        }
    }

    async fn enveloped(&self, kind: EntityKind, options: FetchOptions) -> DataEnvelope {
        serde_json::from_value(self.get(kind, options).await).unwrap_or_default()
    }

    // ===== Entity entry points =====

    pub async fn app_users(&self, force_refresh: bool) -> Vec<Value> {
        self.list(EntityKind::Users, FetchOptions::refresh(force_refresh))
            .await
    }

    pub async fn app_clients(&self, force_refresh: bool, include_inactive: bool) -> Vec<Value> {
        let options = FetchOptions::refresh(force_refresh).with_inactive(include_inactive);
        self.list(EntityKind::Clients, options).await
    }

    pub async fn app_client_area_tags(&self, force_refresh: bool) -> Vec<Value> {
        self.list(EntityKind::ClientAreaTags, FetchOptions::refresh(force_refresh))
            .await
    }

    pub async fn app_client_industries(&self, force_refresh: bool) -> Vec<Value> {
        self.list(EntityKind::ClientIndustries, FetchOptions::refresh(force_refresh))
            .await
    }

    pub async fn app_categories(&self, force_refresh: bool) -> Vec<Value> {
        self.list(EntityKind::Categories, FetchOptions::refresh(force_refresh))
            .await
    }

    pub async fn app_products(&self, force_refresh: bool, include_inactive: bool) -> DataEnvelope {
        let options = FetchOptions::refresh(force_refresh).with_inactive(include_inactive);
        self.enveloped(EntityKind::Products, options).await
    }

    pub async fn app_base_units(&self, force_refresh: bool) -> DataEnvelope {
        self.enveloped(EntityKind::BaseUnits, FetchOptions::refresh(force_refresh))
            .await
    }

    pub async fn app_warehouses(&self, force_refresh: bool, include_inactive: bool) -> DataEnvelope {
        let options = FetchOptions::refresh(force_refresh).with_inactive(include_inactive);
        self.enveloped(EntityKind::Warehouses, options).await
    }

    pub async fn app_packaging_types(&self, force_refresh: bool) -> DataEnvelope {
        self.enveloped(EntityKind::PackagingTypes, FetchOptions::refresh(force_refresh))
            .await
    }

    pub async fn app_suppliers(&self, force_refresh: bool) -> DataEnvelope {
        self.enveloped(EntityKind::Suppliers, FetchOptions::refresh(force_refresh))
            .await
    }

    pub async fn app_payment_methods(&self, force_refresh: bool) -> Vec<Value> {
        self.list(EntityKind::PaymentMethods, FetchOptions::refresh(force_refresh))
            .await
    }

    pub async fn app_safes(&self, force_refresh: bool) -> Vec<Value> {
        self.list(EntityKind::Safes, FetchOptions::refresh(force_refresh))
            .await
    }

    pub async fn app_purchase_orders(&self, force_refresh: bool) -> Vec<Value> {
        self.list(EntityKind::PurchaseOrders, FetchOptions::refresh(force_refresh))
            .await
    }

    pub async fn app_sales_orders(&self, force_refresh: bool) -> Vec<Value> {
        self.list(EntityKind::SalesOrders, FetchOptions::refresh(force_refresh))
            .await
    }

    pub async fn app_sales_returns(&self, force_refresh: bool) -> Vec<Value> {
        self.list(EntityKind::SalesReturns, FetchOptions::refresh(force_refresh))
            .await
    }

    pub async fn app_purchase_returns(&self, force_refresh: bool) -> Vec<Value> {
        self.list(EntityKind::PurchaseReturns, FetchOptions::refresh(force_refresh))
            .await
    }

    pub async fn app_goods_receipts(&self, force_refresh: bool) -> Vec<Value> {
        self.list(EntityKind::GoodsReceipts, FetchOptions::refresh(force_refresh))
            .await
    }

    pub async fn app_inventory(&self, force_refresh: bool) -> Vec<Value> {
        self.list(EntityKind::Inventory, FetchOptions::refresh(force_refresh))
            .await
    }

    pub async fn app_notifications(&self, force_refresh: bool) -> Vec<Value> {
        self.list(EntityKind::Notifications, FetchOptions::refresh(force_refresh))
            .await
    }

    pub async fn app_settings(&self, force_refresh: bool) -> Vec<Value> {
        self.list(EntityKind::Settings, FetchOptions::refresh(force_refresh))
            .await
    }

    pub async fn app_categorized_settings(&self, force_refresh: bool) -> CategorizedSettings {
        let value = self.categorized_value(force_refresh).await;
        CategorizedSettings::from_value(&value).unwrap_or_default()
    }
}

// ============================================================================
// Tests
// ============================================================================
