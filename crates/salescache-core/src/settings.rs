//! Settings categorization.
//!
//! The settings screens group the flat settings list by topic. Each key is
//! classified by an ordered rule list: exact keys first, then prefix and
//! substring rules grouped by topic. The first matching rule wins and anything
//! unmatched lands in `advanced`. Rule order is part of the contract - moving
//! a rule changes which screen a setting shows up on.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::Setting;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingsCategory {
    Company,
    System,
    Financial,
    Inventory,
    Business,
    Mobile,
    Visit,
    Safe,
    Warehouse,
    Client,
    Notifications,
    Security,
    Backup,
    Reports,
    Product,
    Ui,
    Integration,
    Performance,
    Advanced,
}

impl SettingsCategory {
    pub const ALL: [SettingsCategory; 19] = [
        SettingsCategory::Company,
        SettingsCategory::System,
        SettingsCategory::Financial,
        SettingsCategory::Inventory,
        SettingsCategory::Business,
        SettingsCategory::Mobile,
        SettingsCategory::Visit,
        SettingsCategory::Safe,
        SettingsCategory::Warehouse,
        SettingsCategory::Client,
        SettingsCategory::Notifications,
        SettingsCategory::Security,
        SettingsCategory::Backup,
        SettingsCategory::Reports,
        SettingsCategory::Product,
        SettingsCategory::Ui,
        SettingsCategory::Integration,
        SettingsCategory::Performance,
        SettingsCategory::Advanced,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SettingsCategory::Company => "company",
            SettingsCategory::System => "system",
            SettingsCategory::Financial => "financial",
            SettingsCategory::Inventory => "inventory",
            SettingsCategory::Business => "business",
            SettingsCategory::Mobile => "mobile",
            SettingsCategory::Visit => "visit",
            SettingsCategory::Safe => "safe",
            SettingsCategory::Warehouse => "warehouse",
            SettingsCategory::Client => "client",
            SettingsCategory::Notifications => "notifications",
            SettingsCategory::Security => "security",
            SettingsCategory::Backup => "backup",
            SettingsCategory::Reports => "reports",
            SettingsCategory::Product => "product",
            SettingsCategory::Ui => "ui",
            SettingsCategory::Integration => "integration",
            SettingsCategory::Performance => "performance",
            SettingsCategory::Advanced => "advanced",
        }
    }
}

impl fmt::Display for SettingsCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
enum KeyPattern {
    Prefix(&'static str),
    Contains(&'static str),
}

impl KeyPattern {
    fn matches(&self, key: &str) -> bool {
        match self {
            KeyPattern::Prefix(p) => key.starts_with(p),
            KeyPattern::Contains(s) => key.contains(s),
        }
    }
}

use KeyPattern::{Contains, Prefix};

/// Keys whose category is fixed regardless of the topic rules.
const EXPLICIT_KEYS: &[(&str, SettingsCategory)] = &[
    ("company_name", SettingsCategory::Company),
    ("company_logo", SettingsCategory::Company),
    ("company_address", SettingsCategory::Company),
    ("company_phone", SettingsCategory::Company),
    ("company_email", SettingsCategory::Company),
    ("company_tax_number", SettingsCategory::Company),
    ("company_website", SettingsCategory::Company),
    ("app_version", SettingsCategory::System),
    ("maintenance_mode", SettingsCategory::System),
    ("default_language", SettingsCategory::System),
    ("default_currency", SettingsCategory::Financial),
    ("currency_symbol", SettingsCategory::Financial),
    ("tax_rate", SettingsCategory::Financial),
    ("allow_negative_stock", SettingsCategory::Inventory),
    ("theme_mode", SettingsCategory::Ui),
    ("primary_color", SettingsCategory::Ui),
];

/// Topic rules, evaluated top to bottom.
const TOPIC_RULES: &[(SettingsCategory, &[KeyPattern])] = &[
    (
        SettingsCategory::Company,
        &[Prefix("company_"), Contains("organization"), Contains("branch")],
    ),
    (
        SettingsCategory::System,
        &[
            Prefix("system_"),
            Contains("timezone"),
            Contains("locale"),
            Contains("language"),
            Contains("date_format"),
            Contains("time_format"),
            Contains("maintenance"),
        ],
    ),
    (
        SettingsCategory::Financial,
        &[
            Contains("currency"),
            Contains("tax"),
            Contains("vat"),
            Contains("invoice"),
            Contains("payment"),
            Contains("price"),
            Contains("discount"),
            Contains("credit"),
            Contains("fiscal"),
        ],
    ),
    (
        SettingsCategory::Inventory,
        &[
            Contains("inventory"),
            Contains("stock"),
            Contains("expiry"),
            Contains("serial"),
        ],
    ),
    (
        SettingsCategory::Business,
        &[
            Contains("business"),
            Contains("sales"),
            Contains("order"),
            Contains("purchase"),
            Contains("return"),
            Contains("commission"),
            Contains("target"),
        ],
    ),
    (
        SettingsCategory::Mobile,
        &[
            Contains("mobile"),
            Prefix("app_"),
            Contains("gps"),
            Contains("location"),
            Contains("offline"),
            Contains("sync"),
        ],
    ),
    (
        SettingsCategory::Visit,
        &[
            Contains("visit"),
            Contains("route"),
            Contains("journey"),
            Contains("check_in"),
            Contains("checkin"),
        ],
    ),
    (
        SettingsCategory::Safe,
        &[Contains("safe"), Contains("cash"), Contains("treasury")],
    ),
    (
        SettingsCategory::Warehouse,
        &[Contains("warehouse"), Contains("transfer"), Contains("receipt")],
    ),
    (
        SettingsCategory::Client,
        &[
            Contains("client"),
            Contains("customer"),
            Contains("area"),
            Contains("industry"),
        ],
    ),
    (
        SettingsCategory::Notifications,
        &[
            Contains("notification"),
            Contains("notify"),
            Contains("email"),
            Contains("sms"),
            Contains("push"),
            Contains("alert"),
        ],
    ),
    (
        SettingsCategory::Security,
        &[
            Contains("security"),
            Contains("password"),
            Contains("login"),
            Contains("session"),
            Contains("auth"),
            Contains("permission"),
            Contains("otp"),
        ],
    ),
    (
        SettingsCategory::Backup,
        &[
            Contains("backup"),
            Contains("restore"),
            Contains("archive"),
            Contains("export"),
        ],
    ),
    (
        SettingsCategory::Reports,
        &[
            Contains("report"),
            Contains("dashboard"),
            Contains("analytics"),
            Contains("statistic"),
        ],
    ),
    (
        SettingsCategory::Product,
        &[
            Contains("product"),
            Contains("unit"),
            Contains("packaging"),
            Contains("category"),
            Contains("barcode"),
            Contains("sku"),
        ],
    ),
    (
        SettingsCategory::Ui,
        &[
            Prefix("ui_"),
            Contains("theme"),
            Contains("color"),
            Contains("logo"),
            Contains("display"),
            Contains("layout"),
            Contains("font"),
        ],
    ),
    (
        SettingsCategory::Integration,
        &[
            Contains("integration"),
            Contains("api"),
            Contains("webhook"),
            Contains("erp"),
            Contains("external"),
        ],
    ),
    (
        SettingsCategory::Performance,
        &[
            Contains("performance"),
            Contains("cache"),
            Contains("timeout"),
            Contains("limit"),
            Contains("page_size"),
            Contains("batch"),
        ],
    ),
];

/// Category for a settings key. Total: every key gets exactly one category.
pub fn classify(settings_key: &str) -> SettingsCategory {
    let key = settings_key.trim().to_lowercase();

    if let Some((_, category)) = EXPLICIT_KEYS.iter().find(|(k, _)| *k == key) {
        return *category;
    }

    TOPIC_RULES
        .iter()
        .find(|(_, patterns)| patterns.iter().any(|p| p.matches(&key)))
        .map(|(category, _)| *category)
        .unwrap_or(SettingsCategory::Advanced)
}

/// Settings grouped by category. Every category is always present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategorizedSettings {
    categories: BTreeMap<SettingsCategory, Vec<Setting>>,
}

impl Default for CategorizedSettings {
    fn default() -> Self {
        Self {
            categories: SettingsCategory::ALL
                .iter()
                .map(|c| (*c, Vec::new()))
                .collect(),
        }
    }
}

impl CategorizedSettings {
    pub fn get(&self, category: SettingsCategory) -> &[Setting] {
        self.categories
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (SettingsCategory, &[Setting])> {
        self.categories.iter().map(|(c, s)| (*c, s.as_slice()))
    }

    pub fn total(&self) -> usize {
        self.categories.values().map(Vec::len).sum()
    }

    /// Parse a cached value, filling in any category it lacks.
    pub fn from_value(value: &Value) -> Option<Self> {
        let parsed: CategorizedSettings = serde_json::from_value(value.clone()).ok()?;
        let mut full = Self::default();
        full.categories.extend(parsed.categories);
        Some(full)
    }
}

/// Group settings by category, preserving input order within each category.
pub fn categorize(settings: &[Setting]) -> CategorizedSettings {
    let mut result = CategorizedSettings::default();
    for setting in settings {
        result
            .categories
            .entry(classify(&setting.settings_key))
            .or_default()
            .push(setting.clone());
    }
    result
}

/// Group raw settings records; records that are not objects are dropped.
pub fn categorize_records(records: &[Value]) -> CategorizedSettings {
    let settings: Vec<Setting> = records.iter().filter_map(Setting::from_value).collect();
    categorize(&settings)
}

/// Cache validity check for persisted categorized settings.
pub fn is_categorized_settings(value: &Value) -> bool {
    CategorizedSettings::from_value(value).is_some()
}
