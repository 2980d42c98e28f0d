//! OCAPI request and response documents
//!
//! OCAPI bodies are snake_case JSON. Unknown properties are ignored, except on
//! documents that carry custom attributes, which keep them in a flattened map.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::migrations::{MigrationContext, MigrationError};
use crate::search::SearchHit;

/// Error document carried by non-success OCAPI responses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fault {
    /// Exception name, e.g. `CodeVersionNotFoundException`
    #[serde(rename = "type")]
    pub kind: String,
    /// Human readable message
    #[serde(default)]
    pub message: String,
    /// Values substituted into the message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Map<String, Value>>,
    /// Message template with argument placeholders
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_message_pattern: Option<String>,
}

/// Unpaged collection returned by list resources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataCollection<T> {
    /// Collection members
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    /// Members returned
    #[serde(default)]
    pub count: usize,
    /// Offset of the first member
    #[serde(default)]
    pub start: usize,
    /// Members available
    #[serde(default)]
    pub total: usize,
}

/// A storefront site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    /// Site id
    pub id: String,
    /// Localized display names keyed by locale
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<Map<String, Value>>,
    /// `online` or `offline`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl Site {
    /// Default-locale display name, falling back to the id
    pub fn name(&self) -> &str {
        self.display_name
            .as_ref()
            .and_then(|names| names.get("default"))
            .and_then(Value::as_str)
            .unwrap_or(&self.id)
    }
}

/// A code version held by the instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeVersion {
    /// Code version id
    pub id: String,
    /// Whether this version serves the storefront
    #[serde(default)]
    pub active: bool,
    /// Cartridges uploaded to this version
    #[serde(default)]
    pub cartridges: Vec<String>,
    /// API compatibility mode, e.g. `18.10`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compatibility_mode: Option<String>,
    /// When the version was last activated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activation_time: Option<DateTime<Utc>>,
    /// When the version's files last changed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modification_time: Option<DateTime<Utc>>,
    /// Whether this is the rollback version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback: Option<bool>,
    /// Size on disk in bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_size: Option<u64>,
    /// WebDAV URL of the version's directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_dav_url: Option<String>,
}

/// Partial update of a code version. Only set fields are sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeVersionPatch {
    /// New activation state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    /// New id (rename)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl CodeVersionPatch {
    /// Patch activating the code version
    pub fn activate() -> Self {
        Self {
            active: Some(true),
            ..Self::default()
        }
    }
}

/// Outcome of a status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    /// Success
    Ok,
    /// Failure
    Error,
}

/// Status document, e.g. the exit status of a job execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    /// Outcome
    pub status: StatusKind,
    /// Machine readable code, e.g. `OK` or `ERROR`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// One run of a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobExecution {
    /// Execution id
    pub id: String,
    /// Job that was run
    pub job_id: String,
    /// `pending`, `running`, `finished` and so on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_status: Option<String>,
    /// When the run started
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    /// When the run ended
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Result, once finished
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_status: Option<Status>,
}

impl JobExecution {
    /// Whether the job finished with an `ok` exit status
    pub fn succeeded(&self) -> bool {
        self.exit_status
            .as_ref()
            .is_some_and(|status| status.status == StatusKind::Ok)
    }
}

/// Body of the `sfcc-site-archive-export` system job
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteArchiveExportConfiguration {
    /// What to export
    pub data_units: ExportDataUnits,
    /// Archive name under the Impex `src/instance` directory
    pub export_file: String,
    /// Replace an existing archive of the same name
    #[serde(default)]
    pub overwrite_export_file: bool,
}

/// Data selected for a site archive export. Maps are keyed by object id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportDataUnits {
    /// Organization-wide data
    pub global_data: ExportGlobalData,
    /// Static resources per catalog
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog_static_resources: Option<BTreeMap<String, bool>>,
    /// Catalogs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalogs: Option<BTreeMap<String, bool>>,
    /// Customer lists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_lists: Option<BTreeMap<String, bool>>,
    /// Inventory lists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inventory_lists: Option<BTreeMap<String, bool>>,
    /// Content libraries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub libraries: Option<BTreeMap<String, bool>>,
    /// Static resources per library
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library_static_resources: Option<BTreeMap<String, bool>>,
    /// Price books
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_books: Option<BTreeMap<String, bool>>,
    /// Per-site data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sites: Option<BTreeMap<String, ExportSiteData>>,
}

/// Organization-wide export switches, one per Business Manager checkbox
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct ExportGlobalData {
    /// Include access roles
    pub access_roles: bool,
    /// Include Customer Service Center settings
    pub csc_settings: bool,
    /// Include CSRF allowlists
    pub csrf_whitelists: bool,
    /// Include custom preference groups
    pub custom_preference_groups: bool,
    /// Include custom quota settings
    pub custom_quota_settings: bool,
    /// Include custom types
    pub custom_types: bool,
    /// Include geolocations
    pub geolocations: bool,
    /// Include global custom objects
    pub global_custom_objects: bool,
    /// Include job schedules
    pub job_schedules: bool,
    /// Include job schedules in the deprecated format
    pub job_schedules_deprecated: bool,
    /// Include locales
    pub locales: bool,
    /// Include system and custom object metadata
    pub meta_data: bool,
    /// Include OAuth providers
    pub oauth_providers: bool,
    /// Include OCAPI settings
    pub ocapi_settings: bool,
    /// Include page meta tags
    pub page_meta_tags: bool,
    /// Include preferences
    pub preferences: bool,
    /// Include price adjustment limits
    pub price_adjustment_limits: bool,
    /// Include services
    pub services: bool,
    /// Include sorting rules
    pub sorting_rules: bool,
    /// Include static resources
    pub static_resources: bool,
    /// Include system type definitions
    pub system_type_definitions: bool,
    /// Include users
    pub users: bool,
    /// Include WebDAV client permissions
    pub webdav_client_permissions: bool,
}

/// Per-site export switches, one per Business Manager checkbox
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct ExportSiteData {
    /// Include A/B tests
    pub ab_tests: bool,
    /// Include active data feeds
    pub active_data_feeds: bool,
    /// Include everything of the site
    pub all: bool,
    /// Include cache settings
    pub cache_settings: bool,
    /// Include campaigns and promotions
    pub campaigns_and_promotions: bool,
    /// Include content
    pub content: bool,
    /// Include coupons
    pub coupons: bool,
    /// Include custom objects
    pub custom_objects: bool,
    /// Include customer CDN settings
    pub customer_cdn_settings: bool,
    /// Include customer groups
    pub customer_groups: bool,
    /// Include distributed commerce extensions
    pub distributed_commerce_extensions: bool,
    /// Include dynamic file resources
    pub dynamic_file_resources: bool,
    /// Include gift certificates
    pub gift_certificates: bool,
    /// Include OCAPI settings
    pub ocapi_settings: bool,
    /// Include payment methods
    pub payment_methods: bool,
    /// Include payment processors
    pub payment_processors: bool,
    /// Include redirect urls
    pub redirect_urls: bool,
    /// Include search settings
    pub search_settings: bool,
    /// Include shipping
    pub shipping: bool,
    /// Include site descriptor
    pub site_descriptor: bool,
    /// Include site preferences
    pub site_preferences: bool,
    /// Include sitemap settings
    pub sitemap_settings: bool,
    /// Include slots
    pub slots: bool,
    /// Include sorting rules
    pub sorting_rules: bool,
    /// Include source codes
    pub source_codes: bool,
    /// Include static dynamic alias mappings
    pub static_dynamic_alias_mappings: bool,
    /// Include stores
    pub stores: bool,
    /// Include tax
    pub tax: bool,
    /// Include URL rules
    pub url_rules: bool,
}

/// Body of the `sfcc-site-archive-import` system job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteArchiveImportConfiguration {
    /// Archive name under the Impex `src/instance` directory
    pub file_name: String,
    /// Import mode, `merge` unless told otherwise
    #[serde(default = "default_import_mode")]
    pub mode: String,
}

impl SiteArchiveImportConfiguration {
    /// Merge import of `file_name`
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            mode: default_import_mode(),
        }
    }
}

fn default_import_mode() -> String {
    "merge".to_string()
}

/// Organization preferences of one group and instance type.
///
/// The migration bookkeeping attributes use the names earlier migration
/// tools wrote, so instances migrated by either tool stay comparable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrganizationPreferences {
    /// Last migration applied
    #[serde(
        rename = "c_dwreMigrateCurrentVersion",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub migrate_current_version: Option<String>,

    /// Version of the tool that applied it
    #[serde(
        rename = "c_dwreMigrateToolVersion",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub migrate_tool_version: Option<String>,

    /// Applied migrations, oldest first
    #[serde(
        rename = "c_dwreMigrateVersionPath",
        default,
        with = "csv_list",
        skip_serializing_if = "Option::is_none"
    )]
    pub migrate_version_path: Option<Vec<String>>,

    /// Applied hotfixes
    #[serde(
        rename = "c_dwreMigrateHotfixes",
        default,
        with = "csv_list",
        skip_serializing_if = "Option::is_none"
    )]
    pub migrate_hotfixes: Option<Vec<String>>,

    /// Every other attribute of the group
    #[serde(flatten)]
    pub custom: Map<String, Value>,
}

impl OrganizationPreferences {
    /// Migration history recorded on the instance
    pub fn migration_context(&self) -> Result<MigrationContext, MigrationError> {
        let joined = |list: &Option<Vec<String>>| list.as_deref().unwrap_or_default().join(",");
        MigrationContext::from_comma_separated(
            self.migrate_current_version.as_deref().unwrap_or_default(),
            &joined(&self.migrate_version_path),
            &joined(&self.migrate_hotfixes),
        )
    }
}

/// Lists stored as a single comma separated string attribute
mod csv_list {
    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(list: &Option<Vec<String>>, serializer: S) -> Result<S::Ok, S::Error> {
        match list {
            Some(items) => serializer.serialize_str(&items.join(",")),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<String>>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect()
        }))
    }
}

/// Whether an order was handed to the fulfilment system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportStatus {
    /// Waiting to be exported
    Ready,
    /// Not exported and not queued
    NotExported,
    /// Export attempted and failed
    Failed,
    /// Exported
    Exported,
}

/// Lifecycle state of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Basket turned into an order, not yet placed
    Created,
    /// Placed
    New,
    /// Being processed
    Open,
    /// Fulfilled
    Completed,
    /// Cancelled
    Cancelled,
    /// Replaced by another order
    Replaced,
    /// Placement failed
    Failed,
}

/// A storefront order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Order number
    pub order_no: String,
    /// When the order was created
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<DateTime<Utc>>,
    /// Name of the ordering customer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    /// Tax total
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_total: Option<f64>,
    /// Shipping total
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping_total: Option<f64>,
    /// Product total
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_total: Option<f64>,
    /// Grand total
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_total: Option<f64>,
    /// Ordered products
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub product_items: Vec<ProductItem>,
    /// Payments
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub payment_instruments: Vec<PaymentInstrument>,
    /// Shipments
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub shipments: Vec<Shipment>,
    /// Customer reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_info: Option<CustomerInfo>,
    /// Export state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_status: Option<ExportStatus>,
    /// Lifecycle state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    /// Billing address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_address: Option<OrderAddress>,
    /// Custom attributes (`c_*`) and anything else not modelled
    #[serde(flatten)]
    pub custom: Map<String, Value>,
}

/// Order search result entry
pub type OrderSearchHit = SearchHit<Order>;

/// Order line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductItem {
    /// Ordered product
    pub product_id: String,
    /// Units ordered
    #[serde(default)]
    pub quantity: u32,
}

/// Payment of an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentInstrument {
    /// Payment method, e.g. `CREDIT_CARD`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method_id: Option<String>,
    /// Method specific attributes
    #[serde(flatten)]
    pub custom: Map<String, Value>,
}

/// Shipment of an order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shipment {
    /// Destination
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping_address: Option<OrderAddress>,
    /// Carrier service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping_method: Option<ShippingMethod>,
}

/// Shipping method reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingMethod {
    /// Method id
    pub id: String,
}

/// Customer reference of an order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerInfo {
    /// Customer number, absent for guest checkouts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_no: Option<String>,
    /// Contact email
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Postal address
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderAddress {
    /// First name
    pub first_name: Option<String>,
    /// Last name
    pub last_name: Option<String>,
    /// Street line
    pub address1: Option<String>,
    /// Additional street line
    pub address2: Option<String>,
    /// City
    pub city: Option<String>,
    /// Postal code
    pub postal_code: Option<String>,
    /// State or province code
    pub state_code: Option<String>,
    /// ISO country code
    pub country_code: Option<String>,
    /// Phone number
    pub phone: Option<String>,
}

/// Note attached to an order by an agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Subject line
    pub subject: String,
    /// Body
    pub text: String,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::migrations::Migration;

    #[test]
    fn test_preferences_split_csv_lists_and_keep_custom_attributes() {
        let prefs: OrganizationPreferences = serde_json::from_value(json!({
            "_v": "20.8",
            "c_dwreMigrateCurrentVersion": "b",
            "c_dwreMigrateToolVersion": "0.4.0",
            "c_dwreMigrateVersionPath": "a,b",
            "c_dwreMigrateHotfixes": "",
            "c_somethingElse": 42
        }))
        .unwrap();

        assert_eq!(prefs.migrate_version_path, Some(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(prefs.migrate_hotfixes, Some(vec![]));
        assert_eq!(prefs.custom.get("c_somethingElse"), Some(&json!(42)));

        let context = prefs.migration_context().unwrap();
        assert_eq!(
            context.migrations,
            vec![Migration::hotfix("a"), Migration::new("b", Some("a"))]
        );
        assert_eq!(context.current, Some(Migration::new("b", Some("a"))));
    }

    #[test]
    fn test_preferences_serialize_lists_as_csv() {
        let prefs = OrganizationPreferences {
            migrate_current_version: Some("c".to_string()),
            migrate_version_path: Some(vec!["a".to_string(), "b".to_string(), "c".to_string()]),
            ..OrganizationPreferences::default()
        };

        assert_eq!(
            serde_json::to_value(&prefs).unwrap(),
            json!({
                "c_dwreMigrateCurrentVersion": "c",
                "c_dwreMigrateVersionPath": "a,b,c"
            })
        );
    }

    #[test]
    fn test_empty_preferences_mean_nothing_applied() {
        let context = OrganizationPreferences::default().migration_context().unwrap();

        assert!(context.migrations.is_empty());
        assert!(context.current.is_none());
    }

    #[test]
    fn test_order_keeps_custom_attributes() {
        let order: Order = serde_json::from_value(json!({
            "order_no": "00001",
            "creation_date": "2020-01-12T20:10:37.000Z",
            "status": "new",
            "export_status": "not_exported",
            "order_total": 12.5,
            "c_loyaltyId": "L-1"
        }))
        .unwrap();

        assert_eq!(order.status, Some(OrderStatus::New));
        assert_eq!(order.export_status, Some(ExportStatus::NotExported));
        assert_eq!(order.custom.get("c_loyaltyId"), Some(&json!("L-1")));
    }

    #[test]
    fn test_code_version_patch_sends_only_set_fields() {
        assert_eq!(
            serde_json::to_value(CodeVersionPatch::activate()).unwrap(),
            json!({ "active": true })
        );
    }

    #[test]
    fn test_job_execution_exit_status() {
        let execution: JobExecution = serde_json::from_value(json!({
            "id": "1",
            "job_id": "sfcc-site-archive-export",
            "execution_status": "finished",
            "exit_status": { "status": "ok", "code": "OK" }
        }))
        .unwrap();

        assert!(execution.succeeded());
    }
}
