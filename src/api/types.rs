//! Request and response types for the admin backend API.
//!
//! All structs use camelCase serialization to match the API's JSON format.

use serde::{Deserialize, Serialize};

use super::error::ApiError;

/// Uniform response wrapper: `{ success, data, message? }`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> Envelope<T> {
    /// Fail with [`ApiError::Rejected`] unless `success` is set.
    pub fn ensure_success(self) -> Result<Self, ApiError> {
        if self.success {
            Ok(self)
        } else {
            Err(ApiError::Rejected(
                self.message
                    .unwrap_or_else(|| "request was not successful".to_string()),
            ))
        }
    }

    /// Payload of a successful envelope. Missing data counts as a rejection.
    pub fn into_data(self) -> Result<T, ApiError> {
        self.ensure_success()?
            .data
            .ok_or_else(|| ApiError::Rejected("response contained no data".to_string()))
    }
}

// ── Account ───────────────────────────────────────────────────────────────────

/// Body of POST /Account/Authentication.
#[derive(Debug, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// `data` of a successful login envelope; stored verbatim as the session
/// snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthData {
    pub jw_token: String,
    /// Remaining profile fields, kept as sent.
    #[serde(flatten)]
    pub profile: serde_json::Map<String, serde_json::Value>,
}

impl AuthData {
    /// Best human-readable name in the profile.
    pub fn display_name(&self) -> Option<&str> {
        ["userName", "email", "id"]
            .iter()
            .find_map(|key| self.profile.get(*key).and_then(|v| v.as_str()))
    }
}

/// Body of POST /Account/RegisterUser. `comfirm_password` matches the
/// backend's field name.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub user_name: String,
    pub gender: Option<i32>,
    pub password: String,
    pub comfirm_password: String,
    pub phone_number: String,
}

// ── Catalog ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryDraft {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    pub id: String,
    pub name: String,
}

/// Short inventory view embedded in a material.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventorySummary {
    pub id: String,
    pub quantity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    pub id: String,
    pub name: String,
    pub category_id: String,
    pub unit_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inventories: Option<Vec<InventorySummary>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialDraft {
    pub name: String,
    pub category_id: String,
    pub unit_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category_id: String,
    pub price: f64,
    #[serde(default)]
    pub is_promotion: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion_end: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Menu item fields sent as multipart form data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItemDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category_id: String,
    pub price: f64,
    #[serde(default)]
    pub is_promotion: bool,
    /// ISO-8601 timestamp.
    #[serde(default)]
    pub promotion_end: Option<String>,
    #[serde(default)]
    pub discount_percent: Option<f64>,
}

// ── Stock ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Supplier {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub payment_terms: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplierDraft {
    pub name: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub payment_terms: String,
}

/// Material reference embedded in inventory lots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialRef {
    pub id: String,
    pub name: String,
}

/// One received batch of a material.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryLot {
    pub id: String,
    pub material_id: String,
    pub quantity: f64,
    pub price: f64,
    pub supplier_id: String,
    pub import_date: String,
    pub expiry_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<MaterialRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryDraft {
    pub material_id: String,
    pub quantity: f64,
    pub supplier_id: String,
    pub price: f64,
    pub import_date: String,
    pub expiry_date: String,
}

// ── Floor ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    pub id: String,
    pub name: String,
    pub capacity: i32,
    #[serde(default)]
    pub location: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    pub status: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableDraft {
    pub name: String,
    pub capacity: i32,
    pub location: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub id: String,
    pub table_id: String,
    pub customer_name: String,
    pub number_people: i32,
    #[serde(default)]
    pub notes: String,
    pub date_time: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationDraft {
    pub table_id: String,
    pub customer_name: String,
    pub number_people: i32,
    #[serde(default)]
    pub notes: String,
    pub date_time: String,
    pub status: String,
}

// ── Access ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feature {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub created_by: String,
    #[serde(default)]
    pub created_on: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_on: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureDraft {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub user_name: String,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub email_confirmed: bool,
    #[serde(default)]
    pub phone_number_confirmed: bool,
    #[serde(default)]
    pub two_factor_enabled: bool,
}
