//! Business entity endpoints.
//!
//! Every entity lives under a REST collection with Django-style trailing
//! slashes: `orders/`, `orders/{id}/`, `orders/{id}/{action}/`.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::client::ApiClient;
use crate::error::{Error, Result};
use crate::partner::{FieldDef, LiveRecord};

/// Entity collections exposed by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    Orders,
    DeliveryNotes,
    LoadingNotes,
    Discharges,
    Preparations,
    PromotionFamilies,
    PromotionBoosts,
    Templates,
    Partners,
}

impl Entity {
    pub const ALL: [Self; 9] = [
        Self::Orders,
        Self::DeliveryNotes,
        Self::LoadingNotes,
        Self::Discharges,
        Self::Preparations,
        Self::PromotionFamilies,
        Self::PromotionBoosts,
        Self::Templates,
        Self::Partners,
    ];

    /// Command-line name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Orders => "orders",
            Self::DeliveryNotes => "delivery-notes",
            Self::LoadingNotes => "loading-notes",
            Self::Discharges => "discharges",
            Self::Preparations => "preparations",
            Self::PromotionFamilies => "promotion-families",
            Self::PromotionBoosts => "promotion-boosts",
            Self::Templates => "templates",
            Self::Partners => "partners",
        }
    }

    /// Collection path relative to the API root.
    #[must_use]
    pub const fn path(&self) -> &'static str {
        match self {
            Self::Orders => "orders",
            Self::DeliveryNotes => "delivery-notes",
            Self::LoadingNotes => "loading-notes",
            Self::Discharges => "discharges",
            Self::Preparations => "preparations",
            Self::PromotionFamilies => "promotions/families",
            Self::PromotionBoosts => "promotions/boosts",
            Self::Templates => "templates",
            Self::Partners => "partners",
        }
    }

    #[must_use]
    pub fn list_path(&self) -> String {
        format!("{}/", self.path())
    }

    #[must_use]
    pub fn detail_path(&self, id: &str) -> String {
        format!("{}/{id}/", self.path())
    }

    /// Path of a workflow action, e.g. `orders/12/validate/`.
    #[must_use]
    pub fn transition_path(&self, id: &str, action: &str) -> String {
        format!("{}/{id}/{action}/", self.path())
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Entity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|e| e.as_str() == normalized || e.path() == normalized)
            .ok_or_else(|| {
                let known: Vec<_> = Self::ALL.iter().map(Self::as_str).collect();
                Error::InvalidArgument(format!(
                    "Unknown entity '{s}'. Expected one of: {}",
                    known.join(", ")
                ))
            })
    }
}

/// One page of a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Server-side total, when the endpoint is paginated.
    pub total: Option<u64>,
}

/// List endpoints answer either with a paginated envelope or a bare array.
#[derive(Deserialize)]
#[serde(untagged)]
enum ListResponse<T> {
    Paged {
        #[serde(alias = "data", alias = "items")]
        results: Vec<T>,
        #[serde(default, alias = "total")]
        count: Option<u64>,
    },
    Bare(Vec<T>),
}

impl<T> From<ListResponse<T>> for Page<T> {
    fn from(response: ListResponse<T>) -> Self {
        match response {
            ListResponse::Paged { results, count } => Self {
                items: results,
                total: count,
            },
            ListResponse::Bare(items) => Self { items, total: None },
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FieldDefsResponse {
    Wrapped {
        #[serde(alias = "results", alias = "fields")]
        data: Vec<FieldDef>,
    },
    Bare(Vec<FieldDef>),
}

impl ApiClient {
    /// List an entity collection with optional query filters.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body is not a list.
    pub async fn list_entities<T: DeserializeOwned>(
        &self,
        entity: Entity,
        filters: &[(String, String)],
    ) -> Result<Page<T>> {
        let response: ListResponse<T> = self
            .get_json_with_query(&entity.list_path(), filters)
            .await?;
        Ok(response.into())
    }

    /// Fetch one entity.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn get_entity<T: DeserializeOwned>(&self, entity: Entity, id: &str) -> Result<T> {
        self.get_json(&entity.detail_path(id)).await
    }

    /// Create an entity.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn create_entity(&self, entity: Entity, body: &Value) -> Result<Value> {
        self.post_json(&entity.list_path(), body).await
    }

    /// Partially update an entity.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn update_entity(&self, entity: Entity, id: &str, body: &Value) -> Result<Value> {
        self.patch_json(&entity.detail_path(id), body).await
    }

    /// Trigger a workflow action on an entity (validate, cancel, ship…).
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the action is refused.
    pub async fn transition_entity(
        &self,
        entity: Entity,
        id: &str,
        action: &str,
        body: &Value,
    ) -> Result<Value> {
        let valid = |c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_';
        if action.is_empty() || !action.chars().all(valid) {
            return Err(Error::InvalidArgument(format!("Invalid action '{action}'")));
        }
        self.post_json(&entity.transition_path(id, action), body).await
    }

    /// Fetch a partner as a live record for reconciliation.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn get_partner(&self, id: &str) -> Result<LiveRecord> {
        self.get_entity(Entity::Partners, id).await
    }

    /// Send a partial partner update, typically `AppliedResult::to_patch_body()`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn update_partner(&self, id: &str, body: &Value) -> Result<LiveRecord> {
        self.patch_json(&Entity::Partners.detail_path(id), body).await
    }

    /// Custom-field definitions configured for partners.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn partner_custom_fields(&self) -> Result<Vec<FieldDef>> {
        let response: FieldDefsResponse = self.get_json("partners/custom-fields/").await?;
        Ok(match response {
            FieldDefsResponse::Wrapped { data } | FieldDefsResponse::Bare(data) => data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entity_parse() {
        assert_eq!("orders".parse::<Entity>().unwrap(), Entity::Orders);
        assert_eq!("Delivery_Notes".parse::<Entity>().unwrap(), Entity::DeliveryNotes);
        assert_eq!(
            "promotions/boosts".parse::<Entity>().unwrap(),
            Entity::PromotionBoosts
        );
        let err = "invoices".parse::<Entity>().unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn test_paths() {
        assert_eq!(Entity::Orders.list_path(), "orders/");
        assert_eq!(Entity::PromotionFamilies.detail_path("3"), "promotions/families/3/");
        assert_eq!(
            Entity::LoadingNotes.transition_path("8", "validate"),
            "loading-notes/8/validate/"
        );
    }

    #[test]
    fn test_list_response_shapes() {
        let paged: ListResponse<Value> =
            serde_json::from_value(json!({"count": 2, "results": [{"id": 1}, {"id": 2}]}))
                .unwrap();
        let page = Page::from(paged);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total, Some(2));

        let data: ListResponse<Value> =
            serde_json::from_value(json!({"data": [{"id": 1}], "total": 40})).unwrap();
        assert_eq!(Page::from(data).total, Some(40));

        let bare: ListResponse<Value> = serde_json::from_value(json!([{"id": 1}])).unwrap();
        let page = Page::from(bare);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.total, None);
    }

    #[test]
    fn test_field_defs_shapes() {
        let wrapped: FieldDefsResponse =
            serde_json::from_value(json!({"results": [{"key": "partner_rib", "label": "RIB"}]}))
                .unwrap();
        assert!(matches!(wrapped, FieldDefsResponse::Wrapped { ref data } if data.len() == 1));

        let bare: FieldDefsResponse =
            serde_json::from_value(json!([{"key": "zone_code", "name": "Zone"}])).unwrap();
        assert!(matches!(bare, FieldDefsResponse::Bare(ref data) if data[0].label == "Zone"));
    }
}
