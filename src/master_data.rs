//! Read-only reference lists used when creating events.

use anyhow::Result;
use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::http::{ApiClient, ReadOptions, Transport};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventType {
    pub id: u64,
    pub name: String,
}

/// Minimal reference to a parent record embedded in a child.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedRef {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventCategory {
    pub id: u64,
    pub name: String,
    pub event_type_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<NamedRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionMaterialType {
    pub id: u64,
    pub material_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Language {
    pub id: u64,
    pub name: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_on: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_on: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Orator {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SevaType {
    pub id: u64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_on: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_on: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSubCategory {
    pub id: u64,
    pub name: String,
    pub event_category_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_category: Option<EventCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_on: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_on: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    pub id: u64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_on: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_on: Option<String>,
}

/// Source of event master data.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MasterData: Send + Sync {
    async fn event_types(&self) -> Result<Vec<EventType>>;
    async fn event_categories(&self) -> Result<Vec<EventCategory>>;
    async fn promotion_material_types(&self) -> Result<Vec<PromotionMaterialType>>;
    async fn languages(&self) -> Result<Vec<Language>>;
    async fn orators(&self) -> Result<Vec<Orator>>;
    async fn seva_types(&self) -> Result<Vec<SevaType>>;

    /// All sub-categories, or only those of `category_id`.
    async fn event_sub_categories(&self, category_id: Option<u64>) -> Result<Vec<EventSubCategory>>;

    async fn themes(&self) -> Result<Vec<Theme>>;
}

/// [`MasterData`] served by the admin API.
pub struct ApiMasterData<T: Transport> {
    client: ApiClient<T>,
}

impl<T: Transport> ApiMasterData<T> {
    pub fn new(client: ApiClient<T>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<T: Transport> MasterData for ApiMasterData<T> {
    async fn event_types(&self) -> Result<Vec<EventType>> {
        self.client.get_json("event-types", ReadOptions::default()).await
    }

    async fn event_categories(&self) -> Result<Vec<EventCategory>> {
        self.client
            .get_json("event-categories", ReadOptions::default())
            .await
    }

    async fn promotion_material_types(&self) -> Result<Vec<PromotionMaterialType>> {
        self.client
            .get_json("promotion-material-types", ReadOptions::default())
            .await
    }

    async fn languages(&self) -> Result<Vec<Language>> {
        self.client.get_json("languages", ReadOptions::default()).await
    }

    async fn orators(&self) -> Result<Vec<Orator>> {
        self.client.get_json("orators", ReadOptions::default()).await
    }

    async fn seva_types(&self) -> Result<Vec<SevaType>> {
        self.client.get_json("seva-types", ReadOptions::default()).await
    }

    #[tracing::instrument(skip(self))]
    async fn event_sub_categories(&self, category_id: Option<u64>) -> Result<Vec<EventSubCategory>> {
        match category_id {
            Some(id) => {
                debug!("Fetching sub-categories of category {}...", id);
                self.client
                    .get_json(
                        "event-sub-categories/by-category",
                        ReadOptions::default().query("category_id", id.to_string()),
                    )
                    .await
            }
            None => {
                self.client
                    .get_json("event-sub-categories", ReadOptions::default())
                    .await
            }
        }
    }

    async fn themes(&self) -> Result<Vec<Theme>> {
        self.client.get_json("themes", ReadOptions::default()).await
    }
}
