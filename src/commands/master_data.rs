use anyhow::Result;
use log::warn;
use serde_json::Value;

use crate::{
    config::Config,
    master_data::{ApiMasterData, MasterData},
    runtime::Runtime,
};

/// Master-data lists available from the admin API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum MasterDataKind {
    EventTypes,
    EventCategories,
    PromotionMaterialTypes,
    Languages,
    Orators,
    SevaTypes,
    EventSubCategories,
    Themes,
}

#[tracing::instrument(skip(runtime, api_url))]
pub async fn master_data<R: Runtime>(
    runtime: R,
    api_url: Option<String>,
    kind: MasterDataKind,
    category_id: Option<u64>,
) -> Result<Value> {
    let config = Config::new(runtime, api_url, None)?;
    fetch_master_data(&ApiMasterData::new(config.api), kind, category_id).await
}

/// Fetch one master-data list as JSON.
pub async fn fetch_master_data<M: MasterData>(
    source: &M,
    kind: MasterDataKind,
    category_id: Option<u64>,
) -> Result<Value> {
    if category_id.is_some() && kind != MasterDataKind::EventSubCategories {
        warn!("--category-id only applies to event-sub-categories, ignoring it");
    }

    let value = match kind {
        MasterDataKind::EventTypes => serde_json::to_value(source.event_types().await?)?,
        MasterDataKind::EventCategories => serde_json::to_value(source.event_categories().await?)?,
        MasterDataKind::PromotionMaterialTypes => {
            serde_json::to_value(source.promotion_material_types().await?)?
        }
        MasterDataKind::Languages => serde_json::to_value(source.languages().await?)?,
        MasterDataKind::Orators => serde_json::to_value(source.orators().await?)?,
        MasterDataKind::SevaTypes => serde_json::to_value(source.seva_types().await?)?,
        MasterDataKind::EventSubCategories => {
            serde_json::to_value(source.event_sub_categories(category_id).await?)?
        }
        MasterDataKind::Themes => serde_json::to_value(source.themes().await?)?,
    };
    Ok(value)
}
