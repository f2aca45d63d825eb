//! Notion-backed gateway.
//!
//! The database is a Notion "pages" database with typed columns; each row is
//! created as a page whose properties are mapped by column type.

use std::collections::HashMap;

use async_trait::async_trait;
use cashback_core::{Row, RowField};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{debug, info};

use crate::gateway::validate;
use crate::{Gateway, RowId, StoreError};

const NOTION_API: &str = "https://api.notion.com";
const NOTION_VERSION: &str = "2022-06-28";

/// Gateway over a single Notion database.
pub struct NotionStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    db_id: String,
}

#[derive(Deserialize)]
struct Database {
    properties: HashMap<String, Property>,
}

#[derive(Deserialize)]
struct Property {
    multi_select: Option<SelectSchema>,
}

#[derive(Deserialize)]
struct SelectSchema {
    options: Vec<SelectOption>,
}

#[derive(Deserialize)]
struct SelectOption {
    name: String,
}

#[derive(Deserialize)]
struct CreatedPage {
    id: String,
}

impl NotionStore {
    /// Create a store for `db_id` authenticated with an integration token.
    pub fn new(api_key: String, db_id: String) -> Self {
        Self::with_base_url(NOTION_API.to_string(), api_key, db_id)
    }

    /// Create a store against a non-default API host (no trailing slash needed).
    pub fn with_base_url(base_url: String, api_key: String, db_id: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            db_id,
        }
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response, StoreError> {
        let resp = req
            .bearer_auth(&self.api_key)
            .header("Notion-Version", NOTION_VERSION)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StoreError::Server {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }
}

#[async_trait]
impl Gateway for NotionStore {
    async fn list_categories(&self) -> Result<Vec<String>, StoreError> {
        let url = format!("{}/v1/databases/{}", self.base_url, self.db_id);
        debug!(url = %url, "retrieving database schema");
        let resp = self.send(self.client.get(&url)).await?;
        let db: Database = serde_json::from_str(&resp.text().await?)?;
        let categories = category_names(db)?;
        info!(count = categories.len(), "loaded category vocabulary");
        Ok(categories)
    }

    async fn write_row(&self, row: &Row) -> Result<RowId, StoreError> {
        validate(row)?;

        let url = format!("{}/v1/pages", self.base_url);
        let body = json!({
            "parent": { "database_id": self.db_id },
            "properties": page_properties(row),
        });
        let resp = self.send(self.client.post(&url).json(&body)).await?;
        let page: CreatedPage = serde_json::from_str(&resp.text().await?)?;
        info!(page_id = %page.id, category = row.category.as_deref().unwrap_or(""), "row written");
        Ok(RowId(page.id))
    }
}

fn category_names(db: Database) -> Result<Vec<String>, StoreError> {
    let name = RowField::Category.as_str();
    let schema = db
        .properties
        .get(name)
        .and_then(|p| p.multi_select.as_ref())
        .ok_or_else(|| StoreError::MissingProperty(name.to_string()))?;
    Ok(schema.options.iter().map(|o| o.name.clone()).collect())
}

/// Map a row onto Notion property values, one entry per column.
///
/// Empty fields, including required ones the model sent as null, are written
/// as explicit nulls or empty selections.
pub(crate) fn page_properties(row: &Row) -> Map<String, Value> {
    let mut props = Map::new();

    let category = match non_blank(&row.category) {
        Some(name) => json!({ "multi_select": [{ "name": name }] }),
        None => json!({ "multi_select": [] }),
    };
    props.insert(RowField::Category.to_string(), category);

    props.insert(RowField::Percent.to_string(), json!({ "number": row.percent }));
    props.insert(RowField::Limit.to_string(), json!({ "number": row.limit }));

    for (field, value) in [(RowField::Bank, &row.bank), (RowField::Person, &row.person)] {
        let select = non_blank(value).map(|name| json!({ "name": name }));
        props.insert(field.to_string(), json!({ "select": select }));
    }

    let date = non_blank(&row.date).map(|start| json!({ "start": start }));
    props.insert(RowField::Date.to_string(), json!({ "date": date }));

    let info = non_blank(&row.info).unwrap_or("");
    props.insert(
        RowField::Info.to_string(),
        json!({ "title": [{ "text": { "content": info } }] }),
    );

    props
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.trim().is_empty())
}
