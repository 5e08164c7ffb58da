use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Method, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::connection::FirestoreConnection;
use crate::errors::ProbeError;
use crate::models::{decode_fields, encode_fields, fields_to_json, CollectionName, DocumentId, Fields};

const LIST_PAGE_SIZE: u32 = 100;

/// A document as returned by the store
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: DocumentId,
    pub fields: Fields,
    pub create_time: Option<DateTime<Utc>>,
    pub update_time: Option<DateTime<Utc>>,
}

impl StoredDocument {
    pub fn to_json(&self) -> Value {
        fields_to_json(&self.fields)
    }
}

/// The four remote operations the smoke test needs.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Lists top-level collection ids.
    async fn list_collections(&self) -> Result<Vec<String>, ProbeError>;

    /// Inserts a document with a server-generated id.
    async fn add_document(&self, collection: &CollectionName, fields: &Fields) -> Result<StoredDocument, ProbeError>;

    /// Fetches a document; `Ok(None)` when it does not exist.
    async fn get_document(
        &self,
        collection: &CollectionName,
        id: &DocumentId,
    ) -> Result<Option<StoredDocument>, ProbeError>;

    /// Deletes a document that must exist.
    async fn delete_document(&self, collection: &CollectionName, id: &DocumentId) -> Result<(), ProbeError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireDocument {
    name: String,
    #[serde(default)]
    fields: Option<Value>,
    #[serde(default)]
    create_time: Option<DateTime<Utc>>,
    #[serde(default)]
    update_time: Option<DateTime<Utc>>,
}

impl WireDocument {
    fn into_stored(self) -> Result<StoredDocument, ProbeError> {
        let fields = match &self.fields {
            Some(wire) => decode_fields(wire)?,
            None => Fields::new(),
        };
        Ok(StoredDocument {
            id: DocumentId::from_resource_name(&self.name)?,
            fields,
            create_time: self.create_time,
            update_time: self.update_time,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListCollectionIdsResponse {
    #[serde(default)]
    collection_ids: Vec<String>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorEnvelope {
    error: GoogleError,
}

#[derive(Debug, Deserialize)]
struct GoogleError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// Turns a non-success response into a typed error.
async fn error_from_response(response: Response) -> ProbeError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    let message = match serde_json::from_str::<GoogleErrorEnvelope>(&body) {
        Ok(envelope) => match envelope.error.status {
            Some(code) => format!("{} ({})", envelope.error.message, code),
            None => envelope.error.message,
        },
        Err(_) if body.is_empty() => status.canonical_reason().unwrap_or("unknown error").to_string(),
        Err(_) => body,
    };

    ProbeError::from_status(status.as_u16(), message)
}

#[async_trait]
impl DocumentStore for FirestoreConnection {
    async fn list_collections(&self) -> Result<Vec<String>, ProbeError> {
        let url = format!("{}:listCollectionIds", self.documents_url());
        let mut collections = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut body = json!({ "pageSize": LIST_PAGE_SIZE });
            if let Some(token) = &page_token {
                body["pageToken"] = json!(token);
            }

            let response = self.request(Method::POST, &url).json(&body).send().await?;
            if !response.status().is_success() {
                return Err(error_from_response(response).await);
            }

            let page: ListCollectionIdsResponse = response.json().await?;
            debug!("Listed {} collection ids", page.collection_ids.len());
            collections.extend(page.collection_ids);

            match page.next_page_token {
                Some(token) if !token.is_empty() && page_token.as_deref() != Some(token.as_str()) => {
                    page_token = Some(token);
                }
                Some(token) if !token.is_empty() => {
                    warn!("Collection listing returned the same page token twice; stopping");
                    break;
                }
                _ => break,
            }
        }

        Ok(collections)
    }

    async fn add_document(&self, collection: &CollectionName, fields: &Fields) -> Result<StoredDocument, ProbeError> {
        let url = self.url_for_path(&[collection.as_str()]);
        let body = json!({ "fields": encode_fields(fields) });

        let response = self.request(Method::POST, &url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let document: WireDocument = response.json().await?;
        let stored = document.into_stored()?;
        debug!("Created {}/{}", collection, stored.id);
        Ok(stored)
    }

    async fn get_document(
        &self,
        collection: &CollectionName,
        id: &DocumentId,
    ) -> Result<Option<StoredDocument>, ProbeError> {
        let url = self.url_for_path(&[collection.as_str(), id.as_str()]);

        let response = self.request(Method::GET, &url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!("Document {}/{} does not exist", collection, id);
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let document: WireDocument = response.json().await?;
        document.into_stored().map(Some)
    }

    async fn delete_document(&self, collection: &CollectionName, id: &DocumentId) -> Result<(), ProbeError> {
        let url = self.url_for_path(&[collection.as_str(), id.as_str()]);

        // Without the precondition a missing document deletes silently
        let response = self
            .request(Method::DELETE, &url)
            .query(&[("currentDocument.exists", "true")])
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            warn!("Delete target {}/{} no longer exists", collection, id);
            return Err(ProbeError::not_found(collection.as_str(), id.as_str()));
        }
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        Ok(())
    }
}
