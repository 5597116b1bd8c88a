//! Typed site resources and their CRUD wrappers
//!
//! Thin layer over `ApiClient::request`: each wrapper picks the path and
//! method and decodes `data` into a model. The models keep fields they do
//! not know about in `extra`, so an update round-trips whatever the backend
//! sent.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use studio_auth::{CONTACT_INFO_PATH, Envelope, MESSAGES_PATH, PROJECTS_PATH, SERVICES_PATH};

use crate::client::ApiClient;
use crate::error::Result;
use crate::request::ApiRequest;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    #[serde(
        default,
        alias = "_id",
        deserialize_with = "resource_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(
        default,
        alias = "_id",
        deserialize_with = "resource_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub technologies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Inbound contact-form submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(
        default,
        alias = "_id",
        deserialize_with = "resource_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Result of `POST /api/upload/image`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedImage {
    pub filename: String,
    pub url: String,
}

/// Backends disagree on whether ids are numbers or strings; keep them as text.
fn resource_id<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }

    Ok(Option::<Id>::deserialize(deserializer)?.map(|id| match id {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    }))
}

/// Ids are caller input; encoded so they stay a single path segment.
fn item_path(collection: &str, id: &str) -> String {
    format!("{collection}/{}", urlencoding::encode(id))
}

impl ApiClient {
    /// Public contact details. Sent without a bearer.
    pub async fn contact_info(&self) -> Result<Envelope<ContactInfo>> {
        self.request(ApiRequest::get(CONTACT_INFO_PATH)).await
    }

    pub async fn update_contact_info(&self, info: &ContactInfo) -> Result<Envelope<ContactInfo>> {
        self.request(ApiRequest::put(CONTACT_INFO_PATH).json(info)?)
            .await
    }

    pub async fn services(&self) -> Result<Envelope<Vec<Service>>> {
        self.request(ApiRequest::get(SERVICES_PATH)).await
    }

    pub async fn service(&self, id: &str) -> Result<Envelope<Service>> {
        self.request(ApiRequest::get(item_path(SERVICES_PATH, id)))
            .await
    }

    pub async fn create_service(&self, service: &Service) -> Result<Envelope<Service>> {
        self.request(ApiRequest::post(SERVICES_PATH).json(service)?)
            .await
    }

    pub async fn update_service(&self, id: &str, service: &Service) -> Result<Envelope<Service>> {
        self.request(ApiRequest::put(item_path(SERVICES_PATH, id)).json(service)?)
            .await
    }

    pub async fn delete_service(&self, id: &str) -> Result<Envelope<Value>> {
        self.request(ApiRequest::delete(item_path(SERVICES_PATH, id)))
            .await
    }

    pub async fn projects(&self) -> Result<Envelope<Vec<Project>>> {
        self.request(ApiRequest::get(PROJECTS_PATH)).await
    }

    pub async fn project(&self, id: &str) -> Result<Envelope<Project>> {
        self.request(ApiRequest::get(item_path(PROJECTS_PATH, id)))
            .await
    }

    pub async fn create_project(&self, project: &Project) -> Result<Envelope<Project>> {
        self.request(ApiRequest::post(PROJECTS_PATH).json(project)?)
            .await
    }

    pub async fn update_project(&self, id: &str, project: &Project) -> Result<Envelope<Project>> {
        self.request(ApiRequest::put(item_path(PROJECTS_PATH, id)).json(project)?)
            .await
    }

    pub async fn delete_project(&self, id: &str) -> Result<Envelope<Value>> {
        self.request(ApiRequest::delete(item_path(PROJECTS_PATH, id)))
            .await
    }

    pub async fn messages(&self) -> Result<Envelope<Vec<Message>>> {
        self.request(ApiRequest::get(MESSAGES_PATH)).await
    }

    pub async fn message(&self, id: &str) -> Result<Envelope<Message>> {
        self.request(ApiRequest::get(item_path(MESSAGES_PATH, id)))
            .await
    }

    pub async fn delete_message(&self, id: &str) -> Result<Envelope<Value>> {
        self.request(ApiRequest::delete(item_path(MESSAGES_PATH, id)))
            .await
    }

    pub async fn mark_message_read(&self, id: &str) -> Result<Envelope<Message>> {
        let path = format!("{}/read", item_path(MESSAGES_PATH, id));
        self.request(ApiRequest::patch(path)).await
    }
}
