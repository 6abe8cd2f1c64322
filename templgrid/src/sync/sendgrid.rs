//! SendGrid v3 dynamic template client
//!
//! This implementation talks to the template endpoints of the SendGrid web API
//! (`/v3/templates`, `/v3/templates/{id}/versions`).

use crate::error::{Result, TemplgridError};
use crate::sync::store::{RemoteTemplateRecord, TemplateStore, VersionId};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const DEFAULT_HOST: &str = "https://api.sendgrid.com";
const PAGE_SIZE: usize = 200;

/// SendGrid template store
pub struct SendGridStore {
    host: String,
    api_key: String,
    client: reqwest::Client,
}

impl SendGridStore {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into().trim_end_matches('/').to_string();
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.host, path)
    }

    async fn fetch(&self, internal_id: &str) -> Result<TemplateDetails> {
        let response = self
            .client
            .get(self.url(&format!("/v3/templates/{}", internal_id)))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let response = expect_status(response, StatusCode::OK).await?;
        Ok(response.json().await?)
    }
}

/// Template listing page
#[derive(Debug, Deserialize)]
struct TemplateList {
    #[serde(default)]
    result: Vec<TemplateSummary>,
    #[serde(rename = "_metadata", default)]
    metadata: Option<ListMetadata>,
}

#[derive(Debug, Deserialize)]
struct ListMetadata {
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TemplateSummary {
    id: String,
    name: String,
}

/// Single template with its versions
#[derive(Debug, Deserialize)]
struct TemplateDetails {
    id: String,
    name: String,
    #[serde(default)]
    versions: Vec<TemplateVersion>,
}

#[derive(Debug, Deserialize)]
struct TemplateVersion {
    id: String,
    #[serde(default)]
    active: u8,
    #[serde(default)]
    subject: String,
    #[serde(default)]
    html_content: String,
    #[serde(default)]
    updated_at: String,
}

#[derive(Debug, Serialize)]
struct CreateTemplateRequest<'a> {
    name: &'a str,
    generation: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreatedResource {
    id: String,
}

#[derive(Debug, Serialize)]
struct CreateVersionRequest<'a> {
    template_id: &'a str,
    active: u8,
    name: String,
    html_content: &'a str,
    subject: &'a str,
    editor: &'a str,
    generate_plain_content: bool,
}

impl From<TemplateDetails> for RemoteTemplateRecord {
    fn from(details: TemplateDetails) -> Self {
        let mut versions = details.versions;
        // `updated_at` is "YYYY-MM-DD HH:MM:SS", so lexical order is chronological
        versions.sort_by(|a, b| a.updated_at.cmp(&b.updated_at));

        let active_version = versions.iter().find(|v| v.active == 1).map(|v| v.id.clone());
        let (subject, html) = versions
            .last()
            .map(|v| (v.subject.clone(), v.html_content.clone()))
            .unwrap_or_default();

        RemoteTemplateRecord {
            name: details.name,
            internal_id: details.id,
            active_version,
            versions: versions.into_iter().map(|v| v.id).collect(),
            subject,
            html,
        }
    }
}

async fn expect_status(response: reqwest::Response, expected: StatusCode) -> Result<reqwest::Response> {
    let status = response.status();
    if status == expected || (expected == StatusCode::OK && status.is_success()) {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    warn!("SendGrid request failed with status {}: {}", status, body);
    Err(TemplgridError::RemoteCall {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl TemplateStore for SendGridStore {
    async fn list(&self) -> Result<Vec<RemoteTemplateRecord>> {
        let mut summaries = Vec::new();
        let mut next = Some(self.url(&format!(
            "/v3/templates?generations=dynamic&page_size={}",
            PAGE_SIZE
        )));

        while let Some(url) = next.take() {
            debug!("SendGrid: listing templates from {}", url);
            let response = self
                .client
                .get(&url)
                .bearer_auth(&self.api_key)
                .send()
                .await?;

            let page: TemplateList = expect_status(response, StatusCode::OK).await?.json().await?;
            let count = page.result.len();
            summaries.extend(page.result);

            next = page
                .metadata
                .and_then(|m| m.next)
                .filter(|n| !n.is_empty() && n != &url && count > 0);
        }

        let mut records = Vec::with_capacity(summaries.len());
        for summary in summaries {
            debug!("SendGrid: fetching template {} ({})", summary.name, summary.id);
            records.push(self.fetch(&summary.id).await?.into());
        }

        Ok(records)
    }

    async fn create(&self, name: &str) -> Result<String> {
        let response = self
            .client
            .post(self.url("/v3/templates"))
            .bearer_auth(&self.api_key)
            .json(&CreateTemplateRequest {
                name,
                generation: "dynamic",
            })
            .send()
            .await?;

        let created: CreatedResource = expect_status(response, StatusCode::CREATED)
            .await?
            .json()
            .await?;

        debug!("SendGrid: created template {} with id {}", name, created.id);
        Ok(created.id)
    }

    async fn create_version(
        &self,
        internal_id: &str,
        subject: &str,
        html: &str,
        activate: bool,
    ) -> Result<VersionId> {
        let request = CreateVersionRequest {
            template_id: internal_id,
            active: u8::from(activate),
            name: chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.f UTC").to_string(),
            html_content: html,
            subject,
            editor: "code",
            generate_plain_content: false,
        };

        let response = self
            .client
            .post(self.url(&format!("/v3/templates/{}/versions", internal_id)))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let created: CreatedResource = expect_status(response, StatusCode::CREATED)
            .await?
            .json()
            .await?;

        Ok(created.id)
    }

    async fn delete(&self, internal_id: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.url(&format!("/v3/templates/{}", internal_id)))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        expect_status(response, StatusCode::NO_CONTENT).await?;
        Ok(())
    }
}
