//! Where dwell-gated view reports are delivered.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use folio_shared::types::Slug;

use crate::error::{ClientError, Result};

/// Counters returned by the server after a view is recorded.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewReceipt {
    pub slug: String,
    pub view_count: i64,
    pub unique_views: i64,
    pub unique: bool,
}

#[async_trait]
pub trait ViewSink: Send + Sync {
    async fn report_view(&self, slug: &Slug, path: &str) -> Result<ViewReceipt>;
}

#[derive(Serialize)]
struct ViewReport<'a> {
    path: &'a str,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Posts view reports to a Folio server.
#[derive(Debug, Clone)]
pub struct HttpViewSink {
    client: reqwest::Client,
    base_url: String,
}

impl HttpViewSink {
    pub fn new(base_url: &str) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn view_url(&self, slug: &Slug) -> String {
        format!("{}/api/views/{}", self.base_url, slug)
    }
}

#[async_trait]
impl ViewSink for HttpViewSink {
    async fn report_view(&self, slug: &Slug, path: &str) -> Result<ViewReceipt> {
        let resp = self
            .client
            .post(self.view_url(slug))
            .json(&ViewReport { path })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = match resp.json::<ErrorBody>().await {
                Ok(body) => body.error,
                Err(_) => status.canonical_reason().unwrap_or("unknown").to_string(),
            };
            return Err(ClientError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let receipt: ViewReceipt = resp.json().await?;
        debug!(slug = %slug, views = receipt.view_count, "View reported");
        Ok(receipt)
    }
}
