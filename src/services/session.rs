// src/services/session.rs

//! Authenticated portal session capability.
//!
//! Session establishment (the login handshake) is an external collaborator's
//! responsibility: callers construct a [`PortalSession`] from an already
//! obtained session cookie. Components consume the capability through the
//! [`Session`] trait so tests can substitute fake sessions.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, COOKIE};
use tokio::io::AsyncWriteExt;

use crate::error::Result;
use crate::models::PortalConfig;

/// Response of a portal page request, after redirects.
#[derive(Debug, Clone)]
pub struct PageResponse {
    /// HTTP status code
    pub status: u16,

    /// Final URL after redirect following
    pub final_url: String,

    /// Response body as text
    pub body: String,
}

/// Capability to perform authenticated HTTP requests against the portal.
#[async_trait]
pub trait Session: Send + Sync {
    /// GET a page, following redirects.
    async fn get(&self, url: &str) -> Result<PageResponse>;

    /// POST a form, following redirects.
    async fn post_form(&self, url: &str, fields: &BTreeMap<String, String>)
        -> Result<PageResponse>;

    /// Stream a file to `dest`, returning the number of bytes written.
    async fn download_to(&self, url: &str, dest: &Path) -> Result<u64>;
}

/// Portal session backed by a reqwest client with a cookie store.
pub struct PortalSession {
    client: reqwest::Client,
}

impl PortalSession {
    /// Build a session from an externally obtained cookie header value.
    pub fn with_cookie(config: &PortalConfig, cookie: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("pt-BR,pt;q=0.9,en;q=0.8"),
        );
        if let Ok(value) = HeaderValue::from_str(cookie) {
            headers.insert(COOKIE, value);
        }

        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .cookie_store(true)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Session for PortalSession {
    async fn get(&self, url: &str) -> Result<PageResponse> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let body = response.text().await?;

        Ok(PageResponse {
            status,
            final_url,
            body,
        })
    }

    async fn post_form(
        &self,
        url: &str,
        fields: &BTreeMap<String, String>,
    ) -> Result<PageResponse> {
        let response = self
            .client
            .post(url)
            .form(fields)
            .send()
            .await?
            .error_for_status()?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let body = response.text().await?;

        Ok(PageResponse {
            status,
            final_url,
            body,
        })
    }

    async fn download_to(&self, url: &str, dest: &Path) -> Result<u64> {
        let mut response = self.client.get(url).send().await?.error_for_status()?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut written: u64 = 0;
        let mut last_logged_mb: u64 = 0;

        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;

            let mb = written / (1024 * 1024);
            if mb > last_logged_mb {
                log::info!("Download progress: {} MB", mb);
                last_logged_mb = mb;
            }
        }

        file.flush().await?;
        Ok(written)
    }
}
