//! Authenticated client for the CI build API

use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use tracing::{debug, info};

use crate::config::CiConfig;
use crate::error::{RelayError, Result};
use crate::event::{BuildEvent, Link, ShareLinkResult};
use crate::utils::join_url;

/// Operations the pipeline needs from the CI service
#[async_trait]
pub trait BuildService: Send + Sync {
    /// Fetch the full build document behind an `api_self` href.
    async fn fetch_build(&self, href: &str) -> Result<BuildEvent>;

    /// Ask the CI service to create a public share link for a build.
    async fn create_share(&self, link: &Link) -> Result<ShareLinkResult>;
}

#[derive(Clone)]
pub struct CiClient {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
}

impl CiClient {
    pub fn new(client: reqwest::Client, config: &CiConfig) -> Self {
        Self {
            client,
            api_base: config.api_base.clone(),
            api_key: config.api_key.clone(),
        }
    }

    fn authorization(&self) -> String {
        format!("Basic {}", self.api_key)
    }
}

#[async_trait]
impl BuildService for CiClient {
    async fn fetch_build(&self, href: &str) -> Result<BuildEvent> {
        let url = join_url(&self.api_base, href);
        debug!("Fetching build details from {}", url);

        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, self.authorization())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| RelayError::UpstreamFetch(format!("GET {}: {}", url, e)))?;

        response
            .json::<BuildEvent>()
            .await
            .map_err(|e| RelayError::UpstreamFetch(format!("Invalid build document from {}: {}", url, e)))
    }

    async fn create_share(&self, link: &Link) -> Result<ShareLinkResult> {
        let raw_method = link.method.as_deref().unwrap_or("POST").to_uppercase();
        let method = Method::from_bytes(raw_method.as_bytes()).map_err(|_| {
            RelayError::ShareLink(format!("Unsupported share link method '{}'", raw_method))
        })?;
        let url = join_url(&self.api_base, &link.href);
        info!("createShareLink: started {} {}", method, url);

        let response = self
            .client
            .request(method, &url)
            .header(AUTHORIZATION, self.authorization())
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| RelayError::ShareLink(format!("{}: {}", url, e)))?;

        let result = response
            .json::<ShareLinkResult>()
            .await
            .map_err(|e| RelayError::ShareLink(format!("Invalid share response from {}: {}", url, e)))?;

        info!("createShareLink: finished");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::BuildStatus;
    use crate::utils::build_http_client;
    use std::time::Duration;

    fn client(base: String) -> CiClient {
        CiClient::new(
            build_http_client(Duration::from_secs(5)).unwrap(),
            &CiConfig {
                api_base: base,
                api_key: "ci-key".into(),
                share_link_base: "https://share.example/".into(),
            },
        )
    }

    #[tokio::test]
    async fn fetch_build_sends_basic_auth() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/builds/42")
            .match_header("authorization", "Basic ci-key")
            .with_status(200)
            .with_body(r#"{"buildStatus":"queued","created":"t0","cooldownDate":"t1"}"#)
            .create_async()
            .await;

        let event = client(format!("{}/", server.url()))
            .fetch_build("/api/v1/builds/42")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(event.build_status, BuildStatus::Queued);
        assert_eq!(event.cooldown_date.as_deref(), Some("t1"));
    }

    #[tokio::test]
    async fn fetch_build_maps_http_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/builds/42")
            .with_status(401)
            .create_async()
            .await;

        let err = client(server.url())
            .fetch_build("/api/v1/builds/42")
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::UpstreamFetch(_)));
    }

    #[tokio::test]
    async fn create_share_uses_link_method() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/builds/42/share")
            .match_header("authorization", "Basic ci-key")
            .match_header("content-type", "application/json")
            .with_status(201)
            .with_body(r#"{"shareid":"abc123"}"#)
            .create_async()
            .await;

        let result = client(server.url())
            .create_share(&Link {
                href: "/api/v1/builds/42/share".into(),
                method: Some("post".into()),
            })
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(result.shareid, "abc123");
    }

    #[tokio::test]
    async fn create_share_failure_is_share_link_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/share")
            .with_status(500)
            .create_async()
            .await;

        let err = client(server.url())
            .create_share(&Link {
                href: "/share".into(),
                method: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::ShareLink(_)));
    }
}
