//! Build event payloads exchanged with the CI service

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status reported by the CI service for a build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BuildStatus {
    SentToBuilder,
    Started,
    Queued,
    Success,
    Canceled,
    /// Any status this relay does not act on, with the raw value kept for logging
    Unknown(String),
}

impl Default for BuildStatus {
    fn default() -> Self {
        BuildStatus::Unknown(String::new())
    }
}

impl From<String> for BuildStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "sentToBuilder" => BuildStatus::SentToBuilder,
            "started" => BuildStatus::Started,
            "queued" => BuildStatus::Queued,
            "success" => BuildStatus::Success,
            "canceled" => BuildStatus::Canceled,
            _ => BuildStatus::Unknown(raw),
        }
    }
}

impl From<BuildStatus> for String {
    fn from(status: BuildStatus) -> Self {
        status.to_string()
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildStatus::SentToBuilder => f.write_str("sentToBuilder"),
            BuildStatus::Started => f.write_str("started"),
            BuildStatus::Queued => f.write_str("queued"),
            BuildStatus::Success => f.write_str("success"),
            BuildStatus::Canceled => f.write_str("canceled"),
            BuildStatus::Unknown(raw) => f.write_str(raw),
        }
    }
}

/// A named operation exposed by the CI API
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Link {
    #[serde(default)]
    pub href: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

impl Link {
    pub fn is_usable(&self) -> bool {
        !self.href.trim().is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Links {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_self: Option<Link>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_primary: Option<Link>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_share: Option<Link>,
}

/// Returns the link only when it carries a non-empty href.
pub fn usable(link: &Option<Link>) -> Option<&Link> {
    link.as_ref().filter(|l| l.is_usable())
}

/// Webhook payload, and the richer detail document returned by the CI API
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildEvent {
    #[serde(default)]
    pub project_name: String,
    #[serde(default)]
    pub build_target_name: String,
    #[serde(default)]
    pub started_by: Option<String>,
    #[serde(default)]
    pub build_status: BuildStatus,
    #[serde(default)]
    pub links: Links,

    pub build: Option<u64>,
    #[serde(rename = "buildtargetid")]
    pub build_target_id: Option<String>,
    pub platform: Option<String>,
    pub finished: Option<String>,
    pub project_id: Option<String>,
    pub project_version: Option<String>,
    pub created: Option<String>,
    pub cooldown_date: Option<String>,
    pub checkout_start_time: Option<String>,
}

/// Body forwarded to the notification endpoint once a share link exists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareLinkRequest {
    pub build: Option<u64>,
    pub buildtargetid: Option<String>,
    #[serde(rename = "buildTargetName")]
    pub build_target_name: String,
    pub platform: Option<String>,
    pub finished: Option<String>,
    #[serde(rename = "projectName")]
    pub project_name: String,
    #[serde(rename = "projectId")]
    pub project_id: Option<String>,
    #[serde(rename = "projectVersion")]
    pub project_version: Option<String>,
    #[serde(rename = "shareUrl")]
    pub share_url: String,
}

impl ShareLinkRequest {
    pub fn from_event(event: &BuildEvent, share_url: impl Into<String>) -> Self {
        Self {
            build: event.build,
            buildtargetid: event.build_target_id.clone(),
            build_target_name: event.build_target_name.clone(),
            platform: event.platform.clone(),
            finished: event.finished.clone(),
            project_name: event.project_name.clone(),
            project_id: event.project_id.clone(),
            project_version: event.project_version.clone(),
            share_url: share_url.into(),
        }
    }
}

/// Response of the CI share-link endpoint
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ShareLinkResult {
    pub shareid: String,
}
