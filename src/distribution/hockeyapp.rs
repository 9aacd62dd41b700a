//! HockeyApp-style multipart upload channel

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use tracing::info;

use super::{DistributionChannel, UploadReceipt};
use crate::config::ReleaseSettings;
use crate::error::{RelayError, Result};
use crate::storage::ArtifactReader;
use crate::utils::megabytes;

pub const CHANNEL_NAME: &str = "hockeyapp";

// HockeyApp release status: 1 = testers cannot download, 2 = available for download
const STATUS_HIDDEN: u8 = 1;
const STATUS_AVAILABLE: u8 = 2;

pub struct HockeyAppChannel {
    client: reqwest::Client,
    upload_url: String,
    api_token: String,
}

impl HockeyAppChannel {
    pub fn new(client: reqwest::Client, upload_url: String, api_token: String) -> Self {
        Self {
            client,
            upload_url,
            api_token,
        }
    }

    fn form(artifact: ArtifactReader, release: &ReleaseSettings) -> Form {
        let status = if release.visible {
            STATUS_AVAILABLE
        } else {
            STATUS_HIDDEN
        };
        let filename = artifact.filename.clone();
        let length = artifact.length;
        let body = reqwest::Body::wrap_stream(artifact.into_stream());

        Form::new()
            .text("status", status.to_string())
            .text("notes", release.notes.clone())
            .text("notes_type", release.notes_type.to_string())
            .text("notify", u8::from(release.notify_testers).to_string())
            .part(
                "ipa",
                Part::stream_with_length(body, length).file_name(filename),
            )
    }
}

#[async_trait]
impl DistributionChannel for HockeyAppChannel {
    fn name(&self) -> &str {
        CHANNEL_NAME
    }

    async fn upload(
        &self,
        artifact: ArtifactReader,
        release: &ReleaseSettings,
    ) -> Result<UploadReceipt> {
        info!(
            "Uploading {} to HockeyApp ({:.2} mb)",
            artifact.filename,
            megabytes(artifact.length)
        );

        let response = self
            .client
            .post(&self.upload_url)
            .header("Accept", "application/json")
            .header("X-HockeyAppToken", &self.api_token)
            .multipart(Self::form(artifact, release))
            .send()
            .await
            .map_err(|e| RelayError::Transfer(format!("HockeyApp upload failed: {}", e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| RelayError::Transfer(format!("Reading HockeyApp response failed: {}", e)))?;

        if status != 200 && status != 201 {
            return Err(RelayError::DistributionRejected {
                channel: CHANNEL_NAME.to_string(),
                status,
                body,
            });
        }

        Ok(UploadReceipt { status, body })
    }
}
