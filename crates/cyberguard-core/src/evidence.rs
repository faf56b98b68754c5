//! Evidence preprocessing: image attachments become text for categorization.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::models::Attachment;
use crate::traits::{Blob, DescribeImage, GenerativeModel};

/// Fixed instruction sent with every image.
pub const IMAGE_PROMPT: &str =
    "Analyze this image and describe its content relevant to a cybercrime complaint.";

/// Description used when the vision oracle gives nothing back.
pub const NO_CONTENT_DESCRIPTION: &str = "No significant content detected in the image.";

/// [`DescribeImage`] implementation backed by a [`GenerativeModel`].
pub struct OracleImageDescriber {
    model: Arc<dyn GenerativeModel>,
}

impl OracleImageDescriber {
    pub fn new(model: Arc<dyn GenerativeModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl DescribeImage for OracleImageDescriber {
    async fn describe_image(&self, bytes: &[u8], media_type: &str) -> String {
        let blob = Blob {
            media_type,
            data: bytes,
        };
        match self.model.generate(IMAGE_PROMPT, Some(blob)).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => NO_CONTENT_DESCRIPTION.to_string(),
            Err(e) => {
                warn!(error = %e, "image description failed");
                NO_CONTENT_DESCRIPTION.to_string()
            }
        }
    }
}

/// Folds image attachments into `"<filename>: <description>"` strings.
///
/// Non-image attachments are kept with the complaint but not described.
/// Attachments whose content cannot be decoded are skipped.
#[derive(Clone)]
pub struct EvidencePreprocessor {
    describer: Arc<dyn DescribeImage>,
}

impl EvidencePreprocessor {
    pub fn new(describer: Arc<dyn DescribeImage>) -> Self {
        Self { describer }
    }

    pub async fn describe(&self, attachments: &[Attachment]) -> Vec<String> {
        let mut descriptions = Vec::new();
        for attachment in attachments {
            if !attachment.is_image() {
                debug!(name = %attachment.name, "non-image evidence passed through");
                continue;
            }
            let bytes = match attachment.decode() {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(name = %attachment.name, error = %e, "could not decode evidence image");
                    continue;
                }
            };
            let description = self
                .describer
                .describe_image(&bytes, attachment.image_media_type())
                .await;
            descriptions.push(format!("{}: {}", attachment.name, description));
        }
        descriptions
    }
}
