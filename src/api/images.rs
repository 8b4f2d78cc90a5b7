use super::{ApiClient, GenerationStatus};
use crate::completion::JobState;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub id: String,
    pub status: GenerationStatus,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub brand_id: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobState for Image {
    fn is_complete(&self) -> bool {
        self.status == GenerationStatus::Completed
    }

    fn is_failed(&self) -> bool {
        self.status == GenerationStatus::Failed
    }

    fn failure_reason(&self) -> Option<String> {
        self.error.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateImage {
    pub text: String,
    pub brand: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl ApiClient {
    pub async fn create_image(&self, request: &CreateImage) -> Result<Image> {
        self.post("/images", request).await
    }

    pub async fn get_image(&self, id: &str) -> Result<Image> {
        self.get(&format!("/images/{id}")).await
    }
}
