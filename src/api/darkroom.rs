use crate::completion::JobState;
use crate::config::Profile;
use crate::errors::Error;
use crate::logging::*;
use anyhow::{Context, Result};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

const UNREACHABLE_HINT: &str =
    "Ensure the darkroom instance is running and darkroom-api service is active";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuInfo {
    pub name: String,
    pub memory_used: f64,
    pub memory_total: f64,
    pub utilization: f64,
    pub temperature: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskUsage {
    pub used: String,
    pub total: String,
    pub percent: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disks {
    pub root: DiskUsage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comfyui: Option<DiskUsage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
    pub gpu: GpuInfo,
    pub disk: Disks,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    pub persona: String,
    pub path: String,
    pub image_count: u32,
    pub caption_count: u32,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainRequest {
    pub persona_slug: String,
    pub trigger_word: String,
    pub lora_name: String,
    pub steps: u32,
    pub lora_rank: u32,
    pub learning_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainResponse {
    pub job_id: String,
    pub image_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrainState {
    Running,
    Completed,
    Failed,
    #[serde(other)]
    Unknown,
}

impl TrainState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TrainState::Completed | TrainState::Failed)
    }
}

impl fmt::Display for TrainState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TrainState::Running => "running",
            TrainState::Completed => "completed",
            TrainState::Failed => "failed",
            TrainState::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainStatus {
    pub job_id: String,
    pub status: TrainState,
    /// `training`, `postprocessing`, `uploading`, `completed` or `failed`.
    pub stage: String,
    /// Percent, 0 to 100.
    pub progress: f64,
    pub started_at: String,
    #[serde(default)]
    pub completed_at: Option<String>,
    pub persona_slug: String,
    pub lora_name: String,
    pub image_count: u32,
    #[serde(default)]
    pub error: Option<String>,
}

impl JobState for TrainStatus {
    fn is_complete(&self) -> bool {
        self.status == TrainState::Completed
    }

    fn is_failed(&self) -> bool {
        self.status == TrainState::Failed
    }

    fn failure_reason(&self) -> Option<String> {
        Some(format!(
            "Training failed: {}",
            self.error.as_deref().unwrap_or("Unknown error")
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptionRequest {
    pub persona_slug: String,
    pub trigger_word: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptionResponse {
    pub status: String,
    #[serde(default)]
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoraInfo {
    pub name: String,
    pub filename: String,
    pub size_mb: f64,
    pub modified: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loras {
    pub loras: Vec<LoraInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetUpload {
    pub persona: String,
    pub path: String,
    pub uploaded_count: u32,
    #[serde(default)]
    pub files: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetDeleted {
    pub persona: String,
    pub deleted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ComfyAction {
    Start,
    Stop,
    Restart,
    Status,
}

impl ComfyAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComfyAction::Start => "start",
            ComfyAction::Stop => "stop",
            ComfyAction::Restart => "restart",
            ComfyAction::Status => "status",
        }
    }
}

impl fmt::Display for ComfyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComfyActionResult {
    pub action: String,
    pub returncode: i32,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
}

/// Training steps for a dataset of `image_count` images.
pub fn auto_steps(image_count: u32) -> u32 {
    match image_count {
        0..=9 => 1000,
        10..=14 => 1500,
        15..=24 => 2000,
        _ => 3000,
    }
}

/// Client of the darkroom host. Plain JSON, no envelope, no auth.
#[derive(Debug, Clone)]
pub struct DarkroomClient {
    client: Client,
    base_url: String,
}

impl DarkroomClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }

    pub fn for_profile(profile: &Profile) -> Self {
        Self::new(profile.darkroom_url())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn health(&self) -> Result<Health> {
        self.request(Method::GET, "/health", None::<&()>).await
    }

    pub async fn dataset(&self, persona: &str) -> Result<Dataset> {
        self.request(Method::GET, &format!("/datasets/{persona}"), None::<&()>)
            .await
    }

    pub async fn start_training(&self, request: &TrainRequest) -> Result<TrainResponse> {
        self.request(Method::POST, "/train", Some(request)).await
    }

    pub async fn training_status(&self, job_id: &str) -> Result<TrainStatus> {
        self.request(Method::GET, &format!("/train/{job_id}"), None::<&()>)
            .await
    }

    pub async fn caption(&self, request: &CaptionRequest) -> Result<CaptionResponse> {
        self.request(Method::POST, "/caption", Some(request)).await
    }

    pub async fn loras(&self) -> Result<Loras> {
        self.request(Method::GET, "/loras", None::<&()>).await
    }

    pub async fn comfy(&self, action: ComfyAction) -> Result<ComfyActionResult> {
        self.request(Method::POST, &format!("/comfyui/{action}"), None::<&()>)
            .await
    }

    /// Sends `files` as one multipart form, each under the `files` field.
    pub async fn upload_dataset(&self, persona: &str, files: &[PathBuf]) -> Result<DatasetUpload> {
        let mut form = Form::new();
        for path in files {
            let content = tokio::fs::read(path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            let name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            form = form.part("files", Part::bytes(content).file_name(name));
        }
        let path = format!("/datasets/{persona}/upload");
        let request = self
            .client
            .post(format!("{}{path}", self.base_url))
            .multipart(form);
        let body = self.execute(&Method::POST, &path, request).await?;
        parse(&Method::POST, &path, &body)
    }

    /// The dataset as a gzipped tarball.
    pub async fn download_dataset(&self, persona: &str) -> Result<Vec<u8>> {
        let path = format!("/datasets/{persona}/download");
        let request = self.client.get(format!("{}{path}", self.base_url));
        self.execute(&Method::GET, &path, request).await
    }

    pub async fn delete_dataset(&self, persona: &str) -> Result<DatasetDeleted> {
        self.request(Method::DELETE, &format!("/datasets/{persona}"), None::<&()>)
            .await
    }

    async fn request<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T> {
        let mut request = self
            .client
            .request(method.clone(), format!("{}{path}", self.base_url));
        if let Some(body) = body {
            request = request.json(body);
        }
        let body = self.execute(&method, path, request).await?;
        parse(&method, path, &body)
    }

    /// Sends the request and returns the raw body of a 2xx response.
    async fn execute(
        &self,
        method: &Method,
        path: &str,
        request: RequestBuilder,
    ) -> Result<Vec<u8>> {
        let log = DEFAULT.new(o!(
            "function" => "DarkroomClient::execute",
            "method" => method.to_string(),
            "path" => path.to_owned(),
        ));
        let cannot_reach = |err: reqwest::Error| Error::Darkroom {
            message: format!("Cannot reach Darkroom API at {}: {err}", self.base_url),
            suggestion: Some(UNREACHABLE_HINT.to_owned()),
        };
        let response = request.send().await.map_err(cannot_reach)?;
        let status = response.status();
        debug!(log, "response"; "status" => status.as_u16());

        let body = response.bytes().await.map_err(cannot_reach)?;
        if !status.is_success() {
            return Err(Error::darkroom(format!(
                "Darkroom API {method} {path} failed: {} {}",
                status.as_u16(),
                String::from_utf8_lossy(&body)
            ))
            .into());
        }
        Ok(body.to_vec())
    }
}

/// An empty body reads as JSON `null`.
fn parse<T: DeserializeOwned>(method: &Method, path: &str, body: &[u8]) -> Result<T> {
    let body = if body.iter().all(u8::is_ascii_whitespace) {
        b"null".as_slice()
    } else {
        body
    };
    serde_json::from_slice(body).map_err(|err| {
        Error::darkroom(format!("Darkroom API {method} {path} returned invalid JSON: {err}")).into()
    })
}
