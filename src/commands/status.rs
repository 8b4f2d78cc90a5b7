use super::Session;
use crate::api::images::Image;
use crate::api::videos::Video;
use crate::api::{ApiClient, GenerationStatus};
use crate::errors::Error;
use crate::ui::{self, print_json, print_label};
use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Parser, ValueEnum};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Image,
    Video,
}

#[derive(Parser)]
#[clap(about = "Check the status of a generation job")]
pub struct StatusArgs {
    #[clap(help = "The ID of the image or video")]
    pub id: String,

    #[clap(short = 't', long = "type", value_enum, default_value = "image", help = "Content type")]
    pub content_type: ContentType,

    #[clap(long, help = "Output as JSON")]
    pub json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResult {
    pub id: String,
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub status: GenerationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Dimensions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
}

impl From<Image> for StatusResult {
    fn from(image: Image) -> Self {
        let dimensions = match (image.width, image.height) {
            (Some(width), Some(height)) => Some(Dimensions { width, height }),
            _ => None,
        };
        Self {
            id: image.id,
            content_type: ContentType::Image,
            status: image.status,
            url: image.url,
            error: image.error,
            model: image.model,
            created_at: image.created_at,
            completed_at: image.completed_at,
            dimensions,
            duration: None,
            resolution: None,
        }
    }
}

impl From<Video> for StatusResult {
    fn from(video: Video) -> Self {
        Self {
            id: video.id,
            content_type: ContentType::Video,
            status: video.status,
            url: video.url,
            error: video.error,
            model: video.model,
            created_at: video.created_at,
            completed_at: video.completed_at,
            dimensions: None,
            duration: video.duration,
            resolution: video.resolution,
        }
    }
}

/// Looks the id up as `content_type`. An image lookup that 404s is retried
/// as a video; if that fails too the image error is returned.
pub async fn lookup(api: &ApiClient, id: &str, content_type: ContentType) -> Result<StatusResult> {
    match content_type {
        ContentType::Video => Ok(api.get_video(id).await?.into()),
        ContentType::Image => match api.get_image(id).await {
            Ok(image) => Ok(image.into()),
            Err(err) if is_not_found(&err) => match api.get_video(id).await {
                Ok(video) => Ok(video.into()),
                Err(_) => Err(err),
            },
            Err(err) => Err(err),
        },
    }
}

fn is_not_found(err: &anyhow::Error) -> bool {
    err.downcast_ref::<Error>().and_then(Error::status) == Some(404)
}

fn status_line(status: GenerationStatus) -> &'static str {
    match status {
        GenerationStatus::Pending => "● Pending",
        GenerationStatus::Processing => "● Processing",
        GenerationStatus::Completed => "● Completed",
        GenerationStatus::Failed => "● Failed",
        GenerationStatus::Unknown => "● Unknown",
    }
}

pub async fn run(args: StatusArgs) -> Result<()> {
    let session = Session::load()?;
    let api = session.api()?;

    let pb = ui::spinner("Fetching status...", args.json)?;
    let result = lookup(&api, &args.id, args.content_type).await;
    pb.finish_and_clear();
    let result = result?;

    if args.json {
        return print_json(&result);
    }

    print_label("ID", &result.id);
    print_label(
        "Type",
        match result.content_type {
            ContentType::Image => "image",
            ContentType::Video => "video",
        },
    );
    print_label("Status", status_line(result.status));
    print_label("Model", &result.model);

    match result.status {
        GenerationStatus::Completed => {
            if let Some(url) = &result.url {
                print_label("URL", url);
            }
            if let Some(Dimensions { width, height }) = result.dimensions {
                print_label("Dimensions", format!("{width} × {height}"));
            }
            if let Some(duration) = result.duration {
                print_label("Duration", format!("{duration}s"));
            }
            if let Some(resolution) = &result.resolution {
                print_label("Resolution", resolution);
            }
            if let Some(completed) = result.completed_at {
                print_label("Completed", completed.format("%Y-%m-%d %H:%M:%S UTC"));
            }
        }
        GenerationStatus::Failed => {
            if let Some(error) = &result.error {
                println!();
                println!("✖ Error: {error}");
            }
        }
        GenerationStatus::Pending | GenerationStatus::Processing => {
            println!();
            println!("Generation is still in progress. Check again later.");
        }
        GenerationStatus::Unknown => {}
    }
    Ok(())
}
