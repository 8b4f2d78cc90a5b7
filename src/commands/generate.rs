use super::{Session, interrupt, wait_error};
use crate::api::ApiClient;
use crate::api::images::CreateImage;
use crate::api::videos::CreateVideo;
use crate::completion::clock::format_secs;
use crate::completion::listener::Listener;
use crate::completion::{JobKind, JobRef, WaitRequest, WaitStrategy};
use crate::logging::*;
use crate::notify::socketio::SocketIoConnector;
use crate::ui::{self, print_json, print_label};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::ProgressBar;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const IMAGE_INTERVAL: Duration = Duration::from_secs(2);
pub const IMAGE_TIMEOUT: Duration = Duration::from_secs(5 * 60);
pub const VIDEO_INTERVAL: Duration = Duration::from_secs(5);
pub const VIDEO_TIMEOUT: Duration = Duration::from_secs(10 * 60);

#[derive(Parser)]
#[clap(about = "Generate images and videos")]
pub struct GenerateCommand {
    #[clap(subcommand)]
    pub subcommand: GenerateSubcommand,
}

#[derive(Subcommand)]
pub enum GenerateSubcommand {
    /// Generate an AI image
    Image(ImageArgs),
    /// Generate an AI video
    Video(VideoArgs),
}

/// Flags shared by every generation command.
#[derive(Args, Debug, Clone)]
pub struct GenerationFlags {
    #[clap(short, long, help = "Model to use for generation")]
    pub model: Option<String>,

    #[clap(short, long, help = "Brand ID (overrides active brand)")]
    pub brand: Option<String>,

    #[clap(short, long, help = "Download the result to a file")]
    pub output: Option<PathBuf>,

    #[clap(long, help = "Do not wait for generation to complete")]
    pub no_wait: bool,

    #[clap(long, help = "Poll for completion instead of listening for notifications")]
    pub poll: bool,

    #[clap(long, value_parser = humantime::parse_duration, help = "How long to wait, e.g. 90s or 10m")]
    pub timeout: Option<Duration>,

    #[clap(long, help = "Output as JSON")]
    pub json: bool,
}

impl GenerationFlags {
    /// Notifications with polling as the fallback, or polling only with `--poll`.
    pub fn strategy(
        &self,
        api: &ApiClient,
        interval: Duration,
    ) -> Result<WaitStrategy<SocketIoConnector>> {
        if self.poll {
            return Ok(WaitStrategy::Poll { interval });
        }
        let connector = SocketIoConnector::new(api.base_url(), api.api_key())?;
        Ok(WaitStrategy::PushThenPoll {
            listener: Listener::new(connector),
            interval,
        })
    }
}

#[derive(Parser, Debug)]
pub struct ImageArgs {
    #[clap(help = "The prompt describing the image to generate")]
    pub prompt: String,

    #[clap(long, help = "Image width in pixels")]
    pub width: Option<u32>,

    #[clap(long, help = "Image height in pixels")]
    pub height: Option<u32>,

    #[clap(flatten)]
    pub flags: GenerationFlags,
}

#[derive(Parser, Debug)]
pub struct VideoArgs {
    #[clap(help = "The prompt describing the video to generate")]
    pub prompt: String,

    #[clap(short, long, help = "Video duration in seconds")]
    pub duration: Option<u32>,

    #[clap(short, long, help = "Video resolution (720p, 1080p, 4k)")]
    pub resolution: Option<String>,

    #[clap(flatten)]
    pub flags: GenerationFlags,
}

pub async fn run(command: GenerateCommand) -> Result<()> {
    match command.subcommand {
        GenerateSubcommand::Image(args) => image(args).await,
        GenerateSubcommand::Video(args) => video(args).await,
    }
}

async fn image(args: ImageArgs) -> Result<()> {
    let log = DEFAULT.new(o!("function" => "commands::generate::image"));
    let session = Session::load()?;
    let api = session.api()?;
    let flags = &args.flags;
    let brand = session.brand(flags.brand.as_deref())?;
    let model = flags
        .model
        .clone()
        .unwrap_or_else(|| session.profile.defaults.image_model.clone());

    let pb = ui::spinner("Creating image...", flags.json)?;
    let created = api
        .create_image(&CreateImage {
            text: args.prompt.clone(),
            brand,
            model: Some(model),
            width: args.width,
            height: args.height,
        })
        .await?;
    info!(log, "image requested"; "id" => &created.id);

    if flags.no_wait {
        pb.finish_with_message("Image generation started");
        return started(&created.id, &created.status.to_string(), flags.json);
    }

    pb.set_message("Generating image...");
    let strategy = flags.strategy(&api, IMAGE_INTERVAL)?;
    let request = WaitRequest::new(
        JobRef::new(created.id.as_str(), JobKind::Image),
        flags.timeout.unwrap_or(IMAGE_TIMEOUT),
    )
    .progress(&pb)
    .cancel_on(interrupt());
    let (client, id) = (&api, created.id.as_str());
    let outcome = match strategy.wait(request, move || client.get_image(id)).await {
        Ok(outcome) => outcome,
        Err(err) => {
            pb.abandon_with_message("Image generation failed");
            return Err(wait_error(err));
        }
    };
    pb.finish_with_message(format!("Image generated ({})", format_secs(outcome.elapsed)));

    let result = outcome.result;
    if flags.json {
        print_json(&json!({
            "id": result.id,
            "status": result.status,
            "url": result.url,
            "width": result.width,
            "height": result.height,
            "model": result.model,
            "elapsed": outcome.elapsed.as_millis() as u64,
        }))?;
    } else {
        print_label("URL", result.url.as_deref().unwrap_or("N/A"));
        if let (Some(width), Some(height)) = (result.width, result.height) {
            print_label("Dimensions", format!("{width} × {height}"));
        }
        print_label("Model", &result.model);
    }

    if let (Some(path), Some(url)) = (&flags.output, &result.url) {
        download(url, path, "image", flags.json).await?;
    }
    Ok(())
}

async fn video(args: VideoArgs) -> Result<()> {
    let log = DEFAULT.new(o!("function" => "commands::generate::video"));
    let session = Session::load()?;
    let api = session.api()?;
    let flags = &args.flags;
    let brand = session.brand(flags.brand.as_deref())?;
    let model = flags
        .model
        .clone()
        .unwrap_or_else(|| session.profile.defaults.video_model.clone());

    let pb = ui::spinner("Creating video...", flags.json)?;
    let created = api
        .create_video(&CreateVideo {
            text: args.prompt.clone(),
            brand,
            model: Some(model),
            duration: args.duration,
            resolution: args.resolution.clone(),
        })
        .await?;
    info!(log, "video requested"; "id" => &created.id);

    if flags.no_wait {
        pb.finish_with_message("Video generation started");
        return started(&created.id, &created.status.to_string(), flags.json);
    }

    pb.set_message("Generating video...");
    let strategy = flags.strategy(&api, VIDEO_INTERVAL)?;
    let request = WaitRequest::new(
        JobRef::new(created.id.as_str(), JobKind::Video),
        flags.timeout.unwrap_or(VIDEO_TIMEOUT),
    )
    .progress(&pb)
    .cancel_on(interrupt());
    let (client, id) = (&api, created.id.as_str());
    let outcome = match strategy.wait(request, move || client.get_video(id)).await {
        Ok(outcome) => outcome,
        Err(err) => {
            pb.abandon_with_message("Video generation failed");
            return Err(wait_error(err));
        }
    };
    pb.finish_with_message(format!("Video generated ({})", format_secs(outcome.elapsed)));

    let result = outcome.result;
    if flags.json {
        print_json(&json!({
            "id": result.id,
            "status": result.status,
            "url": result.url,
            "duration": result.duration,
            "resolution": result.resolution,
            "model": result.model,
            "elapsed": outcome.elapsed.as_millis() as u64,
        }))?;
    } else {
        print_label("URL", result.url.as_deref().unwrap_or("N/A"));
        if let Some(duration) = result.duration {
            print_label("Duration", format!("{duration}s"));
        }
        if let Some(resolution) = &result.resolution {
            print_label("Resolution", resolution);
        }
        print_label("Model", &result.model);
    }

    if let (Some(path), Some(url)) = (&flags.output, &result.url) {
        download(url, path, "video", flags.json).await?;
    }
    Ok(())
}

fn started(id: &str, status: &str, json: bool) -> Result<()> {
    if json {
        return print_json(&json!({ "id": id, "status": status }));
    }
    print_label("ID", id);
    print_label("Status", status);
    println!();
    println!("Check status with: gf status {id}");
    Ok(())
}

/// Saves the asset at `url` to `path`.
pub async fn download(url: &str, path: &Path, what: &str, quiet: bool) -> Result<()> {
    let pb: ProgressBar = ui::spinner(format!("Downloading {what}..."), quiet)?;
    let fetched = async {
        let response = reqwest::get(url)
            .await?
            .error_for_status()
            .with_context(|| format!("Failed to download {url}"))?;
        let bytes = response.bytes().await?;
        tokio::fs::write(path, &bytes)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        anyhow::Ok(())
    }
    .await;
    match fetched {
        Ok(()) => {
            pb.finish_with_message(format!("Saved to {}", path.display()));
            Ok(())
        }
        Err(err) => {
            pb.abandon_with_message(format!("Failed to download {what}"));
            Err(err)
        }
    }
}
