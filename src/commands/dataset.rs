use super::Session;
use crate::api::darkroom::{DarkroomClient, Dataset};
use crate::errors::Error;
use crate::logging::*;
use crate::ui::{self, print_json, print_label};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio::process::Command;

const DATASET_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "webp", "txt"];
const LISTED_FILES: usize = 20;

#[derive(Parser)]
#[clap(about = "Manage training datasets [admin]")]
pub struct DatasetCommand {
    #[clap(subcommand)]
    pub subcommand: DatasetSubcommand,
}

#[derive(Subcommand)]
pub enum DatasetSubcommand {
    /// Show dataset info for a persona
    Info {
        #[clap(help = "Persona handle")]
        handle: String,

        #[clap(long, help = "Output as JSON")]
        json: bool,
    },
    /// Upload training images to darkroom
    Upload {
        #[clap(help = "Persona handle")]
        handle: String,

        #[clap(help = "Local directory containing images")]
        path: PathBuf,
    },
    /// Download dataset from darkroom
    Download {
        #[clap(help = "Persona handle")]
        handle: String,

        #[clap(default_value = ".", help = "Output directory")]
        out_dir: PathBuf,
    },
    /// Delete dataset from darkroom
    Delete {
        #[clap(help = "Persona handle")]
        handle: String,
    },
}

pub async fn run(command: DatasetCommand) -> Result<()> {
    let session = Session::load()?;
    let darkroom = session.darkroom()?;
    match command.subcommand {
        DatasetSubcommand::Info { handle, json } => info(&darkroom, &handle, json).await,
        DatasetSubcommand::Upload { handle, path } => upload(&darkroom, &handle, &path).await,
        DatasetSubcommand::Download { handle, out_dir } => {
            download(&darkroom, &handle, &out_dir).await
        }
        DatasetSubcommand::Delete { handle } => {
            let pb = ui::spinner(format!("Deleting dataset for {handle}..."), false)?;
            darkroom.delete_dataset(&handle).await?;
            pb.finish_with_message(format!("Dataset {handle} deleted"));
            Ok(())
        }
    }
}

async fn info(darkroom: &DarkroomClient, handle: &str, json: bool) -> Result<()> {
    let pb = ui::spinner(format!("Fetching dataset for {handle}..."), json)?;
    let dataset = darkroom.dataset(handle).await?;
    pb.finish_and_clear();

    if json {
        return print_json(&dataset);
    }
    println!("Dataset: {handle}");
    println!();
    print_label("Path", &dataset.path);
    print_label("Images", dataset.image_count);
    print_label("Captions", dataset.caption_count);
    let files = file_listing(&dataset);
    if !files.is_empty() {
        println!();
        println!("Files:");
        for line in files {
            println!("  {line}");
        }
    }
    Ok(())
}

/// The first few file names, then a count of the rest.
pub fn file_listing(dataset: &Dataset) -> Vec<String> {
    let mut lines: Vec<String> = dataset.images.iter().take(LISTED_FILES).cloned().collect();
    if dataset.images.len() > LISTED_FILES {
        lines.push(format!(
            "... and {} more",
            dataset.images.len() - LISTED_FILES
        ));
    }
    lines
}

/// Images and caption files directly inside `dir`, sorted by name.
pub fn dataset_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let wanted = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| DATASET_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
        if wanted && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

async fn upload(darkroom: &DarkroomClient, handle: &str, dir: &Path) -> Result<()> {
    let log = DEFAULT.new(o!(
        "function" => "commands::dataset::upload",
        "persona" => handle.to_owned(),
    ));
    let dir = std::path::absolute(dir)?;
    let files = dataset_files(&dir)?;
    if files.is_empty() {
        println!("✖ No image or caption files found in {}", dir.display());
        return Ok(());
    }

    let pb = ui::spinner(
        format!("Uploading {} files for {handle}...", files.len()),
        false,
    )?;
    let result = darkroom.upload_dataset(handle, &files).await?;
    info!(log, "uploaded"; "count" => result.uploaded_count);
    pb.finish_with_message(format!(
        "Uploaded {} files to {}",
        result.uploaded_count, result.path
    ));
    Ok(())
}

async fn download(darkroom: &DarkroomClient, handle: &str, out_dir: &Path) -> Result<()> {
    let out_dir = std::path::absolute(out_dir)?;
    let pb = ui::spinner(format!("Downloading dataset for {handle}..."), false)?;
    let archive = darkroom.download_dataset(handle).await?;
    unpack(&archive, handle, &out_dir).await?;
    pb.finish_with_message(format!("Dataset downloaded to {}", out_dir.display()));
    Ok(())
}

/// Writes the tarball into `out_dir`, extracts it there with `tar`, and
/// removes the tarball.
pub async fn unpack(archive: &[u8], handle: &str, out_dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(out_dir)
        .await
        .with_context(|| format!("failed to create {}", out_dir.display()))?;
    let tarball = out_dir.join(format!("{handle}-dataset.tar.gz"));
    tokio::fs::write(&tarball, archive).await?;

    let output = Command::new("tar")
        .arg("xzf")
        .arg(&tarball)
        .arg("-C")
        .arg(out_dir)
        .output()
        .await;
    tokio::fs::remove_file(&tarball).await?;

    let output = output.context("failed to run tar")?;
    if !output.status.success() {
        return Err(Error::darkroom(format!(
            "Failed to extract dataset archive: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        ))
        .into());
    }
    Ok(())
}
