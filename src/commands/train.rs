use super::{Session, interrupt, wait_error};
use crate::api::darkroom::{DarkroomClient, TrainRequest, TrainStatus, auto_steps};
use crate::completion::poller::{PollOptions, poll};
use crate::completion::{WaitError, WaitOutcome};
use crate::logging::*;
use crate::ui::{self, format_progress, print_json, print_label};
use anyhow::Result;
use clap::{Parser, Subcommand};
use indicatif::ProgressBar;
use std::time::Duration;

pub const TRAINING_INTERVAL: Duration = Duration::from_secs(5);
pub const TRAINING_TIMEOUT: Duration = Duration::from_secs(2 * 60 * 60);

pub const DEFAULT_LORA_RANK: u32 = 16;
pub const DEFAULT_LEARNING_RATE: f64 = 4e-4;

#[derive(Parser)]
#[clap(about = "LoRA training management [admin]")]
pub struct TrainCommand {
    #[clap(subcommand)]
    pub subcommand: TrainSubcommand,
}

#[derive(Subcommand)]
pub enum TrainSubcommand {
    /// Start training a LoRA on a persona's dataset
    Start(StartArgs),
    /// Check training job status
    Status(StatusArgs),
}

#[derive(Parser, Debug)]
pub struct StartArgs {
    #[clap(help = "Persona handle (e.g., quincylandx)")]
    pub handle: String,

    #[clap(short, long, help = "Training steps (tuned to the dataset size by default)")]
    pub steps: Option<u32>,

    #[clap(short, long, help = "LoRA rank [default: 16]")]
    pub rank: Option<u32>,

    #[clap(short, long, help = "Trigger word (defaults to handle)")]
    pub trigger: Option<String>,

    #[clap(long, help = "Learning rate [default: 4e-4]")]
    pub lr: Option<f64>,

    #[clap(long, help = "Wait for training to complete")]
    pub wait: bool,

    #[clap(long, help = "Output as JSON")]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct StatusArgs {
    #[clap(help = "Training job ID")]
    pub job_id: String,

    #[clap(long, help = "Watch for updates until completion")]
    pub watch: bool,

    #[clap(long, help = "Output as JSON")]
    pub json: bool,
}

pub async fn run(command: TrainCommand) -> Result<()> {
    let session = Session::load()?;
    let darkroom = session.darkroom()?;
    match command.subcommand {
        TrainSubcommand::Start(args) => start(&darkroom, args).await,
        TrainSubcommand::Status(args) => status(&darkroom, args).await,
    }
}

/// Training parameters for `args` on a dataset of `image_count` images.
pub fn train_request(args: &StartArgs, image_count: u32) -> TrainRequest {
    TrainRequest {
        persona_slug: args.handle.clone(),
        trigger_word: args.trigger.clone().unwrap_or_else(|| args.handle.clone()),
        lora_name: format!("{}_zimage", args.handle),
        steps: args.steps.unwrap_or_else(|| auto_steps(image_count)),
        lora_rank: args.rank.unwrap_or(DEFAULT_LORA_RANK),
        learning_rate: args.lr.unwrap_or(DEFAULT_LEARNING_RATE),
    }
}

async fn start(darkroom: &DarkroomClient, args: StartArgs) -> Result<()> {
    let log = DEFAULT.new(o!(
        "function" => "commands::train::start",
        "persona" => args.handle.clone(),
    ));

    let pb = ui::spinner("Checking dataset...", args.json)?;
    let dataset = darkroom.dataset(&args.handle).await?;
    pb.finish_and_clear();

    if dataset.image_count == 0 {
        println!("✖ No training images found for \"{}\".", args.handle);
        println!("Upload images with: gf dataset upload {} <path>", args.handle);
        return Ok(());
    }
    if !args.json {
        print_label(
            "Dataset",
            format!(
                "{} images, {} captions",
                dataset.image_count, dataset.caption_count
            ),
        );
    }

    let request = train_request(&args, dataset.image_count);
    let pb = ui::spinner("Starting training...", args.json)?;
    let started = darkroom.start_training(&request).await?;
    pb.finish_with_message("Training started");
    info!(log, "training started"; "job" => &started.job_id, "steps" => request.steps);

    if args.json {
        print_json(&started)?;
    } else {
        print_label("Job ID", &started.job_id);
        print_label("Images", started.image_count);
        print_label("Steps", request.steps);
        print_label("Trigger", &request.trigger_word);
        print_label("LoRA Name", &request.lora_name);
    }

    if !args.wait {
        if !args.json {
            println!();
            println!("Check progress with: gf train status {}", started.job_id);
        }
        return Ok(());
    }

    let pb = ui::spinner("Training in progress...", args.json)?;
    let outcome = watch(darkroom, &started.job_id, &pb, "Training: ").await;
    settle(&pb, outcome, |status| format!("Training completed: {}", status.lora_name))
}

async fn status(darkroom: &DarkroomClient, args: StatusArgs) -> Result<()> {
    let pb = ui::spinner("Fetching training status...", args.json)?;
    let current = darkroom.training_status(&args.job_id).await?;
    pb.finish_and_clear();

    if args.json && !args.watch {
        return print_json(&current);
    }
    if !args.json {
        print_status(&current);
    }

    if !args.watch || current.status.is_terminal() {
        if args.json {
            print_json(&current)?;
        }
        return Ok(());
    }

    if !args.json {
        println!();
    }
    let pb = ui::spinner("Watching training...", args.json)?;
    let outcome = watch(darkroom, &args.job_id, &pb, "").await;
    if args.json {
        if let Ok(outcome) = &outcome {
            print_json(&outcome.result)?;
        }
    }
    settle(&pb, outcome, |_| "Training completed".to_owned())
}

/// Polls the training job until it completes, fails or runs out of time,
/// showing `<prefix><stage> <progress>` on the spinner.
pub async fn watch(
    darkroom: &DarkroomClient,
    job_id: &str,
    pb: &ProgressBar,
    prefix: &str,
) -> Result<WaitOutcome<TrainStatus>, WaitError> {
    let spinner = pb.clone();
    let prefix = prefix.to_owned();
    let options = PollOptions::for_state()
        .interval(TRAINING_INTERVAL)
        .timeout(TRAINING_TIMEOUT)
        .on_update(move |status: &TrainStatus, _| {
            spinner.set_message(format!(
                "{prefix}{} {}",
                status.stage,
                format_progress(status.progress)
            ));
        })
        .cancel_on(interrupt());
    poll(move || darkroom.training_status(job_id), options).await
}

fn settle(
    pb: &ProgressBar,
    outcome: Result<WaitOutcome<TrainStatus>, WaitError>,
    done: impl FnOnce(&TrainStatus) -> String,
) -> Result<()> {
    match outcome {
        Ok(outcome) => {
            pb.finish_with_message(done(&outcome.result));
            Ok(())
        }
        Err(WaitError::Timeout) => {
            pb.abandon_with_message(
                "Training polling timed out (2h). Job may still be running on the server.",
            );
            Err(WaitError::Timeout.into())
        }
        Err(err) => {
            pb.abandon_with_message(err.to_string());
            Err(wait_error(err))
        }
    }
}

fn print_status(status: &TrainStatus) {
    print_label("Job ID", &status.job_id);
    print_label("Status", status.status);
    print_label("Stage", &status.stage);
    print_label("Progress", format_progress(status.progress));
    print_label("Persona", &status.persona_slug);
    print_label("LoRA", &status.lora_name);
    print_label("Images", status.image_count);
    print_label("Started", &status.started_at);
    if let Some(completed) = &status.completed_at {
        print_label("Completed", completed);
    }
    if let Some(error) = &status.error {
        print_label("Error", error);
    }
}
