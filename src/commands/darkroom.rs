use super::Session;
use crate::api::darkroom::{ComfyAction, ComfyActionResult, DiskUsage, Health};
use crate::ui::{self, print_json, print_label};
use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[clap(about = "Darkroom infrastructure management [admin]")]
pub struct DarkroomCommand {
    #[clap(subcommand)]
    pub subcommand: DarkroomSubcommand,
}

#[derive(Subcommand)]
pub enum DarkroomSubcommand {
    /// Show darkroom status (VRAM, temperature, disk)
    Health {
        #[clap(long, help = "Output as JSON")]
        json: bool,
    },
    /// Manage the ComfyUI service
    Comfy {
        #[clap(value_enum, help = "Action to run")]
        action: ComfyAction,

        #[clap(long, help = "Output as JSON")]
        json: bool,
    },
    /// List available LoRA models
    Loras {
        #[clap(long, help = "Output as JSON")]
        json: bool,
    },
}

pub async fn run(command: DarkroomCommand) -> Result<()> {
    let session = Session::load()?;
    let darkroom = session.darkroom()?;
    match command.subcommand {
        DarkroomSubcommand::Health { json } => {
            let pb = ui::spinner("Fetching darkroom health...", json)?;
            let health = darkroom.health().await?;
            pb.finish_and_clear();
            if json {
                return print_json(&health);
            }
            print_health(&health);
            Ok(())
        }
        DarkroomSubcommand::Comfy { action, json } => {
            let pb = ui::spinner(comfy_progress(action), json)?;
            let result = darkroom.comfy(action).await?;
            pb.finish_and_clear();
            if json {
                return print_json(&result);
            }
            print_comfy(action, &result);
            Ok(())
        }
        DarkroomSubcommand::Loras { json } => {
            let pb = ui::spinner("Fetching LoRAs...", json)?;
            let result = darkroom.loras().await?;
            pb.finish_and_clear();
            if json {
                return print_json(&result);
            }
            if result.loras.is_empty() {
                println!("{}", ui::format_warning("No LoRA models found."));
                return Ok(());
            }
            println!("LoRA Models ({})", result.loras.len());
            println!();
            for lora in &result.loras {
                println!("  {}", lora.name);
                println!("    {:.1} MB | {}", lora.size_mb, lora.modified);
            }
            Ok(())
        }
    }
}

pub fn comfy_progress(action: ComfyAction) -> &'static str {
    match action {
        ComfyAction::Start => "Starting ComfyUI...",
        ComfyAction::Stop => "Stopping ComfyUI...",
        ComfyAction::Restart => "Restarting ComfyUI...",
        ComfyAction::Status => "Checking ComfyUI...",
    }
}

pub fn comfy_outcome(action: ComfyAction, result: &ComfyActionResult) -> String {
    if result.returncode == 0 {
        ui::format_success(&format!("ComfyUI {action}: success"))
    } else {
        format!(
            "✖ ComfyUI {action}: failed (exit code {})",
            result.returncode
        )
    }
}

fn print_comfy(action: ComfyAction, result: &ComfyActionResult) {
    println!("{}", comfy_outcome(action, result));
    if !result.stdout.is_empty() {
        println!("{}", result.stdout);
    }
    if !result.stderr.is_empty() {
        println!("{}", ui::format_warning(&result.stderr));
    }
}

/// `used/total GB (percent%)` from megabyte figures.
pub fn vram_line(used_mb: f64, total_mb: f64) -> String {
    let percent = if total_mb > 0.0 {
        used_mb / total_mb * 100.0
    } else {
        0.0
    };
    format!(
        "{:.1}/{:.1} GB ({percent:.0}%)",
        used_mb / 1024.0,
        total_mb / 1024.0
    )
}

fn disk_line(disk: &DiskUsage) -> String {
    format!("{}/{} ({})", disk.used, disk.total, disk.percent)
}

fn print_health(health: &Health) {
    let gpu = &health.gpu;
    println!("Darkroom Status");
    println!();
    print_label("GPU", &gpu.name);
    print_label("VRAM", vram_line(gpu.memory_used, gpu.memory_total));
    print_label("Utilization", format!("{}%", gpu.utilization));
    print_label("Temperature", format!("{}°C", gpu.temperature));
    println!();
    println!("Disk");
    println!();
    print_label("Root", disk_line(&health.disk.root));
    if let Some(comfyui) = &health.disk.comfyui {
        print_label("ComfyUI", disk_line(comfyui));
    }
}
