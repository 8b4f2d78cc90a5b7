#![allow(async_fn_in_trait)]

pub mod api;
pub mod commands;
pub mod completion;
pub mod config;
pub mod errors;
pub mod logging;
pub mod notify;
pub mod ui;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[clap(name = "gf")]
#[clap(about = "Genfeed CLI: generate images and videos, train LoRAs")]
#[clap(version)]
pub struct Cli {
    #[clap(short, long, global = true, help = "Profile to use for this command")]
    pub profile: Option<String>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    Login(commands::auth::LoginArgs),
    /// Remove the stored API key
    Logout,
    Whoami(commands::auth::WhoamiArgs),
    Profile(commands::profile::ProfileCommand),
    Brands(commands::brands::BrandsCommand),
    Generate(commands::generate::GenerateCommand),
    Status(commands::status::StatusArgs),
    Train(commands::train::TrainCommand),
    Caption(commands::caption::CaptionArgs),
    Darkroom(commands::darkroom::DarkroomCommand),
    Dataset(commands::dataset::DatasetCommand),
    Personas(commands::personas::PersonasCommand),
}

pub async fn run(cli: Cli) -> Result<()> {
    if let Some(profile) = &cli.profile {
        config::set("GF_PROFILE", profile);
    }
    match cli.command {
        Commands::Login(args) => commands::auth::login(args).await,
        Commands::Logout => commands::auth::logout().await,
        Commands::Whoami(args) => commands::auth::whoami(args).await,
        Commands::Profile(command) => commands::profile::run(command).await,
        Commands::Brands(command) => commands::brands::run(command).await,
        Commands::Generate(command) => commands::generate::run(command).await,
        Commands::Status(args) => commands::status::run(args).await,
        Commands::Train(command) => commands::train::run(command).await,
        Commands::Caption(args) => commands::caption::run(args).await,
        Commands::Darkroom(command) => commands::darkroom::run(command).await,
        Commands::Dataset(command) => commands::dataset::run(command).await,
        Commands::Personas(command) => commands::personas::run(command).await,
    }
}
