use crate::config::{ConfigStore, DEFAULT_DARKROOM_HOST, Profile};
use crate::ui::{self, print_json, print_label};
use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[clap(about = "Manage CLI profiles")]
pub struct ProfileCommand {
    #[clap(subcommand)]
    pub subcommand: ProfileSubcommand,
}

#[derive(Subcommand)]
pub enum ProfileSubcommand {
    /// List all profiles
    List {
        #[clap(long, help = "Output as JSON")]
        json: bool,
    },
    /// Set the active profile
    Use {
        #[clap(help = "Profile name")]
        name: String,
    },
    /// Create a new profile
    Create(CreateArgs),
    /// Update a profile field
    Set(SetArgs),
}

#[derive(Parser)]
pub struct CreateArgs {
    #[clap(help = "Profile name")]
    pub name: String,

    #[clap(long, help = "API URL")]
    pub api_url: Option<String>,

    #[clap(long, help = "API key")]
    pub api_key: Option<String>,

    #[clap(long, help = "Darkroom host address")]
    pub darkroom_host: Option<String>,

    #[clap(long, help = "User role (user or admin)")]
    pub role: Option<String>,
}

/// Targets the active profile, or the one named by the global `--profile`.
#[derive(Parser)]
pub struct SetArgs {
    #[clap(help = "Field name (active-brand, api-key, api-url, darkroom-host, darkroom-port, role)")]
    pub field: String,

    #[clap(help = "Field value")]
    pub value: String,
}

pub async fn run(command: ProfileCommand) -> Result<()> {
    let store = ConfigStore::open()?;
    match command.subcommand {
        ProfileSubcommand::List { json } => list(&store, json),
        ProfileSubcommand::Use { name } => {
            store.use_profile(&name)?;
            println!("{}", ui::format_success(&format!("Active profile: {name}")));
            Ok(())
        }
        ProfileSubcommand::Create(args) => create(&store, args),
        ProfileSubcommand::Set(args) => set(&store, args),
    }
}

fn list(store: &ConfigStore, json: bool) -> Result<()> {
    let profiles = store.list_profiles()?;
    if json {
        return print_json(&profiles);
    }

    println!("Profiles");
    println!();
    for entry in &profiles {
        let marker = if entry.active { "●" } else { "○" };
        let active = if entry.active { " (active)" } else { "" };
        println!("  {marker} {}{active} {}", entry.name, entry.profile.api_url);
        if entry.profile.darkroom_host != DEFAULT_DARKROOM_HOST {
            println!("    darkroom: {}", entry.profile.darkroom_host);
        }
    }
    println!();
    println!("Config: {}", store.path().display());
    Ok(())
}

/// Builds the profile from the flags before touching the file, so a bad
/// value leaves nothing behind.
pub fn profile_from(args: &CreateArgs) -> Result<Profile> {
    let mut profile = Profile::default();
    let fields = [
        ("api-url", &args.api_url),
        ("api-key", &args.api_key),
        ("darkroom-host", &args.darkroom_host),
        ("role", &args.role),
    ];
    for (field, value) in fields {
        if let Some(value) = value {
            profile.set_field(field, value)?;
        }
    }
    Ok(profile)
}

fn create(store: &ConfigStore, args: CreateArgs) -> Result<()> {
    let profile = profile_from(&args)?;
    store.create_profile(&args.name, profile)?;
    println!(
        "{}",
        ui::format_success(&format!("Profile \"{}\" created", args.name))
    );
    println!("Switch to it with: gf profile use {}", args.name);
    Ok(())
}

fn set(store: &ConfigStore, args: SetArgs) -> Result<()> {
    let name = store.set_field(&args.field, &args.value, None)?;
    println!(
        "{}",
        ui::format_success(&format!("Set {} = {}", args.field, args.value))
    );
    print_label("Profile", name);
    Ok(())
}
