use super::Session;
use crate::ui::{self, print_json, print_label};
use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[clap(about = "Manage brands")]
pub struct BrandsCommand {
    #[clap(subcommand)]
    pub subcommand: BrandsSubcommand,
}

#[derive(Subcommand)]
pub enum BrandsSubcommand {
    /// List the organization's brands
    List {
        #[clap(long, help = "Output as JSON")]
        json: bool,
    },
    /// Make a brand the default for generation
    Select {
        #[clap(help = "Brand ID")]
        id: String,
    },
    /// Show the active brand
    Current {
        #[clap(long, help = "Output as JSON")]
        json: bool,
    },
}

pub async fn run(command: BrandsCommand) -> Result<()> {
    match command.subcommand {
        BrandsSubcommand::List { json } => list(json).await,
        BrandsSubcommand::Select { id } => select(&id).await,
        BrandsSubcommand::Current { json } => current(json).await,
    }
}

async fn list(json: bool) -> Result<()> {
    let session = Session::load()?;
    let api = session.api()?;

    let pb = ui::spinner("Fetching brands...", json)?;
    let brands = api.list_brands().await?;
    pb.finish_and_clear();

    if json {
        return print_json(&brands);
    }
    if brands.is_empty() {
        println!("{}", ui::format_warning("No brands found"));
        return Ok(());
    }
    let active = session.profile.active_brand.as_deref();
    for brand in &brands {
        let marker = if Some(brand.id.as_str()) == active { "*" } else { " " };
        match &brand.description {
            Some(description) => println!("{marker} {}  {}  {description}", brand.id, brand.name),
            None => println!("{marker} {}  {}", brand.id, brand.name),
        }
    }
    Ok(())
}

async fn select(id: &str) -> Result<()> {
    let session = Session::load()?;
    let api = session.api()?;

    let brand = api.get_brand(id).await?;
    session.store.set_active_brand(Some(&brand.id))?;
    println!(
        "{}",
        ui::format_success(&format!("Active brand: {}", brand.name))
    );
    Ok(())
}

async fn current(json: bool) -> Result<()> {
    let session = Session::load()?;
    let id = session.brand(None)?;
    let api = session.api()?;
    let brand = api.get_brand(&id).await?;

    if json {
        return print_json(&brand);
    }
    print_label("ID", &brand.id);
    print_label("Name", &brand.name);
    if let Some(description) = &brand.description {
        print_label("Description", description);
    }
    Ok(())
}
