use super::Session;
use crate::api::ApiClient;
use crate::api::auth::is_valid_key_format;
use crate::errors::Error;
use crate::logging::*;
use crate::ui::{self, print_json, print_label};
use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[clap(about = "Authenticate with your Genfeed API key")]
pub struct LoginArgs {
    #[clap(short, long, help = "API key; read from stdin when omitted")]
    pub key: Option<String>,
}

#[derive(Parser)]
#[clap(about = "Show the current user, organization and scopes")]
pub struct WhoamiArgs {
    #[clap(long, help = "Output as JSON")]
    pub json: bool,
}

pub async fn login(args: LoginArgs) -> Result<()> {
    let log = DEFAULT.new(o!("function" => "commands::auth::login"));
    let session = Session::load()?;

    let api_key = match args.key {
        Some(key) => key,
        None => read_key().await?,
    };
    if !is_valid_key_format(&api_key) {
        return Err(Error::InvalidApiKey.into());
    }

    // saved first so the profile's URL and key are what gets verified
    session.store.set_api_key(Some(&api_key))?;
    let api = ApiClient::new(&session.profile.api_url, &api_key);

    let pb = ui::spinner("Validating API key...", false)?;
    let whoami = match api.whoami().await {
        Ok(whoami) => whoami,
        Err(err) => {
            pb.abandon_with_message("Invalid API key");
            session.store.set_api_key(None)?;
            return Err(err);
        }
    };
    pb.finish_and_clear();
    info!(log, "logged in"; "profile" => &session.name, "organization" => &whoami.organization.id);

    println!(
        "{}",
        ui::format_success(&format!("Logged in as {}", whoami.organization.name))
    );
    print_label("Email", &whoami.user.email);
    print_label("Scopes", whoami.scopes.join(", "));
    println!();

    let brands = api.list_brands().await?;
    match brands.as_slice() {
        [] => println!(
            "{}",
            ui::format_warning("No brands found. Create one at https://app.genfeed.ai")
        ),
        [brand] => {
            session.store.set_active_brand(Some(&brand.id))?;
            println!(
                "{}",
                ui::format_success(&format!("Active brand: {}", brand.name))
            );
        }
        _ => {
            println!("{} brands available:", brands.len());
            for brand in &brands {
                println!("  {}  {}", brand.id, brand.name);
            }
            println!();
            println!("Select one with: gf brands select <id>");
        }
    }
    Ok(())
}

async fn read_key() -> Result<String> {
    eprintln!("Get your API key at: https://app.genfeed.ai/settings/api-keys");
    eprintln!("Enter your Genfeed API key:");
    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("failed to read API key from stdin")?;
    Ok(line.trim().to_owned())
}

pub async fn logout() -> Result<()> {
    let session = Session::load()?;
    session.store.set_api_key(None)?;
    println!("{}", ui::format_success("Logged out"));
    Ok(())
}

pub async fn whoami(args: WhoamiArgs) -> Result<()> {
    let session = Session::load()?;
    let api = session.api()?;

    let pb = ui::spinner("Fetching account info...", args.json)?;
    let whoami = api.whoami().await?;
    pb.finish_and_clear();

    if args.json {
        return print_json(&json!({
            "user": whoami.user,
            "organization": whoami.organization,
            "scopes": whoami.scopes,
            "profile": session.name,
            "apiUrl": session.profile.api_url,
        }));
    }

    print_label("User", format!("{} <{}>", whoami.user.name, whoami.user.email));
    print_label("Organization", &whoami.organization.name);
    print_label("Scopes", whoami.scopes.join(", "));
    print_label("Profile", &session.name);
    print_label("API", &session.profile.api_url);
    if let Some(brand) = &session.profile.active_brand {
        print_label("Brand", brand);
    }
    Ok(())
}
