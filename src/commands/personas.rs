use super::Session;
use crate::api::personas::Persona;
use crate::ui::{self, print_json, print_label};
use anyhow::Result;
use clap::{Parser, Subcommand};

const DESCRIPTION_WIDTH: usize = 80;

#[derive(Parser)]
#[clap(about = "List and manage personas [admin]")]
pub struct PersonasCommand {
    #[clap(subcommand)]
    pub subcommand: Option<PersonasSubcommand>,

    #[clap(long, help = "Output as JSON")]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum PersonasSubcommand {
    /// Show persona details
    Show {
        #[clap(help = "Persona handle")]
        handle: String,

        #[clap(long, help = "Output as JSON")]
        json: bool,
    },
}

pub async fn run(command: PersonasCommand) -> Result<()> {
    let session = Session::load()?;
    session.require_admin()?;
    let api = session.api()?;

    match command.subcommand {
        None => {
            let pb = ui::spinner("Fetching personas...", command.json)?;
            let personas = api.list_personas().await?;
            pb.finish_and_clear();

            if command.json {
                return print_json(&personas);
            }
            if personas.is_empty() {
                println!("{}", ui::format_warning("No personas found."));
                return Ok(());
            }
            println!("Personas ({})", personas.len());
            println!();
            for persona in &personas {
                for line in summary(persona) {
                    println!("{line}");
                }
            }
            Ok(())
        }
        Some(PersonasSubcommand::Show { handle, json }) => {
            let pb = ui::spinner(format!("Fetching persona {handle}..."), json)?;
            let persona = api.get_persona(&handle).await?;
            pb.finish_and_clear();

            if json {
                return print_json(&persona);
            }
            print_details(&persona);
            Ok(())
        }
    }
}

/// List entry: status marker, handle and name, then the optional
/// description and trigger word.
pub fn summary(persona: &Persona) -> Vec<String> {
    let marker = if persona.is_active() { "●" } else { "○" };
    let mut lines = vec![format!("  {marker} {} ({})", persona.handle, persona.name)];
    if let Some(description) = &persona.description {
        let short: String = description.chars().take(DESCRIPTION_WIDTH).collect();
        lines.push(format!("    {short}"));
    }
    if let Some(trigger) = &persona.trigger_word {
        lines.push(format!("    trigger: {trigger}"));
    }
    lines
}

fn print_details(persona: &Persona) {
    println!("{} (@{})", persona.name, persona.handle);
    println!();
    print_label("ID", &persona.id);
    if let Some(description) = &persona.description {
        print_label("Description", description);
    }
    if let Some(trigger) = &persona.trigger_word {
        print_label("Trigger Word", trigger);
    }
    if let Some(platform) = &persona.platform {
        print_label("Platform", platform);
    }
    if let Some(status) = &persona.status {
        print_label("Status", status);
    }
    if let Some(created) = &persona.created_at {
        print_label("Created", created.format("%Y-%m-%d"));
    }
}
