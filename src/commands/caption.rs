use super::Session;
use crate::api::darkroom::CaptionRequest;
use crate::ui::{self, print_json};
use anyhow::Result;
use clap::Parser;

#[derive(Parser)]
#[clap(about = "Run Florence-2 auto-captioning on a training dataset [admin]")]
pub struct CaptionArgs {
    #[clap(help = "Persona handle (e.g., quincylandx)")]
    pub handle: String,

    #[clap(short, long, help = "Trigger word (defaults to handle)")]
    pub trigger: Option<String>,

    #[clap(long, help = "Output as JSON")]
    pub json: bool,
}

pub async fn run(args: CaptionArgs) -> Result<()> {
    let session = Session::load()?;
    let darkroom = session.darkroom()?;

    let request = CaptionRequest {
        trigger_word: args.trigger.clone().unwrap_or_else(|| args.handle.clone()),
        persona_slug: args.handle,
    };
    let pb = ui::spinner(
        format!("Captioning dataset for {}...", request.persona_slug),
        args.json,
    )?;
    let result = darkroom.caption(&request).await?;
    pb.finish_with_message("Captioning complete");

    if args.json {
        return print_json(&result);
    }
    if !result.output.is_empty() {
        println!("{}", result.output);
    }
    Ok(())
}
