use clap::Parser;
use genfeed::Cli;
use genfeed::errors::format_error;
use std::process;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(err) = genfeed::run(cli).await {
        eprintln!("{}", format_error(&err));
        process::exit(1);
    }
}
