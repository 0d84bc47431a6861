mod cli;
mod climateserv;
mod geometry;
mod intervals;
mod reading;

use anyhow::{Error, Result};
use clap::Parser;
use cli::{command, Cli, Commands};

#[tokio::main]
async fn main() -> Result<(), Error> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Fetch {} => match command::fetch().await {
            Ok(summary) => println!("{}", summary),
            Err(e) => eprintln!("Error: {}", e),
        },
        Commands::Aggregate {} => match command::aggregate() {
            Ok(summary) => println!("{}", summary),
            Err(e) => eprintln!("Error: {}", e),
        },
        Commands::Convert {} => match command::convert() {
            Ok(summary) => println!("{}", summary),
            Err(e) => eprintln!("Error: {}", e),
        },
    }

    Ok(())
}
