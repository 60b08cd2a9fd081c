use anyhow::Result;
use clap::{CommandFactory, Parser};

use rover_signal::{
    config::{Cli, Command, ServerConfig},
    launcher, server,
    util::init_log,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Command::Server(args)) => {
            init_log(args.debug);
            server::run(ServerConfig::from(&args)).await
        }
        Some(Command::Launch(args)) => {
            init_log(false);
            launcher::launch(&args).await?;
            Ok(())
        }
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    }
}
