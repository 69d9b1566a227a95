use clap::Parser;
use sona::cli::{self, Cli, Commands};
use sona::config::Config;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_log = match cli.command {
        Commands::Serve(_) => Some("info"),
        _ => None,
    };
    cli::init_tracing(default_log);

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Read { file } => cli::read(&config, file).await,
        Commands::Explain(args) => cli::explain(&config, args).await,
        Commands::Session(args) => cli::session(&config, args).await,
        Commands::Serve(args) => cli::serve(&config, args).await,
        Commands::Config(args) => cli::config(&config, &args),
    }
}
