use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "stride", version, about = "Stride daily goal streaks")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log activity for a day
    Log(commands::activity::LogArgs),
    /// Run the daily check and print the report
    Check,
    /// Show streak and pass balance
    Status,
    /// Show recent days against the goal
    History(commands::activity::HistoryArgs),
    /// Print the next affirmation
    Affirm,
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Log(args) => commands::activity::log(args),
        Commands::Check => commands::check::run(),
        Commands::Status => commands::status::run(),
        Commands::History(args) => commands::activity::history(args),
        Commands::Affirm => commands::check::affirm(),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
