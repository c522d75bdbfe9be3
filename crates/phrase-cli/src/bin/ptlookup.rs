use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use phrase_cli::commands::{batch_ops, config_ops, lookup_ops};

#[derive(Parser)]
#[command(name = "ptlookup", about = "Phrase table lookup tool")]
struct Cli {
    /// Settings TOML replacing the built-in defaults
    #[arg(long, global = true)]
    settings: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Look up phrases in every configured dictionary
    Lookup {
        /// Dictionary configuration, one table per line
        #[arg(long)]
        config: String,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
        /// Source phrases (quote multi-word phrases)
        #[arg(required = true)]
        phrases: Vec<String>,
    },
    /// Look up every span of every sentence in a file
    Batch {
        /// Dictionary configuration, one table per line
        #[arg(long)]
        config: String,
        /// Input sentences, one per line
        #[arg(long)]
        input: String,
        /// Decoding worker threads
        #[arg(short, long, default_value = "1")]
        workers: usize,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Inspect lookup settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print the built-in settings TOML
    Export,
    /// Check a settings TOML file
    Validate { file: String },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("phrase_core=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Some(file) = &cli.settings {
        config_ops::use_settings(file);
    }

    match cli.command {
        Command::Lookup {
            config,
            json,
            phrases,
        } => lookup_ops::lookup(&config, &phrases, json),
        Command::Batch {
            config,
            input,
            workers,
            json,
        } => batch_ops::batch(&config, &input, workers, json),
        Command::Settings { action } => match action {
            SettingsAction::Export => config_ops::settings_export(),
            SettingsAction::Validate { file } => config_ops::settings_validate(&file),
        },
    }
}
