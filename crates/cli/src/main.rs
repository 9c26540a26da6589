//! Peticiona CLI: assemble legal petitions from `.docx` templates.

use clap::{Parser, Subcommand};
use peticiona_config::AppConfig;
use peticiona_data::DataKind;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(
    name = "peticiona",
    about = "📄 Peticiona: document assembly for legal petitions",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the TOML configuration file
    #[arg(short, long, global = true, env = "PETICIONA_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate one document per record
    Generate {
        /// The .docx template
        #[arg(short, long)]
        template: PathBuf,

        /// CSV or JSON file with the records
        #[arg(short = 'i', long)]
        data: PathBuf,

        /// Data kind; guessed from the file extension when omitted
        #[arg(short, long)]
        kind: Option<DataKind>,

        /// Output file or directory (defaults to `output.dir` from config)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Only process the first record
        #[arg(long)]
        first_record: bool,

        /// Fail records with missing required fields
        #[arg(long)]
        strict: bool,

        /// Number of worker threads
        #[arg(short, long)]
        workers: Option<usize>,

        /// Write the batch report as JSON to this path
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// List the placeholders and sections a template uses
    Inspect {
        /// The .docx template
        template: PathBuf,

        /// Print the inspection as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the loaded field schema and activation rules
    Schema {
        /// Print the schema as JSON
        #[arg(long)]
        json: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Validate the configuration file
    Validate,
    /// Print a default configuration file
    Init,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("❌ {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    if let Commands::Config { action: ConfigAction::Init } = cli.command {
        commands::config_cmd::init();
        return Ok(ExitCode::SUCCESS);
    }

    let config = AppConfig::load(cli.config.as_deref()).map_err(|e| format!("Failed to load config: {e}"))?;
    init_logging(&config, cli.debug);

    match cli.command {
        Commands::Generate {
            template,
            data,
            kind,
            output,
            first_record,
            strict,
            workers,
            report,
        } => {
            let args = commands::generate::GenerateArgs {
                template,
                data,
                kind,
                output,
                first_record,
                strict,
                workers,
                report,
            };
            let batch = commands::generate::run(&config, args)?;
            if batch.has_failures() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Inspect { template, json } => {
            commands::inspect::run(&config, &template, json)?;
        }
        Commands::Schema { json } => {
            commands::schema::run(&config, json)?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show(&config)?,
            ConfigAction::Validate => commands::config_cmd::validate(&config),
            ConfigAction::Init => commands::config_cmd::init(),
        },
    }

    Ok(ExitCode::SUCCESS)
}

/// `RUST_LOG` wins; otherwise `--debug`, then `logging.level`.
fn init_logging(config: &AppConfig, debug: bool) {
    let level = if debug { "debug" } else { config.logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
