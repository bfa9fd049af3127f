//! CLI tool for paktools container operations.

mod commands;
mod exit_codes;
mod keys;
mod output;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use std::path::PathBuf;

use exit_codes::ExitCode;

/// Unreal Engine pak and IoStore container tool
#[derive(Parser)]
#[command(name = "paktools")]
#[command(author, version, about = "List and extract Unreal Engine pak and IoStore containers", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Key chain file (crypto.json) with the containers' AES keys
    #[arg(long, env = "PAKTOOLS_CRYPTO_KEYS", global = true)]
    crypto_keys: Option<PathBuf>,

    /// Principal AES key, as 64 hex digits or base64
    #[arg(long, env = "PAKTOOLS_AES_KEY", global = true, hide_env_values = true)]
    aes_key: Option<String>,

    /// Output format
    #[arg(long, short = 'f', value_enum, default_value = "human", global = true)]
    format: OutputFormat,

    /// Only log warnings and errors
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Log debug details
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List the contents of one or more containers (alias: l)
    #[command(alias = "l")]
    List {
        /// .pak or .utoc files to list
        #[arg(required = true)]
        archives: Vec<PathBuf>,
    },

    /// Extract every file of a container (alias: x)
    #[command(alias = "x")]
    Extract {
        /// .pak or .utoc file to extract
        archive: PathBuf,

        /// Output directory
        output: PathBuf,

        /// Copy buffer size in bytes for uncompressed entries
        #[arg(long, default_value_t = paktools::read::DEFAULT_BUFFER_SIZE)]
        buffer_size: usize,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
}

fn init_logging(quiet: bool, verbose: bool) {
    let level = if quiet {
        "warn"
    } else if verbose {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        let name = cmd.get_name().to_string();
        generate(shell, &mut cmd, name, &mut std::io::stdout());
        std::process::exit(ExitCode::Success.code());
    }

    let keys = match keys::build_key_chain(cli.crypto_keys.as_deref(), cli.aes_key.as_deref()) {
        Ok(keys) => keys,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(exit_codes::error_to_exit_code(&e).code());
        }
    };

    let exit_code = match cli.command {
        Commands::List { archives } => commands::list(&archives, &keys, cli.format),

        Commands::Extract {
            archive,
            output,
            buffer_size,
        } => commands::extract(
            &commands::ExtractConfig {
                archive_path: &archive,
                output_dir: &output,
                buffer_size,
                format: cli.format,
                quiet: cli.quiet,
            },
            &keys,
        ),

        Commands::Completions { .. } => ExitCode::Success,
    };

    std::process::exit(exit_code.code());
}
