mod commands;
mod config;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::{exit_code_for, parse_rev_assignment};
use config::CliConfig;
use envflake_schema::{InputName, Revision};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "envflake",
    version,
    about = "Load and validate declarative development-shell descriptors"
)]
struct Cli {
    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Validate a descriptor and report a summary.
    Check {
        /// Path to descriptor TOML file.
        descriptor: Option<PathBuf>,
    },
    /// List declared inputs with their locators and pin state.
    Inputs {
        /// Path to descriptor TOML file.
        descriptor: Option<PathBuf>,
    },
    /// Show the packages of the shell declared for a platform.
    Shell {
        /// Path to descriptor TOML file.
        descriptor: Option<PathBuf>,
        /// Platform identifier (defaults to config, then the host).
        #[arg(long)]
        platform: Option<String>,
    },
    /// List the platforms that declare a shell.
    Platforms {
        /// Path to descriptor TOML file.
        descriptor: Option<PathBuf>,
    },
    /// Print the deterministic descriptor identity.
    Id {
        /// Path to descriptor TOML file.
        descriptor: Option<PathBuf>,
    },
    /// Check or set pinned input revisions in a descriptor.
    Pin {
        /// Path to descriptor TOML file.
        descriptor: Option<PathBuf>,
        /// Exit non-zero if any input is not pinned.
        #[arg(long, default_value_t = false)]
        check: bool,
        /// Pin an input, as <input>=<rev>. May be repeated.
        #[arg(long = "set", value_parser = parse_rev_assignment)]
        set: Vec<(InputName, Revision)>,
    },
    /// Write or verify the lock file next to the descriptor.
    Lock {
        /// Path to descriptor TOML file.
        descriptor: Option<PathBuf>,
        /// Revision for an unpinned input, as <input>=<rev>. May be repeated.
        #[arg(long = "rev", value_parser = parse_rev_assignment)]
        revs: Vec<(InputName, Revision)>,
        /// Verify the existing lock file instead of writing one.
        #[arg(long, default_value_t = false, conflicts_with = "revs")]
        verify: bool,
    },
    /// Write a new descriptor from a built-in preset.
    New {
        /// Preset to start from.
        #[arg(long, default_value = "minimal")]
        template: String,
        /// Destination file.
        #[arg(long, default_value = commands::DEFAULT_DESCRIPTOR)]
        output: PathBuf,
        /// Overwrite an existing file.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// List built-in presets.
    Presets,
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
    /// Generate man pages in the specified directory.
    ManPages {
        /// Output directory for man pages.
        #[arg(default_value = "man")]
        dir: PathBuf,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("ENVFLAKE_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    match dispatch(cli.command, cli.json) {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            ExitCode::from(exit_code_for(&msg))
        }
    }
}

/// Run one command. Only commands that take a descriptor or a platform read
/// the user config, so a broken config never blocks `new` or `presets`.
fn dispatch(command: Commands, json: bool) -> Result<u8, String> {
    match command {
        Commands::Check { descriptor } => {
            let config = CliConfig::load_default()?;
            commands::check::run(&config.descriptor_path(descriptor), json)
        }
        Commands::Inputs { descriptor } => {
            let config = CliConfig::load_default()?;
            commands::inputs::run(&config.descriptor_path(descriptor), json)
        }
        Commands::Shell {
            descriptor,
            platform,
        } => {
            let config = CliConfig::load_default()?;
            let platform = config.platform(platform.as_deref())?;
            commands::shell::run(&config.descriptor_path(descriptor), platform, json)
        }
        Commands::Platforms { descriptor } => {
            let config = CliConfig::load_default()?;
            commands::platforms::run(&config.descriptor_path(descriptor), json)
        }
        Commands::Id { descriptor } => {
            let config = CliConfig::load_default()?;
            commands::id::run(&config.descriptor_path(descriptor), json)
        }
        Commands::Pin {
            descriptor,
            check,
            set,
        } => {
            let config = CliConfig::load_default()?;
            commands::pin::run(&config.descriptor_path(descriptor), check, &set, json)
        }
        Commands::Lock {
            descriptor,
            revs,
            verify,
        } => {
            let config = CliConfig::load_default()?;
            commands::lock::run(&config.descriptor_path(descriptor), &revs, verify, json)
        }
        Commands::New {
            template,
            output,
            force,
        } => commands::new::run(&template, &output, force, json),
        Commands::Presets => commands::presets::run(json),
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
        Commands::ManPages { dir } => commands::man_pages::run::<Cli>(&dir),
    }
}
