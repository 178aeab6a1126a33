use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "archlens")]
#[command(
    version,
    about = "Conversational architecture assistant: C4 diagrams from your repositories"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true)]
    verbose: bool,

    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize archlens in the current directory
    Init {
        #[arg(long, short, help = "Overwrite existing initialization")]
        force: bool,
        #[arg(long, help = "Directory whose subdirectories are repositories")]
        repos: Option<PathBuf>,
    },

    /// Manage agents
    Agent {
        #[command(subcommand)]
        action: AgentAction,
    },

    /// Send one message to an agent
    Ask {
        #[arg(long, short, help = "Agent name or id")]
        agent: String,
        #[arg(help = "Message, e.g. \"show architecture\"")]
        message: String,
        #[arg(long, help = "Print the turn trace as JSON")]
        trace: bool,
    },

    /// Interactive session with an agent (one message per line)
    Chat {
        #[arg(long, short, help = "Agent name or id")]
        agent: String,
    },

    /// Inspect and export diagrams
    Diagram {
        #[command(subcommand)]
        action: DiagramAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Show project status
    Status {
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            help = "Output format: text, json"
        )]
        format: String,
    },
}

#[derive(Subcommand)]
enum AgentAction {
    /// Create a new agent
    Create { name: String },
    /// List agents
    List {
        #[arg(short = 'f', long, default_value = "text", help = "Output format: text, json")]
        format: String,
    },
    /// Delete an agent (its diagrams are kept)
    Delete { name: String },
    /// Show an agent's context
    Show {
        name: String,
        #[arg(short = 'f', long, default_value = "text", help = "Output format: text, json")]
        format: String,
    },
}

#[derive(Subcommand)]
enum DiagramAction {
    /// List diagrams
    List,
    /// Show or export a diagram
    Show {
        id: String,
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            help = "Output format: text, json, dot, mermaid"
        )]
        format: String,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show {
        #[arg(short = 'g', long, help = "Show global config file only")]
        global: bool,
        #[arg(
            short = 'f',
            long,
            default_value = "toml",
            help = "Output format: toml, json"
        )]
        format: String,
    },
    /// Show configuration file paths
    Path,
    /// Initialize configuration
    Init {
        #[arg(long, short, help = "Initialize global config")]
        global: bool,
        #[arg(long, help = "Overwrite existing config")]
        force: bool,
    },
}

/// Set up panic handler for graceful error reporting
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\n\x1b[1;31m━━━ PANIC ━━━\x1b[0m");
        eprintln!("\x1b[31marchlens encountered an unexpected error:\x1b[0m");
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mLocation: {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }
        eprintln!();

        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    use archlens::cli::commands;

    match cli.command {
        Commands::Init { force, repos } => {
            commands::init::run(force, repos.as_deref())?;
        }
        Commands::Agent { action } => {
            let rt = Runtime::new()?;
            match action {
                AgentAction::Create { name } => rt.block_on(commands::agent::create(&name))?,
                AgentAction::List { format } => commands::agent::list(&format)?,
                AgentAction::Delete { name } => rt.block_on(commands::agent::delete(&name))?,
                AgentAction::Show { name, format } => {
                    rt.block_on(commands::agent::show(&name, &format))?
                }
            }
        }
        Commands::Ask {
            agent,
            message,
            trace,
        } => {
            let rt = Runtime::new()?;
            rt.block_on(commands::ask::ask(&agent, &message, trace))?;
        }
        Commands::Chat { agent } => {
            let rt = Runtime::new()?;
            rt.block_on(commands::ask::chat(&agent))?;
        }
        Commands::Diagram { action } => match action {
            DiagramAction::List => commands::diagram::list()?,
            DiagramAction::Show { id, format } => commands::diagram::show(&id, &format)?,
        },
        Commands::Config { action } => match action {
            ConfigAction::Show { global, format } => {
                commands::config::show(global, &format)?;
            }
            ConfigAction::Path => {
                commands::config::path()?;
            }
            ConfigAction::Init { global, force } => {
                if global {
                    commands::config::init_global(force)?;
                } else {
                    commands::config::init_project()?;
                }
            }
        },
        Commands::Status { format } => {
            commands::status::run(&format)?;
        }
    }

    Ok(())
}
