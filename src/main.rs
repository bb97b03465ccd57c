//! Gemini Terminal: an interactive assistant for the command line.
//!
//! Usage:
//!   gemini-terminal                     Start the interactive chat
//!   gemini-terminal tool <name> [args]  Run one tool and print its result
//!   gemini-terminal interpret <text>    Show how input would be routed
//!   gemini-terminal tools               List the available tools
//!   gemini-terminal init                Write a default config file

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use gemini_terminal::config::{self, AssistantConfig};
use gemini_terminal::intent::{IntentChain, SessionContext};
use gemini_terminal::repl::Repl;
use gemini_terminal::tools::{Dispatcher, ToolContext, ToolRegistry};
use gemini_terminal::ui::{PresentationContext, Presenter, Theme};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "gemini-terminal")]
#[command(version)]
#[command(about = "Terminal assistant backed by Gemini with local tools")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to the config file (default: ~/.gemini-terminal/config.toml).
    #[arg(long)]
    config: Option<String>,

    /// Model to use for this session.
    #[arg(long)]
    model: Option<String>,

    /// Log level (trace, debug, info, warn, error). Overrides the config.
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the interactive chat (default).
    Chat,

    /// Run a single tool and print its result.
    Tool {
        name: String,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Show which handler a phrase would be routed to.
    Interpret {
        #[arg(required = true, trailing_var_arg = true)]
        phrase: Vec<String>,
    },

    /// List the available tools.
    Tools,

    /// Write a default config file if none exists.
    Init,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .as_deref()
        .map(config::resolve_path)
        .unwrap_or_else(config::default_config_path);
    let mut cfg = config::load_config(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    config::apply_env(&mut cfg);

    // Logs go to stderr so the REPL output stays clean.
    let level = cli.log_level.clone().unwrap_or_else(|| cfg.log_level.clone());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Some(model) = &cli.model {
        if config::is_known_model(model) {
            cfg.model = model.clone();
        } else {
            warn!("Ignoring unknown model '{}', keeping {}", model, cfg.model);
        }
    }

    let registry = Arc::new(ToolRegistry::builtin().context("Failed to build tool registry")?);
    let presenter = Presenter::new(PresentationContext {
        color: std::io::stdout().is_terminal(),
        theme: Theme::from_name(&cfg.theme),
    });

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => cmd_chat(cfg, config_path, registry, presenter).await,
        Commands::Tool { name, args } => cmd_tool(&cfg, registry, presenter, &name, &args).await,
        Commands::Interpret { phrase } => cmd_interpret(registry, &phrase.join(" ")),
        Commands::Tools => cmd_tools(&registry, presenter),
        Commands::Init => cmd_init(&cfg, &config_path),
    }
}

// ---------------------------------------------------------------------------
// Command implementations
// ---------------------------------------------------------------------------

async fn cmd_chat(
    cfg: AssistantConfig,
    config_path: PathBuf,
    registry: Arc<ToolRegistry>,
    presenter: Presenter,
) -> Result<()> {
    if cfg.api_key.trim().is_empty() {
        eprintln!(
            "{} No API key found. Set {} or add api_key to {}",
            "Error:".red().bold(),
            config::API_KEY_ENV,
            config_path.display()
        );
        std::process::exit(1);
    }

    info!(
        "Starting chat (model: {}, tools: {}, execution: {})",
        cfg.model, cfg.enable_tools, cfg.allow_execution
    );
    let mut repl = Repl::new(cfg, config_path, registry, presenter)?;
    repl.run().await
}

async fn cmd_tool(
    cfg: &AssistantConfig,
    registry: Arc<ToolRegistry>,
    presenter: Presenter,
    name: &str,
    args: &[String],
) -> Result<()> {
    let Some(descriptor) = registry.lookup_ignore_case(name) else {
        bail!("Unknown tool '{}'. Run `gemini-terminal tools` to list them.", name);
    };
    let name = descriptor.name.clone();

    let dispatcher = Dispatcher::new(
        registry.clone(),
        ToolContext {
            allow_execution: cfg.allow_execution,
            ..ToolContext::default()
        },
    );
    let result = dispatcher.execute(&name, &join_args(args)).await;
    println!("{}", presenter.tool_result(&name, &result));
    if result.is_error() {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_interpret(registry: Arc<ToolRegistry>, phrase: &str) -> Result<()> {
    let chain = IntentChain::new(registry);
    println!("{:#?}", chain.resolve(phrase, &SessionContext::default()));
    Ok(())
}

fn cmd_tools(registry: &ToolRegistry, presenter: Presenter) -> Result<()> {
    let entries: Vec<(String, String)> = registry
        .list()
        .map(|d| (d.name.clone(), d.usage.clone()))
        .collect();
    println!("{}", presenter.listing("Available Tools", &entries));
    Ok(())
}

fn cmd_init(cfg: &AssistantConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("Config already exists at {}", config_path.display());
        return Ok(());
    }
    config::save_settings(cfg, config_path)?;
    println!("{} Wrote {}", ">>>".green().bold(), config_path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Rebuild a single argument string, re-quoting words the shell split.
fn join_args(args: &[String]) -> String {
    args.iter()
        .map(|a| {
            if a.is_empty() || a.contains(char::is_whitespace) || a.contains('"') {
                format!("\"{}\"", a.replace('\\', "\\\\").replace('"', "\\\""))
            } else {
                a.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
