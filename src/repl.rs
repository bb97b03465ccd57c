//! Interactive read-eval-print loop.
//!
//! Lines starting with `/` are REPL commands. Everything else goes
//! through the [`IntentChain`]: local tools first, the model last.

use crate::agent::session::{self, default_session_file};
use crate::agent::{TurnController, TurnOutcome};
use crate::config::{self, AssistantConfig, AVAILABLE_MODELS};
use crate::intent::{Intent, IntentChain, SessionContext, Stage};
use crate::model::GeminiClient;
use crate::tools::{Dispatcher, ToolContext, ToolRegistry};
use crate::types::ToolResult;
use crate::ui::Presenter;
use anyhow::{bail, Context, Result};
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const COMMANDS: &[(&str, &str)] = &[
    ("/help", "Show this help"),
    ("/exit", "Leave the assistant"),
    ("/tools", "List available tools"),
    ("/config", "Show the current configuration"),
    ("/save [file]", "Save the conversation as JSON"),
    ("/load <file>", "Load a saved conversation"),
    ("/clear", "Clear the conversation history"),
    ("/interpret <text>", "Show how input would be routed, without running it"),
    ("/context [key=value|clear]", "Show or edit the session context"),
    ("/summary", "Ask the model to summarize the conversation"),
    ("/system [message]", "Show or set the system message"),
    ("/models [name]", "List models or switch to one"),
    ("/execute <command>", "Run a shell command"),
    ("/git_status [path]", "Show git status"),
    ("/git_diff <a> <b>", "Diff two files with git"),
    ("/git_log [path] [--count=N]", "Show recent commits"),
    ("/lint [path]", "Lint Python code with flake8"),
    ("/ps", "List running processes"),
    ("/find_large [path] [--count=N]", "Find the largest files"),
    ("/ping <host>", "Ping a host"),
    ("/curl <url>", "Fetch a URL"),
];

/// Slash commands that run a tool directly: (command, tool, default args).
const TOOL_COMMANDS: &[(&str, &str, &str)] = &[
    ("/execute", "shell", ""),
    ("/git_status", "git_status", ""),
    ("/git_diff", "git_diff", ""),
    ("/git_log", "git_log", ""),
    ("/lint", "lint", "."),
    ("/ps", "ps", ""),
    ("/find_large", "find_large", ""),
    ("/ping", "ping", ""),
    ("/curl", "curl", ""),
];

enum Flow {
    Continue,
    Exit,
}

pub struct Repl {
    config: AssistantConfig,
    config_path: PathBuf,
    client: GeminiClient,
    controller: TurnController,
    dispatcher: Dispatcher,
    chain: IntentChain,
    context: SessionContext,
    presenter: Presenter,
}

impl Repl {
    pub fn new(
        config: AssistantConfig,
        config_path: PathBuf,
        registry: Arc<ToolRegistry>,
        presenter: Presenter,
    ) -> Result<Self> {
        let dispatcher = Dispatcher::new(
            registry.clone(),
            ToolContext {
                allow_execution: config.allow_execution,
                ..ToolContext::default()
            },
        );
        let client = build_client(&config, &registry)?;
        let controller = TurnController::new(
            Arc::new(client.clone()),
            dispatcher.clone(),
            config.max_follow_ups,
        );

        Ok(Self {
            config,
            config_path,
            client,
            controller,
            dispatcher,
            chain: IntentChain::new(registry),
            context: SessionContext::default(),
            presenter,
        })
    }

    /// Read lines until `/exit` or end of input.
    pub async fn run(&mut self) -> Result<()> {
        println!(
            "{}",
            self.presenter.info(&format!(
                "Gemini Terminal ({}). Type /help for commands, /exit to quit.",
                self.config.model
            ))
        );

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            print!(
                "{}",
                self.presenter.prompt(
                    self.controller.history().user_message_count(),
                    self.controller.model_name()
                )
            );
            std::io::stdout().flush().ok();

            let line = tokio::select! {
                line = lines.next_line() => line.context("Failed to read input")?,
                _ = tokio::signal::ctrl_c() => {
                    println!("\n{}", self.presenter.warning("Use /exit to quit."));
                    continue;
                }
            };
            let Some(line) = line else {
                println!();
                break;
            };

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match self.handle_line(line).await {
                Ok(Flow::Exit) => break,
                Ok(Flow::Continue) => {}
                Err(e) => println!("{}", self.presenter.error(&format!("{:#}", e))),
            }
        }

        info!("REPL finished");
        Ok(())
    }

    async fn handle_line(&mut self, line: &str) -> Result<Flow> {
        if line.starts_with('/') {
            let (command, args) = split_command(line);
            return self.handle_command(&command, args).await;
        }

        match self.chain.resolve(line, &self.context) {
            Intent::Tool { stage, name, args } => {
                let title = match stage {
                    Stage::Interpreter => format!("Interpreted: {}", name),
                    Stage::Prefix => format!("Tool Result ({})", name),
                    Stage::Intercept => intercept_title(&name).to_string(),
                };
                self.run_tool(&name, &args, &title).await;
            }
            Intent::ChangeDirectory(dir) => self.change_directory(&dir)?,
            Intent::Model(text) => self.chat(&text).await?,
        }
        Ok(Flow::Continue)
    }

    async fn handle_command(&mut self, command: &str, args: &str) -> Result<Flow> {
        if let Some((_, tool, default)) = TOOL_COMMANDS.iter().find(|(c, _, _)| *c == command) {
            let args = if args.is_empty() { *default } else { args };
            self.run_tool(tool, args, &format!("/{}", tool)).await;
            return Ok(Flow::Continue);
        }

        match command {
            "/exit" | "/quit" => return Ok(Flow::Exit),
            "/help" => {
                let entries: Vec<(String, String)> = COMMANDS
                    .iter()
                    .map(|(c, d)| (c.to_string(), d.to_string()))
                    .collect();
                println!("{}", self.presenter.listing("Commands", &entries));
                println!(
                    "{}",
                    self.presenter
                        .info("Anything else is interpreted locally or sent to the model.")
                );
            }
            "/tools" => {
                let entries: Vec<(String, String)> = self
                    .dispatcher
                    .registry()
                    .list()
                    .map(|d| (d.name.clone(), d.description.clone()))
                    .collect();
                println!("{}", self.presenter.listing("Available Tools", &entries));
            }
            "/config" => {
                let mut entries: Vec<(String, String)> = self
                    .config
                    .display_rows()
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v))
                    .collect();
                entries.push(("Config Path".into(), self.config_path.display().to_string()));
                println!("{}", self.presenter.listing("Configuration", &entries));
            }
            "/save" => {
                let file = if args.is_empty() {
                    default_session_file()
                } else {
                    args.to_string()
                };
                let path = config::resolve_path(&file);
                session::save_session(&path, self.controller.model_name(), self.controller.history())?;
                println!(
                    "{}",
                    self.presenter
                        .success(&format!("Conversation saved to {}", path.display()))
                );
            }
            "/load" => {
                if args.is_empty() {
                    bail!("Usage: /load <file>");
                }
                let loaded = session::load_session(&config::resolve_path(args))?;
                let count = loaded.history.len();
                self.controller.replace_history(loaded.history);
                if config::is_known_model(&loaded.model) && loaded.model != self.config.model {
                    self.switch_model(&loaded.model);
                }
                println!(
                    "{}",
                    self.presenter
                        .success(&format!("Loaded {} messages from {}", count, args))
                );
                if let Some(last) = self.controller.history().last() {
                    println!("{}", self.presenter.info(&format!("Last message: {}", last.preview(200))));
                }
            }
            "/clear" => {
                self.controller.clear_history();
                println!("{}", self.presenter.success("Conversation history cleared."));
            }
            "/interpret" => {
                if args.is_empty() {
                    bail!("Usage: /interpret <text>");
                }
                println!("{}", describe_intent(&self.chain.resolve(args, &self.context)));
            }
            "/context" => self.context_command(args)?,
            "/summary" => self.summary().await,
            "/system" => {
                if args.is_empty() {
                    println!("{}", self.presenter.listing(
                        "System Message",
                        &[("Current".into(), self.config.system_message.clone())],
                    ));
                } else {
                    self.config.system_message = args.to_string();
                    self.rebuild_client()?;
                    config::save_settings(&self.config, &self.config_path)?;
                    println!("{}", self.presenter.success("System message updated."));
                }
            }
            "/models" => {
                if args.is_empty() {
                    let entries: Vec<(String, String)> = AVAILABLE_MODELS
                        .iter()
                        .map(|(name, desc)| {
                            let marker = if *name == self.config.model { " (current)" } else { "" };
                            (name.to_string(), format!("{}{}", desc, marker))
                        })
                        .collect();
                    println!("{}", self.presenter.listing("Available Models", &entries));
                } else if config::is_known_model(args) {
                    self.switch_model(args);
                    config::save_settings(&self.config, &self.config_path)?;
                    println!("{}", self.presenter.success(&format!("Model changed to: {}", args)));
                } else {
                    bail!("Unknown model '{}'. Use /models to list available models.", args);
                }
            }
            other => {
                println!(
                    "{}",
                    self.presenter
                        .warning(&format!("Unknown command: {}. Type /help for commands.", other))
                );
            }
        }
        Ok(Flow::Continue)
    }

    /// Run one tool, letting Ctrl-C abandon it.
    async fn run_tool(&self, name: &str, args: &str, title: &str) {
        debug!("Running {} with '{}'", name, args);
        let cancel = CancellationToken::new();
        let result = with_interrupt(&cancel, async {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                r = self.dispatcher.execute(name, args) => Some(r),
            }
        })
        .await
        .unwrap_or_else(|| ToolResult::error("interrupted by user"));
        println!("{}", self.presenter.tool_result(title, &result));
    }

    async fn chat(&mut self, text: &str) -> Result<()> {
        if self.config.api_key.is_empty() {
            bail!(
                "No API key configured. Set {} or api_key in {}",
                config::API_KEY_ENV,
                self.config_path.display()
            );
        }

        let cancel = CancellationToken::new();
        let controller = &mut self.controller;
        let outcome = with_interrupt(&cancel, controller.run_turn(text, &cancel)).await;

        match outcome {
            TurnOutcome::Response { text, tool_calls } => {
                println!("{}", self.presenter.model_reply(&text, &tool_calls));
            }
            TurnOutcome::Failed(e) => println!("{}", self.presenter.error(&e.to_string())),
            TurnOutcome::Interrupted => {
                println!("{}", self.presenter.warning("Turn interrupted."));
            }
        }
        Ok(())
    }

    async fn summary(&self) {
        if self.controller.history().is_empty() {
            println!("{}", self.presenter.warning("No conversation history to summarize."));
            return;
        }
        let context = (!self.context.is_empty()).then(|| self.context.to_json().to_string());

        let cancel = CancellationToken::new();
        let result = with_interrupt(&cancel, async {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                r = self.controller.summarize(context.as_deref()) => Some(r),
            }
        })
        .await;

        match result {
            None => println!("{}", self.presenter.warning("Summary interrupted.")),
            Some(Err(e)) => println!(
                "{}",
                self.presenter.error(&format!("Error generating summary: {}", e))
            ),
            Some(Ok(text)) if text.trim().is_empty() => println!(
                "{}",
                self.presenter.warning("Failed to generate a summary (or summary was empty).")
            ),
            Some(Ok(text)) => println!("{}", self.presenter.model_reply(&text, &[])),
        }
    }

    fn context_command(&mut self, args: &str) -> Result<()> {
        if args.is_empty() {
            let shown = if self.context.is_empty() {
                "[Context is empty]".to_string()
            } else {
                serde_json::to_string_pretty(&self.context.to_json())?
            };
            println!("{}", self.presenter.listing("Current Context", &[]));
            println!("{}", shown);
        } else if args.eq_ignore_ascii_case("clear") {
            self.context = SessionContext::default();
            println!("{}", self.presenter.success("Context cleared."));
        } else if let Some((key, value)) = args.split_once('=') {
            let (key, value) = (key.trim(), value.trim());
            if key == "current_dir" {
                self.change_directory(value)?;
            } else {
                self.context.notes.insert(key.to_string(), value.to_string());
                println!(
                    "{}",
                    self.presenter
                        .success(&format!("Context updated: {} = {}", key, value))
                );
            }
        } else {
            bail!("Usage: /context or /context clear or /context <key>=<value>");
        }
        Ok(())
    }

    fn change_directory(&mut self, dir: &str) -> Result<()> {
        let resolved = resolve_directory(dir, self.context.current_dir.as_deref())?;
        std::env::set_current_dir(&resolved)
            .with_context(|| format!("Cannot change directory to {}", resolved.display()))?;
        info!("Working directory set to {}", resolved.display());
        println!(
            "{}",
            self.presenter
                .info(&format!("Context: current directory is now '{}'", resolved.display()))
        );
        self.context.current_dir = Some(resolved);
        Ok(())
    }

    fn switch_model(&mut self, model: &str) {
        self.config.model = model.to_string();
        self.client = self.client.with_model(model);
        self.controller.set_model(Arc::new(self.client.clone()));
    }

    fn rebuild_client(&mut self) -> Result<()> {
        self.client = build_client(&self.config, self.dispatcher.registry())?;
        self.controller.set_model(Arc::new(self.client.clone()));
        Ok(())
    }
}

fn build_client(config: &AssistantConfig, registry: &ToolRegistry) -> Result<GeminiClient> {
    let declarations = if config.enable_tools {
        registry.declarations()
    } else {
        Vec::new()
    };
    GeminiClient::new(config, declarations)
}

/// Drive `work` to completion, cancelling `cancel` on Ctrl-C.
async fn with_interrupt<F: Future>(cancel: &CancellationToken, work: F) -> F::Output {
    let token = cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });
    let output = work.await;
    watcher.abort();
    output
}

/// Split `/cmd rest` into a lowercased command and trimmed arguments.
fn split_command(line: &str) -> (String, &str) {
    match line.split_once(char::is_whitespace) {
        Some((cmd, rest)) => (cmd.to_lowercase(), rest.trim()),
        None => (line.to_lowercase(), ""),
    }
}

fn intercept_title(tool: &str) -> &'static str {
    match tool {
        "sys_info" => "System Information",
        "git_status" => "Git Status",
        "ps" => "Process List",
        _ => "Tool Result",
    }
}

fn describe_intent(intent: &Intent) -> String {
    match intent {
        Intent::Tool { stage, name, args } => {
            format!("Stage: {}\nTool: {}\nArgs: {}", stage, name, args)
        }
        Intent::ChangeDirectory(dir) => format!("Stage: interpreter\nChange directory: {}", dir),
        Intent::Model(text) => format!("Stage: model\nSent to model: {}", text),
    }
}

/// Resolve a `cd` target against the context directory (or the process
/// working directory) and require that it exists.
pub fn resolve_directory(input: &str, base: Option<&Path>) -> Result<PathBuf> {
    let expanded = config::resolve_path(input);
    let joined = if expanded.is_absolute() {
        expanded
    } else {
        match base {
            Some(base) => base.join(expanded),
            None => std::env::current_dir()
                .context("Cannot determine current directory")?
                .join(expanded),
        }
    };
    let resolved = joined
        .canonicalize()
        .map_err(|_| anyhow::anyhow!("Directory not found: {}", joined.display()))?;
    if !resolved.is_dir() {
        warn!("{} is not a directory", resolved.display());
        bail!("Not a directory: {}", resolved.display());
    }
    Ok(resolved)
}
