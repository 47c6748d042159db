//! CLI command definitions, routing, and tracing setup.

use std::io::{self, BufRead, IsTerminal, Write};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use researcher_core::{Orchestrator, ProgressReporter};
use researcher_shared::{AppConfig, Phase, Question, RunOutput, init_config, load_config};
use tracing::info;

/// Used when no question is given on the command line or stdin.
const DEMO_QUESTION: &str = "What are the latest developments in quantum error correction?";

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Researcher: answer questions from live web search.
#[derive(Parser)]
#[command(
    name = "researcher",
    version,
    about = "Answer research questions with planned web searches and cited sources.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Research a question and print a cited answer.
    Ask {
        /// The question. Read from stdin when omitted.
        question: Option<String>,

        /// Print the run output as JSON.
        #[arg(long)]
        json: bool,

        /// Override the configured chat model.
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr so `--json`
/// output on stdout stays parseable.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "researcher=info",
        1 => "researcher=debug",
        _ => "researcher=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Ask {
            question,
            json,
            model,
        } => cmd_ask(question, json, model).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_ask(question: Option<String>, json: bool, model: Option<String>) -> Result<()> {
    dotenvy::dotenv().ok();

    let mut config = load_config()?;
    if let Some(model) = model {
        config.llm.model = model;
    }

    let raw = match question {
        Some(q) => q,
        None => read_question()?,
    };
    let text = question_or_demo(&raw);
    if text == DEMO_QUESTION {
        // stderr, so `--json` stdout stays parseable.
        eprintln!("Using demo question: {DEMO_QUESTION}");
    }
    let question = Question::parse(text)?;

    // Fails on missing API keys before any stage runs.
    let orchestrator = Orchestrator::from_config(&config)?;

    info!(%question, model = %config.llm.model, "starting research");

    let output = if json {
        orchestrator.run(&question, &researcher_core::SilentProgress).await
    } else {
        let reporter = CliProgress::new();
        orchestrator.run(&question, &reporter).await
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_report(&output);
    }

    Ok(())
}

/// The question to research: `raw`, or the demo question when `raw` is blank.
fn question_or_demo(raw: &str) -> &str {
    if raw.trim().is_empty() {
        DEMO_QUESTION
    } else {
        raw
    }
}

/// Prompt on a terminal, otherwise read the first line of piped stdin.
/// The prompt goes to stderr, like every other non-report line.
fn read_question() -> Result<String> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        eprint!("Enter your question (or press Enter for demo): ");
        io::stderr().flush()?;
    }

    let mut line = String::new();
    stdin
        .lock()
        .read_line(&mut line)
        .map_err(|e| eyre!("failed to read question from stdin: {e}"))?;
    Ok(line)
}

fn print_report(output: &RunOutput) {
    let rule = "=".repeat(80);

    println!();
    println!("{rule}");
    println!("  Question: {}", output.question);
    println!("{rule}");

    println!();
    println!("  Search queries:");
    for (i, query) in output.queries.iter().enumerate() {
        println!("    {}. {query}", i + 1);
    }

    println!();
    println!("  Key findings:");
    for (i, finding) in output.findings.iter().enumerate() {
        println!("    {}. {finding}", i + 1);
    }

    println!();
    println!("  Answer:");
    println!();
    for line in output.answer.lines() {
        println!("  {line}");
    }

    if !output.sources.is_empty() {
        println!();
        println!("  Sources:");
        for source in &output.sources {
            println!("    {source}");
        }
    }

    if output.is_degraded() {
        println!();
        println!("  Completed with {} error(s):", output.errors.len());
        for error in &output.errors {
            println!("    - {error}");
        }
    }

    println!();
    println!("  Time: {:.1}s", output.elapsed_ms as f64 / 1000.0);
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, phase: Phase) {
        self.spinner.set_message(phase.label().to_string());
    }

    fn query_finished(&self, query: &str, ok: bool, current: usize, total: usize) {
        let status = if ok { "done" } else { "failed" };
        self.spinner.set_message(format!("Searching [{current}/{total}] {query} ({status})"));
    }

    fn done(&self, _output: &RunOutput) {
        self.spinner.finish_and_clear();
    }
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_input_uses_demo_question() {
        assert_eq!(question_or_demo(""), DEMO_QUESTION);
        assert_eq!(question_or_demo("  \n"), DEMO_QUESTION);
        assert_eq!(question_or_demo("How do qubits decohere?\n"), "How do qubits decohere?\n");
    }

    #[test]
    fn ask_accepts_json_flag_and_model_override() {
        let cli = Cli::parse_from([
            "researcher",
            "ask",
            "Why is the sky blue?",
            "--json",
            "-m",
            "gpt-4o-mini",
        ]);
        match cli.command {
            Command::Ask {
                question,
                json,
                model,
            } => {
                assert_eq!(question.as_deref(), Some("Why is the sky blue?"));
                assert!(json);
                assert_eq!(model.as_deref(), Some("gpt-4o-mini"));
            }
            Command::Config { .. } => panic!("expected ask"),
        }
    }
}
