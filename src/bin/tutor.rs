//! CLI binary for edgequake-tutor.
//!
//! A thin shim over the library crate that maps CLI flags to `TutorConfig`,
//! runs one feature and prints the result.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_tutor::features::problems::parse_option;
use edgequake_tutor::{
    ChatSession, Credentials, Difficulty, ExportProgressCallback, Exportable, ProblemRequest,
    ProgressCallback, Selection, SimulationLanguage, SimulationRequest, Tutor, TutorConfig,
    TutorError, DEFAULT_MODEL, DEFAULT_PROVIDER,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

/// Spinner shown while waiting on the model. Hidden when `enabled` is false.
fn spinner(enabled: bool, msg: &str) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS),
    );
    bar.set_message(msg.to_string());
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

// ── CLI export progress using indicatif ──────────────────────────────────────

/// Renders a bar over rasterised blocks, then a one-line summary.
struct CliExportProgress {
    bar: ProgressBar,
}

impl CliExportProgress {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} blocks  {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS),
        );
        bar.set_prefix("Rendering");
        Arc::new(Self { bar })
    }
}

impl ExportProgressCallback for CliExportProgress {
    fn on_export_start(&self, total_blocks: usize) {
        self.bar.set_length(total_blocks as u64);
        self.bar.enable_steady_tick(Duration::from_millis(80));
    }

    fn on_block_rasterised(&self, _index: usize, _total: usize, _w: u32, _h: u32) {
        self.bar.inc(1);
    }

    fn on_page_finished(&self, page_num: usize) {
        self.bar.set_prefix("Writing");
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_export_complete(&self, pages: usize) {
        self.bar.finish_and_clear();
        eprintln!("{} PDF written ({} pages)", green("✔"), bold(&pages.to_string()));
    }

    fn on_export_failed(&self, _error: &str) {
        self.bar.abandon();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Socratic chat (type /export notes.pdf, /reset or /quit at the prompt)
  tutor chat

  # Three practice problems, answered interactively, exported with solutions
  tutor problems "動量守恆" --count 3 --export momentum.pdf --with-solutions

  # Explain a diagram from disk or the web
  tutor diagram ./free-body.png --question "Why is the normal force smaller here?"
  tutor diagram https://example.com/circuit.png --json

  # Generate a simulation and save the code
  tutor simulate "projectile motion with drag" --language python --save

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY      Google Gemini API key (default provider)
  OPENAI_API_KEY      OpenAI API key (with --provider openai)
  ANTHROPIC_API_KEY   Anthropic API key (with --provider anthropic)
  TUTOR_PROVIDER      Override provider
  TUTOR_MODEL         Override model ID
  RUST_LOG            Override log filter (e.g. edgequake_tutor=debug)
"#;

/// A Socratic science tutor in the terminal.
#[derive(Parser, Debug)]
#[command(
    name = "tutor",
    version,
    about = "Socratic tutoring, practice problems, diagram analysis and simulations from an LLM",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// LLM provider: gemini, openai, anthropic, ollama, ...
    #[arg(long, global = true, env = "TUTOR_PROVIDER", default_value = DEFAULT_PROVIDER)]
    provider: String,

    /// Model ID.
    #[arg(long, global = true, env = "TUTOR_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, global = true, env = "TUTOR_TEMPERATURE", default_value_t = 0.7)]
    temperature: f32,

    /// Max output tokens per reply.
    #[arg(long, global = true, env = "TUTOR_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// Attempts per model call, including the first.
    #[arg(long, global = true, env = "TUTOR_MAX_ATTEMPTS", default_value_t = 3)]
    max_attempts: u32,

    /// Delay before the first retry in milliseconds; doubles each time.
    #[arg(long, global = true, env = "TUTOR_RETRY_DELAY_MS", default_value_t = 1000)]
    retry_delay_ms: u64,

    /// Pixel width PDF blocks are rendered at.
    #[arg(long, global = true, env = "TUTOR_RENDER_WIDTH", default_value_t = 1240)]
    render_width: u32,

    /// HTTP timeout for diagram URLs in seconds.
    #[arg(long, global = true, env = "TUTOR_DOWNLOAD_TIMEOUT", default_value_t = 30)]
    download_timeout: u64,

    /// Disable spinners and progress bars.
    #[arg(long, global = true, env = "TUTOR_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "TUTOR_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and results.
    #[arg(short, long, global = true, env = "TUTOR_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Talk to the Socratic tutor.
    Chat {
        /// Text file replacing the built-in tutor persona.
        #[arg(long, env = "TUTOR_PERSONA_FILE")]
        persona_file: Option<PathBuf>,

        /// Export the transcript to this PDF when the session ends.
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// Generate multiple-choice practice problems.
    Problems {
        /// Topic, in any language.
        topic: String,

        /// Number of problems (1–10).
        #[arg(short = 'n', long, default_value_t = 3,
              value_parser = clap::value_parser!(u64).range(1..=10))]
        count: u64,

        #[arg(short, long, value_enum, default_value = "medium")]
        difficulty: DifficultyArg,

        /// Print the problems without asking for answers.
        #[arg(long)]
        no_quiz: bool,

        /// Include answers and worked solutions in the export.
        #[arg(long)]
        with_solutions: bool,

        #[arg(long)]
        export: Option<PathBuf>,

        /// Print the problem set as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Explain a diagram (PNG, JPEG, WebP or GIF; path or URL).
    Diagram {
        source: String,

        /// A specific question about the diagram.
        #[arg(long)]
        question: Option<String>,

        #[arg(long)]
        export: Option<PathBuf>,

        #[arg(long)]
        json: bool,
    },

    /// Generate interactive simulation code for a concept.
    Simulate {
        concept: String,

        #[arg(short, long, value_enum, default_value = "html")]
        language: LanguageArg,

        /// Write the code to a file named after the simulation.
        #[arg(long)]
        save: bool,

        #[arg(long)]
        export: Option<PathBuf>,

        #[arg(long)]
        json: bool,
    },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum DifficultyArg {
    Easy,
    Medium,
    Hard,
}

impl From<DifficultyArg> for Difficulty {
    fn from(v: DifficultyArg) -> Self {
        match v {
            DifficultyArg::Easy => Difficulty::Easy,
            DifficultyArg::Medium => Difficulty::Medium,
            DifficultyArg::Hard => Difficulty::Hard,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LanguageArg {
    Html,
    Python,
}

impl From<LanguageArg> for SimulationLanguage {
    fn from(v: LanguageArg) -> Self {
        match v {
            LanguageArg::Html => SimulationLanguage::Html,
            LanguageArg::Python => SimulationLanguage::Python,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let g = &cli.global;

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if g.verbose {
        "debug"
    } else if g.quiet {
        "error"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Credentials ──────────────────────────────────────────────────────
    // Checked up front so a missing key is one clear screen, not a failed
    // request halfway through a session.
    if let Err(e) = Credentials::from_env(&g.provider) {
        eprintln!("{}\n", red(&bold("✘ The tutor cannot start")));
        eprintln!("{e}");
        std::process::exit(2);
    }

    if let Err(e) = run(&cli).await {
        match e.downcast_ref::<TutorError>() {
            Some(te) => {
                tracing::debug!("{e:#}");
                eprintln!("{} {}", red("✘"), te.user_message());
            }
            None => eprintln!("{} {e:#}", red("✘")),
        }
        std::process::exit(1);
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let g = &cli.global;
    let show_progress = !g.quiet && !g.no_progress && io::stderr().is_terminal();

    let persona = match &cli.command {
        Command::Chat {
            persona_file: Some(path),
            ..
        } => Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read persona from {:?}", path))?,
        ),
        _ => None,
    };

    let config = build_config(g, persona, show_progress)?;
    let tutor = Tutor::new(config)?;

    match &cli.command {
        Command::Chat { export, .. } => run_chat(&tutor, export.as_deref(), show_progress).await,
        Command::Problems {
            topic,
            count,
            difficulty,
            no_quiz,
            with_solutions,
            export,
            json,
        } => {
            let request = ProblemRequest::new(topic.as_str(), *count as usize, (*difficulty).into())?;
            let bar = spinner(show_progress, "Writing problems…");
            let result = tutor.generate_problems(&request).await;
            bar.finish_and_clear();
            let set = result?;

            if *json {
                println!("{}", serde_json::to_string_pretty(&set)?);
            } else if *no_quiz || !io::stdin().is_terminal() {
                for (i, card) in set.cards().iter().enumerate() {
                    println!("{}", card.render(i + 1));
                }
            } else {
                run_quiz(&set).await?;
            }

            if let Some(path) = export {
                export_to(&tutor, &set.for_export(*with_solutions), path, g.quiet).await?;
            }
            Ok(())
        }
        Command::Diagram {
            source,
            question,
            export,
            json,
        } => {
            let bar = spinner(show_progress, "Looking at the diagram…");
            let result = tutor.analyze_diagram(source, question.as_deref()).await;
            bar.finish_and_clear();
            let report = result?;
            let a = &report.analysis;

            if *json {
                println!("{}", serde_json::to_string_pretty(a)?);
            } else {
                println!("{}\n{}\n", bold("Summary"), a.summary.trim());
                if !a.key_concepts.is_empty() {
                    println!("{}", bold("Key concepts"));
                    for c in &a.key_concepts {
                        println!("  • {}", c.trim());
                    }
                    println!();
                }
                println!("{}\n{}\n", bold("Explanation"), a.explanation.trim());
                if !a.follow_up_questions.is_empty() {
                    println!("{}", bold("Check yourself"));
                    for q in &a.follow_up_questions {
                        println!("  ? {}", q.trim());
                    }
                }
            }

            if let Some(path) = export {
                export_to(&tutor, &report, path, g.quiet).await?;
            }
            Ok(())
        }
        Command::Simulate {
            concept,
            language,
            save,
            export,
            json,
        } => {
            let request = SimulationRequest::new(concept.as_str(), (*language).into())?;
            let bar = spinner(show_progress, "Writing the simulation…");
            let result = tutor.generate_simulation(&request).await;
            bar.finish_and_clear();
            let sim = result?;

            if *json {
                println!("{}", serde_json::to_string_pretty(&sim)?);
            } else {
                println!("{}\n{}\n", bold(&sim.title), sim.description.trim());
                println!("{}", sim.code);
            }

            if *save {
                let path = PathBuf::from(sim.suggested_file_name());
                tokio::fs::write(&path, &sim.code)
                    .await
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                if !g.quiet {
                    eprintln!("{} Code saved to {}", green("✔"), bold(&path.display().to_string()));
                }
            }

            if let Some(path) = export {
                export_to(&tutor, &sim, path, g.quiet).await?;
            }
            Ok(())
        }
    }
}

/// Map CLI args to `TutorConfig`.
fn build_config(
    g: &GlobalArgs,
    persona: Option<String>,
    show_progress: bool,
) -> Result<TutorConfig> {
    let mut builder = TutorConfig::builder()
        .provider_name(&g.provider)
        .model(&g.model)
        .temperature(g.temperature)
        .max_tokens(g.max_tokens)
        .max_attempts(g.max_attempts)
        .initial_delay_ms(g.retry_delay_ms)
        .render_width_px(g.render_width)
        .download_timeout_secs(g.download_timeout);

    if let Some(p) = persona {
        builder = builder.persona(p);
    }
    if show_progress {
        let cb: ProgressCallback = CliExportProgress::new();
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

async fn export_to(tutor: &Tutor, item: &dyn Exportable, path: &Path, quiet: bool) -> Result<()> {
    let summary = tutor.export(item, path).await?;
    if !quiet {
        eprintln!(
            "   {} → {}",
            dim(&format!("{} blocks, {} bytes, {}ms", summary.blocks, summary.bytes, summary.duration_ms)),
            bold(&summary.path.display().to_string())
        );
    }
    Ok(())
}

// ── Interactive loops ────────────────────────────────────────────────────────

fn prompt(label: &str) -> Result<()> {
    print!("{label}");
    io::stdout().flush().context("Failed to flush stdout")
}

async fn run_chat(tutor: &Tutor, export: Option<&Path>, show_progress: bool) -> Result<()> {
    let mut session: ChatSession = tutor.chat_session();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!(
        "{} {}",
        cyan("◆"),
        dim("Ask anything. /export <file.pdf> saves the transcript, /reset starts over, /quit exits.")
    );

    loop {
        prompt(&bold("you › "))?;
        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            println!();
            break;
        };
        let line = line.trim();

        match line {
            "" => continue,
            "/quit" | "/exit" => break,
            "/reset" => {
                session.reset();
                println!("{}", dim("(conversation cleared)"));
                continue;
            }
            _ => {}
        }
        if let Some(path) = line.strip_prefix("/export") {
            let path = path.trim();
            if path.is_empty() {
                println!("{}", dim("usage: /export <file.pdf>"));
            } else if let Err(e) = tutor.export(&session, Path::new(path)).await {
                eprintln!("{} {}", red("✘"), e.user_message());
            }
            continue;
        }

        let bar = spinner(show_progress, "Thinking…");
        let result = session.next_turn(tutor, line).await;
        bar.finish_and_clear();
        match result {
            Ok(reply) => println!("{} {}\n", cyan("tutor ›"), reply),
            // The history is unchanged, so the student can simply retry.
            Err(e) => eprintln!("{} {}\n", red("✘"), e.user_message()),
        }
    }

    if let Some(path) = export {
        if session.is_empty() {
            eprintln!("{}", dim("Nothing to export."));
        } else {
            let summary = tutor.export(&session, path).await?;
            eprintln!("{} Transcript saved to {}", green("✔"), bold(&summary.path.display().to_string()));
        }
    }
    Ok(())
}

async fn run_quiz(set: &edgequake_tutor::ProblemSet) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut correct = 0;
    let total = set.problems.len();

    for (i, mut card) in set.cards().into_iter().enumerate() {
        println!("{}", card.render(i + 1));
        loop {
            prompt(&bold("answer (A-D) › "))?;
            let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
                return Ok(());
            };
            let Some(choice) = parse_option(&line) else {
                println!("{}", dim("Type a letter A-D."));
                continue;
            };
            match card.select(choice) {
                Ok(Selection::Correct) => {
                    correct += 1;
                    break;
                }
                Ok(_) => break,
                Err(e) => println!("{}", dim(&e.user_message())),
            }
        }
        println!("\n{}\n", card.render(i + 1));
    }

    println!(
        "{} {}/{} correct",
        if correct == total { green("✔") } else { cyan("◆") },
        bold(&correct.to_string()),
        total
    );
    Ok(())
}
