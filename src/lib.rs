//! # edgequake-tutor
//!
//! A Socratic science tutor on top of a hosted LLM: guided chat, practice
//! problems, diagram analysis and simulation code, each exportable to a
//! paginated PDF.
//!
//! ## Architecture
//!
//! ```text
//!            ┌──────────── Tutor (config + backend) ────────────┐
//!            │                                                  │
//!  chat ─────┤                                                  │
//!  problems ─┼─► GenerationRequest ─► retry ─► backend ─► parse ─┤
//!  diagram ──┤              (backoff + jitter)   (edgequake-llm) │
//!  simulate ─┘                                                  │
//!                                                               ▼
//!  Exportable ─► SVG blocks ─► resvg ─► paginate ─► pdf-writer ─► file
//! ```
//!
//! Transient service failures (overload, rate limits, dropped connections,
//! empty replies) are retried with exponential backoff. Structured replies
//! are decoded from JSON after stripping any markdown fence. Export never
//! splits a block across pages and never leaves a partial file behind.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_tutor::{Difficulty, ProblemRequest, Tutor, TutorConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads GEMINI_API_KEY
//!     let tutor = Tutor::new(TutorConfig::default())?;
//!
//!     let request = ProblemRequest::new("動量守恆", 3, Difficulty::Medium)?;
//!     let set = tutor.generate_problems(&request).await?;
//!     for (i, card) in set.cards().iter().enumerate() {
//!         println!("{}", card.render(i + 1));
//!     }
//!
//!     tutor.export(&set.for_export(true), "momentum.pdf".as_ref()).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `tutor` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! ```toml
//! edgequake-tutor = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod export;
pub mod features;
pub mod generation;
pub mod progress;
pub mod prompts;
pub mod tutor;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{Credentials, TutorConfig, TutorConfigBuilder, DEFAULT_MODEL, DEFAULT_PROVIDER};
pub use error::TutorError;
pub use export::{
    ContentBlock, DocumentBuilder, ExportOptions, ExportSummary, Exportable, PageLayout,
    Rasterizer, SvgRasterizer,
};
pub use features::{
    ChatSession, DiagramAnalysis, DiagramReport, Difficulty, PracticeProblem, ProblemCard,
    ProblemRequest, ProblemSet, Selection, SimulationCode, SimulationLanguage, SimulationRequest,
};
pub use generation::{
    GenerationBackend, GenerationRequest, GenerationResponse, LlmBackend, RetryPolicy,
};
pub use progress::{ExportProgressCallback, NoopProgressCallback, ProgressCallback};
pub use tutor::Tutor;
