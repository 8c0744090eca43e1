//! The four tutoring features.
//!
//! Each module owns its request/response types, its call into
//! [`crate::tutor::Tutor`] and its [`crate::export::Exportable`] layout.
//! Prompts and schemas live in [`crate::prompts`].

pub mod chat;
pub mod diagram;
pub mod problems;
pub mod simulation;

pub use chat::ChatSession;
pub use diagram::{DiagramAnalysis, DiagramImage, DiagramReport};
pub use problems::{
    render_card, Difficulty, PracticeProblem, ProblemCard, ProblemRequest, ProblemSet,
    ProblemSheet, Selection,
};
pub use simulation::{SimulationCode, SimulationLanguage, SimulationRequest};
