//! Multiple-choice practice problems.
//!
//! The model returns a JSON array of problems; each is validated (exactly
//! four options, correct index in range) before it reaches the student.
//! [`ProblemCard`] holds the answering state: the solution stays hidden until
//! an option has been selected, and the first selection is final.

use crate::error::TutorError;
use crate::export::{DocumentBuilder, Exportable};
use crate::generation::GenerationRequest;
use crate::prompts;
use crate::tutor::Tutor;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

/// Number of options every problem carries.
pub const OPTION_COUNT: usize = 4;

/// Upper bound on problems per request.
pub const MAX_PROBLEMS: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        })
    }
}

impl FromStr for Difficulty {
    type Err = TutorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(TutorError::InvalidInput(format!(
                "Unknown difficulty '{other}'. Use easy, medium or hard."
            ))),
        }
    }
}

/// What to generate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProblemRequest {
    pub topic: String,
    pub count: usize,
    pub difficulty: Difficulty,
}

impl ProblemRequest {
    /// Validate and build a request. `count` must be in `1..=10`.
    pub fn new(
        topic: impl Into<String>,
        count: usize,
        difficulty: Difficulty,
    ) -> Result<Self, TutorError> {
        let topic = topic.into().trim().to_string();
        if topic.is_empty() {
            return Err(TutorError::InvalidInput("Enter a topic first.".into()));
        }
        if !(1..=MAX_PROBLEMS).contains(&count) {
            return Err(TutorError::InvalidInput(format!(
                "Ask for between 1 and {MAX_PROBLEMS} problems (got {count})."
            )));
        }
        Ok(Self {
            topic,
            count,
            difficulty,
        })
    }
}

/// One problem as decoded from the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PracticeProblem {
    pub question: String,
    pub options: Vec<String>,
    /// 0-based index into `options`.
    pub correct_option: usize,
    pub solution: String,
}

impl PracticeProblem {
    fn validate(&self, index: usize) -> Result<(), TutorError> {
        let malformed = |detail: String| TutorError::MalformedResponse { detail };
        if self.question.trim().is_empty() {
            return Err(malformed(format!("problem {} has no question", index + 1)));
        }
        if self.options.len() != OPTION_COUNT {
            return Err(malformed(format!(
                "problem {} has {} options, expected {OPTION_COUNT}",
                index + 1,
                self.options.len()
            )));
        }
        if self.correct_option >= OPTION_COUNT {
            return Err(malformed(format!(
                "problem {} marks option {} correct",
                index + 1,
                self.correct_option
            )));
        }
        Ok(())
    }

    pub fn correct_text(&self) -> &str {
        &self.options[self.correct_option]
    }
}

/// The array form is what the schema asks for; some models wrap it.
#[derive(Deserialize)]
#[serde(untagged)]
enum ProblemPayload {
    List(Vec<PracticeProblem>),
    Wrapped { problems: Vec<PracticeProblem> },
}

/// A validated batch of problems.
#[derive(Debug, Clone, Serialize)]
pub struct ProblemSet {
    pub topic: String,
    pub difficulty: Difficulty,
    pub problems: Vec<PracticeProblem>,
}

impl ProblemSet {
    /// One [`ProblemCard`] per problem, all unanswered.
    pub fn cards(&self) -> Vec<ProblemCard> {
        self.problems.iter().cloned().map(ProblemCard::new).collect()
    }

    /// An exportable view, optionally including worked solutions.
    pub fn for_export(&self, with_solutions: bool) -> ProblemSheet<'_> {
        ProblemSheet {
            set: self,
            with_solutions,
        }
    }
}

pub(crate) async fn generate(
    tutor: &Tutor,
    request: &ProblemRequest,
) -> Result<ProblemSet, TutorError> {
    info!(
        "Generating {} {} problem(s) on '{}'",
        request.count, request.difficulty, request.topic
    );
    let prompt = prompts::problem_request_prompt(
        &request.topic,
        request.count,
        &request.difficulty.to_string(),
    );
    let gen = GenerationRequest::prompt(prompt)
        .with_system(prompts::PROBLEM_GENERATOR_PROMPT)
        .with_schema(prompts::problem_schema());

    let mut problems = match tutor.generate_structured::<ProblemPayload>(gen).await? {
        ProblemPayload::List(p) | ProblemPayload::Wrapped { problems: p } => p,
    };

    if problems.is_empty() {
        return Err(TutorError::MalformedResponse {
            detail: "no problems in reply".into(),
        });
    }
    if problems.len() > request.count {
        warn!(
            "Model returned {} problems, keeping the first {}",
            problems.len(),
            request.count
        );
        problems.truncate(request.count);
    }
    for (i, p) in problems.iter().enumerate() {
        p.validate(i)?;
    }

    Ok(ProblemSet {
        topic: request.topic.clone(),
        difficulty: request.difficulty,
        problems,
    })
}

/// Result of [`ProblemCard::select`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Correct,
    Incorrect { correct_option: usize },
    /// The card was already answered; the earlier choice stands.
    Locked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CardState {
    Unanswered,
    Answered { selected: usize },
}

/// A problem being answered.
#[derive(Debug, Clone)]
pub struct ProblemCard {
    problem: PracticeProblem,
    state: CardState,
}

impl ProblemCard {
    pub fn new(problem: PracticeProblem) -> Self {
        Self {
            problem,
            state: CardState::Unanswered,
        }
    }

    pub fn problem(&self) -> &PracticeProblem {
        &self.problem
    }

    /// Choose option `index` (0-based).
    pub fn select(&mut self, index: usize) -> Result<Selection, TutorError> {
        if index >= self.problem.options.len() {
            return Err(TutorError::InvalidInput(format!(
                "Choose an option between A and {}.",
                option_label(self.problem.options.len().saturating_sub(1))
            )));
        }
        if self.state != CardState::Unanswered {
            return Ok(Selection::Locked);
        }
        self.state = CardState::Answered { selected: index };
        if index == self.problem.correct_option {
            Ok(Selection::Correct)
        } else {
            Ok(Selection::Incorrect {
                correct_option: self.problem.correct_option,
            })
        }
    }

    pub fn selected(&self) -> Option<usize> {
        match self.state {
            CardState::Answered { selected } => Some(selected),
            CardState::Unanswered => None,
        }
    }

    pub fn is_revealed(&self) -> bool {
        self.selected().is_some()
    }

    /// The worked solution, once an option has been selected.
    pub fn solution(&self) -> Option<&str> {
        self.is_revealed().then_some(self.problem.solution.as_str())
    }

    /// Terminal rendering of the card in its current state.
    pub fn render(&self, number: usize) -> String {
        render_card(self, number)
    }
}

/// "A", "B", ...
pub fn option_label(index: usize) -> char {
    (b'A' + (index as u8 % 26)) as char
}

/// Parse "a", "B", "2" (1-based) into a 0-based option index.
pub fn parse_option(input: &str) -> Option<usize> {
    let s = input.trim();
    let mut chars = s.chars();
    let c = chars.next()?;
    if chars.next().is_some() {
        return s.parse::<usize>().ok().and_then(|n| n.checked_sub(1));
    }
    match c {
        'a'..='z' => Some(c as usize - 'a' as usize),
        'A'..='Z' => Some(c as usize - 'A' as usize),
        '1'..='9' => Some(c as usize - '1' as usize),
        _ => None,
    }
}

/// Question, lettered options and, once answered, the verdict and solution.
pub fn render_card(card: &ProblemCard, number: usize) -> String {
    let p = &card.problem;
    let mut out = format!("Problem {number}. {}\n", p.question.trim());
    for (i, opt) in p.options.iter().enumerate() {
        let marker = match card.selected() {
            Some(_) if i == p.correct_option => "✓",
            Some(sel) if sel == i => "✗",
            _ => " ",
        };
        out.push_str(&format!("  {marker} {}. {}\n", option_label(i), opt.trim()));
    }
    if let Some(selected) = card.selected() {
        if selected == p.correct_option {
            out.push_str("\nCorrect!\n");
        } else {
            out.push_str(&format!(
                "\nNot quite. The answer is {}.\n",
                option_label(p.correct_option)
            ));
        }
        out.push_str(&format!("\nSolution:\n{}\n", p.solution.trim()));
    }
    out
}

/// Export view of a [`ProblemSet`].
#[derive(Debug, Clone, Copy)]
pub struct ProblemSheet<'a> {
    set: &'a ProblemSet,
    with_solutions: bool,
}

impl Exportable for ProblemSheet<'_> {
    fn export_title(&self) -> String {
        format!("Practice problems: {}", self.set.topic)
    }

    fn assemble(&self, doc: &mut DocumentBuilder) {
        doc.paragraph(&format!("Difficulty: {}", self.set.difficulty));
        for (i, p) in self.set.problems.iter().enumerate() {
            if i > 0 {
                doc.rule();
            }
            doc.heading(&format!("Problem {}", i + 1));
            doc.paragraph(&p.question);
            let options: Vec<String> = p
                .options
                .iter()
                .enumerate()
                .map(|(j, o)| format!("{}. {}", option_label(j), o.trim()))
                .collect();
            doc.bullets(&options);
            if self.with_solutions {
                doc.labelled(
                    "Answer:",
                    &format!("{}. {}", option_label(p.correct_option), p.correct_text()),
                );
                doc.paragraph(&p.solution);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::assemble_document;

    fn sample() -> PracticeProblem {
        PracticeProblem {
            question: "A 2 kg cart at 3 m/s hits a 1 kg cart at rest and they stick. Final speed?"
                .into(),
            options: vec!["1 m/s".into(), "2 m/s".into(), "3 m/s".into(), "6 m/s".into()],
            correct_option: 1,
            solution: "p = 2 × 3 = 6 kg·m/s; v = 6 / 3 = 2 m/s.".into(),
        }
    }

    #[test]
    fn request_validation() {
        assert!(ProblemRequest::new("動量守恆", 1, Difficulty::Easy).is_ok());
        assert!(ProblemRequest::new("  ", 1, Difficulty::Easy).is_err());
        assert!(ProblemRequest::new("x", 0, Difficulty::Easy).is_err());
        assert!(ProblemRequest::new("x", 11, Difficulty::Easy).is_err());
    }

    #[test]
    fn difficulty_parses_case_insensitively() {
        assert_eq!("HARD".parse::<Difficulty>().unwrap(), Difficulty::Hard);
        assert!("extreme".parse::<Difficulty>().is_err());
    }

    #[test]
    fn validation_rejects_wrong_option_count() {
        let mut p = sample();
        p.options.pop();
        assert!(matches!(
            p.validate(0),
            Err(TutorError::MalformedResponse { .. })
        ));
        let mut p = sample();
        p.correct_option = 4;
        assert!(p.validate(0).is_err());
        assert!(sample().validate(0).is_ok());
    }

    #[test]
    fn payload_accepts_bare_and_wrapped_arrays() {
        let bare = r#"[{"question":"q","options":["a","b","c","d"],"correct_option":0,"solution":"s"}]"#;
        let wrapped = format!(r#"{{"problems": {bare}}}"#);
        for raw in [bare.to_string(), wrapped] {
            let p: ProblemPayload = serde_json::from_str(&raw).unwrap();
            let list = match p {
                ProblemPayload::List(l) | ProblemPayload::Wrapped { problems: l } => l,
            };
            assert_eq!(list.len(), 1);
        }
    }

    #[test]
    fn solution_hidden_until_selection_then_locked() {
        let mut card = ProblemCard::new(sample());
        assert!(card.solution().is_none());
        assert!(!card.render(1).contains("Solution"));

        assert_eq!(
            card.select(3).unwrap(),
            Selection::Incorrect { correct_option: 1 }
        );
        assert!(card.solution().is_some());
        assert_eq!(card.select(1).unwrap(), Selection::Locked);
        assert_eq!(card.selected(), Some(3));

        let text = card.render(1);
        assert!(text.contains("✓ B. 2 m/s"), "{text}");
        assert!(text.contains("✗ D. 6 m/s"), "{text}");
        assert!(text.contains("Solution:"));
    }

    #[test]
    fn out_of_range_selection_is_rejected_without_locking() {
        let mut card = ProblemCard::new(sample());
        assert!(card.select(7).is_err());
        assert!(!card.is_revealed());
        assert_eq!(card.select(1).unwrap(), Selection::Correct);
    }

    #[test]
    fn option_parsing() {
        assert_eq!(parse_option("a"), Some(0));
        assert_eq!(parse_option(" D "), Some(3));
        assert_eq!(parse_option("2"), Some(1));
        assert_eq!(parse_option("10"), Some(9));
        assert_eq!(parse_option(""), None);
        assert_eq!(parse_option("?"), None);
    }

    #[test]
    fn sheet_hides_solutions_unless_asked() {
        let set = ProblemSet {
            topic: "Momentum".into(),
            difficulty: Difficulty::Medium,
            problems: vec![sample(), sample()],
        };
        let without = assemble_document(&set.for_export(false));
        let with = assemble_document(&set.for_export(true));
        // Each problem adds an "Answer:" block and a solution block.
        assert_eq!(with.len(), without.len() + 4);
    }
}
