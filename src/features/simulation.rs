//! Interactive simulation code for a concept, as HTML or Python.

use crate::error::TutorError;
use crate::export::{DocumentBuilder, Exportable};
use crate::generation::{strip_code_fences, GenerationRequest};
use crate::prompts;
use crate::tutor::Tutor;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::info;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulationLanguage {
    /// A single HTML page with inline JavaScript.
    #[default]
    Html,
    Python,
}

impl SimulationLanguage {
    pub fn file_extension(&self) -> &'static str {
        match self {
            SimulationLanguage::Html => "html",
            SimulationLanguage::Python => "py",
        }
    }
}

impl fmt::Display for SimulationLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SimulationLanguage::Html => "html",
            SimulationLanguage::Python => "python",
        })
    }
}

impl FromStr for SimulationLanguage {
    type Err = TutorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "html" | "js" | "javascript" => Ok(SimulationLanguage::Html),
            "python" | "py" => Ok(SimulationLanguage::Python),
            other => Err(TutorError::InvalidInput(format!(
                "Unknown simulation language '{other}'. Use html or python."
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationRequest {
    pub concept: String,
    pub language: SimulationLanguage,
}

impl SimulationRequest {
    pub fn new(concept: impl Into<String>, language: SimulationLanguage) -> Result<Self, TutorError> {
        let concept = concept.into().trim().to_string();
        if concept.is_empty() {
            return Err(TutorError::InvalidInput(
                "Describe the concept to simulate.".into(),
            ));
        }
        Ok(Self { concept, language })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationCode {
    pub title: String,
    pub description: String,
    pub language: SimulationLanguage,
    pub code: String,
}

impl SimulationCode {
    /// File name derived from the title, e.g. `elastic-collisions.html`.
    pub fn suggested_file_name(&self) -> String {
        let mut slug = String::new();
        for c in self.title.chars() {
            if c.is_alphanumeric() {
                slug.extend(c.to_lowercase());
            } else if !slug.is_empty() && !slug.ends_with('-') {
                slug.push('-');
            }
        }
        let slug = slug.trim_end_matches('-');
        let slug = if slug.is_empty() { "simulation" } else { slug };
        format!("{slug}.{}", self.language.file_extension())
    }
}

pub(crate) async fn generate(
    tutor: &Tutor,
    request: &SimulationRequest,
) -> Result<SimulationCode, TutorError> {
    info!(
        "Generating {} simulation for '{}'",
        request.language, request.concept
    );
    let gen = GenerationRequest::prompt(prompts::simulation_request_prompt(
        &request.concept,
        &request.language.to_string(),
    ))
    .with_system(prompts::SIMULATION_PROMPT)
    .with_schema(prompts::simulation_schema());

    let mut sim: SimulationCode = tutor.generate_structured(gen).await?;

    // Models sometimes fence the code inside the JSON string as well.
    sim.code = strip_code_fences(&sim.code).to_string();
    if sim.code.trim().is_empty() {
        return Err(TutorError::MalformedResponse {
            detail: "simulation has no code".into(),
        });
    }
    if sim.language != request.language {
        return Err(TutorError::MalformedResponse {
            detail: format!(
                "asked for {} but got {}",
                request.language, sim.language
            ),
        });
    }
    Ok(sim)
}

impl Exportable for SimulationCode {
    fn export_title(&self) -> String {
        self.title.clone()
    }

    fn assemble(&self, doc: &mut DocumentBuilder) {
        doc.paragraph(&self.description);
        doc.labelled("Language:", &self.language.to_string());
        doc.rule();
        doc.code(&self.code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sim(title: &str, language: SimulationLanguage) -> SimulationCode {
        SimulationCode {
            title: title.into(),
            description: "d".into(),
            language,
            code: "print(1)".into(),
        }
    }

    #[test]
    fn language_parsing() {
        assert_eq!("HTML".parse::<SimulationLanguage>().unwrap(), SimulationLanguage::Html);
        assert_eq!("py".parse::<SimulationLanguage>().unwrap(), SimulationLanguage::Python);
        assert!("rust".parse::<SimulationLanguage>().is_err());
    }

    #[test]
    fn language_serde_is_lowercase() {
        let s: SimulationCode = serde_json::from_str(
            r#"{"title":"t","description":"d","language":"python","code":"x"}"#,
        )
        .unwrap();
        assert_eq!(s.language, SimulationLanguage::Python);
    }

    #[test]
    fn file_names_are_slugged() {
        assert_eq!(
            sim("Elastic Collisions!", SimulationLanguage::Html).suggested_file_name(),
            "elastic-collisions.html"
        );
        assert_eq!(
            sim("  ??", SimulationLanguage::Python).suggested_file_name(),
            "simulation.py"
        );
    }

    #[test]
    fn empty_concept_rejected() {
        assert!(SimulationRequest::new(" ", SimulationLanguage::Html).is_err());
    }
}
