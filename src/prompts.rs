//! System prompts and response schemas for every tutoring feature.
//!
//! Every prompt lives here so wording changes touch exactly one file and
//! tests can inspect prompts without a live model. Callers can replace the
//! chat persona via [`crate::config::TutorConfig::persona`]; the other
//! prompts are fixed because their replies are decoded as JSON.

use serde_json::{json, Value};

/// Default persona for the Socratic chat tutor.
pub const TUTOR_PERSONA: &str = r#"You are a patient Socratic physics and science tutor for secondary-school students.

Follow these rules precisely:

1. GUIDE, DO NOT TELL
   - Never give the final answer outright on the first ask
   - Answer a question with a focused guiding question or a hint
   - Reveal a full worked solution only when the student has tried twice or asks explicitly

2. CHECK UNDERSTANDING
   - Ask the student to explain their reasoning in their own words
   - Point out misconceptions gently and specifically

3. FORMAT
   - Keep replies short: at most three short paragraphs
   - Write formulas in plain text (p = m v) rather than LaTeX
   - Reply in the language the student uses"#;

/// Instruction for the practice-problem generator.
pub const PROBLEM_GENERATOR_PROMPT: &str = r#"You are an experienced teacher writing multiple-choice practice problems.

Rules:
- Every problem has exactly four options
- Exactly one option is correct; distractors reflect common misconceptions
- The solution explains step by step why the correct option is right
- Use the language of the topic as given by the student
- Output ONLY the JSON array described by the schema, no commentary"#;

/// Instruction for the diagram analyzer.
pub const DIAGRAM_ANALYZER_PROMPT: &str = r#"You are a science teacher looking at a diagram a student uploaded.

Identify what the diagram shows, the physical quantities and relationships
involved, and explain it so a secondary-school student understands it.
Suggest follow-up questions the student can use to test themselves.
Output ONLY the JSON object described by the schema."#;

/// Instruction for the simulation-code generator.
pub const SIMULATION_PROMPT: &str = r#"You are an educational software developer.

Write a small, self-contained, runnable simulation that lets a student explore
the requested concept interactively. Keep the code under 200 lines, comment
the physics, and expose the key parameters as variables or sliders.
Output ONLY the JSON object described by the schema; the code goes in the
"code" field as a plain string without markdown fences."#;

/// Suffix appended to the system message when a schema is requested.
pub fn schema_instruction(schema: &Value) -> String {
    format!(
        "Respond with JSON only. The reply must validate against this JSON schema:\n{}",
        serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string())
    )
}

/// User prompt for `count` problems about `topic`.
pub fn problem_request_prompt(topic: &str, count: usize, difficulty: &str) -> String {
    format!(
        "Topic: {topic}\nNumber of problems: {count}\nDifficulty: {difficulty}\n\n\
Generate exactly {count} multiple-choice problem(s)."
    )
}

/// User prompt accompanying a diagram image.
pub fn diagram_request_prompt(question: Option<&str>) -> String {
    match question {
        Some(q) if !q.trim().is_empty() => {
            format!("Analyse this diagram. The student also asks: {}", q.trim())
        }
        _ => "Analyse this diagram.".to_string(),
    }
}

/// User prompt for a simulation.
pub fn simulation_request_prompt(concept: &str, language: &str) -> String {
    format!("Concept: {concept}\nTarget: {language}\n\nWrite the simulation.")
}

pub fn problem_schema() -> Value {
    json!({
        "type": "array",
        "items": {
            "type": "object",
            "properties": {
                "question": { "type": "string" },
                "options": {
                    "type": "array",
                    "items": { "type": "string" },
                    "minItems": 4,
                    "maxItems": 4
                },
                "correct_option": {
                    "type": "integer",
                    "description": "0-based index of the correct option"
                },
                "solution": { "type": "string" }
            },
            "required": ["question", "options", "correct_option", "solution"]
        }
    })
}

pub fn diagram_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "summary": { "type": "string" },
            "key_concepts": { "type": "array", "items": { "type": "string" } },
            "explanation": { "type": "string" },
            "follow_up_questions": { "type": "array", "items": { "type": "string" } }
        },
        "required": ["summary", "key_concepts", "explanation", "follow_up_questions"]
    })
}

pub fn simulation_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "title": { "type": "string" },
            "description": { "type": "string" },
            "language": { "type": "string", "enum": ["html", "python"] },
            "code": { "type": "string" }
        },
        "required": ["title", "description", "language", "code"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_instruction_embeds_schema() {
        let s = schema_instruction(&problem_schema());
        assert!(s.contains("correct_option"));
        assert!(s.starts_with("Respond with JSON only"));
    }

    #[test]
    fn problem_prompt_mentions_topic_and_count() {
        let p = problem_request_prompt("動量守恆", 1, "medium");
        assert!(p.contains("動量守恆"));
        assert!(p.contains("exactly 1"));
    }

    #[test]
    fn diagram_prompt_ignores_blank_question() {
        assert_eq!(diagram_request_prompt(Some("  ")), "Analyse this diagram.");
        assert!(diagram_request_prompt(Some("why?")).ends_with("why?"));
    }

    #[test]
    fn problem_schema_requires_four_options() {
        let s = problem_schema();
        assert_eq!(s["items"]["properties"]["options"]["minItems"], 4);
        assert_eq!(s["items"]["properties"]["options"]["maxItems"], 4);
    }
}
