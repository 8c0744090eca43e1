//! Diagram analysis: a student-supplied image plus an optional question.
//!
//! The image comes from a local path or an HTTP(S) URL. Its format is
//! sniffed from the bytes (file extensions and `Content-Type` headers are
//! not trusted) and only the formats the model service accepts are passed
//! on.

use crate::error::TutorError;
use crate::export::{DocumentBuilder, Exportable};
use crate::generation::cleanup::clean_reply;
use crate::generation::GenerationRequest;
use crate::prompts;
use crate::tutor::Tutor;
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Longest edge of the copy embedded in an exported PDF.
const EMBED_MAX_EDGE_PX: u32 = 1240;

/// Diagram bytes ready to attach to a request.
#[derive(Clone)]
pub struct DiagramImage {
    /// Path or URL as given.
    pub source: String,
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
}

impl std::fmt::Debug for DiagramImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagramImage")
            .field("source", &self.source)
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

/// Structured explanation returned by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagramAnalysis {
    pub summary: String,
    #[serde(default)]
    pub key_concepts: Vec<String>,
    pub explanation: String,
    #[serde(default)]
    pub follow_up_questions: Vec<String>,
}

/// An analysis together with the diagram it describes.
#[derive(Debug, Clone)]
pub struct DiagramReport {
    pub image: DiagramImage,
    pub question: Option<String>,
    pub analysis: DiagramAnalysis,
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Read or download `source` and identify its image format.
pub async fn load_diagram(source: &str, timeout_secs: u64) -> Result<DiagramImage, TutorError> {
    let bytes = if is_url(source) {
        download(source, timeout_secs).await?
    } else {
        let path = PathBuf::from(source);
        if !path.is_file() {
            return Err(TutorError::InputNotFound { path });
        }
        match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(_) => return Err(TutorError::InputNotFound { path }),
        }
    };

    let mime_type = sniff_mime(&bytes, source)?;
    debug!("Loaded diagram {} ({}, {} bytes)", source, mime_type, bytes.len());
    Ok(DiagramImage {
        source: source.to_string(),
        bytes,
        mime_type,
    })
}

async fn download(url: &str, timeout_secs: u64) -> Result<Vec<u8>, TutorError> {
    info!("Downloading diagram from: {}", url);
    let failed = |reason: String| TutorError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            failed(format!("timed out after {timeout_secs}s"))
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;
    Ok(bytes.to_vec())
}

/// MIME type for the formats the model accepts.
fn sniff_mime(bytes: &[u8], source: &str) -> Result<&'static str, TutorError> {
    let unsupported = |detail: String| TutorError::UnsupportedImage {
        source_name: source.to_string(),
        detail,
    };
    let format = image::guess_format(bytes)
        .map_err(|_| unsupported("not a recognisable image".into()))?;
    match format {
        ImageFormat::Png => Ok("image/png"),
        ImageFormat::Jpeg => Ok("image/jpeg"),
        ImageFormat::WebP => Ok("image/webp"),
        ImageFormat::Gif => Ok("image/gif"),
        other => Err(unsupported(format!("{other:?} images are not accepted"))),
    }
}

pub(crate) async fn analyze(
    tutor: &Tutor,
    image: &DiagramImage,
    question: Option<&str>,
) -> Result<DiagramAnalysis, TutorError> {
    info!("Analysing diagram {}", image.source);
    let request = GenerationRequest::prompt(prompts::diagram_request_prompt(question))
        .with_system(prompts::DIAGRAM_ANALYZER_PROMPT)
        .with_schema(prompts::diagram_schema())
        .with_attachment(image.bytes.clone(), image.mime_type);

    let mut analysis: DiagramAnalysis = tutor.generate_structured(request).await?;
    if analysis.summary.trim().is_empty() && analysis.explanation.trim().is_empty() {
        return Err(TutorError::MalformedResponse {
            detail: "analysis has neither summary nor explanation".into(),
        });
    }
    analysis.explanation = clean_reply(&analysis.explanation).trim_end().to_string();
    Ok(analysis)
}

impl DiagramImage {
    /// PNG copy no larger than [`EMBED_MAX_EDGE_PX`], with its size.
    fn embeddable_png(&self) -> Option<(Vec<u8>, u32, u32)> {
        let img = image::load_from_memory(&self.bytes)
            .map_err(|e| warn!("Cannot decode {} for export: {}", self.source, e))
            .ok()?;
        let img = if img.width().max(img.height()) > EMBED_MAX_EDGE_PX {
            img.thumbnail(EMBED_MAX_EDGE_PX, EMBED_MAX_EDGE_PX)
        } else {
            img
        };
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .map_err(|e| warn!("Cannot re-encode {} for export: {}", self.source, e))
            .ok()?;
        Some((buf, img.width(), img.height()))
    }
}

impl Exportable for DiagramReport {
    fn export_title(&self) -> String {
        "Diagram analysis".to_string()
    }

    fn assemble(&self, doc: &mut DocumentBuilder) {
        match self.image.embeddable_png() {
            Some((png, w, h)) => {
                doc.image(&png, w, h);
            }
            None => {
                doc.paragraph(&format!("(Diagram: {})", self.image.source));
            }
        }
        if let Some(q) = &self.question {
            doc.labelled("Question:", q);
        }
        doc.rule();
        self.analysis.assemble(doc);
    }
}

impl Exportable for DiagramAnalysis {
    fn export_title(&self) -> String {
        "Diagram analysis".to_string()
    }

    fn assemble(&self, doc: &mut DocumentBuilder) {
        doc.heading("Summary");
        doc.paragraph(&self.summary);
        if !self.key_concepts.is_empty() {
            doc.heading("Key concepts");
            doc.bullets(&self.key_concepts);
        }
        doc.rule();
        doc.heading("Explanation");
        doc.paragraph(&self.explanation);
        if !self.follow_up_questions.is_empty() {
            doc.rule();
            doc.heading("Check yourself");
            doc.bullets(&self.follow_up_questions);
        }
    }
}
