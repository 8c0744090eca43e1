//! Error types for the edgequake-tutor library.
//!
//! A single enum, [`TutorError`], covers every failure the library can
//! report. The variants fall into five classes that callers treat
//! differently:
//!
//! * **Configuration**: the API key is missing or the provider cannot be
//!   built. Fatal at startup; the CLI prints the full remediation text.
//! * **Transient service**: overload, rate limiting, transport failures and
//!   empty model replies. Recovered locally by
//!   [`crate::generation::retry::execute_with_retry`]; surfaced only after the
//!   attempts are exhausted.
//! * **Malformed response**: the model answered but the payload could not be
//!   decoded. Not retried.
//! * **Invalid request**: the service rejected the input. Not retried.
//! * **Export**: rasterisation or file output failed. The whole export is
//!   aborted and no partial file is left behind.
//!
//! [`TutorError::user_message`] collapses every recoverable condition into one
//! readable line; the `Display` output keeps the raw detail for logs.

use edgequake_llm::LlmError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the edgequake-tutor library.
#[derive(Debug, Error)]
pub enum TutorError {
    // ── Configuration errors ──────────────────────────────────────────────
    /// The API key environment variable is unset or empty.
    #[error(
        "Missing API key: environment variable {var} is not set.\n\n\
How to fix:\n\
  1. Create a key for your provider (for Gemini: https://aistudio.google.com/app/apikey).\n\
  2. Export it before starting the tutor:\n\
       export {var}=<your-key>\n\
  3. Restart the tutor.\n"
    )]
    MissingApiKey { var: String },

    /// The configured provider could not be constructed.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Transient service errors (retryable) ──────────────────────────────
    /// HTTP 429 from the model service.
    #[error("Rate limit exceeded: {detail}")]
    RateLimited { detail: String },

    /// HTTP 500 / 503 or an explicit overload signal.
    #[error("Model service unavailable: {detail}")]
    ServiceUnavailable { detail: String },

    /// Network or RPC-level failure before a response was received.
    #[error("Transport failure: {detail}")]
    Transport { detail: String },

    /// The model answered without any text.
    #[error("Model returned an empty response")]
    EmptyResponse,

    // ── Terminal service errors ───────────────────────────────────────────
    /// The service rejected the request (HTTP 400, safety block, …).
    #[error("Request rejected by the model service: {detail}")]
    InvalidRequest { detail: String },

    /// The API key was rejected by the service.
    #[error("Authentication failed: {detail}")]
    AuthError { detail: String },

    /// Any other provider error.
    #[error("LLM API error: {message}")]
    LlmApiError { message: String },

    /// The payload could not be decoded after fence stripping.
    #[error("Malformed model response: {detail}")]
    MalformedResponse { detail: String },

    // ── Input errors ──────────────────────────────────────────────────────
    /// The student's input was rejected before any model call.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Local diagram file was not found.
    #[error("File not found: '{path}'")]
    InputNotFound { path: PathBuf },

    /// Downloading a diagram from a URL failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// The diagram is not an image format the model accepts.
    #[error("Unsupported image '{source_name}': {detail}")]
    UnsupportedImage { source_name: String, detail: String },

    // ── Export errors ─────────────────────────────────────────────────────
    /// The rasteriser failed for one block; the export is aborted.
    #[error("Rasterisation failed for block {block}: {detail}")]
    RasterisationFailed { block: usize, detail: String },

    /// PDF assembly failed after rasterisation.
    #[error("PDF export failed: {0}")]
    ExportFailed(String),

    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TutorError {
    /// Whether the retry executor may attempt the call again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TutorError::RateLimited { .. }
                | TutorError::ServiceUnavailable { .. }
                | TutorError::Transport { .. }
                | TutorError::EmptyResponse
        )
    }

    /// Whether this error should halt the program at startup.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            TutorError::MissingApiKey { .. }
                | TutorError::ProviderNotConfigured { .. }
                | TutorError::InvalidConfig(_)
        )
    }

    /// One readable line for the student.
    ///
    /// Configuration errors keep their full text because the remediation
    /// steps are the useful part.
    pub fn user_message(&self) -> String {
        match self {
            TutorError::MissingApiKey { .. }
            | TutorError::ProviderNotConfigured { .. }
            | TutorError::InvalidConfig(_) => self.to_string(),
            TutorError::RateLimited { .. } => {
                "The AI service is busy right now (too many requests). Please wait a moment and try again.".into()
            }
            TutorError::ServiceUnavailable { .. }
            | TutorError::Transport { .. }
            | TutorError::EmptyResponse => {
                "The AI service is temporarily unavailable. Please try again later.".into()
            }
            TutorError::MalformedResponse { .. } => {
                "AI returned data in an unexpected format.".into()
            }
            TutorError::InvalidRequest { .. } => {
                "The request was rejected. Please rephrase your input and try again.".into()
            }
            TutorError::AuthError { .. } => {
                "The API key was rejected. Check that it is valid and has access to the model.".into()
            }
            TutorError::LlmApiError { .. } | TutorError::Internal(_) => {
                "Something went wrong while talking to the AI service.".into()
            }
            TutorError::InvalidInput(msg) => msg.clone(),
            TutorError::InputNotFound { path } => format!("Cannot find '{}'.", path.display()),
            TutorError::DownloadFailed { url, .. } => format!("Could not download '{url}'."),
            TutorError::UnsupportedImage { .. } => {
                "That file is not a supported image (PNG, JPEG, WebP or GIF).".into()
            }
            TutorError::RasterisationFailed { .. }
            | TutorError::ExportFailed(_)
            | TutorError::OutputWriteFailed { .. } => {
                "PDF export failed. No file was saved.".into()
            }
        }
    }
}

/// Classify a provider error into a [`TutorError`].
///
/// Typed variants are mapped directly. Only the catch-all variants, which
/// carry the service's raw message, go through [`classify_api_error`].
pub fn classify_llm_error(err: &LlmError) -> TutorError {
    let detail = err.to_string();
    match err {
        LlmError::RateLimited(_) => TutorError::RateLimited { detail },
        LlmError::NetworkError(_) | LlmError::Timeout => TutorError::Transport { detail },
        LlmError::AuthError(_) => TutorError::AuthError { detail },
        LlmError::InvalidRequest(_) | LlmError::TokenLimitExceeded { .. } => {
            TutorError::InvalidRequest { detail }
        }
        LlmError::ModelNotFound(_) | LlmError::ConfigError(_) | LlmError::NotSupported(_) => {
            TutorError::InvalidConfig(detail)
        }
        LlmError::SerializationError(_) => TutorError::MalformedResponse { detail },
        LlmError::ApiError(message)
        | LlmError::ProviderError(message)
        | LlmError::Unknown(message) => classify_api_error(message),
    }
}

static STATUS_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[45]\d{2}\b").unwrap());

/// Classify a provider error message into a [`TutorError`].
///
/// Used for messages that arrive as plain strings. Status codes only count as
/// standalone three-digit numbers. Key problems are checked first because
/// some services report an invalid key with status 400.
pub fn classify_api_error(message: &str) -> TutorError {
    let lower = message.to_lowercase();
    let detail = message.to_string();
    let status = |code: &str| STATUS_CODE.find_iter(&lower).any(|m| m.as_str() == code);

    if lower.contains("api key")
        || lower.contains("api_key")
        || status("401")
        || status("403")
        || lower.contains("permission_denied")
    {
        TutorError::AuthError { detail }
    } else if status("429")
        || lower.contains("rate limit")
        || lower.contains("resource_exhausted")
    {
        TutorError::RateLimited { detail }
    } else if status("500")
        || status("503")
        || lower.contains("overloaded")
        || lower.contains("unavailable")
    {
        TutorError::ServiceUnavailable { detail }
    } else if lower.contains("rpc failed")
        || lower.contains("xhr error")
        || lower.contains("connection")
        || lower.contains("network")
        || lower.contains("timed out")
    {
        TutorError::Transport { detail }
    } else if status("400") || lower.contains("invalid_argument") {
        TutorError::InvalidRequest { detail }
    } else {
        TutorError::LlmApiError { message: detail }
    }
}
