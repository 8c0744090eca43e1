//! Talking to the model service.
//!
//! ```text
//! feature ──▶ GenerationRequest ──▶ retry ──▶ backend ──▶ parse / cleanup
//!                                    (backoff) (provider)  (JSON / text)
//! ```
//!
//! 1. [`request`]: the transient request/response types
//! 2. [`backend`]: the [`GenerationBackend`] seam and its `edgequake_llm`
//!    implementation; the only code with network I/O
//! 3. [`retry`]: bounded attempts with exponential backoff and jitter
//! 4. [`parse`]: fence stripping + JSON decoding for structured replies
//! 5. [`cleanup`]: whitespace/invisible-character rules for free text

pub mod backend;
pub mod cleanup;
pub mod parse;
pub mod request;
pub mod retry;

pub use backend::{GenerationBackend, LlmBackend};
pub use parse::{parse_structured, strip_code_fences};
pub use request::{Attachment, GenerationRequest, GenerationResponse, Role, Turn};
pub use retry::{execute_with_retry, generate_with_retry, RetryPolicy};
