//! Configuration types for the tutor.
//!
//! All behaviour is controlled through [`TutorConfig`], built via its
//! [`TutorConfigBuilder`]. Credentials are checked separately by
//! [`Credentials::from_env`] so a missing key is reported once, at startup,
//! as a typed error rather than failing deep inside the first request.

use crate::error::TutorError;
use crate::export::paginate::PageLayout;
use crate::generation::backend::GenerationBackend;
use crate::generation::retry::RetryPolicy;
use crate::progress::ProgressCallback;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Provider used when none is configured.
pub const DEFAULT_PROVIDER: &str = "gemini";

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Configuration for a tutoring session.
///
/// # Example
/// ```rust
/// use edgequake_tutor::TutorConfig;
///
/// let config = TutorConfig::builder()
///     .model("gemini-2.5-pro")
///     .max_attempts(5)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_attempts, 5);
/// ```
#[derive(Clone)]
pub struct TutorConfig {
    /// Provider name understood by `edgequake_llm::ProviderFactory`. Default: "gemini".
    pub provider_name: String,

    /// Model identifier. Default: "gemini-2.5-flash".
    pub model: String,

    /// Pre-constructed backend. Takes precedence over `provider_name`.
    pub backend: Option<Arc<dyn GenerationBackend>>,

    /// Sampling temperature. Default: 0.7.
    ///
    /// Tutoring replies and problem sets benefit from some variety; the
    /// structured features still decode reliably at this level.
    pub temperature: f32,

    /// Maximum output tokens per reply. Default: 8192.
    pub max_tokens: usize,

    /// Total attempts per generation call, including the first. Default: 3.
    pub max_attempts: u32,

    /// Delay before the first retry in milliseconds; doubles each round. Default: 1000.
    pub initial_delay_ms: u64,

    /// Replaces the built-in chat persona when set.
    pub persona: Option<String>,

    /// HTTP timeout for diagram URLs in seconds. Default: 30.
    pub download_timeout_secs: u64,

    /// Physical page geometry for PDF export. Default: A4 portrait, 15 mm margins.
    pub page_layout: PageLayout,

    /// Pixel width blocks are rasterised at. Default: 1240 (≈175 DPI across 180 mm).
    pub render_width_px: u32,

    /// Export progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for TutorConfig {
    fn default() -> Self {
        Self {
            provider_name: DEFAULT_PROVIDER.to_string(),
            model: DEFAULT_MODEL.to_string(),
            backend: None,
            temperature: 0.7,
            max_tokens: 8192,
            max_attempts: 3,
            initial_delay_ms: 1000,
            persona: None,
            download_timeout_secs: 30,
            page_layout: PageLayout::default(),
            render_width_px: 1240,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for TutorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TutorConfig")
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("backend", &self.backend.as_ref().map(|b| b.name().to_string()))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_attempts", &self.max_attempts)
            .field("initial_delay_ms", &self.initial_delay_ms)
            .field("persona", &self.persona.as_ref().map(|_| "<custom>"))
            .field("page_layout", &self.page_layout)
            .field("render_width_px", &self.render_width_px)
            .finish()
    }
}

impl TutorConfig {
    pub fn builder() -> TutorConfigBuilder {
        TutorConfigBuilder {
            config: Self::default(),
        }
    }

    /// Retry policy derived from `max_attempts` and `initial_delay_ms`.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.initial_delay_ms),
        )
    }
}

/// Builder for [`TutorConfig`].
pub struct TutorConfigBuilder {
    config: TutorConfig,
}

impl fmt::Debug for TutorConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TutorConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl TutorConfigBuilder {
    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = name.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn backend(mut self, backend: Arc<dyn GenerationBackend>) -> Self {
        self.config.backend = Some(backend);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.max_attempts = n.max(1);
        self
    }

    pub fn initial_delay_ms(mut self, ms: u64) -> Self {
        self.config.initial_delay_ms = ms.max(1);
        self
    }

    pub fn persona(mut self, persona: impl Into<String>) -> Self {
        self.config.persona = Some(persona.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn page_layout(mut self, layout: PageLayout) -> Self {
        self.config.page_layout = layout;
        self
    }

    pub fn render_width_px(mut self, px: u32) -> Self {
        self.config.render_width_px = px.max(100);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<TutorConfig, TutorError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(TutorError::InvalidConfig("Model must not be empty".into()));
        }
        if c.max_tokens == 0 {
            return Err(TutorError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        c.page_layout.validate()?;
        Ok(self.config)
    }
}

/// Proof that the provider's API key is present.
///
/// Obtained once at startup; the entry point decides how to report the
/// failure.
#[derive(Clone)]
pub struct Credentials {
    var: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("var", &self.var)
            .field("key", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Check the key variable for `provider` in the process environment.
    pub fn from_env(provider: &str) -> Result<Self, TutorError> {
        Self::from_lookup(provider, |var| std::env::var(var).ok())
    }

    /// As [`Credentials::from_env`], reading variables through `lookup`.
    pub fn from_lookup(
        provider: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, TutorError> {
        let var = match api_key_var(provider) {
            Some(v) => v,
            // Local providers (ollama, lmstudio) need no key.
            None => return Ok(Self { var: String::new() }),
        };
        match lookup(var) {
            Some(value) if !value.trim().is_empty() => Ok(Self {
                var: var.to_string(),
            }),
            _ => Err(TutorError::MissingApiKey {
                var: var.to_string(),
            }),
        }
    }

    /// The environment variable the key was read from.
    pub fn var(&self) -> &str {
        &self.var
    }
}

/// Environment variable holding the key for a provider, if one is needed.
pub fn api_key_var(provider: &str) -> Option<&'static str> {
    match provider.to_lowercase().as_str() {
        "gemini" | "google" => Some("GEMINI_API_KEY"),
        "openai" => Some("OPENAI_API_KEY"),
        "anthropic" => Some("ANTHROPIC_API_KEY"),
        "mistral" => Some("MISTRAL_API_KEY"),
        "openrouter" => Some("OPENROUTER_API_KEY"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = TutorConfig::default();
        assert_eq!(c.provider_name, "gemini");
        assert_eq!(c.max_attempts, 3);
        assert_eq!(c.initial_delay_ms, 1000);
        assert_eq!(c.page_layout, PageLayout::a4());
    }

    #[test]
    fn builder_clamps() {
        let c = TutorConfig::builder()
            .max_attempts(0)
            .initial_delay_ms(0)
            .temperature(9.0)
            .build()
            .unwrap();
        assert_eq!(c.max_attempts, 1);
        assert_eq!(c.initial_delay_ms, 1);
        assert_eq!(c.temperature, 2.0);
    }

    #[test]
    fn builder_rejects_empty_model() {
        let err = TutorConfig::builder().model(" ").build().unwrap_err();
        assert!(matches!(err, TutorError::InvalidConfig(_)));
    }

    #[test]
    fn retry_policy_from_config() {
        let c = TutorConfig::builder()
            .max_attempts(4)
            .initial_delay_ms(250)
            .build()
            .unwrap();
        let p = c.retry_policy();
        assert_eq!(p.max_attempts, 4);
        assert_eq!(p.initial_delay, Duration::from_millis(250));
    }

    #[test]
    fn missing_key_is_typed_error() {
        let err = Credentials::from_lookup("gemini", |_| None).unwrap_err();
        match err {
            TutorError::MissingApiKey { var } => assert_eq!(var, "GEMINI_API_KEY"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn blank_key_is_missing() {
        let err = Credentials::from_lookup("openai", |_| Some("  ".into())).unwrap_err();
        assert!(matches!(err, TutorError::MissingApiKey { .. }));
    }

    #[test]
    fn present_key_is_accepted() {
        let c = Credentials::from_lookup("gemini", |v| {
            (v == "GEMINI_API_KEY").then(|| "abc".to_string())
        })
        .unwrap();
        assert_eq!(c.var(), "GEMINI_API_KEY");
        assert!(!format!("{c:?}").contains("abc"));
    }

    #[test]
    fn local_provider_needs_no_key() {
        assert!(Credentials::from_lookup("ollama", |_| None).is_ok());
    }
}
