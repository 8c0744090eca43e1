//! The [`Tutor`] facade: one configured backend shared by every feature.

use crate::config::{Credentials, TutorConfig};
use crate::error::TutorError;
use crate::export::{
    assemble_document, export_pdf, ExportOptions, ExportSummary, Exportable, Rasterizer,
    SvgRasterizer,
};
use crate::features::chat::ChatSession;
use crate::features::diagram::{self, DiagramAnalysis, DiagramReport};
use crate::features::problems::{self, ProblemRequest, ProblemSet};
use crate::features::simulation::{self, SimulationCode, SimulationRequest};
use crate::generation::{
    generate_with_retry, parse_structured, GenerationBackend, GenerationRequest,
    GenerationResponse, LlmBackend,
};
use crate::progress::{NoopProgressCallback, ProgressCallback};
use crate::prompts;
use edgequake_llm::ProviderFactory;
use once_cell::sync::OnceCell;
use serde::de::DeserializeOwned;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Entry point for every tutoring feature.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
pub struct Tutor {
    config: TutorConfig,
    backend: Arc<dyn GenerationBackend>,
    rasterizer: OnceCell<Arc<dyn Rasterizer>>,
}

impl fmt::Debug for Tutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tutor")
            .field("backend", &self.backend.name())
            .field("config", &self.config)
            .finish()
    }
}

impl Tutor {
    /// Build a tutor, resolving the backend from `config`.
    ///
    /// A pre-built `config.backend` is used as-is. Otherwise the provider's
    /// API key is checked first, so a missing key surfaces as
    /// [`TutorError::MissingApiKey`] rather than a provider-specific message.
    pub fn new(config: TutorConfig) -> Result<Self, TutorError> {
        let backend = resolve_backend(&config)?;
        Ok(Self::with_backend(config, backend))
    }

    pub fn with_backend(config: TutorConfig, backend: Arc<dyn GenerationBackend>) -> Self {
        Self {
            config,
            backend,
            rasterizer: OnceCell::new(),
        }
    }

    /// Replace the default `resvg` rasteriser used by [`Tutor::export`].
    pub fn with_rasterizer(self, rasterizer: Arc<dyn Rasterizer>) -> Self {
        let cell = OnceCell::new();
        let _ = cell.set(rasterizer);
        Self {
            rasterizer: cell,
            ..self
        }
    }

    pub fn config(&self) -> &TutorConfig {
        &self.config
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    // ── Features ─────────────────────────────────────────────────────────

    /// A fresh conversation using the configured (or default) persona.
    pub fn chat_session(&self) -> ChatSession {
        let persona = self
            .config
            .persona
            .clone()
            .unwrap_or_else(|| prompts::TUTOR_PERSONA.to_string());
        ChatSession::new(persona)
    }

    pub async fn generate_problems(
        &self,
        request: &ProblemRequest,
    ) -> Result<ProblemSet, TutorError> {
        problems::generate(self, request).await
    }

    /// Analyse a diagram from a local path or an HTTP(S) URL.
    pub async fn analyze_diagram(
        &self,
        source: &str,
        question: Option<&str>,
    ) -> Result<DiagramReport, TutorError> {
        let image = diagram::load_diagram(source, self.config.download_timeout_secs).await?;
        let analysis: DiagramAnalysis = diagram::analyze(self, &image, question).await?;
        Ok(DiagramReport {
            image,
            question: question.map(str::to_string),
            analysis,
        })
    }

    pub async fn generate_simulation(
        &self,
        request: &SimulationRequest,
    ) -> Result<SimulationCode, TutorError> {
        simulation::generate(self, request).await
    }

    /// Assemble `item` and write it to `path` as a PDF.
    pub async fn export(
        &self,
        item: &dyn Exportable,
        path: &Path,
    ) -> Result<ExportSummary, TutorError> {
        let blocks = assemble_document(item);
        let rasterizer = self.rasterizer().await?;
        let options = ExportOptions {
            layout: self.config.page_layout,
            render_width_px: self.config.render_width_px,
        };
        let progress: ProgressCallback = self
            .config
            .progress_callback
            .clone()
            .unwrap_or_else(|| Arc::new(NoopProgressCallback));
        export_pdf(blocks, rasterizer, &options, path, &progress).await
    }

    // ── Generation plumbing ──────────────────────────────────────────────

    /// Fill in model and sampling defaults, then call through the retry
    /// executor.
    pub(crate) async fn generate(
        &self,
        mut request: GenerationRequest,
    ) -> Result<GenerationResponse, TutorError> {
        if request.model.is_none() {
            request.model = Some(self.config.model.clone());
        }
        request.temperature = request.temperature.or(Some(self.config.temperature));
        request.max_tokens = request.max_tokens.or(Some(self.config.max_tokens));

        let policy = self.config.retry_policy();
        let response = generate_with_retry(self.backend.as_ref(), &request, &policy).await?;
        debug!(
            "Generation complete: {} in / {} out tokens",
            response.input_tokens, response.output_tokens
        );
        Ok(response)
    }

    /// [`Tutor::generate`] followed by fence stripping and JSON decoding.
    pub(crate) async fn generate_structured<T: DeserializeOwned>(
        &self,
        request: GenerationRequest,
    ) -> Result<T, TutorError> {
        let response = self.generate(request).await?;
        parse_structured(&response.text)
    }

    async fn rasterizer(&self) -> Result<Arc<dyn Rasterizer>, TutorError> {
        if let Some(r) = self.rasterizer.get() {
            return Ok(Arc::clone(r));
        }
        // Font discovery walks the system font directories.
        let built: Arc<dyn Rasterizer> = tokio::task::spawn_blocking(SvgRasterizer::new)
            .await
            .map(|r| Arc::new(r) as Arc<dyn Rasterizer>)
            .map_err(|e| TutorError::Internal(format!("Font loading panicked: {e}")))?;
        Ok(Arc::clone(self.rasterizer.get_or_init(|| built)))
    }
}

/// Resolve the backend, from most to least specific.
///
/// 1. **Pre-built backend** (`config.backend`), used as-is.
/// 2. **Named provider**: check its key variable, then build it through
///    [`ProviderFactory::create_llm_provider`].
fn resolve_backend(config: &TutorConfig) -> Result<Arc<dyn GenerationBackend>, TutorError> {
    if let Some(ref backend) = config.backend {
        return Ok(Arc::clone(backend));
    }

    let credentials = Credentials::from_env(&config.provider_name)?;
    debug!("Using credentials from {:?}", credentials);

    let provider = ProviderFactory::create_llm_provider(&config.provider_name, &config.model)
        .map_err(|e| TutorError::ProviderNotConfigured {
            provider: config.provider_name.clone(),
            hint: format!("{e}"),
        })?;

    info!(
        "Using provider '{}' with model '{}'",
        config.provider_name, config.model
    );
    let label = format!("{}/{}", config.provider_name, config.model);
    Ok(Arc::new(LlmBackend::new(provider, label)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::GenerationResponse;
    use futures::future::BoxFuture;
    use std::sync::Mutex;

    struct Echo {
        seen: Mutex<Vec<GenerationRequest>>,
    }

    impl GenerationBackend for Echo {
        fn generate<'a>(
            &'a self,
            request: &'a GenerationRequest,
        ) -> BoxFuture<'a, Result<GenerationResponse, TutorError>> {
            Box::pin(async move {
                self.seen.lock().unwrap().push(request.clone());
                Ok(GenerationResponse::text("```json\n{\"n\": 7}\n```"))
            })
        }
    }

    #[derive(serde::Deserialize)]
    struct N {
        n: u32,
    }

    #[tokio::test]
    async fn fills_request_defaults_from_config() {
        let backend = Arc::new(Echo {
            seen: Mutex::new(Vec::new()),
        });
        let config = TutorConfig::builder()
            .model("test-model")
            .temperature(0.2)
            .max_tokens(512)
            .build()
            .unwrap();
        let tutor = Tutor::with_backend(config, backend.clone());

        let n: N = tutor
            .generate_structured(GenerationRequest::prompt("count"))
            .await
            .unwrap();
        assert_eq!(n.n, 7);

        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen[0].model.as_deref(), Some("test-model"));
        assert_eq!(seen[0].temperature, Some(0.2));
        assert_eq!(seen[0].max_tokens, Some(512));
    }

    #[test]
    fn prebuilt_backend_skips_credentials() {
        let backend: Arc<dyn GenerationBackend> = Arc::new(Echo {
            seen: Mutex::new(Vec::new()),
        });
        let config = TutorConfig::builder()
            .provider_name("openai")
            .backend(backend)
            .build()
            .unwrap();
        assert!(Tutor::new(config).is_ok());
    }

    #[test]
    fn custom_persona_reaches_chat_session() {
        let backend: Arc<dyn GenerationBackend> = Arc::new(Echo {
            seen: Mutex::new(Vec::new()),
        });
        let config = TutorConfig::builder().persona("Be brief.").build().unwrap();
        let tutor = Tutor::with_backend(config, backend);
        assert_eq!(tutor.chat_session().persona(), "Be brief.");
    }
}
