//! Backend selection: an ordered list of constructors tried in sequence.

use super::{BackendKind, BackendSettings, OllamaBackend, OpenAiCompatibleBackend, TextBackend};
use crate::config::LlmConfig;
use crate::error::{KgError, Result};

/// Deferred construction of one backend.
pub type BackendConstructor = Box<dyn FnOnce() -> Result<Box<dyn TextBackend>> + Send>;

/// Construct a backend of the kind named in `settings`.
pub fn create_backend(settings: BackendSettings) -> Result<Box<dyn TextBackend>> {
    match settings.kind {
        BackendKind::Ollama => Ok(Box::new(OllamaBackend::new(settings)?)),
        BackendKind::HuggingFace | BackendKind::OpenAi => {
            Ok(Box::new(OpenAiCompatibleBackend::new(settings)?))
        }
    }
}

/// Primary backend first, then the fallback list without the primary or
/// repeats.
pub fn fallback_order(primary: BackendKind, fallback: &[BackendKind]) -> Vec<BackendKind> {
    let mut order = vec![primary];
    for kind in fallback {
        if !order.contains(kind) {
            order.push(*kind);
        }
    }
    order
}

/// Run constructors in order and return the first backend that builds.
///
/// Each failure is logged and the next candidate is tried. When all fail the
/// error lists every attempt.
pub fn first_available(
    candidates: Vec<(String, BackendConstructor)>,
) -> Result<Box<dyn TextBackend>> {
    let mut failures = Vec::new();

    for (label, construct) in candidates {
        match construct() {
            Ok(backend) => {
                log::info!(
                    "Using text-generation backend {}/{}",
                    backend.provider_name(),
                    backend.model_name()
                );
                return Ok(backend);
            }
            Err(e) => {
                log::warn!("Backend {} failed to initialize: {}", label, e);
                failures.push(format!("{}: {}", label, e));
            }
        }
    }

    if failures.is_empty() {
        return Err(KgError::NoBackend("no backends configured".to_string()));
    }
    Err(KgError::NoBackend(failures.join("; ")))
}

/// Bind to the first backend in the configured chain that initializes.
pub fn connect(config: &LlmConfig) -> Result<Box<dyn TextBackend>> {
    let candidates = fallback_order(config.provider, &config.fallback)
        .into_iter()
        .map(|kind| {
            let settings = config.settings_for(kind);
            let construct: BackendConstructor = Box::new(move || create_backend(settings));
            (kind.to_string(), construct)
        })
        .collect();
    first_available(candidates)
}
