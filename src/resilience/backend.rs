//! # Inference Backends
//!
//! Backends are explicit implementations of [`InferenceBackend`] registered in
//! a static [`BackendRegistry`] at startup; the candidate order comes from
//! configuration. [`InferenceClient`] binds registry, candidate order, and a
//! [`ResilientCaller`] so that "first successful candidate wins" lives in one
//! place instead of at every call site.

use crate::config::{ConfigResult, ConfigurationError, HurriaidConfig};
use crate::error::{CallError, ResilienceError};
use crate::resilience::{CircuitBreaker, ResilientCaller};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// A backend candidate and the class its circuit breaker state is keyed by
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BackendId {
    pub id: String,
    pub class: String,
}

impl BackendId {
    pub fn new(id: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            class: class.into(),
        }
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.class)
    }
}

/// One text-generation endpoint. Implementations classify their own failures
/// into [`CallError`] variants; nothing downstream inspects foreign errors.
#[async_trait]
pub trait InferenceBackend: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String, CallError>;
}

/// Startup-time map from backend id to implementation
#[derive(Debug, Default, Clone)]
pub struct BackendRegistry {
    backends: HashMap<String, Arc<dyn InferenceBackend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, backend: Arc<dyn InferenceBackend>) -> &mut Self {
        debug!(backend = backend.id(), "Registering inference backend");
        self.backends.insert(backend.id().to_string(), backend);
        self
    }

    pub fn with_backend(mut self, backend: Arc<dyn InferenceBackend>) -> Self {
        self.register(backend);
        self
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn InferenceBackend>> {
        self.backends.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.backends.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

/// Resilient text generation over the configured candidates
#[derive(Debug, Clone)]
pub struct InferenceClient {
    registry: Arc<BackendRegistry>,
    caller: ResilientCaller,
    candidates: Vec<BackendId>,
}

impl InferenceClient {
    /// Bind candidates to registered backends; unknown ids are a configuration error
    pub fn new(
        registry: Arc<BackendRegistry>,
        caller: ResilientCaller,
        candidates: Vec<BackendId>,
    ) -> ConfigResult<Self> {
        if candidates.is_empty() {
            return Err(ConfigurationError::validation(
                "at least one backend candidate is required",
            ));
        }
        if let Some(missing) = candidates.iter().find(|c| !registry.contains(&c.id)) {
            return Err(ConfigurationError::UnknownBackend {
                id: missing.id.clone(),
            });
        }

        Ok(Self {
            registry,
            caller,
            candidates,
        })
    }

    /// Build from configuration, requiring the credential variable to be set
    pub fn from_config(
        config: &HurriaidConfig,
        registry: Arc<BackendRegistry>,
        breaker: Arc<CircuitBreaker>,
    ) -> ConfigResult<Self> {
        let variable = &config.inference.api_key_env;
        let credential_present = std::env::var(variable)
            .map(|value| !value.trim().is_empty())
            .unwrap_or(false);
        if !credential_present {
            return Err(ConfigurationError::MissingCredential {
                variable: variable.clone(),
            });
        }

        let caller = ResilientCaller::new(breaker, config.retry.to_policy());
        let client = Self::new(registry, caller, config.inference.backends.clone())?;

        info!(
            candidates = ?client.candidates.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(),
            "Inference client ready"
        );
        Ok(client)
    }

    pub fn candidates(&self) -> &[BackendId] {
        &self.candidates
    }

    /// One resilient call returning the raw response text
    pub async fn generate(&self, prompt: &str) -> Result<String, ResilienceError> {
        self.generate_parsed(prompt, |text| Ok(text.to_string()))
            .await
    }

    /// One resilient call whose response is parsed inside the attempt, so a
    /// malformed response surfaces as a parse failure rather than a call failure
    pub async fn generate_parsed<T, P>(&self, prompt: &str, parse: P) -> Result<T, ResilienceError>
    where
        T: Send + 'static,
        P: Fn(&str) -> Result<T, String> + Send + Sync + 'static,
    {
        let prompt: Arc<str> = Arc::from(prompt);
        let parse = Arc::new(parse);
        let registry = Arc::clone(&self.registry);

        self.caller
            .call(&self.candidates, move |candidate| {
                let registry = Arc::clone(&registry);
                let prompt = Arc::clone(&prompt);
                let parse = Arc::clone(&parse);
                async move {
                    let backend = registry.get(&candidate.id).ok_or_else(|| {
                        CallError::Rejected(format!("backend '{}' is not registered", candidate.id))
                    })?;
                    let text = backend.generate(&prompt).await?;
                    if text.trim().is_empty() {
                        return Err(CallError::Parse("empty response".to_string()));
                    }
                    (*parse)(&text).map_err(CallError::Parse)
                }
            })
            .await
    }
}

/// Lazily builds the [`InferenceClient`] on first use, so a missing credential
/// surfaces as a configuration error at the stage that needs it
#[derive(Debug)]
pub struct InferenceProvider {
    config: HurriaidConfig,
    registry: Arc<BackendRegistry>,
    breaker: Arc<CircuitBreaker>,
    client: OnceCell<Arc<InferenceClient>>,
}

impl InferenceProvider {
    pub fn new(
        config: HurriaidConfig,
        registry: Arc<BackendRegistry>,
        breaker: Arc<CircuitBreaker>,
    ) -> Self {
        Self {
            config,
            registry,
            breaker,
            client: OnceCell::new(),
        }
    }

    pub async fn client(&self) -> ConfigResult<Arc<InferenceClient>> {
        self.client
            .get_or_try_init(|| async {
                InferenceClient::from_config(
                    &self.config,
                    Arc::clone(&self.registry),
                    Arc::clone(&self.breaker),
                )
                .map(Arc::new)
            })
            .await
            .cloned()
    }
}
