// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// LLM Provider Registry - Model Alias Resolution and Provider Management
//
// Manages LLM providers and resolves model aliases to actual providers.
// Retries with exponential backoff, then tries the fallback provider once.

use crate::domain::aether_config::{
    resolve_secret, AetherConfigManifest, LLMProviderConfig, LLMSelection,
};
use crate::domain::llm::{ChatRequest, ChatResponse, LLMError, LLMProvider};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::ollama::OllamaAdapter;
use super::openai::OpenAIAdapter;

/// Registry for managing LLM providers and resolving model aliases
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn LLMProvider>>,
    alias_map: HashMap<String, String>, // alias -> provider_name
    default_alias: String,
    fallback_provider: Option<String>,
    max_retries: u32,
    retry_delay_ms: u64,
}

impl ProviderRegistry {
    /// Empty registry using the given selection policy
    pub fn new(selection: &LLMSelection) -> Self {
        Self {
            providers: HashMap::new(),
            alias_map: HashMap::new(),
            default_alias: selection.default_alias.clone(),
            fallback_provider: selection.fallback_provider.clone(),
            max_retries: selection.max_retries,
            retry_delay_ms: selection.retry_delay_ms,
        }
    }

    /// Create provider registry from configuration
    pub fn from_config(config: &AetherConfigManifest) -> anyhow::Result<Self> {
        let mut registry = Self::new(&config.spec.llm_selection);

        info!("Initializing LLM provider registry");

        for provider_config in &config.spec.llm_providers {
            if !provider_config.enabled {
                info!("Provider '{}' disabled, skipping", provider_config.name);
                continue;
            }

            match Self::create_provider(provider_config) {
                Ok(provider) => {
                    let aliases: Vec<&str> = provider_config
                        .models
                        .iter()
                        .map(|m| {
                            info!(
                                "Mapping alias '{}' -> {} ({})",
                                m.alias, m.model, provider_config.name
                            );
                            m.alias.as_str()
                        })
                        .collect();
                    registry.register(&provider_config.name, provider, &aliases);
                }
                Err(e) => {
                    warn!("Failed to initialize provider '{}': {}", provider_config.name, e);
                }
            }
        }

        if registry.providers.is_empty() {
            warn!("No LLM providers configured - agents will use rule-based reasoning only");
        }

        Ok(registry)
    }

    fn create_provider(config: &LLMProviderConfig) -> anyhow::Result<Arc<dyn LLMProvider>> {
        let api_key = resolve_secret(&config.api_key)?;
        let model = config
            .models
            .first()
            .ok_or_else(|| anyhow::anyhow!("No models configured"))?
            .model
            .clone();

        let provider: Arc<dyn LLMProvider> = match config.provider_type.as_str() {
            "ollama" => Arc::new(OllamaAdapter::new(config.endpoint.clone(), model)),
            // OpenAI-compatible APIs (LM Studio, vLLM, etc.) share the adapter
            "openai" | "openai-compatible" => {
                Arc::new(OpenAIAdapter::new(config.endpoint.clone(), api_key, model))
            }
            _ => anyhow::bail!("Unsupported provider type: {}", config.provider_type),
        };

        Ok(provider)
    }

    pub fn register(&mut self, name: &str, provider: Arc<dyn LLMProvider>, aliases: &[&str]) {
        self.providers.insert(name.to_string(), provider);
        for alias in aliases {
            self.alias_map.insert(alias.to_string(), name.to_string());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Chat using a model alias, with retries and fallback
    pub async fn chat_with_alias(
        &self,
        alias: &str,
        request: &ChatRequest,
    ) -> Result<ChatResponse, LLMError> {
        let provider_name = self
            .alias_map
            .get(alias)
            .ok_or_else(|| LLMError::ModelNotFound(format!("Model alias '{}' not found", alias)))?;

        let provider = self.providers.get(provider_name).ok_or_else(|| {
            LLMError::Provider(format!("Provider '{}' not found", provider_name))
        })?;

        let attempts = self.max_retries.max(1);
        let mut last_error = None;

        for attempt in 0..attempts {
            match provider.chat(request).await {
                Ok(response) => {
                    info!("Chat successful on attempt {}", attempt + 1);
                    return Ok(response);
                }
                Err(e) => {
                    warn!("Chat failed (attempt {}/{}): {:?}", attempt + 1, attempts, e);
                    last_error = Some(e);

                    if attempt + 1 < attempts {
                        tokio::time::sleep(self.backoff_delay(attempt)).await;
                    }
                }
            }
        }

        if let Some(fallback) = &self.fallback_provider {
            if fallback != provider_name {
                if let Some(fallback_provider) = self.providers.get(fallback) {
                    info!("Trying fallback provider: {}", fallback);
                    return fallback_provider.chat(request).await;
                }
            }
        }

        Err(last_error.unwrap_or_else(|| LLMError::Provider("Unknown error".into())))
    }

    /// Delay before retry `attempt + 1`; saturates instead of overflowing
    fn backoff_delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(
            self.retry_delay_ms
                .saturating_mul(2_u64.saturating_pow(attempt)),
        )
    }

    /// Ping every registered provider, keyed by provider name
    pub async fn health_check_all(&self) -> BTreeMap<String, Result<(), LLMError>> {
        let mut results = BTreeMap::new();

        for (name, provider) in &self.providers {
            info!("Health checking provider: {}", name);
            results.insert(name.clone(), provider.health_check().await);
        }

        results
    }

    pub fn available_aliases(&self) -> Vec<String> {
        self.alias_map.keys().cloned().collect()
    }

    pub fn has_alias(&self, alias: &str) -> bool {
        self.alias_map.contains_key(alias)
    }
}

/// The registry is itself a provider bound to the default alias
#[async_trait]
impl LLMProvider for ProviderRegistry {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, LLMError> {
        self.chat_with_alias(&self.default_alias, request).await
    }

    async fn health_check(&self) -> Result<(), LLMError> {
        let provider = self
            .alias_map
            .get(&self.default_alias)
            .and_then(|name| self.providers.get(name))
            .ok_or_else(|| LLMError::ModelNotFound(self.default_alias.clone()))?;
        provider.health_check().await
    }
}
