//! Fallback orchestration.
//!
//! The top-level coordinator for every generation request:
//! `CacheCheck → ProviderAttempt(i) → {Success | NextProvider} → … →
//! LocalFallback → Done`. Providers are tried in the fixed configured
//! priority order; every provider fault is a soft failure that advances the
//! cascade. Only configuration errors and rate-limit exhaustion cross the
//! pipeline boundary — an ordinary generation failure never does.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::assemble::{ChatStore, ContextAssembler, ContextBundle, EvidenceStore, SessionStore};
use crate::cache::ResponseCache;
use crate::chunker::TextChunker;
use crate::clock::{system_clock, Clock};
use crate::config::{PipelineConfig, ProviderKind};
use crate::error::PipelineError;
use crate::fingerprint::fingerprint;
use crate::heuristic;
use crate::limiter::RateLimiter;
use crate::params::{normalize, NormalizedParams};
use crate::prompt::{build_prompt, parse_payload};
use crate::providers::{
    GeminiProvider, GenerationStrategy, ImageResolver, LocalHeuristicStrategy,
    OpenAiCompatibleProvider, PreparedRequest,
};
use crate::types::{
    EvidenceRecord, GenerationRequest, GenerationResult, OperationKind, ResultPayload,
};

const PRIMARY_CONFIDENCE: f32 = 0.9;
const CONFIDENCE_STEP: f32 = 0.08;
const MIN_REMOTE_CONFIDENCE: f32 = 0.5;

struct RemoteStrategy {
    strategy: Arc<dyn GenerationStrategy>,
    timeout: Duration,
}

pub struct GenerationPipeline {
    config: PipelineConfig,
    remotes: Vec<RemoteStrategy>,
    terminal: Arc<dyn GenerationStrategy>,
    limiter: RateLimiter,
    cache: ResponseCache,
    assembler: ContextAssembler,
    chunker: TextChunker,
    resolver: Option<Arc<dyn ImageResolver>>,
    clock: Arc<dyn Clock>,
}

impl GenerationPipeline {
    /// Build a pipeline from configuration: one strategy per configured
    /// provider, in priority order, terminated by the local heuristic.
    pub fn from_config(
        config: PipelineConfig,
        sessions: Option<Arc<dyn SessionStore>>,
        evidence: Option<Arc<dyn EvidenceStore>>,
        chat: Option<Arc<dyn ChatStore>>,
        resolver: Option<Arc<dyn ImageResolver>>,
    ) -> Result<Self, PipelineError> {
        config
            .validate()
            .map_err(PipelineError::Configuration)?;

        let mut remotes = Vec::with_capacity(config.providers.len());
        for provider in &config.providers {
            let strategy: Arc<dyn GenerationStrategy> = match &provider.kind {
                ProviderKind::OpenAiCompatible { endpoint } => Arc::new(
                    OpenAiCompatibleProvider::new(
                        endpoint.clone(),
                        provider.api_key.clone(),
                        provider.model.clone(),
                    )
                    .map_err(|e| PipelineError::Configuration(e.to_string()))?,
                ),
                ProviderKind::Gemini => Arc::new(
                    GeminiProvider::new(provider.api_key.clone(), provider.model.clone())
                        .map_err(|e| PipelineError::Configuration(e.to_string()))?,
                ),
            };
            remotes.push(RemoteStrategy {
                strategy,
                timeout: Duration::from_secs(provider.timeout_secs),
            });
        }

        let clock = system_clock();
        let assembler =
            ContextAssembler::new(sessions, evidence, chat, config.context.clone());

        Ok(Self {
            limiter: RateLimiter::new(&config.rate, clock.clone()),
            cache: ResponseCache::new(&config.cache, clock.clone()),
            chunker: TextChunker::new(config.chunking.target_size),
            terminal: Arc::new(LocalHeuristicStrategy::new()),
            assembler,
            remotes,
            resolver,
            clock,
            config,
        })
    }

    /// Assemble a pipeline from explicit strategies. Used by tests and by
    /// callers embedding custom providers.
    pub fn with_strategies(
        config: PipelineConfig,
        remotes: Vec<Arc<dyn GenerationStrategy>>,
        terminal: Arc<dyn GenerationStrategy>,
        assembler: ContextAssembler,
        resolver: Option<Arc<dyn ImageResolver>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let remotes = remotes
            .into_iter()
            .map(|strategy| RemoteStrategy {
                strategy,
                timeout: Duration::from_secs(30),
            })
            .collect();

        Self {
            limiter: RateLimiter::new(&config.rate, clock.clone()),
            cache: ResponseCache::new(&config.cache, clock.clone()),
            chunker: TextChunker::new(config.chunking.target_size),
            terminal,
            assembler,
            remotes,
            resolver,
            clock,
            config,
        }
    }

    /// Override the per-attempt timeout for every remote strategy.
    pub fn with_remote_timeout(mut self, timeout: Duration) -> Self {
        for remote in &mut self.remotes {
            remote.timeout = timeout;
        }
        self
    }

    /// Run one generation request through the cascade. Always returns a
    /// well-formed result unless configuration is broken or the first
    /// provider's rate budget is exhausted.
    pub async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResult, PipelineError> {
        let started = self.clock.now();
        let params = normalize(&request.params, &self.config.limits);
        let fp = fingerprint(request.operation, &request.input, &params);

        if let Some(mut hit) = self.cache.get(&fp) {
            hit.from_cache = true;
            hit.processing_time_ms = self.elapsed_ms(started);
            tracing::debug!(operation = request.operation.tag(), fingerprint = %fp, "cache hit");
            return Ok(hit);
        }

        if request.operation.requires_vision() && self.remotes.is_empty() {
            return Err(PipelineError::Configuration(format!(
                "operation '{}' needs a vision-capable provider but none is configured",
                request.operation.tag()
            )));
        }

        // The first provider's budget gates the whole request: exhaustion is
        // surfaced so the caller can decide retry timing.
        if let Some(first) = self.remotes.first() {
            let tag = first.strategy.tag();
            if !self.limiter.try_consume(tag) {
                let retry_after = self.limiter.retry_after(tag);
                tracing::info!(provider = %tag, "rate budget exhausted, surfacing to caller");
                return Err(PipelineError::RateLimited {
                    provider: tag.to_string(),
                    retry_after_ms: retry_after.as_millis() as u64,
                });
            }
        }

        let prepared = self.prepare(&request, params).await;

        for (index, remote) in self.remotes.iter().enumerate() {
            let tag = remote.strategy.tag();
            if index > 0 && !self.limiter.try_consume(tag) {
                tracing::warn!(provider = %tag, "provider budget exhausted, skipping");
                continue;
            }

            match tokio::time::timeout(remote.timeout, remote.strategy.attempt(&prepared)).await
            {
                Ok(Ok(provider_result)) if provider_result.success => {
                    match parse_payload(request.operation, &provider_result.text) {
                        Ok(payload) => {
                            let result = self.finish(
                                payload,
                                tag,
                                remote_confidence(index),
                                started,
                            );
                            self.cache.set(fp, result.clone());
                            tracing::info!(
                                operation = request.operation.tag(),
                                provider = %tag,
                                "generation succeeded"
                            );
                            return Ok(result);
                        }
                        Err(e) => {
                            tracing::warn!(provider = %tag, error = %e, "provider response failed validation")
                        }
                    }
                }
                Ok(Ok(_)) => tracing::warn!(provider = %tag, "provider reported failure"),
                Ok(Err(e)) => tracing::warn!(provider = %tag, error = %e, "provider attempt failed"),
                Err(_) => {
                    let timeout_ms = remote.timeout.as_millis() as u64;
                    tracing::warn!(provider = %tag, timeout_ms, "provider attempt timed out");
                }
            }
        }

        let tag = self.terminal.tag().to_string();
        let payload = match self.terminal.attempt(&prepared).await {
            Ok(provider_result) => parse_payload(request.operation, &provider_result.text)
                .unwrap_or_else(|_| degraded_payload(request.operation)),
            Err(_) => degraded_payload(request.operation),
        };

        let result = self.finish(payload, &tag, heuristic::HEURISTIC_CONFIDENCE, started);
        self.cache.set(fp, result.clone());
        tracing::info!(
            operation = request.operation.tag(),
            "all providers failed, served local fallback"
        );
        Ok(result)
    }

    /// Split provider- or heuristic-extracted text into evidence records
    /// for the persistence collaborator.
    pub fn extract_evidence(
        &self,
        text: &str,
        method: &str,
        confidence: f32,
    ) -> Vec<EvidenceRecord> {
        heuristic::build_evidence(text, method, confidence)
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }

    pub fn remaining_budget(&self, provider_tag: &str) -> u32 {
        self.limiter.remaining(provider_tag)
    }

    async fn prepare(
        &self,
        request: &GenerationRequest,
        params: NormalizedParams,
    ) -> PreparedRequest {
        let raw_text = request
            .input
            .text
            .as_deref()
            .unwrap_or("")
            .trim()
            .to_string();
        let bounded = self.bound_text(&raw_text);

        let context = if request.operation == OperationKind::RagChat
            || !request.context_refs.is_empty()
        {
            self.assembler.assemble(&request.context_refs).await
        } else {
            ContextBundle::default()
        };

        let image_url = match (&request.input.image_ref, &self.resolver) {
            (Some(image_ref), Some(resolver)) => {
                let resolved = resolver.resolve(image_ref).await;
                if resolved.is_none() {
                    tracing::warn!(image_ref = %image_ref, "image reference unresolved, degrading to text-only");
                }
                resolved
            }
            _ => None,
        };

        let prompt = build_prompt(request.operation, &bounded, &context, image_url.is_some());

        PreparedRequest {
            operation: request.operation,
            prompt,
            raw_text: bounded,
            image_url,
            params,
            context,
        }
    }

    /// Bound the input text forwarded to providers, keeping whole chunks
    /// where possible.
    fn bound_text(&self, raw_text: &str) -> String {
        let cap = self.config.chunking.max_prompt_chars;
        if raw_text.len() <= cap {
            return raw_text.to_string();
        }

        let mut bounded = String::new();
        for chunk in self.chunker.chunk(raw_text) {
            if bounded.len() + chunk.len() + 1 > cap {
                break;
            }
            if !bounded.is_empty() {
                bounded.push('\n');
            }
            bounded.push_str(&chunk);
        }
        if bounded.is_empty() {
            bounded = raw_text.chars().take(cap).collect();
        }
        bounded
    }

    fn finish(
        &self,
        payload: ResultPayload,
        method: &str,
        confidence: f32,
        started: Instant,
    ) -> GenerationResult {
        GenerationResult {
            success: true,
            payload,
            method_used: method.to_string(),
            confidence: confidence.clamp(0.0, 1.0),
            from_cache: false,
            processing_time_ms: self.elapsed_ms(started),
        }
    }

    fn elapsed_ms(&self, started: Instant) -> u64 {
        self.clock.now().duration_since(started).as_millis() as u64
    }
}

fn remote_confidence(index: usize) -> f32 {
    (PRIMARY_CONFIDENCE - CONFIDENCE_STEP * index as f32).max(MIN_REMOTE_CONFIDENCE)
}

fn degraded_payload(operation: OperationKind) -> ResultPayload {
    ResultPayload::Text(format!(
        "Generation for '{}' is temporarily unavailable.",
        operation.tag()
    ))
}
