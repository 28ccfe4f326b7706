use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which wire protocol a configured provider speaks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// OpenAI-style `chat/completions` endpoint. Vision-capable via
    /// `image_url` content parts.
    OpenAiCompatible { endpoint: String },
    /// Google `generateContent` endpoint. Vision-capable via file parts.
    Gemini,
}

/// One remote provider entry. Order in `PipelineConfig::providers` is the
/// fallback priority order: most capable first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub api_key: String,
    pub model: String,
    /// Per-attempt timeout; an expired attempt is a soft failure.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

/// Bounds applied by the parameter normalizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    pub min_tokens: u32,
    pub max_tokens_upper: u32,
    pub default_max_tokens: u32,
    pub default_temperature: f32,
    pub default_top_p: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub capacity: usize,
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateConfig {
    pub window_secs: u64,
    pub max_requests_per_window: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Most recent sessions pulled when none is referenced explicitly.
    pub max_sessions: usize,
    /// Most recent chat entries included in a bundle.
    pub max_chat_entries: usize,
    /// Per-item character budget applied before inclusion.
    pub item_char_budget: usize,
    /// Aggregate character cap for the whole bundle.
    pub bundle_char_cap: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Target chunk size in characters.
    pub target_size: usize,
    /// Upper bound on characters of input text forwarded to a provider.
    pub max_prompt_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub providers: Vec<ProviderConfig>,
    pub limits: LimitsConfig,
    pub cache: CacheConfig,
    pub rate: RateConfig,
    pub context: ContextConfig,
    pub chunking: ChunkingConfig,
}

impl PipelineConfig {
    /// Validate config values, returning errors for clearly broken
    /// configurations.
    pub fn validate(&self) -> Result<(), String> {
        for (i, provider) in self.providers.iter().enumerate() {
            if provider.api_key.trim().is_empty() {
                return Err(format!("providers[{}].api_key must not be empty", i));
            }
            if provider.model.trim().is_empty() {
                return Err(format!("providers[{}].model must not be empty", i));
            }
            if provider.timeout_secs == 0 {
                return Err(format!("providers[{}].timeout_secs must be > 0", i));
            }
            if let ProviderKind::OpenAiCompatible { endpoint } = &provider.kind {
                if endpoint.trim().is_empty() {
                    return Err(format!("providers[{}].endpoint must not be empty", i));
                }
            }
        }
        if self.limits.min_tokens == 0 {
            return Err("limits.min_tokens must be > 0".into());
        }
        if self.limits.max_tokens_upper < self.limits.min_tokens {
            return Err("limits.max_tokens_upper must be >= min_tokens".into());
        }
        if self.cache.capacity == 0 {
            return Err("cache.capacity must be > 0".into());
        }
        if self.rate.window_secs == 0 {
            return Err("rate.window_secs must be > 0".into());
        }
        if self.rate.max_requests_per_window == 0 {
            return Err("rate.max_requests_per_window must be > 0".into());
        }
        if self.chunking.target_size < 200 {
            return Err("chunking.target_size must be >= 200".into());
        }
        if self.context.item_char_budget == 0 {
            return Err("context.item_char_budget must be > 0".into());
        }
        Ok(())
    }

    /// Load config from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config: {}", e))?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            limits: LimitsConfig {
                min_tokens: 64,
                max_tokens_upper: 8000,
                default_max_tokens: 1024,
                default_temperature: 0.7,
                default_top_p: 0.95,
            },
            cache: CacheConfig {
                capacity: 100,
                ttl_secs: 3600,
            },
            rate: RateConfig {
                window_secs: 60,
                max_requests_per_window: 30,
            },
            context: ContextConfig {
                max_sessions: 3,
                max_chat_entries: 10,
                item_char_budget: 1200,
                bundle_char_cap: 8000,
            },
            chunking: ChunkingConfig {
                target_size: 4000,
                max_prompt_chars: 12000,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_empty_api_key_rejected() {
        let mut config = PipelineConfig::default();
        config.providers.push(ProviderConfig {
            kind: ProviderKind::Gemini,
            api_key: "  ".into(),
            model: "gemini-1.5-flash".into(),
            timeout_secs: 30,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inverted_token_bounds_rejected() {
        let mut config = PipelineConfig::default();
        config.limits.max_tokens_upper = 10;
        config.limits.min_tokens = 64;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_roundtrips_through_json() {
        let config = PipelineConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: PipelineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.cache.capacity, config.cache.capacity);
        assert_eq!(back.rate.window_secs, config.rate.window_secs);
    }
}
