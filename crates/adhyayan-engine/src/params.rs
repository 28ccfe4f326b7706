//! Parameter normalization.
//!
//! Every generation parameter is clamped into safe bounds before it reaches
//! a provider. Total and idempotent: out-of-range values are corrected
//! silently, never rejected.

use crate::config::LimitsConfig;
use crate::types::GenerationParams;
use serde::{Deserialize, Serialize};

pub const TEMPERATURE_RANGE: (f32, f32) = (0.0, 2.0);
pub const TOP_P_RANGE: (f32, f32) = (0.0, 1.0);

/// Parameters after clamping. Always within documented bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedParams {
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

impl From<NormalizedParams> for GenerationParams {
    fn from(p: NormalizedParams) -> Self {
        GenerationParams {
            max_tokens: Some(p.max_tokens as i64),
            temperature: Some(p.temperature),
            top_p: Some(p.top_p),
        }
    }
}

/// Clamp caller parameters into the configured bounds, applying defaults
/// where a value is absent. Non-finite floats fall back to the defaults.
pub fn normalize(params: &GenerationParams, limits: &LimitsConfig) -> NormalizedParams {
    let max_tokens = params
        .max_tokens
        .unwrap_or(limits.default_max_tokens as i64)
        .clamp(limits.min_tokens as i64, limits.max_tokens_upper as i64) as u32;

    let temperature = clamp_float(
        params.temperature,
        limits.default_temperature,
        TEMPERATURE_RANGE,
    );
    let top_p = clamp_float(params.top_p, limits.default_top_p, TOP_P_RANGE);

    NormalizedParams {
        max_tokens,
        temperature,
        top_p,
    }
}

fn clamp_float(value: Option<f32>, default: f32, (lo, hi): (f32, f32)) -> f32 {
    match value {
        Some(v) if v.is_finite() => v.clamp(lo, hi),
        _ => default.clamp(lo, hi),
    }
}
