//! Deterministic model routing.
//!
//! Classifies each prompt as "heavy" (complexity/intent keywords or sheer
//! length) and picks the provider/model pair accordingly. Pure: the same
//! input and configuration always produce the same choice.

use crate::config::RoutingConfig;
use regex::RegexSetBuilder;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use std::fmt;

/// The two upstream providers the gateway can route to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Anthropic,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::OpenAi => write!(f, "openai"),
            Provider::Anthropic => write!(f, "anthropic"),
        }
    }
}

/// Why a route was chosen. Recorded for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteReason {
    Keyword,
    Length,
    Default,
}

impl fmt::Display for RouteReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteReason::Keyword => write!(f, "keyword"),
            RouteReason::Length => write!(f, "length"),
            RouteReason::Default => write!(f, "default"),
        }
    }
}

/// Caller-supplied routing override, applied field by field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RouteOverride {
    pub provider: Option<Provider>,
    pub model: Option<String>,
}

/// A provider/model decision for one request. Derived per request, never
/// persisted, never mutated: overrides produce a new choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteChoice {
    pub provider: Provider,
    pub model: String,
    pub reason: RouteReason,
}

impl RouteChoice {
    /// Merge a caller override into a new choice. Present fields replace
    /// the heuristic's; absent fields keep it.
    pub fn with_override(&self, ovr: &RouteOverride) -> RouteChoice {
        RouteChoice {
            provider: ovr.provider.unwrap_or(self.provider),
            model: ovr.model.clone().unwrap_or_else(|| self.model.clone()),
            reason: self.reason,
        }
    }
}

pub struct ModelRouter {
    heavy_patterns: regex::RegexSet,
    length_threshold: usize,
    light_model: String,
    heavy_model: String,
}

impl ModelRouter {
    pub fn new(config: &RoutingConfig) -> Result<Self, AppError> {
        let heavy_patterns = RegexSetBuilder::new(&config.heavy_patterns)
            .case_insensitive(true)
            .build()
            .map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!("Invalid heavy-routing pattern: {}", e))
            })?;

        Ok(Self {
            heavy_patterns,
            length_threshold: config.length_threshold,
            light_model: config.light_model.clone(),
            heavy_model: config.heavy_model.clone(),
        })
    }

    /// Choose a provider/model for the given prompt.
    pub fn choose(&self, input: &str) -> RouteChoice {
        if self.heavy_patterns.is_match(input) {
            return RouteChoice {
                provider: Provider::Anthropic,
                model: self.heavy_model.clone(),
                reason: RouteReason::Keyword,
            };
        }

        if input.chars().count() > self.length_threshold {
            return RouteChoice {
                provider: Provider::Anthropic,
                model: self.heavy_model.clone(),
                reason: RouteReason::Length,
            };
        }

        RouteChoice {
            provider: Provider::OpenAi,
            model: self.light_model.clone(),
            reason: RouteReason::Default,
        }
    }
}
