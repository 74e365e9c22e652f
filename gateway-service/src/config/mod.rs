use secrecy::Secret;
use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

/// Default per-session token budget.
const DEFAULT_TOKEN_LIMIT: i64 = 200_000;

/// Default grant period added per confirmed payment.
const DEFAULT_GRANT_HOURS: i64 = 24;

/// Fixed worst-case headroom for the advisory pre-check: roughly one
/// worst-case exchange at ~4 chars/token. The commit remains the sole
/// authority on quota.
const DEFAULT_PRECHECK_HEADROOM: i64 = 2_000;

/// Prompt length above which a request routes to the heavy model.
const DEFAULT_LENGTH_THRESHOLD: usize = 600;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub common: core_config::Config,
    pub mongodb: MongoConfig,
    pub redis: RedisConfig,
    pub rate_limit: RateLimitConfig,
    pub session: SessionConfig,
    pub routing: RoutingConfig,
    pub providers: ProviderConfig,
    pub webhook: WebhookConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
    /// Admit requests when the counter store is unreachable. Only
    /// acceptable outside production; the prod default is fail-closed.
    pub fail_open: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub limit: i64,
    pub window_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub token_limit: i64,
    pub grant_hours: i64,
    pub precheck_headroom: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoutingConfig {
    pub length_threshold: usize,
    /// Complexity/intent signals; any match routes heavy. Matched
    /// case-insensitively.
    pub heavy_patterns: Vec<String>,
    pub light_model: String,
    pub heavy_model: String,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            length_threshold: DEFAULT_LENGTH_THRESHOLD,
            heavy_patterns: default_heavy_patterns(),
            light_model: "gpt-4o-mini".to_string(),
            heavy_model: "claude-3-5-sonnet-20241022".to_string(),
        }
    }
}

fn default_heavy_patterns() -> Vec<String> {
    [
        r"analy[sz]e",
        r"reason",
        r"long\s*form",
        r"proof",
        r"optimi[sz]e",
        r"strategy",
        r"architecture",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub openai_api_key: Secret<String>,
    pub anthropic_api_key: Secret<String>,
}

#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub secret: Secret<String>,
}

impl GatewayConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = common_config.is_prod();

        let routing_defaults = RoutingConfig::default();
        let heavy_patterns = match env::var("GATEWAY_HEAVY_PATTERNS") {
            Ok(val) => val.split(',').map(|s| s.trim().to_string()).collect(),
            Err(_) => routing_defaults.heavy_patterns,
        };

        Ok(GatewayConfig {
            common: common_config,
            mongodb: MongoConfig {
                uri: get_env("MONGODB_URI", Some("mongodb://localhost:27017"), is_prod)?,
                database: get_env("MONGODB_DATABASE", Some("gateway_db"), is_prod)?,
            },
            redis: RedisConfig {
                url: get_env("REDIS_URL", Some("redis://localhost:6379"), is_prod)?,
                // fail-open is never the default, and ignored in prod
                fail_open: !is_prod
                    && get_env("GATEWAY_RATE_LIMIT_FAIL_OPEN", Some("false"), is_prod)?
                        .parse()
                        .unwrap_or(false),
            },
            rate_limit: RateLimitConfig {
                limit: parse_env("GATEWAY_RATE_LIMIT", 30, is_prod)?,
                window_seconds: parse_env("GATEWAY_RATE_WINDOW_SECONDS", 60, is_prod)?,
            },
            session: SessionConfig {
                token_limit: parse_env("GATEWAY_TOKEN_LIMIT", DEFAULT_TOKEN_LIMIT, is_prod)?,
                grant_hours: parse_env("GATEWAY_GRANT_HOURS", DEFAULT_GRANT_HOURS, is_prod)?,
                precheck_headroom: parse_env(
                    "GATEWAY_PRECHECK_HEADROOM",
                    DEFAULT_PRECHECK_HEADROOM,
                    is_prod,
                )?,
            },
            routing: RoutingConfig {
                length_threshold: parse_env(
                    "GATEWAY_LENGTH_THRESHOLD",
                    DEFAULT_LENGTH_THRESHOLD,
                    is_prod,
                )?,
                heavy_patterns,
                light_model: get_env("GATEWAY_LIGHT_MODEL", Some("gpt-4o-mini"), is_prod)?,
                heavy_model: get_env(
                    "GATEWAY_HEAVY_MODEL",
                    Some("claude-3-5-sonnet-20241022"),
                    is_prod,
                )?,
            },
            providers: ProviderConfig {
                openai_api_key: Secret::new(get_env("OPENAI_API_KEY", None, is_prod)?),
                anthropic_api_key: Secret::new(get_env("ANTHROPIC_API_KEY", None, is_prod)?),
            },
            webhook: WebhookConfig {
                secret: Secret::new(get_env(
                    "GATEWAY_WEBHOOK_SECRET",
                    Some("dev-webhook-secret"),
                    is_prod,
                )?),
            },
        })
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

fn parse_env<T>(key: &str, default: T, is_prod: bool) -> Result<T, AppError>
where
    T: std::str::FromStr + ToString,
{
    let raw = get_env(key, Some(&default.to_string()), is_prod)?;
    raw.parse().map_err(|_| {
        AppError::ConfigError(anyhow::anyhow!("{} has an invalid value: {}", key, raw))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routing_defaults_match_documented_policy() {
        let routing = RoutingConfig::default();
        assert_eq!(routing.length_threshold, 600);
        assert_eq!(routing.light_model, "gpt-4o-mini");
        assert_eq!(routing.heavy_model, "claude-3-5-sonnet-20241022");
        assert!(routing.heavy_patterns.iter().any(|p| p.contains("proof")));
    }
}
