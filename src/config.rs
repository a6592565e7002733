//! Configuration loading and validation.

use crate::error::{ConfigError, Result};

/// digestline configuration, assembled entirely from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database file path.
    pub database_path: std::path::PathBuf,

    /// HTTP listen address.
    pub bind_addr: std::net::SocketAddr,

    /// Signature verification settings.
    pub signature: SignatureConfig,

    /// Slack OAuth settings.
    pub oauth: OAuthConfig,

    /// Query-vector composition weights.
    pub query_weights: QueryWeights,

    /// Online feedback update settings.
    pub feedback: FeedbackConfig,

    /// Candidate retrieval window and rerank tuning.
    pub retrieval: RetrievalConfig,
}

/// Slack-style HMAC signature verification settings.
#[derive(Debug, Clone)]
pub struct SignatureConfig {
    /// Shared signing secret. `None` disables verification outright only if
    /// `enabled` is also false; an enabled check with no secret fails per-request.
    pub signing_secret: Option<String>,

    /// Whether the signature check runs at all (`SLACK_VERIFY_SIGNATURE`).
    pub enabled: bool,

    /// Maximum allowed clock skew, in seconds, between request and now.
    pub freshness_window_secs: i64,
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            signing_secret: None,
            enabled: true,
            freshness_window_secs: 300,
        }
    }
}

/// Slack OAuth install/token-exchange settings.
#[derive(Debug, Clone, Default)]
pub struct OAuthConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
    pub scopes: String,
}

/// Query-vector composition weights (§4.6).
#[derive(Debug, Clone, Copy)]
pub struct QueryWeights {
    pub role: f64,
    pub user: f64,
    pub phase: f64,
}

impl Default for QueryWeights {
    fn default() -> Self {
        Self {
            role: 0.45,
            user: 0.35,
            phase: 0.20,
        }
    }
}

/// Online feedback update tuning (§4.8).
#[derive(Debug, Clone, Copy)]
pub struct FeedbackConfig {
    pub alpha: f64,
    pub decay_days: f64,
    pub decay_blend: f64,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            alpha: 0.90,
            decay_days: 14.0,
            decay_blend: 0.05,
        }
    }
}

/// Candidate retrieval window (§4.7).
#[derive(Debug, Clone, Copy)]
pub struct RetrievalConfig {
    pub window_hours: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { window_hours: 24.0 }
    }
}

impl Config {
    /// Load configuration from the environment. Fails only on a genuinely
    /// fatal startup misconfiguration (an unparseable bind address); a
    /// missing signing secret with verification enabled is a per-request
    /// error, not a startup one, per the spec's error-handling policy.
    pub fn load() -> Result<Self> {
        let database_path = std::env::var("DATABASE_PATH")
            .unwrap_or_else(|_| "./app.db".into())
            .into();

        let bind_addr_str = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".into());
        let bind_addr = bind_addr_str
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("invalid BIND_ADDR {bind_addr_str:?}: {e}")))?;

        let signature = SignatureConfig {
            signing_secret: std::env::var("SLACK_SIGNING_SECRET").ok(),
            enabled: signature_verification_enabled(),
            ..SignatureConfig::default()
        };

        let oauth = OAuthConfig {
            client_id: std::env::var("SLACK_CLIENT_ID").ok(),
            client_secret: std::env::var("SLACK_CLIENT_SECRET").ok(),
            redirect_uri: std::env::var("SLACK_REDIRECT_URI").ok(),
            scopes: std::env::var("SLACK_OAUTH_SCOPES")
                .unwrap_or_else(|_| "commands,chat:write,channels:read".into()),
        };

        let query_weights = QueryWeights {
            role: env_f64("QUERY_WEIGHT_ROLE", QueryWeights::default().role),
            user: env_f64("QUERY_WEIGHT_USER", QueryWeights::default().user),
            phase: env_f64("QUERY_WEIGHT_PHASE", QueryWeights::default().phase),
        };

        let feedback = FeedbackConfig {
            alpha: env_f64("USER_EMBED_ALPHA", FeedbackConfig::default().alpha),
            decay_days: env_f64("USER_DECAY_DAYS", FeedbackConfig::default().decay_days),
            decay_blend: env_f64("USER_DECAY_BLEND", FeedbackConfig::default().decay_blend),
        };

        let retrieval = RetrievalConfig {
            window_hours: env_f64(
                "RETRIEVAL_WINDOW_HOURS",
                RetrievalConfig::default().window_hours,
            ),
        };

        Ok(Self {
            database_path,
            bind_addr,
            signature,
            oauth,
            query_weights,
            feedback,
            retrieval,
        })
    }
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Mirrors `original_source/app/ingest.py::signature_verification_enabled`:
/// disabled only if the env var is explicitly one of a known falsy set.
fn signature_verification_enabled() -> bool {
    match std::env::var("SLACK_VERIFY_SIGNATURE") {
        Ok(v) => !matches!(v.to_lowercase().as_str(), "0" | "false" | "no"),
        Err(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_weights_default_matches_spec() {
        let w = QueryWeights::default();
        assert_eq!(w.role, 0.45);
        assert_eq!(w.user, 0.35);
        assert_eq!(w.phase, 0.20);
    }
}
