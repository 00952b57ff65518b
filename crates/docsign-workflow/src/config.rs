//! Engine configuration

use std::time::Duration;

use docsign_types::AppConfiguration;

/// Negative-result memo lifetime (3 hours)
pub const DEFAULT_NEGATIVE_CACHE_TTL: Duration = Duration::from_secs(3 * 60 * 60);

/// Distribution histogram lifetime, sized for dashboard polling
pub const DEFAULT_DISTRIBUTION_CACHE_TTL: Duration = Duration::from_secs(15);

/// Signing links stay valid for 7 days
pub const DEFAULT_LINK_EXPIRY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long a not-found / not-in-group outcome is remembered
    pub negative_cache_ttl: Duration,

    /// How long a distribution status histogram is served from memory
    pub distribution_cache_ttl: Duration,

    /// HMAC key for signer link tokens
    pub link_secret: String,

    pub link_expiry: Duration,

    /// Settings handed to every message sender
    pub app: AppConfiguration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            negative_cache_ttl: DEFAULT_NEGATIVE_CACHE_TTL,
            distribution_cache_ttl: DEFAULT_DISTRIBUTION_CACHE_TTL,
            link_secret: "development-only-link-secret".to_string(),
            link_expiry: DEFAULT_LINK_EXPIRY,
            app: AppConfiguration::default(),
        }
    }
}

impl EngineConfig {
    /// Load from `DOCSIGN_*` environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`EngineConfig::from_env`] with an injectable variable source
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let secs = |key: &str, fallback: Duration| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(fallback)
        };

        let link_secret = match lookup("DOCSIGN_LINK_SECRET") {
            Some(secret) if !secret.is_empty() => secret,
            _ => {
                tracing::warn!("DOCSIGN_LINK_SECRET not configured - using development secret");
                defaults.link_secret.clone()
            }
        };

        Self {
            negative_cache_ttl: secs("DOCSIGN_NEGATIVE_CACHE_TTL_SECS", defaults.negative_cache_ttl),
            distribution_cache_ttl: secs(
                "DOCSIGN_DISTRIBUTION_CACHE_TTL_SECS",
                defaults.distribution_cache_ttl,
            ),
            link_secret,
            link_expiry: secs("DOCSIGN_LINK_EXPIRY_SECS", defaults.link_expiry),
            app: AppConfiguration {
                signing_base_url: lookup("DOCSIGN_SIGNING_BASE_URL")
                    .unwrap_or(defaults.app.signing_base_url),
                download_base_url: lookup("DOCSIGN_DOWNLOAD_BASE_URL")
                    .unwrap_or(defaults.app.download_base_url),
                email_from: lookup("DOCSIGN_EMAIL_FROM").unwrap_or(defaults.app.email_from),
                sms_sender: lookup("DOCSIGN_SMS_SENDER").unwrap_or(defaults.app.sms_sender),
            },
        }
    }
}
