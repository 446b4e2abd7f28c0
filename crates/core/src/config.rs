//! Runtime configuration for the acquisition pipeline.
//! Values come from defaults and environment variables; the CLI overrides
//! individual fields afterwards.

use anyhow::{anyhow, Context, Result};
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_GEMINI_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_BILIBILI_API: &str = "https://api.bilibili.com";
pub const DEFAULT_RELAY: &str = "https://api.allorigins.win/raw";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 120;

/// Settings shared by the resolver, the normalizer and the generator.
#[derive(Clone)]
pub struct Config {
    /// Credential for the generative service. Absence is only reported when
    /// a normalization is attempted.
    pub api_key: Option<String>,
    /// Generative model name.
    pub model: String,
    /// Base URL of the generative service.
    pub gemini_base: String,
    /// Base URL of the Bilibili web API.
    pub bilibili_api_base: String,
    /// Cross-origin relay every Bilibili request goes through, if any.
    pub relay_url: Option<String>,
    /// Subtitle language tags tried in order before falling back to the
    /// first available track.
    pub preferred_languages: Vec<String>,
    /// Language the subtitles are transcribed in.
    pub source_language: String,
    /// Language the subtitles are translated to.
    pub target_language: String,
    pub http_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            gemini_base: DEFAULT_GEMINI_BASE.to_string(),
            bilibili_api_base: DEFAULT_BILIBILI_API.to_string(),
            relay_url: Some(DEFAULT_RELAY.to_string()),
            preferred_languages: vec!["zh-CN".to_string(), "zh-Hans".to_string()],
            source_language: "Chinese".to_string(),
            target_language: "English".to_string(),
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("gemini_base", &self.gemini_base)
            .field("bilibili_api_base", &self.bilibili_api_base)
            .field("relay_url", &self.relay_url)
            .field("preferred_languages", &self.preferred_languages)
            .field("source_language", &self.source_language)
            .field("target_language", &self.target_language)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .finish()
    }
}

impl Config {
    /// Build a configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    /// The way this works is by starting from the defaults and replacing
    /// each field whose variable is set and non-blank.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();
        config.api_key = get("GEMINI_API_KEY").or_else(|| get("API_KEY"));
        if let Some(model) = get("BILISUB_MODEL") {
            config.model = model;
        }
        if let Some(base) = get("BILISUB_GEMINI_BASE") {
            config.gemini_base = base;
        }
        if let Some(base) = get("BILISUB_API_BASE") {
            config.bilibili_api_base = base;
        }
        if let Some(relay) = get("BILISUB_RELAY") {
            config.relay_url = if relay.eq_ignore_ascii_case("none") {
                None
            } else {
                Some(relay)
            };
        }
        if let Some(langs) = get("BILISUB_LANGUAGES") {
            config.preferred_languages = langs
                .split(',')
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(secs) = get("BILISUB_HTTP_TIMEOUT") {
            config.http_timeout_secs = secs
                .trim()
                .parse()
                .with_context(|| format!("invalid BILISUB_HTTP_TIMEOUT {secs:?}"))?;
            if config.http_timeout_secs == 0 {
                return Err(anyhow!("BILISUB_HTTP_TIMEOUT must be positive"));
            }
        }
        Ok(config)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert!(config.api_key.is_none());
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.relay_url.as_deref(), Some(DEFAULT_RELAY));
        assert_eq!(config.preferred_languages, vec!["zh-CN", "zh-Hans"]);
        assert_eq!(config.http_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn api_key_falls_back_to_generic_variable() {
        let config = Config::from_lookup(lookup(&[("API_KEY", "k2")])).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("k2"));
        let config =
            Config::from_lookup(lookup(&[("GEMINI_API_KEY", "k1"), ("API_KEY", "k2")])).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("k1"));
    }

    #[test]
    fn blank_key_counts_as_missing() {
        let config = Config::from_lookup(lookup(&[("GEMINI_API_KEY", "  ")])).unwrap();
        assert!(config.api_key.is_none());
    }

    #[test]
    fn relay_can_be_disabled_and_languages_overridden() {
        let config = Config::from_lookup(lookup(&[
            ("BILISUB_RELAY", "none"),
            ("BILISUB_LANGUAGES", "en-US, ja ,"),
        ]))
        .unwrap();
        assert!(config.relay_url.is_none());
        assert_eq!(config.preferred_languages, vec!["en-US", "ja"]);
    }

    #[test]
    fn rejects_bad_timeout() {
        assert!(Config::from_lookup(lookup(&[("BILISUB_HTTP_TIMEOUT", "soon")])).is_err());
        assert!(Config::from_lookup(lookup(&[("BILISUB_HTTP_TIMEOUT", "0")])).is_err());
    }

    #[test]
    fn debug_output_hides_key() {
        let config = Config {
            api_key: Some("secret".into()),
            ..Config::default()
        };
        assert!(!format!("{config:?}").contains("secret"));
    }
}
