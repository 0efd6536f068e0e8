//! Environment-driven configuration.
//!
//! Every setting has a default so the service starts with an empty environment.
//! Values are read once at startup (after `dotenv`) and shared read-only.

use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Which implementation backs the NER tagger and target-sentiment classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MlBackend {
    /// Offline heuristic tagger + word-list sentiment
    Lexicon,
    /// HTTP calls to the Python model sidecar
    Sidecar,
}

impl FromStr for MlBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lexicon" | "local" => Ok(MlBackend::Lexicon),
            "sidecar" | "remote" => Ok(MlBackend::Sidecar),
            other => Err(format!("unknown ML backend '{}'", other)),
        }
    }
}

/// Knobs for the segmentation and reporting steps of the reconciler.
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// Max tokens per chunk (512-token model window minus special tokens)
    pub token_budget: usize,
    /// Share of all-caps words at which a sentence is dropped as boilerplate
    pub caps_ratio: f32,
    /// Number of entities in the report
    pub top_entities: usize,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            token_budget: 510,
            caps_ratio: 0.8,
            top_entities: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub ml_backend: MlBackend,
    pub sidecar_url: String,
    pub ml_timeout: Duration,
    pub fetch_timeout: Duration,
    pub summary_sentences: usize,
    pub reconcile: ReconcileConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            ml_backend: MlBackend::Lexicon,
            sidecar_url: "http://localhost:8000".to_string(),
            ml_timeout: Duration::from_secs(60),
            fetch_timeout: Duration::from_secs(30),
            summary_sentences: 5,
            reconcile: ReconcileConfig::default(),
        }
    }
}

impl AppConfig {
    /// Build the config from process environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup (tests pass a map here).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = AppConfig::default();

        let token_budget: usize = parse_or(&lookup, "TOKEN_BUDGET", defaults.reconcile.token_budget);
        let caps_ratio: f32 = parse_or(&lookup, "CAPS_RATIO", defaults.reconcile.caps_ratio);

        Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or(defaults.bind_addr),
            ml_backend: parse_or(&lookup, "ML_BACKEND", defaults.ml_backend),
            sidecar_url: lookup("ML_SIDECAR_URL")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or(defaults.sidecar_url),
            ml_timeout: Duration::from_secs(parse_or(&lookup, "ML_TIMEOUT_SECS", 60)),
            fetch_timeout: Duration::from_secs(parse_or(&lookup, "FETCH_TIMEOUT_SECS", 30)),
            summary_sentences: parse_or(&lookup, "SUMMARY_SENTENCES", defaults.summary_sentences),
            reconcile: ReconcileConfig {
                // a zero budget could never hold a single token
                token_budget: token_budget.max(1),
                caps_ratio: caps_ratio.clamp(0.0, 1.0),
                top_entities: parse_or(&lookup, "TOP_ENTITIES", defaults.reconcile.top_entities),
            },
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!("⚠️ Ignoring unparsable {}={:?}, using default", key, raw);
                default
            }
        },
    }
}
