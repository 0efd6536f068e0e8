//! ML capabilities: named-entity tagging and target-dependent sentiment.
//!
//! The reconciler only sees the [`NerTagger`] and [`TargetSentiment`] traits.
//! Two backends implement them:
//! - [`lexicon`]: offline heuristics (capitalisation + gazetteers, word lists)
//! - [`sidecar`]: the Python model sidecar over HTTP

pub mod lexicon;
pub mod sidecar;

use crate::config::{AppConfig, MlBackend};
use crate::error::MlError;
use crate::segment::TokenCounter;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

/// Entity categories the reconciler keeps. Other tagger labels are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Person,
    Organization,
    Location,
    Miscellaneous,
}

impl EntityKind {
    /// Map a tagger label (`PER`, `B-ORG`, `location`, ...) to a kind.
    pub fn from_label(label: &str) -> Option<Self> {
        let upper = label.trim().to_uppercase();
        let bare = upper
            .strip_prefix("B-")
            .or_else(|| upper.strip_prefix("I-"))
            .unwrap_or(upper.as_str());
        match bare {
            "PER" | "PERSON" => Some(EntityKind::Person),
            "ORG" | "ORGANIZATION" | "ORGANISATION" => Some(EntityKind::Organization),
            "LOC" | "LOCATION" | "GPE" => Some(EntityKind::Location),
            "MISC" | "MISCELLANEOUS" => Some(EntityKind::Miscellaneous),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            EntityKind::Person => "PER",
            EntityKind::Organization => "ORG",
            EntityKind::Location => "LOC",
            EntityKind::Miscellaneous => "MISC",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

impl SentimentLabel {
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "positive" | "pos" => Some(SentimentLabel::Positive),
            "neutral" | "neu" => Some(SentimentLabel::Neutral),
            "negative" | "neg" => Some(SentimentLabel::Negative),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Neutral => "neutral",
            SentimentLabel::Negative => "negative",
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One tagger detection, offsets are byte offsets local to the tagged text.
/// Offsets are optional because some taggers omit them for merged tokens.
#[derive(Debug, Clone, PartialEq)]
pub struct NerSpan {
    pub text: String,
    pub label: String,
    pub start: Option<usize>,
    pub end: Option<usize>,
    pub score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SentimentScore {
    pub label: SentimentLabel,
    pub probability: f32,
}

pub trait NerTagger: Send + Sync {
    fn tag(&self, text: &str) -> Result<Vec<NerSpan>, MlError>;
}

/// Sentiment towards `target`, given the text on either side of it.
/// Results are ordered by probability, the first one is the answer.
pub trait TargetSentiment: Send + Sync {
    fn classify(&self, left: &str, target: &str, right: &str)
        -> Result<Vec<SentimentScore>, MlError>;
}

/// The capabilities the reconciler runs with.
#[derive(Clone)]
pub struct MlBackends {
    pub tagger: Arc<dyn NerTagger>,
    pub sentiment: Arc<dyn TargetSentiment>,
    /// The tagger's own tokenizer, when the backend exposes one
    pub counter: Option<Arc<dyn TokenCounter>>,
}

/// Build the configured backend. The sidecar backend must be built from
/// inside a tokio runtime.
pub fn build_backends(config: &AppConfig) -> Result<MlBackends, MlError> {
    match config.ml_backend {
        MlBackend::Lexicon => {
            info!("🧠 Using offline lexicon NER + sentiment backend");
            Ok(MlBackends {
                tagger: Arc::new(lexicon::HeuristicTagger::default()),
                sentiment: Arc::new(lexicon::LexiconSentiment::default()),
                counter: None,
            })
        }
        MlBackend::Sidecar => {
            info!("🧠 Using ML sidecar at {}", config.sidecar_url);
            let client = Arc::new(sidecar::SidecarClient::new(
                &config.sidecar_url,
                config.ml_timeout,
                tokio::runtime::Handle::current(),
            )?);
            Ok(MlBackends {
                tagger: client.clone(),
                sentiment: client.clone(),
                counter: Some(client),
            })
        }
    }
}
