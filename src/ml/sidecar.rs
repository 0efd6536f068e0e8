//! Client for the Python model sidecar.
//!
//! Endpoints:
//! - `POST /ml/ner` `{ "text": ... }` → `{ "entities": [{ text, label, start, end, score }] }`
//! - `POST /ml/target_sentiment` `{ "left", "target", "right" }` → `{ "results": [{ label, probability }] }`
//! - `POST /ml/tokenize` `{ "texts": [...] }` → `{ "counts": [...] }`, token counts
//!   under the NER model's tokenizer, without special tokens
//!
//! The sidecar reports character offsets; they are converted to byte offsets
//! here. The reconciler is synchronous, so calls bridge onto the async client
//! with `Handle::block_on`. They must run on a blocking thread
//! (`spawn_blocking`), never on a runtime worker.

use super::{NerSpan, NerTagger, SentimentLabel, SentimentScore, TargetSentiment};
use crate::error::MlError;
use crate::segment::{ByteCeiling, TokenCounter};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::warn;

#[derive(Debug, Serialize)]
struct NerRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct NerResponse {
    entities: Vec<SidecarEntity>,
}

#[derive(Debug, Deserialize)]
struct SidecarEntity {
    text: String,
    label: String,
    start: Option<usize>,
    end: Option<usize>,
    #[serde(default)]
    score: f32,
}

#[derive(Debug, Serialize)]
struct TargetRequest<'a> {
    left: &'a str,
    target: &'a str,
    right: &'a str,
}

#[derive(Debug, Deserialize)]
struct TargetResponse {
    results: Vec<SidecarSentiment>,
}

#[derive(Debug, Deserialize)]
struct SidecarSentiment {
    label: String,
    probability: f32,
}

#[derive(Debug, Serialize)]
struct TokenizeRequest<'a> {
    texts: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct TokenizeResponse {
    counts: Vec<usize>,
}

pub struct SidecarClient {
    client: reqwest::Client,
    base_url: String,
    handle: Handle,
}

impl SidecarClient {
    pub fn new(base_url: &str, timeout: Duration, handle: Handle) -> Result<Self, MlError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MlError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            handle,
        })
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, MlError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                warn!("⚠️ [ML] {} connection failed: {}. Is the sidecar running?", path, e);
                MlError::Transport(e.to_string())
            })?;

        if !response.status().is_success() {
            warn!("⚠️ [ML] {} request failed: {}", path, response.status());
            return Err(MlError::Status(response.status().as_u16()));
        }

        response
            .json::<R>()
            .await
            .map_err(|e| MlError::Decode(e.to_string()))
    }
}

impl NerTagger for SidecarClient {
    fn tag(&self, text: &str) -> Result<Vec<NerSpan>, MlError> {
        let response: NerResponse = self
            .handle
            .block_on(self.post_json("/ml/ner", &NerRequest { text }))?;

        let offsets = CharOffsets::new(text);
        Ok(response
            .entities
            .into_iter()
            .map(|e| NerSpan {
                text: e.text,
                label: e.label,
                start: e.start.and_then(|c| offsets.byte_offset(c)),
                end: e.end.and_then(|c| offsets.byte_offset(c)),
                score: e.score,
            })
            .collect())
    }
}

impl TargetSentiment for SidecarClient {
    fn classify(
        &self,
        left: &str,
        target: &str,
        right: &str,
    ) -> Result<Vec<SentimentScore>, MlError> {
        let response: TargetResponse = self.handle.block_on(self.post_json(
            "/ml/target_sentiment",
            &TargetRequest { left, target, right },
        ))?;
        let mut results = response.results.into_iter();
        let primary = results.next().ok_or(MlError::EmptyResult)?;
        let label = SentimentLabel::from_label(&primary.label)
            .ok_or_else(|| MlError::Decode(format!("unknown sentiment label '{}'", primary.label)))?;

        let mut scores = vec![SentimentScore {
            label,
            probability: primary.probability,
        }];
        // only the primary answer has to be usable
        scores.extend(results.filter_map(|r| {
            SentimentLabel::from_label(&r.label).map(|label| SentimentScore {
                label,
                probability: r.probability,
            })
        }));
        Ok(scores)
    }
}

impl TokenCounter for SidecarClient {
    fn count(&self, text: &str) -> usize {
        self.count_many(&[text]).first().copied().unwrap_or_default()
    }

    /// One request for the whole batch. If the sidecar cannot answer, falls
    /// back to [`ByteCeiling`], which never undercounts.
    fn count_many(&self, texts: &[&str]) -> Vec<usize> {
        if texts.is_empty() {
            return Vec::new();
        }
        let counted: Result<TokenizeResponse, MlError> = self
            .handle
            .block_on(self.post_json("/ml/tokenize", &TokenizeRequest { texts }));
        match counted {
            Ok(response) if response.counts.len() == texts.len() => response.counts,
            Ok(response) => {
                warn!(
                    "⚠️ [ML] tokenize returned {} counts for {} texts, using byte ceiling",
                    response.counts.len(),
                    texts.len()
                );
                ByteCeiling.count_many(texts)
            }
            Err(e) => {
                warn!("⚠️ [ML] tokenize failed: {}. Using byte ceiling", e);
                ByteCeiling.count_many(texts)
            }
        }
    }
}

/// Char index → byte offset table for one text.
pub(crate) struct CharOffsets {
    boundaries: Vec<usize>,
}

impl CharOffsets {
    pub(crate) fn new(text: &str) -> Self {
        let mut boundaries: Vec<usize> = text.char_indices().map(|(b, _)| b).collect();
        boundaries.push(text.len());
        Self { boundaries }
    }

    /// `None` past the end of the text.
    pub(crate) fn byte_offset(&self, char_index: usize) -> Option<usize> {
        self.boundaries.get(char_index).copied()
    }
}
