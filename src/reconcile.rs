//! The entity sentiment reconciler: segmentation, per-chunk annotation,
//! aggregation and rendering for one text.

use crate::aggregate::{EntityReportRow, EntityTable};
use crate::annotate::{annotate_chunk, EntityOccurrence};
use crate::article::Article;
use crate::config::ReconcileConfig;
use crate::ml::lexicon::{document_sentiment, DocumentSentiment};
use crate::ml::{MlBackends, NerTagger, TargetSentiment};
use crate::render::{render, Rendered};
use crate::segment::{segment, SentenceSplitter, SubwordEstimator, TokenCounter, UnicodeSentenceSplitter};
use std::sync::Arc;
use tracing::{info, warn};

/// Result for one text: escaped filtered text, the same with entity
/// highlighting, and the per-entity aggregation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Analysis {
    pub plain: String,
    pub highlighted: String,
    pub entities: EntityTable,
}

/// Result for an article body and its summary.
#[derive(Debug, Clone)]
pub struct ArticleAnalysis {
    pub body: Analysis,
    pub summary: Rendered,
    pub top_entities: Vec<EntityReportRow>,
    pub document_sentiment: Option<DocumentSentiment>,
}

pub struct Reconciler {
    splitter: Arc<dyn SentenceSplitter>,
    counter: Arc<dyn TokenCounter>,
    tagger: Arc<dyn NerTagger>,
    sentiment: Arc<dyn TargetSentiment>,
    config: ReconcileConfig,
}

impl Reconciler {
    /// Reconciler with the default sentence splitter. Chunks are sized with
    /// the backend's own token counter when it has one, otherwise with the
    /// subword estimator.
    pub fn new(backends: MlBackends, config: ReconcileConfig) -> Self {
        Self {
            splitter: Arc::new(UnicodeSentenceSplitter::new(config.caps_ratio)),
            counter: backends
                .counter
                .unwrap_or_else(|| Arc::new(SubwordEstimator::default())),
            tagger: backends.tagger,
            sentiment: backends.sentiment,
            config,
        }
    }

    pub fn with_splitter(mut self, splitter: Arc<dyn SentenceSplitter>) -> Self {
        self.splitter = splitter;
        self
    }

    pub fn with_token_counter(mut self, counter: Arc<dyn TokenCounter>) -> Self {
        self.counter = counter;
        self
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Every entity occurrence in `text`, in filtered-text coordinates,
    /// along with the filtered text itself.
    pub fn occurrences(&self, text: &str) -> (String, Vec<EntityOccurrence>) {
        let segmentation = segment(text, &*self.splitter, &*self.counter, &self.config);
        if segmentation.is_empty() {
            return (String::new(), Vec::new());
        }

        let mut occurrences = Vec::new();
        let mut chunks = 0;
        let mut skipped = 0;
        for chunk in segmentation.chunks() {
            chunks += 1;
            match annotate_chunk(chunk, &*self.tagger, &*self.sentiment) {
                Ok(found) => occurrences.extend(found),
                Err(e) => {
                    warn!("⚠️ NER failed on chunk at offset {}: {}. Skipping chunk", chunk.offset, e);
                    skipped += 1;
                }
            }
        }
        info!(
            "🧠 Annotated {} chunks ({} skipped), {} entity mentions",
            chunks,
            skipped,
            occurrences.len()
        );

        (segmentation.filtered, occurrences)
    }

    pub fn analyze(&self, text: &str) -> Analysis {
        let (filtered, occurrences) = self.occurrences(text);
        if filtered.is_empty() {
            return Analysis::default();
        }
        let entities = EntityTable::fold(&occurrences);
        let Rendered { plain, highlighted } = render(&filtered, &occurrences);
        Analysis {
            plain,
            highlighted,
            entities,
        }
    }

    /// Analyse an article's body and summary. The summary's entity table is
    /// not kept; the report covers the body only.
    pub fn analyze_article(&self, article: &Article) -> ArticleAnalysis {
        let body = self.analyze(&article.text);
        let summary = self.analyze(&article.summary);
        let top_entities = body.entities.top(self.config.top_entities);

        ArticleAnalysis {
            document_sentiment: document_sentiment(&article.text),
            top_entities,
            summary: Rendered {
                plain: summary.plain,
                highlighted: summary.highlighted,
            },
            body,
        }
    }
}
