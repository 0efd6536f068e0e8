//! Per-chunk annotation: NER on one chunk, then target sentiment for each
//! entity using the chunk as context.

use crate::error::MlError;
use crate::ml::{EntityKind, NerTagger, SentimentLabel, TargetSentiment};
use crate::segment::Chunk;
use serde::Serialize;
use tracing::{debug, warn};
use utoipa::ToSchema;

/// Confidence recorded when the sentiment classifier fails for an entity
pub const FALLBACK_CONFIDENCE: f32 = 0.5;

/// One detected mention. Offsets are byte offsets into the filtered text,
/// end-exclusive.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct EntityOccurrence {
    pub text: String,
    pub kind: EntityKind,
    pub start: usize,
    pub end: usize,
    pub sentiment: SentimentLabel,
    pub confidence: f32,
}

impl EntityOccurrence {
    pub fn overlaps(&self, other: &EntityOccurrence) -> bool {
        self.start < other.end && self.end > other.start
    }
}

/// Tag `chunk` and classify every accepted entity.
///
/// Returns `Err` only when the tagger fails, in which case the caller skips
/// the chunk. A sentiment failure downgrades that one entity to neutral.
pub fn annotate_chunk(
    chunk: Chunk<'_>,
    tagger: &dyn NerTagger,
    sentiment: &dyn TargetSentiment,
) -> Result<Vec<EntityOccurrence>, MlError> {
    let spans = tagger.tag(chunk.text)?;
    let mut occurrences = Vec::with_capacity(spans.len());

    for span in spans {
        let Some(kind) = EntityKind::from_label(&span.label) else {
            continue;
        };
        let (Some(start), Some(end)) = (span.start, span.end) else {
            debug!("Dropping '{}': tagger gave no offsets", span.text);
            continue;
        };
        if start >= end
            || end > chunk.text.len()
            || !chunk.text.is_char_boundary(start)
            || !chunk.text.is_char_boundary(end)
        {
            debug!("Dropping '{}': bad local span {}..{}", span.text, start, end);
            continue;
        }

        let left = &chunk.text[..start];
        let target = &chunk.text[start..end];
        let right = &chunk.text[end..];

        let (label, confidence) = match sentiment.classify(left, target, right) {
            Ok(scores) => match scores.first() {
                Some(primary) if primary.probability.is_finite() => {
                    (primary.label, primary.probability.clamp(0.0, 1.0))
                }
                _ => {
                    warn!("⚠️ No usable sentiment for '{}', defaulting to neutral", target);
                    (SentimentLabel::Neutral, FALLBACK_CONFIDENCE)
                }
            },
            Err(e) => {
                warn!("⚠️ Sentiment failed for '{}': {}. Defaulting to neutral", target, e);
                (SentimentLabel::Neutral, FALLBACK_CONFIDENCE)
            }
        };

        occurrences.push(EntityOccurrence {
            text: target.to_string(),
            kind,
            start: chunk.offset + start,
            end: chunk.offset + end,
            sentiment: label,
            confidence,
        });
    }

    Ok(occurrences)
}
