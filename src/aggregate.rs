//! Folding entity occurrences into per-surface-text records, and the top-N
//! entity report.

use crate::annotate::EntityOccurrence;
use crate::ml::{EntityKind, SentimentLabel};
use serde::Serialize;
use std::collections::BTreeMap;
use utoipa::ToSchema;

/// All mentions of one surface text. `sentiment`/`confidence` come from the
/// most confident mention seen so far.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct EntityRecord {
    pub text: String,
    pub kind: EntityKind,
    pub sentiment: SentimentLabel,
    pub confidence: f32,
    pub occurrences: usize,
}

/// Entity records keyed by exact surface text.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct EntityTable {
    records: BTreeMap<String, EntityRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct EntityReportRow {
    pub name: String,
    pub kind: EntityKind,
    pub occurrences: usize,
    pub sentiment: SentimentLabel,
    pub confidence: f32,
}

impl EntityTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fold<'a, I>(occurrences: I) -> Self
    where
        I: IntoIterator<Item = &'a EntityOccurrence>,
    {
        let mut table = Self::new();
        for occurrence in occurrences {
            table.record(occurrence);
        }
        table
    }

    /// Count one more mention. Sentiment is only replaced by a strictly more
    /// confident mention.
    pub fn record(&mut self, occurrence: &EntityOccurrence) {
        match self.records.get_mut(&occurrence.text) {
            Some(record) => {
                record.occurrences += 1;
                if occurrence.confidence > record.confidence {
                    record.sentiment = occurrence.sentiment;
                    record.confidence = occurrence.confidence;
                }
            }
            None => {
                self.records.insert(
                    occurrence.text.clone(),
                    EntityRecord {
                        text: occurrence.text.clone(),
                        kind: occurrence.kind,
                        sentiment: occurrence.sentiment,
                        confidence: occurrence.confidence,
                        occurrences: 1,
                    },
                );
            }
        }
    }

    pub fn get(&self, text: &str) -> Option<&EntityRecord> {
        self.records.get(text)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &EntityRecord> {
        self.records.values()
    }

    /// The `n` entities with the most mentions, confidence breaking ties.
    pub fn top(&self, n: usize) -> Vec<EntityReportRow> {
        let mut ranked: Vec<&EntityRecord> = self.records.values().collect();
        // map iteration is already sorted by text, so equal keys keep text order
        ranked.sort_by(|a, b| {
            b.occurrences
                .cmp(&a.occurrences)
                .then_with(|| b.confidence.total_cmp(&a.confidence))
        });
        ranked
            .into_iter()
            .take(n)
            .map(|r| EntityReportRow {
                name: r.text.clone(),
                kind: r.kind,
                occurrences: r.occurrences,
                sentiment: r.sentiment,
                confidence: r.confidence,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn occ(text: &str, sentiment: SentimentLabel, confidence: f32) -> EntityOccurrence {
        EntityOccurrence {
            text: text.to_string(),
            kind: EntityKind::Person,
            start: 0,
            end: text.len(),
            sentiment,
            confidence,
        }
    }

    #[test]
    fn test_record_counts_and_keeps_most_confident() {
        let table = EntityTable::fold(&[
            occ("Macron", SentimentLabel::Positive, 0.7),
            occ("Macron", SentimentLabel::Negative, 0.9),
            occ("Macron", SentimentLabel::Neutral, 0.8),
        ]);
        let record = table.get("Macron").unwrap();
        assert_eq!(record.occurrences, 3);
        assert_eq!(record.sentiment, SentimentLabel::Negative);
        assert_eq!(record.confidence, 0.9);
    }

    #[test]
    fn test_equal_confidence_keeps_first() {
        let table = EntityTable::fold(&[
            occ("Oslo", SentimentLabel::Positive, 0.6),
            occ("Oslo", SentimentLabel::Negative, 0.6),
        ]);
        assert_eq!(table.get("Oslo").unwrap().sentiment, SentimentLabel::Positive);
    }

    #[test]
    fn test_surface_text_is_exact_key() {
        let table = EntityTable::fold(&[
            occ("Paris", SentimentLabel::Neutral, 0.5),
            occ("paris", SentimentLabel::Neutral, 0.5),
        ]);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_top_ranks_by_count_then_confidence() {
        let mut occurrences = vec![
            occ("A", SentimentLabel::Neutral, 0.5),
            occ("B", SentimentLabel::Neutral, 0.9),
            occ("C", SentimentLabel::Neutral, 0.6),
        ];
        occurrences.push(occ("A", SentimentLabel::Neutral, 0.5));
        for name in ["D", "E", "F", "G"] {
            occurrences.push(occ(name, SentimentLabel::Neutral, 0.1));
        }
        let table = EntityTable::fold(&occurrences);
        let top = table.top(5);
        let names: Vec<&str> = top.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C", "D", "E"]);
        assert_eq!(top[0].occurrences, 2);
    }

    #[test]
    fn test_top_of_empty_table() {
        assert!(EntityTable::new().top(5).is_empty());
    }
}
