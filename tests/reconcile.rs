//! End-to-end reconciler behaviour with deterministic tagger and sentiment
//! fakes.

use article_sentiment::aggregate::EntityTable;
use article_sentiment::annotate::{EntityOccurrence, FALLBACK_CONFIDENCE};
use article_sentiment::ml::{
    EntityKind, MlBackends, NerSpan, NerTagger, SentimentLabel, SentimentScore, TargetSentiment,
};
use article_sentiment::render::{render, resolve_overlaps};
use article_sentiment::segment::{
    segment, ByteCeiling, SubwordEstimator, TokenCounter, UnicodeSentenceSplitter,
};
use article_sentiment::{MlError, ReconcileConfig, Reconciler};
use proptest::prelude::*;
use regex::Regex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Finds fixed names by exact match. Fails on any chunk containing "poison".
struct DictionaryTagger {
    names: Vec<(&'static str, &'static str)>,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl DictionaryTagger {
    fn new(names: &[(&'static str, &'static str)]) -> Self {
        Self {
            names: names.to_vec(),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }
}

impl NerTagger for DictionaryTagger {
    fn tag(&self, text: &str) -> Result<Vec<NerSpan>, MlError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(text.to_string());
        if text.contains("poison") {
            return Err(MlError::Status(500));
        }
        let mut spans = Vec::new();
        for (name, label) in &self.names {
            for (start, m) in text.match_indices(name) {
                spans.push(NerSpan {
                    text: m.to_string(),
                    label: label.to_string(),
                    start: Some(start),
                    end: Some(start + m.len()),
                    score: 0.99,
                });
            }
        }
        spans.sort_by_key(|s| s.start);
        Ok(spans)
    }
}

/// Returns fixed spans regardless of input
struct FixedTagger(Vec<NerSpan>);

impl NerTagger for FixedTagger {
    fn tag(&self, _text: &str) -> Result<Vec<NerSpan>, MlError> {
        Ok(self.0.clone())
    }
}

/// "won" on the right → positive, "lost" → negative, else neutral.
/// Confidence is 0.6 plus 0.1 per "very" in the context. Targets containing
/// "Boom" fail.
struct ContextSentiment {
    calls: AtomicUsize,
}

impl ContextSentiment {
    fn new() -> Self {
        Self { calls: AtomicUsize::new(0) }
    }
}

impl TargetSentiment for ContextSentiment {
    fn classify(&self, left: &str, target: &str, right: &str) -> Result<Vec<SentimentScore>, MlError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if target.contains("Boom") {
            return Err(MlError::Transport("timeout".into()));
        }
        let label = if right.contains("won") {
            SentimentLabel::Positive
        } else if right.contains("lost") {
            SentimentLabel::Negative
        } else {
            SentimentLabel::Neutral
        };
        let intensity = left.matches("very").count() + right.matches("very").count();
        let probability = (0.6 + 0.1 * intensity as f32).min(0.99);
        Ok(vec![SentimentScore { label, probability }])
    }
}

/// Confidence looked up by target text
struct TableSentiment(Vec<(&'static str, f32)>);

impl TargetSentiment for TableSentiment {
    fn classify(&self, _l: &str, target: &str, _r: &str) -> Result<Vec<SentimentScore>, MlError> {
        let probability = self
            .0
            .iter()
            .find(|(t, _)| *t == target)
            .map(|(_, p)| *p)
            .ok_or(MlError::EmptyResult)?;
        Ok(vec![SentimentScore {
            label: SentimentLabel::Positive,
            probability,
        }])
    }
}

fn reconciler(tagger: Arc<dyn NerTagger>, sentiment: Arc<dyn TargetSentiment>) -> Reconciler {
    Reconciler::new(MlBackends { tagger, sentiment, counter: None }, ReconcileConfig::default())
}

fn people_tagger() -> Arc<DictionaryTagger> {
    Arc::new(DictionaryTagger::new(&[
        ("John Smith", "PER"),
        ("Jane Doe", "PER"),
        ("Paris", "LOC"),
        ("Acme", "ORG"),
        ("Boom Corp", "ORG"),
        ("Monday", "DATE"),
    ]))
}

fn strip_tags(html: &str) -> String {
    Regex::new(r"<[^>]*>").unwrap().replace_all(html, "").into_owned()
}

#[test]
fn test_all_caps_sentence_dropped_and_entities_found() {
    let tagger = people_tagger();
    let r = reconciler(tagger.clone(), Arc::new(ContextSentiment::new()));
    let analysis = r.analyze("ALTHOUGH SHOUTING LOUDLY. John Smith met Jane Doe in Paris.");

    assert_eq!(analysis.plain, "John Smith met Jane Doe in Paris.");
    assert_eq!(analysis.entities.len(), 3);
    assert_eq!(analysis.entities.get("John Smith").unwrap().kind, EntityKind::Person);
    assert_eq!(analysis.entities.get("Jane Doe").unwrap().kind, EntityKind::Person);
    assert_eq!(analysis.entities.get("Paris").unwrap().kind, EntityKind::Location);
    for record in analysis.entities.records() {
        assert!((0.0..=1.0).contains(&record.confidence));
    }
    assert_eq!(analysis.highlighted.matches("<span").count(), 3);
    assert_eq!(strip_tags(&analysis.highlighted), analysis.plain);
    // the shouting sentence never reached the tagger
    assert_eq!(tagger.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_empty_and_fully_filtered_input_skip_models() {
    let tagger = people_tagger();
    let sentiment = Arc::new(ContextSentiment::new());
    let r = reconciler(tagger.clone(), sentiment.clone());

    let empty = r.analyze("");
    assert_eq!(empty.plain, "");
    assert_eq!(empty.highlighted, "");
    assert!(empty.entities.is_empty());

    let shouting = r.analyze("READ MORE AT OUR WEBSITE. FOLLOW US TODAY.");
    assert!(shouting.entities.is_empty());
    assert_eq!(shouting.plain, "");

    assert_eq!(tagger.calls.load(Ordering::SeqCst), 0);
    assert_eq!(sentiment.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_overlapping_entities_keep_more_confident() {
    let text = "John Smith met people.";
    let tagger = Arc::new(FixedTagger(vec![
        NerSpan { text: "John Smith".into(), label: "PER".into(), start: Some(0), end: Some(10), score: 0.9 },
        NerSpan { text: "Smith met ".into(), label: "MISC".into(), start: Some(5), end: Some(15), score: 0.9 },
    ]));
    let sentiment = Arc::new(TableSentiment(vec![("John Smith", 0.9), ("Smith met ", 0.6)]));
    let analysis = reconciler(tagger, sentiment).analyze(text);

    assert_eq!(analysis.highlighted.matches("<span").count(), 1);
    assert!(analysis.highlighted.contains(">John Smith</span>"));
    // both still count in the aggregation
    assert_eq!(analysis.entities.len(), 2);
}

#[test]
fn test_ner_failure_skips_only_that_chunk() {
    let r = reconciler(people_tagger(), Arc::new(ContextSentiment::new()));
    let analysis = r.analyze("John Smith arrived. A poison letter reached Paris. Jane Doe left.");

    assert!(analysis.entities.get("John Smith").is_some());
    assert!(analysis.entities.get("Jane Doe").is_some());
    assert!(analysis.entities.get("Paris").is_none());
    assert!(analysis.plain.contains("poison letter reached Paris"));
}

#[test]
fn test_sentiment_failure_defaults_single_entity() {
    let r = reconciler(people_tagger(), Arc::new(ContextSentiment::new()));
    let analysis = r.analyze("Boom Corp and Acme won the contract.");

    let boom = analysis.entities.get("Boom Corp").unwrap();
    assert_eq!(boom.sentiment, SentimentLabel::Neutral);
    assert_eq!(boom.confidence, FALLBACK_CONFIDENCE);
    let acme = analysis.entities.get("Acme").unwrap();
    assert_eq!(acme.sentiment, SentimentLabel::Positive);
}

#[test]
fn test_unaccepted_labels_are_ignored() {
    let r = reconciler(people_tagger(), Arc::new(ContextSentiment::new()));
    let analysis = r.analyze("On Monday Acme won.");
    assert!(analysis.entities.get("Monday").is_none());
    assert!(analysis.entities.get("Acme").is_some());
}

#[test]
fn test_aggregation_keeps_most_confident_across_chunks() {
    let r = reconciler(people_tagger(), Arc::new(ContextSentiment::new()));
    let analysis = r.analyze("Paris won. Paris lost very very badly. Paris won very much.");

    let paris = analysis.entities.get("Paris").unwrap();
    assert_eq!(paris.occurrences, 3);
    assert_eq!(paris.sentiment, SentimentLabel::Negative);
    assert!((paris.confidence - 0.8).abs() < 1e-5);
    let top = analysis.entities.top(5);
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].name, "Paris");
}

#[test]
fn test_long_sentence_chunks_fit_budget_and_offsets_line_up() {
    let tagger = people_tagger();
    let config = ReconcileConfig::default();
    let r = Reconciler::new(
        MlBackends {
            tagger: tagger.clone(),
            sentiment: Arc::new(ContextSentiment::new()),
            counter: None,
        },
        config.clone(),
    );
    let mut text = String::new();
    for i in 0..400 {
        text.push_str(if i % 50 == 0 { "Acme " } else { "reported extraordinary developments " });
    }
    text.push('.');

    let analysis = r.analyze(&text);
    let estimator = SubwordEstimator::default();
    let seen = tagger.seen.lock().unwrap();
    assert!(seen.len() > 1);
    assert!(seen.iter().all(|chunk| estimator.count(chunk) <= config.token_budget));
    assert_eq!(analysis.entities.get("Acme").unwrap().occurrences, 8);
    assert_eq!(strip_tags(&analysis.highlighted), analysis.plain);
}

#[test]
fn test_backend_token_counter_sizes_chunks() {
    let tagger = people_tagger();
    let config = ReconcileConfig::default();
    let r = Reconciler::new(
        MlBackends {
            tagger: tagger.clone(),
            sentiment: Arc::new(ContextSentiment::new()),
            counter: Some(Arc::new(ByteCeiling)),
        },
        config.clone(),
    );
    // rare names the estimator undercounts
    let text = format!("{}.", "Zbigniew Brzezinski met Przemyslaw ".repeat(60));
    assert!(SubwordEstimator::default().count(&text) < ByteCeiling.count(&text));

    r.analyze(&text);
    let seen = tagger.seen.lock().unwrap();
    assert!(seen.len() >= ByteCeiling.count(&text) / config.token_budget);
    assert!(seen.iter().all(|chunk| ByteCeiling.count(chunk) <= config.token_budget));
}

fn occurrence(start: usize, len: usize, confidence: f32) -> EntityOccurrence {
    EntityOccurrence {
        text: format!("e{}", start),
        kind: EntityKind::Miscellaneous,
        start,
        end: start + len,
        sentiment: SentimentLabel::Neutral,
        confidence,
    }
}

proptest! {
    #[test]
    fn prop_accepted_spans_never_overlap(
        raw in prop::collection::vec((0usize..60, 1usize..12, 0.0f32..1.0), 0..40)
    ) {
        let input: Vec<EntityOccurrence> = raw.iter().map(|(s, l, c)| occurrence(*s, *l, *c)).collect();
        let accepted = resolve_overlaps(&input);
        for pair in accepted.windows(2) {
            prop_assert!(pair[0].end <= pair[1].start);
        }
        for a in &accepted {
            prop_assert!(input.contains(a));
        }
    }

    #[test]
    fn prop_highlight_strips_to_plain(
        text in "[a-zA-Z &<>\"']{0,60}",
        raw in prop::collection::vec((0usize..70, 1usize..12, 0.0f32..1.0), 0..12)
    ) {
        let input: Vec<EntityOccurrence> = raw.iter().map(|(s, l, c)| occurrence(*s, *l, *c)).collect();
        let rendered = render(&text, &input);
        prop_assert_eq!(strip_tags(&rendered.highlighted), rendered.plain);
    }

    #[test]
    fn prop_chunks_fit_budget_and_cover_text(
        words in prop::collection::vec("[a-z]{1,14}", 0..80),
        budget in 1usize..20
    ) {
        let text = format!("{}.", words.join(" "));
        let config = ReconcileConfig { token_budget: budget, ..ReconcileConfig::default() };
        let estimator = SubwordEstimator::default();
        let seg = segment(&text, &UnicodeSentenceSplitter::default(), &estimator, &config);

        let mut joined = String::new();
        let mut last_end = 0;
        for chunk in seg.chunks() {
            prop_assert!(estimator.count(chunk.text) <= budget);
            prop_assert!(chunk.offset >= last_end);
            prop_assert_eq!(&seg.filtered[chunk.offset..chunk.offset + chunk.text.len()], chunk.text);
            last_end = chunk.offset + chunk.text.len();
            joined.push_str(chunk.text);
        }
        let squash = |s: &str| s.chars().filter(|c| !c.is_whitespace()).collect::<String>();
        prop_assert_eq!(squash(&joined), squash(&seg.filtered));
    }

    #[test]
    fn prop_aggregation_is_order_independent(
        raw in prop::collection::vec((0usize..4, 0.0f32..1.0), 1..30)
    ) {
        let names = ["Paris", "Oslo", "Acme", "Jane Doe"];
        let occurrences: Vec<EntityOccurrence> = raw
            .iter()
            .map(|(n, c)| EntityOccurrence {
                text: names[*n].to_string(),
                kind: EntityKind::Miscellaneous,
                start: 0,
                end: 1,
                sentiment: SentimentLabel::Neutral,
                confidence: *c,
            })
            .collect();
        let forward = EntityTable::fold(&occurrences);
        let backward = EntityTable::fold(occurrences.iter().rev());

        for record in forward.records() {
            let other = backward.get(&record.text).unwrap();
            prop_assert_eq!(record.occurrences, other.occurrences);
            prop_assert_eq!(record.confidence, other.confidence);
            let expected_max = occurrences
                .iter()
                .filter(|o| o.text == record.text)
                .map(|o| o.confidence)
                .fold(f32::MIN, f32::max);
            prop_assert_eq!(record.confidence, expected_max);
        }

        let top = forward.top(5);
        prop_assert!(top.len() <= 5);
        for pair in top.windows(2) {
            prop_assert!(
                (pair[0].occurrences, pair[0].confidence) >= (pair[1].occurrences, pair[1].confidence)
            );
        }
    }
}
