//! Offline NER and sentiment backend.
//!
//! A capitalisation + gazetteer tagger and a word-list sentiment scorer. No
//! model files, no network. Good enough to run the service without the
//! sidecar and to give the pipeline deterministic behaviour in tests.

use super::{NerSpan, NerTagger, SentimentLabel, SentimentScore, TargetSentiment};
use crate::error::MlError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;
use utoipa::ToSchema;

static POSITIVE_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    vec![
        "good", "great", "excellent", "amazing", "wonderful", "fantastic", "superb",
        "outstanding", "brilliant", "love", "loved", "best", "better", "positive",
        "happy", "joy", "beautiful", "perfect", "impressive", "exceptional", "remarkable",
        "success", "successful", "win", "wins", "won", "winner", "winning", "effective",
        "helpful", "reliable", "valuable", "beneficial", "favorable", "profitable",
        "thriving", "prosperous", "praised", "praise", "hailed", "celebrated", "welcomed",
        "support", "supported", "backed", "agreement", "agreed", "deal", "peace",
        "growth", "gains", "gained", "boost", "boosted", "record", "recovery", "rescued",
        "approved", "breakthrough", "honored", "honoured", "award", "awarded", "hope",
        "strong", "stronger", "improved", "improvement", "secure", "safe", "victory",
    ]
    .into_iter()
    .collect()
});

static NEGATIVE_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    vec![
        "bad", "terrible", "awful", "horrible", "poor", "worst", "worse", "hate",
        "hated", "disappointing", "disappointed", "failure", "failed", "fail", "failing",
        "negative", "sad", "angry", "frustrated", "problem", "problems", "crisis",
        "wrong", "useless", "scam", "fraud", "fake", "unstable", "killed", "kill",
        "dead", "died", "death", "attack", "attacked", "war", "violence", "violent",
        "accused", "accusation", "criticized", "criticised", "criticism", "condemned",
        "blamed", "scandal", "corruption", "lawsuit", "sued", "charged", "arrested",
        "convicted", "protest", "protests", "collapse", "collapsed", "losses", "loss",
        "lost", "decline", "declined", "slump", "fell", "threat", "threatened",
        "warned", "fears", "feared", "resigned", "ousted", "banned", "sanctions",
        "injured", "disaster", "controversial", "illegal", "weak", "weaker",
    ]
    .into_iter()
    .collect()
});

static NEGATIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    vec!["not", "no", "never", "nothing", "without", "neither", "nor", "hardly", "didn't", "don't", "isn't", "wasn't"]
        .into_iter()
        .collect()
});

static INTENSIFIERS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    vec!["very", "extremely", "highly", "deeply", "strongly", "hugely", "sharply"]
        .into_iter()
        .collect()
});

// Capitalised runs, allowing lowercase name particles ("Bank of England")
static NAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b\p{Lu}[\p{L}\p{M}'’-]*(?:(?:[ \t]+(?:of|de|la|du|von|van|der|al|bin)[ \t]+|[ \t]+)\p{Lu}[\p{L}\p{M}'’-]*)*",
    )
    .expect("name pattern compiles")
});

static WORD_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\S+").expect("word pattern compiles"));

// Capitalised only because they open a sentence
static SENTENCE_STARTERS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    vec![
        "The", "A", "An", "In", "On", "At", "By", "For", "From", "With", "As", "If",
        "He", "She", "It", "They", "We", "I", "You", "His", "Her", "Their", "Its", "Our",
        "But", "And", "Or", "So", "Yet", "However", "Meanwhile", "Yesterday", "Today",
        "This", "That", "These", "Those", "When", "While", "After", "Before", "Since",
        "According", "Some", "Many", "Most", "Officials", "There", "Here", "What", "Why",
        "How", "Who", "Now", "Then", "Last", "Next", "Also", "Still", "Despite",
    ]
    .into_iter()
    .collect()
});

static LOCATIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    vec![
        "Paris", "London", "Berlin", "Madrid", "Rome", "Moscow", "Kyiv", "Kiev", "Beijing",
        "Tokyo", "Delhi", "New Delhi", "Washington", "New York", "Los Angeles", "Chicago",
        "San Francisco", "Boston", "Seattle", "Brussels", "Geneva", "Vienna", "Warsaw",
        "Istanbul", "Cairo", "Jerusalem", "Gaza", "Tehran", "Dubai", "Sydney", "Toronto",
        "Ottawa", "Mexico City", "Hong Kong", "Singapore", "Seoul", "Taipei", "Lagos",
        "France", "Germany", "Spain", "Italy", "Russia", "Ukraine", "China", "Japan",
        "India", "Pakistan", "Iran", "Iraq", "Israel", "Syria", "Egypt", "Turkey",
        "Britain", "England", "Scotland", "Wales", "Ireland", "United Kingdom",
        "United States", "America", "Canada", "Mexico", "Brazil", "Argentina", "Australia",
        "Europe", "Asia", "Africa", "California", "Texas", "Florida", "Taiwan", "Korea",
        "South Korea", "North Korea", "Poland", "Netherlands", "Sweden", "Norway",
    ]
    .into_iter()
    .collect()
});

static ORGANIZATIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    vec![
        "Google", "Apple", "Microsoft", "Amazon", "Meta", "Facebook", "Tesla", "Nvidia",
        "OpenAI", "Twitter", "Reuters", "Bloomberg", "BBC", "CNN", "NATO", "Congress",
        "Senate", "Parliament", "Pentagon", "Kremlin", "White House", "European Union",
        "United Nations", "World Bank", "Federal Reserve", "Supreme Court", "FBI", "CIA",
        "IMF", "WHO", "EU", "UN", "Labour", "Conservatives", "Democrats", "Republicans",
    ]
    .into_iter()
    .collect()
});

static ORG_SUFFIXES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    vec![
        "Inc", "Corp", "Corporation", "Ltd", "LLC", "Group", "Company", "Co", "Bank",
        "University", "College", "Institute", "Party", "Council", "Ministry", "Agency",
        "Association", "Committee", "Commission", "Foundation", "Times", "News", "Post",
        "FC", "Club", "Department", "Airlines", "Motors", "Holdings", "Union",
    ]
    .into_iter()
    .collect()
});

static PERSON_TITLES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    vec![
        "Mr", "Mrs", "Ms", "Dr", "Prof", "President", "Prime", "Minister", "Senator",
        "Sen", "Rep", "Gov", "Governor", "Chancellor", "King", "Queen", "Prince",
        "Princess", "Pope", "Judge", "General", "Gen", "Sir", "Lady", "Lord", "Mayor",
    ]
    .into_iter()
    .collect()
});

/// Capitalisation-driven tagger with small gazetteers for places and
/// organisations. Multi-word capitalised runs default to persons.
#[derive(Debug, Default, Clone)]
pub struct HeuristicTagger;

impl HeuristicTagger {
    fn classify(surface: &str) -> (&'static str, f32) {
        let words: Vec<&str> = surface.split_whitespace().collect();
        let first = words.first().map(|w| w.trim_end_matches('.')).unwrap_or("");

        if ORGANIZATIONS.contains(surface) {
            ("ORG", 0.9)
        } else if LOCATIONS.contains(surface) {
            ("LOC", 0.9)
        } else if words.len() > 1
            && words.iter().any(|w| ORG_SUFFIXES.contains(w.trim_end_matches('.')))
        {
            ("ORG", 0.75)
        } else if words.len() > 1 && PERSON_TITLES.contains(first) {
            ("PER", 0.8)
        } else if words.len() > 1 {
            ("PER", 0.6)
        } else if surface.chars().count() >= 2 && surface.chars().all(|c| c.is_uppercase()) {
            ("ORG", 0.55)
        } else {
            ("MISC", 0.5)
        }
    }
}

impl NerTagger for HeuristicTagger {
    fn tag(&self, text: &str) -> Result<Vec<NerSpan>, MlError> {
        let mut spans = Vec::new();

        for m in NAME_PATTERN.find_iter(text) {
            let matched = m.as_str();
            // skip leading sentence-opening words
            let Some(first_kept) = WORD_PATTERN
                .find_iter(matched)
                .find(|w| !SENTENCE_STARTERS.contains(w.as_str()))
            else {
                continue;
            };
            let start = m.start() + first_kept.start();
            let trimmed = text[start..m.end()]
                .trim_end_matches("'s")
                .trim_end_matches("’s")
                .trim_end_matches(|c: char| c == '\'' || c == '’' || c == '-' || c.is_whitespace());
            if trimmed.is_empty() {
                continue;
            }
            let end = start + trimmed.len();
            let (label, score) = Self::classify(trimmed);

            spans.push(NerSpan {
                text: trimmed.to_string(),
                label: label.to_string(),
                start: Some(start),
                end: Some(end),
                score,
            });
        }

        debug!("Heuristic tagger found {} spans", spans.len());
        Ok(spans)
    }
}

/// Word-list sentiment over a window of words either side of the target.
#[derive(Debug, Clone)]
pub struct LexiconSentiment {
    /// Words of context considered on each side
    pub window: usize,
}

impl Default for LexiconSentiment {
    fn default() -> Self {
        Self { window: 8 }
    }
}

fn lowercase_words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|w| !w.is_empty())
        .map(String::from)
        .collect()
}

/// Weighted (positive, negative) evidence in `words`, with negation flips.
fn polarity(words: &[String]) -> (f32, f32) {
    let mut positive = 0.0;
    let mut negative = 0.0;
    for (i, word) in words.iter().enumerate() {
        let is_pos = POSITIVE_WORDS.contains(word.as_str());
        let is_neg = NEGATIVE_WORDS.contains(word.as_str());
        if !is_pos && !is_neg {
            continue;
        }
        let prev = i.checked_sub(1).map(|p| words[p].as_str());
        let negated = prev.map_or(false, |p| NEGATIONS.contains(p))
            || i.checked_sub(2).map_or(false, |p| NEGATIONS.contains(words[p].as_str()));
        let weight = if prev.map_or(false, |p| INTENSIFIERS.contains(p)) { 1.5 } else { 1.0 };

        match (is_pos, negated) {
            (true, false) | (false, true) => positive += weight,
            (true, true) | (false, false) => negative += weight,
        }
    }
    (positive, negative)
}

impl TargetSentiment for LexiconSentiment {
    fn classify(
        &self,
        left: &str,
        _target: &str,
        right: &str,
    ) -> Result<Vec<SentimentScore>, MlError> {
        let left_words = lowercase_words(left);
        let right_words = lowercase_words(right);
        let left_tail = &left_words[left_words.len().saturating_sub(self.window)..];
        let right_head = &right_words[..right_words.len().min(self.window)];

        let (lp, ln) = polarity(left_tail);
        let (rp, rn) = polarity(right_head);

        // neutral is the baseline, each cue word pulls away from it
        let weights = [
            (SentimentLabel::Positive, 0.5 + 1.5 * (lp + rp)),
            (SentimentLabel::Negative, 0.5 + 1.5 * (ln + rn)),
            (SentimentLabel::Neutral, 1.0),
        ];
        let total: f32 = weights.iter().map(|(_, w)| w).sum();

        let mut scores: Vec<SentimentScore> = weights
            .iter()
            .map(|(label, w)| SentimentScore {
                label: *label,
                probability: w / total,
            })
            .collect();
        scores.sort_by(|a, b| b.probability.total_cmp(&a.probability));
        Ok(scores)
    }
}

/// Whole-text sentiment for an article.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DocumentSentiment {
    pub label: SentimentLabel,
    pub score: f32,
    pub positive_count: usize,
    pub negative_count: usize,
}

/// Classifies a whole text as positive, negative or neutral by counting
/// sentiment words. Texts under 50 bytes are not scored.
pub fn document_sentiment(text: &str) -> Option<DocumentSentiment> {
    if text.len() < 50 {
        return None;
    }

    let words: Vec<String> = lowercase_words(text)
        .into_iter()
        .filter(|w| w.len() > 2)
        .collect();
    if words.is_empty() {
        return None;
    }

    let positive_count = words.iter().filter(|w| POSITIVE_WORDS.contains(w.as_str())).count();
    let negative_count = words.iter().filter(|w| NEGATIVE_WORDS.contains(w.as_str())).count();
    let total = positive_count + negative_count;

    let (label, score) = if total == 0 {
        (SentimentLabel::Neutral, 0.5)
    } else {
        let positive_ratio = positive_count as f32 / total as f32;
        if positive_ratio > 0.6 {
            (SentimentLabel::Positive, positive_ratio)
        } else if positive_ratio < 0.4 {
            (SentimentLabel::Negative, 1.0 - positive_ratio)
        } else {
            (SentimentLabel::Neutral, 0.5 + (positive_ratio - 0.5).abs())
        }
    };

    debug!(
        "🧠 Document sentiment: {} words, {} positive, {} negative",
        words.len(),
        positive_count,
        negative_count
    );

    Some(DocumentSentiment {
        label,
        score,
        positive_count,
        negative_count,
    })
}
