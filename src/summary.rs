//! Extractive article summary.
//!
//! Sentences are scored by how frequent their content words are across the
//! article, how much they share with the title and how early they appear.
//! The best `n` are returned in article order.

use crate::segment::{SentenceSplitter, UnicodeSentenceSplitter};
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};
use unicode_segmentation::UnicodeSegmentation;

static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    vec![
        "the", "and", "for", "are", "but", "not", "you", "all", "any", "can", "had", "her",
        "was", "one", "our", "out", "has", "have", "his", "him", "how", "its", "may", "new",
        "now", "who", "did", "get", "got", "let", "say", "says", "said", "she", "too", "use",
        "that", "with", "this", "from", "they", "will", "would", "there", "their", "what",
        "about", "which", "when", "make", "like", "time", "just", "know", "take", "into",
        "year", "your", "some", "could", "them", "than", "then", "also", "been", "were",
        "more", "most", "other", "over", "such", "only", "very", "after", "before", "while",
        "where", "these", "those", "being", "because", "should", "between",
    ]
    .into_iter()
    .collect()
});

fn content_words(text: &str) -> Vec<String> {
    text.unicode_words()
        .map(|w| w.to_lowercase())
        .filter(|w| w.chars().count() > 2 && !STOPWORDS.contains(w.as_str()))
        .collect()
}

/// Up to `n` sentences of `text`, in their original order, joined by spaces.
pub fn summarize(text: &str, title: &str, n: usize) -> String {
    let sentences = UnicodeSentenceSplitter::default().split(text);
    if sentences.len() <= n {
        return sentences.join(" ");
    }

    let mut frequency: HashMap<String, usize> = HashMap::new();
    for word in content_words(text) {
        *frequency.entry(word).or_insert(0) += 1;
    }
    let max_frequency = frequency.values().copied().max().unwrap_or(1) as f32;
    let title_words: HashSet<String> = content_words(title).into_iter().collect();

    let mut scored: Vec<(usize, f32)> = sentences
        .iter()
        .enumerate()
        .map(|(idx, sentence)| {
            let words = content_words(sentence);
            if words.is_empty() {
                return (idx, 0.0);
            }
            let density: f32 = words
                .iter()
                .map(|w| frequency.get(w).copied().unwrap_or(0) as f32 / max_frequency)
                .sum::<f32>()
                / words.len() as f32;
            let title_overlap = if title_words.is_empty() {
                0.0
            } else {
                words.iter().filter(|w| title_words.contains(*w)).count() as f32
                    / title_words.len() as f32
            };
            let position = 0.2 / (1.0 + idx as f32);
            (idx, density + 0.5 * title_overlap.min(1.0) + position)
        })
        .collect();

    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    let mut chosen: Vec<usize> = scored.into_iter().take(n).map(|(idx, _)| idx).collect();
    chosen.sort_unstable();

    chosen
        .into_iter()
        .map(|idx| sentences[idx])
        .collect::<Vec<_>>()
        .join(" ")
}
