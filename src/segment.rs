//! Text segmentation.
//!
//! Splits article text into sentences, drops all-caps boilerplate sentences,
//! joins the survivors into the *filtered text* and cuts that text into chunks
//! that fit the NER model's token budget. Chunk offsets are tracked while the
//! filtered text is built, so every chunk is an exact slice of it.

use crate::config::ReconcileConfig;
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::ops::Range;
use unicode_segmentation::UnicodeSegmentation;

/// Splits text into ordered sentences. Returned slices borrow from the input.
pub trait SentenceSplitter: Send + Sync {
    fn split<'a>(&self, text: &'a str) -> Vec<&'a str>;
}

/// Counts model tokens for a piece of text. Only the length matters.
///
/// Counts must be additive over whitespace-separated words: the chunker sums
/// per-word counts instead of recounting growing phrases.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;

    /// Counts for several texts at once. Remote counters override this to
    /// make a single round trip.
    fn count_many(&self, texts: &[&str]) -> Vec<usize> {
        texts.iter().map(|t| self.count(t)).collect()
    }
}

// Lowercased, without the trailing period
static ABBREVIATIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    vec![
        "mr", "mrs", "ms", "dr", "prof", "sr", "jr", "st", "gen", "gov", "sen", "rep",
        "lt", "col", "sgt", "capt", "rev", "inc", "ltd", "corp", "co", "vs", "etc",
        "e.g", "i.e", "u.s", "u.k", "u.n", "a.m", "p.m", "jan", "feb", "mar", "apr",
        "jun", "jul", "aug", "sep", "sept", "oct", "nov", "dec", "no", "fig", "approx",
    ]
    .into_iter()
    .collect()
});

/// UAX-29 sentence bounds with a merge pass for common abbreviations
/// ("Dr. Smith" is one sentence, not two).
///
/// A piece is never merged into when it is all-caps noise on its own at
/// `caps_ratio`, so a credit line after "U.S." still gets filtered.
#[derive(Debug, Clone)]
pub struct UnicodeSentenceSplitter {
    pub caps_ratio: f32,
}

impl UnicodeSentenceSplitter {
    pub fn new(caps_ratio: f32) -> Self {
        Self { caps_ratio }
    }

    fn continues(&self, sentence: &str, next: &str) -> bool {
        let Some(stem) = abbreviation_stem(sentence) else {
            return false;
        };
        if is_all_caps_noise(next, self.caps_ratio) {
            return false;
        }
        // "No. 5" yes, "He said no. Then" no
        if stem == "no" {
            return next.starts_with(|c: char| c.is_ascii_digit());
        }
        true
    }
}

impl Default for UnicodeSentenceSplitter {
    fn default() -> Self {
        Self { caps_ratio: 0.8 }
    }
}

impl SentenceSplitter for UnicodeSentenceSplitter {
    fn split<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let pieces: Vec<(usize, usize)> = text
            .split_sentence_bound_indices()
            .filter(|(_, raw)| !raw.trim().is_empty())
            .map(|(idx, raw)| {
                let lead = raw.len() - raw.trim_start().len();
                (idx + lead, idx + raw.trim_end().len())
            })
            .collect();

        let mut sentences = Vec::with_capacity(pieces.len());
        // start of a sentence that ended on an abbreviation and continues
        let mut pending: Option<usize> = None;
        for (i, &(piece_start, piece_end)) in pieces.iter().enumerate() {
            let start = *pending.get_or_insert(piece_start);
            let sentence = &text[start..piece_end];
            let merge = pieces
                .get(i + 1)
                .map_or(false, |&(s, e)| self.continues(sentence, &text[s..e]));
            if !merge {
                sentences.push(sentence);
                pending = None;
            }
        }
        sentences
    }
}

/// Lowercased abbreviation the sentence ends with, if any. Single-letter
/// initials ("John F. Kennedy") count.
fn abbreviation_stem(sentence: &str) -> Option<String> {
    let last = sentence.split_whitespace().last()?;
    let stem = last.strip_suffix('.')?;
    let stem = stem.trim_start_matches(|c: char| !c.is_alphanumeric());
    if stem.chars().count() == 1 && stem.chars().all(char::is_uppercase) {
        return Some(stem.to_lowercase());
    }
    let lowered = stem.to_lowercase();
    ABBREVIATIONS.contains(lowered.as_str()).then_some(lowered)
}

/// Rough WordPiece approximation for the offline backend: each alphanumeric
/// run costs one token per `chars_per_piece` characters (rounded up), every
/// other non-space char costs one token. Rare and foreign words can need more
/// pieces than this, so it is not an upper bound for a real vocabulary; the
/// sidecar backend counts with the model's own tokenizer.
#[derive(Debug, Clone)]
pub struct SubwordEstimator {
    pub chars_per_piece: usize,
}

impl Default for SubwordEstimator {
    fn default() -> Self {
        Self { chars_per_piece: 4 }
    }
}

impl TokenCounter for SubwordEstimator {
    fn count(&self, text: &str) -> usize {
        let piece = self.chars_per_piece.max(1);
        text.split_word_bounds()
            .map(|segment| {
                if segment.chars().all(char::is_whitespace) {
                    0
                } else if segment.chars().all(char::is_alphanumeric) {
                    segment.chars().count().div_ceil(piece)
                } else {
                    segment.chars().filter(|c| !c.is_whitespace()).count()
                }
            })
            .sum()
    }
}

/// One token per non-whitespace byte. WordPiece and byte-level BPE tokens
/// each cover at least one byte, so no real tokenizer counts more.
#[derive(Debug, Default, Clone)]
pub struct ByteCeiling;

impl TokenCounter for ByteCeiling {
    fn count(&self, text: &str) -> usize {
        text.chars()
            .filter(|c| !c.is_whitespace())
            .map(char::len_utf8)
            .sum()
    }
}

/// A chunk of the filtered text, borrowed from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a> {
    pub text: &'a str,
    /// Byte offset of `text` inside the filtered text
    pub offset: usize,
}

/// Output of [`segment`]: the filtered text and chunk ranges over it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segmentation {
    pub filtered: String,
    pub spans: Vec<Range<usize>>,
}

impl Segmentation {
    pub fn is_empty(&self) -> bool {
        self.filtered.is_empty()
    }

    pub fn chunks(&self) -> impl Iterator<Item = Chunk<'_>> + '_ {
        self.spans.iter().map(move |span| Chunk {
            text: &self.filtered[span.clone()],
            offset: span.start,
        })
    }
}

/// True when at least `ratio` of the sentence's words (2+ chars) are fully
/// uppercase. Sentences without such words are never noise.
pub fn is_all_caps_noise(sentence: &str, ratio: f32) -> bool {
    let words: Vec<&str> = sentence
        .unicode_words()
        .filter(|w| w.chars().count() >= 2)
        .collect();
    if words.is_empty() {
        return false;
    }
    let upper = words.iter().filter(|w| is_upper_word(w)).count();
    upper as f32 / words.len() as f32 >= ratio
}

fn is_upper_word(word: &str) -> bool {
    word.chars().any(char::is_uppercase) && !word.chars().any(char::is_lowercase)
}

/// Split, filter and chunk `text`.
pub fn segment(
    text: &str,
    splitter: &dyn SentenceSplitter,
    counter: &dyn TokenCounter,
    config: &ReconcileConfig,
) -> Segmentation {
    let mut filtered = String::with_capacity(text.len());
    let mut kept: Vec<(usize, &str)> = Vec::new();

    for sentence in splitter.split(text) {
        let sentence = sentence.trim();
        if sentence.is_empty() || is_all_caps_noise(sentence, config.caps_ratio) {
            continue;
        }
        if !filtered.is_empty() {
            filtered.push(' ');
        }
        kept.push((filtered.len(), sentence));
        filtered.push_str(sentence);
    }

    let texts: Vec<&str> = kept.iter().map(|(_, sentence)| *sentence).collect();
    let counts = counter.count_many(&texts);
    let mut spans = Vec::new();
    for ((offset, sentence), tokens) in kept.into_iter().zip(counts) {
        if tokens <= config.token_budget {
            spans.push(offset..offset + sentence.len());
        } else {
            split_to_budget(sentence, offset, counter, config.token_budget, &mut spans);
        }
    }

    Segmentation { filtered, spans }
}

/// Cut an over-budget sentence into greedy word-bounded phrases.
fn split_to_budget(
    sentence: &str,
    offset: usize,
    counter: &dyn TokenCounter,
    budget: usize,
    out: &mut Vec<Range<usize>>,
) {
    let words = word_ranges(sentence);
    let texts: Vec<&str> = words.iter().map(|&(s, e)| &sentence[s..e]).collect();
    let counts = counter.count_many(&texts);

    // (start, end, tokens) of the phrase being built
    let mut phrase: Option<(usize, usize, usize)> = None;
    for (&(word_start, word_end), tokens) in words.iter().zip(counts) {
        if let Some((start, end, used)) = phrase {
            if used + tokens <= budget {
                phrase = Some((start, word_end, used + tokens));
                continue;
            }
            out.push(offset + start..offset + end);
            phrase = None;
        }
        if tokens <= budget {
            phrase = Some((word_start, word_end, tokens));
        } else {
            split_word(&sentence[word_start..word_end], offset + word_start, counter, budget, out);
        }
    }
    if let Some((start, end, _)) = phrase {
        out.push(offset + start..offset + end);
    }
}

/// Last resort for a single word over budget (long URLs, base64 blobs):
/// cut on char boundaries.
fn split_word(
    word: &str,
    offset: usize,
    counter: &dyn TokenCounter,
    budget: usize,
    out: &mut Vec<Range<usize>>,
) {
    let mut start = 0;
    let mut fit_end = 0;
    for (idx, ch) in word.char_indices() {
        let end = idx + ch.len_utf8();
        if fit_end > start && counter.count(&word[start..end]) > budget {
            out.push(offset + start..offset + fit_end);
            start = fit_end;
        }
        fit_end = end;
    }
    if fit_end > start {
        out.push(offset + start..offset + fit_end);
    }
}

/// Byte ranges of whitespace-delimited words.
fn word_ranges(s: &str) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut start = None;
    for (idx, ch) in s.char_indices() {
        if ch.is_whitespace() {
            if let Some(word_start) = start.take() {
                ranges.push((word_start, idx));
            }
        } else if start.is_none() {
            start = Some(idx);
        }
    }
    if let Some(word_start) = start {
        ranges.push((word_start, s.len()));
    }
    ranges
}
