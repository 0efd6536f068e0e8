//! Overlap resolution and HTML rendering of the filtered text.

use crate::annotate::EntityOccurrence;
use crate::ml::SentimentLabel;
use tracing::debug;

/// Plain and highlighted renderings of the same filtered text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rendered {
    pub plain: String,
    pub highlighted: String,
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

pub fn sentiment_color(sentiment: SentimentLabel) -> &'static str {
    match sentiment {
        SentimentLabel::Positive => "#c8f7c5",
        SentimentLabel::Negative => "#f7c5c5",
        SentimentLabel::Neutral => "#c5def7",
    }
}

/// Keep a non-overlapping subset of `occurrences`, sorted by start.
///
/// Sweep in start order (stable, so ties keep discovery order). A candidate
/// that overlaps the last accepted span replaces it only with strictly higher
/// confidence. The accepted list stays sorted and disjoint, so the last
/// accepted span is the only one a candidate can overlap. This is a greedy
/// pass, not a maximum-weight selection: a chain of ever more confident
/// overlapping spans leaves only its last member.
pub fn resolve_overlaps(occurrences: &[EntityOccurrence]) -> Vec<EntityOccurrence> {
    let mut sorted: Vec<&EntityOccurrence> = occurrences.iter().collect();
    sorted.sort_by_key(|o| o.start);

    let mut accepted: Vec<EntityOccurrence> = Vec::with_capacity(sorted.len());
    for candidate in sorted {
        match accepted.last() {
            Some(last) if last.overlaps(candidate) => {
                if candidate.confidence > last.confidence {
                    accepted.pop();
                    accepted.push(candidate.clone());
                }
            }
            _ => accepted.push(candidate.clone()),
        }
    }
    accepted
}

fn is_renderable(text: &str, occurrence: &EntityOccurrence) -> bool {
    occurrence.start < occurrence.end
        && occurrence.end <= text.len()
        && text.is_char_boundary(occurrence.start)
        && text.is_char_boundary(occurrence.end)
}

/// Render `text` twice: escaped, and escaped with sentiment-coloured spans
/// around the non-overlapping entities. Out-of-bounds occurrences are skipped.
pub fn render(text: &str, occurrences: &[EntityOccurrence]) -> Rendered {
    let valid: Vec<EntityOccurrence> = occurrences
        .iter()
        .filter(|o| {
            let ok = is_renderable(text, o);
            if !ok {
                debug!("Skipping out-of-bounds entity '{}' at {}..{}", o.text, o.start, o.end);
            }
            ok
        })
        .cloned()
        .collect();

    let mut highlighted = String::with_capacity(text.len() * 2);
    let mut cursor = 0;
    for entity in resolve_overlaps(&valid) {
        highlighted.push_str(&escape_html(&text[cursor..entity.start]));
        highlighted.push_str(&format!(
            r#"<span class="entity entity-{sentiment}" style="background-color:{color}" title="{kind}: {sentiment} ({confidence:.2})">{body}</span>"#,
            sentiment = entity.sentiment,
            color = sentiment_color(entity.sentiment),
            kind = entity.kind,
            confidence = entity.confidence,
            body = escape_html(&text[entity.start..entity.end]),
        ));
        cursor = entity.end;
    }
    highlighted.push_str(&escape_html(&text[cursor..]));

    Rendered {
        plain: escape_html(text),
        highlighted,
    }
}
