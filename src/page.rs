//! Server-rendered HTML for the browser form.

use crate::article::Article;
use crate::reconcile::ArticleAnalysis;
use crate::render::{escape_html, sentiment_color};

const STYLE: &str = r#"
body { font-family: system-ui, -apple-system, Segoe UI, Roboto, sans-serif; margin: 24px; max-width: 960px; }
table { border-collapse: collapse; margin: 12px 0; }
th, td { padding: 6px 10px; border-bottom: 1px solid #ddd; text-align: left; }
.meta { color: #555; }
.text { white-space: pre-wrap; line-height: 1.6; border: 1px solid #eee; padding: 12px; border-radius: 8px; }
.entity { padding: 0 2px; border-radius: 3px; }
.error { color: #a00; font-weight: bold; }
"#;

fn form(url: &str) -> String {
    format!(
        r#"<form action="" method="get">
  Enter/Paste Article URL here: <input type="url" name="url" size="60" value="{}">
  <input type="submit" value="Analyse Article">
</form>"#,
        escape_html(url)
    )
}

fn layout(url: &str, body: &str) -> String {
    format!(
        r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<title>Article Sentiment</title>
<style>{style}</style>
</head>
<body>
{form}
{body}
</body>
</html>"#,
        style = STYLE,
        form = form(url),
        body = body
    )
}

/// The empty form.
pub fn index_page() -> String {
    layout("", "")
}

/// The form with a user-visible error in place of the output.
pub fn error_page(url: &str, message: &str) -> String {
    layout(
        url,
        &format!(r#"<p class="error">Output: {}</p>"#, escape_html(message)),
    )
}

pub fn article_page(article: &Article, analysis: &ArticleAnalysis) -> String {
    let mut out = String::new();

    out.push_str(&format!("<h1>{}</h1>\n", escape_html(&article.title)));
    out.push_str(&format!(
        r#"<p class="meta">{publication}{authors}{date}</p>"#,
        publication = escape_html(&article.publication),
        authors = if article.authors.is_empty() {
            String::new()
        } else {
            format!(" · by {}", escape_html(&article.authors.join(", ")))
        },
        date = article
            .publish_date
            .map(|d| format!(" · {}", d.format("%Y-%m-%d")))
            .unwrap_or_default(),
    ));
    out.push('\n');

    if let Some(sentiment) = &analysis.document_sentiment {
        out.push_str(&format!(
            r#"<p>Overall tone: <span class="entity" style="background-color:{}">{} ({:.2})</span></p>"#,
            sentiment_color(sentiment.label),
            sentiment.label,
            sentiment.score
        ));
        out.push('\n');
    }

    if !analysis.top_entities.is_empty() {
        out.push_str("<h2>Top entities</h2>\n<table>\n<tr><th>Entity</th><th>Type</th><th>Mentions</th><th>Sentiment</th><th>Confidence</th></tr>\n");
        for row in &analysis.top_entities {
            out.push_str(&format!(
                r#"<tr><td>{}</td><td>{}</td><td>{}</td><td style="background-color:{}">{}</td><td>{:.2}</td></tr>"#,
                escape_html(&row.name),
                row.kind,
                row.occurrences,
                sentiment_color(row.sentiment),
                row.sentiment,
                row.confidence
            ));
            out.push('\n');
        }
        out.push_str("</table>\n");
    }

    if !analysis.summary.highlighted.is_empty() {
        out.push_str(&format!(
            "<h2>Summary</h2>\n<div class=\"text\">{}</div>\n",
            analysis.summary.highlighted
        ));
    }
    out.push_str(&format!(
        "<h2>Article</h2>\n<div class=\"text\">{}</div>\n",
        analysis.body.highlighted
    ));
    out.push_str(&format!(
        "<details><summary>Plain text</summary><div class=\"text\">{}</div></details>\n",
        analysis.body.plain
    ));

    layout(&article.url, &out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::EntityReportRow;
    use crate::ml::{EntityKind, SentimentLabel};
    use crate::reconcile::Analysis;
    use crate::render::Rendered;

    #[test]
    fn test_error_page_escapes_message() {
        let html = error_page("https://x.test/?a=<b>", "invalid input: <script>");
        assert!(html.contains("Output: invalid input: &lt;script&gt;"));
        assert!(html.contains("value=\"https://x.test/?a=&lt;b&gt;\""));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_article_page_sections() {
        let article = Article {
            url: "https://example.com/a".into(),
            title: "Rates & Markets".into(),
            authors: vec!["Jane Doe".into()],
            publish_date: None,
            publication: "Example".into(),
            text: "Body.".into(),
            summary: String::new(),
        };
        let analysis = ArticleAnalysis {
            body: Analysis {
                plain: "Body.".into(),
                highlighted: "<span class=\"entity\">Body</span>.".into(),
                entities: Default::default(),
            },
            summary: Rendered::default(),
            top_entities: vec![EntityReportRow {
                name: "Body".into(),
                kind: EntityKind::Miscellaneous,
                occurrences: 1,
                sentiment: SentimentLabel::Neutral,
                confidence: 0.5,
            }],
            document_sentiment: None,
        };
        let html = article_page(&article, &analysis);
        assert!(html.contains("<h1>Rates &amp; Markets</h1>"));
        assert!(html.contains("by Jane Doe"));
        assert!(html.contains("<td>MISC</td>"));
        assert!(!html.contains("<h2>Summary</h2>"));
    }
}
