use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;

// First line ends at a newline or where a new paragraph opens.
static FIRST_LINE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(.*?)(?:<p>|\n)").unwrap());
static URL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^https?://\S*$").unwrap());

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedComment {
    pub headline: String,
    pub text: String,
}

pub fn normalize(markup: &str) -> NormalizedComment {
    NormalizedComment {
        headline: shorten(markup),
        text: extract_text(markup),
    }
}

/// The headline: markup up to the first paragraph break or newline, with tags
/// stripped and entities decoded. Single-line comments come back whole.
pub fn shorten(markup: &str) -> String {
    let line = FIRST_LINE_RE
        .captures(markup)
        .and_then(|caps| caps.get(1))
        .map_or(markup, |m| m.as_str());
    strip_tags(line).trim().to_string()
}

/// Plain text with a newline after every text node. A node that is a bare
/// URL is glued to the text before it, and inline text after it (starting
/// with whitespace) is glued back on, so a link never gets split. Two URLs in
/// a row stay on separate lines.
pub fn extract_text(markup: &str) -> String {
    let fragment = Html::parse_fragment(markup);
    let mut text = String::with_capacity(markup.len());
    let mut after_url = false;
    for chunk in fragment.root_element().text() {
        let url = is_url(chunk);
        let glue = if url {
            !after_url
        } else {
            after_url && chunk.starts_with(char::is_whitespace)
        };
        if glue && text.ends_with('\n') {
            text.pop();
        }
        text.push_str(chunk);
        text.push('\n');
        after_url = url;
    }
    text
}

fn strip_tags(markup: &str) -> String {
    Html::parse_fragment(markup)
        .root_element()
        .text()
        .collect()
}

fn is_url(chunk: &str) -> bool {
    URL_RE.is_match(chunk)
}
