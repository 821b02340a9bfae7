//! Page text cleaning and chunking for content analysis

use scraper::{Html, Selector};
use std::sync::OnceLock;

/// Elements whose text never reaches the analyzer
const EXCLUDED_TAGS: &[&str] = &[
    "script", "style", "meta", "link", "noscript", "iframe", "svg", "button", "input", "form",
    "nav", "footer", "header",
];

/// Main-content containers, most specific first
const CONTENT_SELECTORS: &[&str] = &[
    "main",
    "article",
    "[role=\"main\"]",
    ".article__body",
    ".content",
    "#content",
];

fn content_selectors() -> &'static [Selector] {
    static SELECTORS: OnceLock<Vec<Selector>> = OnceLock::new();
    SELECTORS.get_or_init(|| {
        CONTENT_SELECTORS
            .iter()
            .filter_map(|s| Selector::parse(s).ok())
            .collect()
    })
}

fn body_selector() -> &'static Selector {
    static BODY: OnceLock<Selector> = OnceLock::new();
    BODY.get_or_init(|| Selector::parse("body").expect("body selector is valid"))
}

/// Collapse whitespace runs (including non-breaking spaces) to single spaces
pub fn collapse_whitespace(text: &str) -> String {
    text.replace('\u{a0}', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Readable text of the page's main content
pub fn clean_html(html: &str) -> String {
    let document = Html::parse_document(html);

    let root = content_selectors()
        .iter()
        .find_map(|selector| document.select(selector).next())
        .or_else(|| document.select(body_selector()).next())
        .unwrap_or_else(|| document.root_element());

    let mut parts: Vec<&str> = Vec::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let excluded = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .map_or(false, |element| EXCLUDED_TAGS.contains(&element.name()))
        });
        if !excluded {
            parts.push(&**text);
        }
    }

    collapse_whitespace(&parts.join(" "))
}

/// Split `text` into chunks of at most `max_chars` characters at word boundaries
///
/// A single word longer than `max_chars` is split mid-word.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if word_len > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let chars: Vec<char> = word.chars().collect();
            for piece in chars.chunks(max_chars) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }

        let needed = if current.is_empty() { word_len } else { word_len + 1 };
        if current_len + needed > max_chars {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_prefers_main_and_drops_noise() {
        let html = r#"<html><head><title>T</title><style>.x{}</style></head>
            <body>
              <header>Site Header</header>
              <nav>Menu</nav>
              <main>
                <h1>Best   albums</h1>
                <p>Radiohead&nbsp;-&nbsp;OK Computer</p>
                <script>track('x')</script>
                <form><button>Subscribe</button></form>
              </main>
              <footer>Copyright</footer>
            </body></html>"#;
        assert_eq!(clean_html(html), "Best albums Radiohead - OK Computer");
    }

    #[test]
    fn test_clean_falls_back_to_body() {
        let html = "<html><body><div>Hello <b>world</b></div><footer>bye</footer></body></html>";
        assert_eq!(clean_html(html), "Hello world");
    }

    #[test]
    fn test_chunks_respect_limit_and_word_boundaries() {
        let text = "alpha beta gamma delta epsilon";
        let chunks = chunk_text(text, 11);
        assert_eq!(chunks, vec!["alpha beta", "gamma delta", "epsilon"]);
        assert!(chunks.iter().all(|c| c.chars().count() <= 11));
    }

    #[test]
    fn test_overlong_word_is_split() {
        let chunks = chunk_text("ab abcdefghij cd", 4);
        assert_eq!(chunks, vec!["ab", "abcd", "efgh", "ij", "cd"]);
    }

    #[test]
    fn test_empty_text_has_no_chunks() {
        assert!(chunk_text("   ", 100).is_empty());
    }
}
