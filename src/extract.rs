//! Retryable per-URL fetch and main-content extraction.
//!
//! Each URL is processed independently: a bounded retry loop with a
//! fixed delay covers transient transport failures, while non-2xx
//! statuses, non-text content types, and empty extractions are
//! deterministic rejections recorded as terminal per-URL errors. One
//! URL's failure never aborts the rest of the batch - the unit always
//! returns one entry per input URL, successes and errors mixed.

use futures::future::join_all;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tracing::{debug, warn};

use crate::artifacts::{ExtractedPage, SearchHit};
use crate::config::Config;
use crate::error::FetchError;

/// Maximum excerpt length in characters.
const EXCERPT_CHARS: usize = 300;

/// Per-URL retry/timeout parameters.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub timeout: Duration,
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl From<&Config> for FetchSettings {
    fn from(config: &Config) -> Self {
        Self {
            timeout: config.fetch_timeout,
            max_attempts: config.fetch_max_attempts,
            retry_delay: config.fetch_retry_delay,
        }
    }
}

/// Fetches pages and extracts their readable text.
pub struct PageFetcher {
    client: reqwest::Client,
    settings: FetchSettings,
}

impl PageFetcher {
    pub fn new(settings: FetchSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            settings,
        }
    }

    /// Process the full batch. Per-URL retry loops run independently,
    /// so one slow URL's retries never block the others.
    pub async fn extract_all(&self, hits: &[SearchHit]) -> Vec<ExtractedPage> {
        join_all(hits.iter().map(|hit| self.extract_one(hit))).await
    }

    async fn extract_one(&self, hit: &SearchHit) -> ExtractedPage {
        let html = match self.fetch_with_retry(&hit.url).await {
            Ok(html) => html,
            Err(err) => {
                warn!(url = %hit.url, error = %err, "page fetch failed");
                return ExtractedPage::failed(&hit.url, err.to_string());
            }
        };

        match extract_readable(&html) {
            Some(content) => {
                let title = if content.title.is_empty() {
                    hit.title.clone()
                } else {
                    content.title
                };
                ExtractedPage {
                    url: hit.url.clone(),
                    title,
                    excerpt: Some(content.excerpt),
                    length: Some(content.text.chars().count()),
                    text: content.text,
                    error: None,
                }
            }
            None => {
                warn!(url = %hit.url, "no content extracted");
                ExtractedPage::failed(&hit.url, FetchError::NoContent.to_string())
            }
        }
    }

    async fn fetch_with_retry(&self, url: &str) -> Result<String, FetchError> {
        let mut last_error = FetchError::Transport("no attempts made".to_string());

        for attempt in 0..self.settings.max_attempts {
            if attempt > 0 {
                debug!(url, attempt, "retrying fetch");
                tokio::time::sleep(self.settings.retry_delay).await;
            }

            match self.fetch_once(url).await {
                Ok(html) => return Ok(html),
                Err(err) if err.is_retryable() => {
                    warn!(url, attempt, error = %err, "fetch attempt failed");
                    last_error = err;
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_error)
    }

    async fn fetch_once(&self, url: &str) -> Result<String, FetchError> {
        // The per-request timeout aborts the underlying transfer, not
        // just the wait for it.
        let response = self
            .client
            .get(url)
            .timeout(self.settings.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout
                } else if e.is_connect() {
                    FetchError::Connection(e.to_string())
                } else {
                    FetchError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();
        if !content_type.contains("html") && !content_type.contains("text") {
            return Err(FetchError::ContentType(content_type));
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))
    }
}

/// Result of readable-content extraction.
pub struct ExtractedText {
    pub title: String,
    pub text: String,
    pub excerpt: String,
}

/// Extract the main readable text from an HTML document. Prefers the
/// `<article>` region when one exists, drops script/style/noscript
/// blocks, and flattens the remaining markup to plain text. Returns
/// `None` when nothing usable survives.
pub fn extract_readable(html: &str) -> Option<ExtractedText> {
    let title = slice_between_ci(html, "<title", "</title>")
        .map(|t| {
            // Skip attributes on the opening tag.
            let t = t.split_once('>').map(|(_, rest)| rest).unwrap_or(t);
            collapse_whitespace(&unescape_entities(t))
        })
        .unwrap_or_default();

    let body = slice_between_ci(html, "<article", "</article>")
        // Drop the remainder of the opening tag itself.
        .map(|b| b.split_once('>').map(|(_, rest)| rest).unwrap_or(b))
        .unwrap_or(html);

    let mut cleaned = body.to_string();
    for tag in ["script", "style", "noscript"] {
        cleaned = strip_tag_blocks(&cleaned, tag);
    }

    let text = collapse_whitespace(&unescape_entities(&strip_tags(&cleaned)));
    if text.is_empty() {
        return None;
    }

    let excerpt: String = text.chars().take(EXCERPT_CHARS).collect();
    Some(ExtractedText {
        title,
        text,
        excerpt,
    })
}

/// Case-insensitive slice between an opening marker and a closing
/// marker. ASCII lowercasing preserves byte offsets, so positions in
/// the lowered copy index safely into the original.
fn slice_between_ci<'a>(haystack: &'a str, open: &str, close: &str) -> Option<&'a str> {
    let lowered = haystack.to_ascii_lowercase();
    let start = lowered.find(open)? + open.len();
    let end = start + lowered[start..].find(close)?;
    Some(&haystack[start..end])
}

/// Remove `<tag ...>...</tag>` blocks, case-insensitively.
fn strip_tag_blocks(html: &str, tag: &str) -> String {
    let open = format!("<{}", tag);
    let close = format!("</{}>", tag);
    let mut out = String::with_capacity(html.len());
    let mut rest = html;

    loop {
        let lowered = rest.to_ascii_lowercase();
        let Some(start) = lowered.find(&open) else {
            out.push_str(rest);
            return out;
        };
        out.push_str(&rest[..start]);
        match lowered[start..].find(&close) {
            Some(rel_end) => rest = &rest[start + rel_end + close.len()..],
            None => return out,
        }
    }
}

/// Block-level tags that become line breaks when markup is flattened.
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "li", "br", "h1", "h2", "h3", "h4", "h5", "h6", "tr", "section", "blockquote",
];

/// Flatten markup to text, inserting newlines at block boundaries.
fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut chars = html.char_indices().peekable();

    while let Some((idx, ch)) = chars.next() {
        if ch != '<' {
            out.push(ch);
            continue;
        }

        let rest = &html[idx..];
        // A `<` only opens a tag when followed by `/`, `!`, or a
        // letter; anything else is body text (`5 < 10`).
        let opens_tag = rest[1..]
            .chars()
            .next()
            .map(|c| c == '/' || c == '!' || c.is_ascii_alphabetic())
            .unwrap_or(false);
        let end = match rest.find('>') {
            Some(end) if opens_tag => end,
            _ => {
                out.push(ch);
                continue;
            }
        };

        let tag_body = rest[1..end].trim_start_matches('/');
        let tag_name: String = tag_body
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        if BLOCK_TAGS.contains(&tag_name.as_str()) {
            out.push('\n');
        } else {
            out.push(' ');
        }

        // Skip to the end of the tag.
        while let Some(&(next_idx, _)) = chars.peek() {
            if next_idx > idx + end {
                break;
            }
            chars.next();
        }
    }

    out
}

fn unescape_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Collapse runs of whitespace, keeping single newlines between
/// non-empty lines.
fn collapse_whitespace(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_HTML: &str = r#"
        <html>
          <head>
            <title>Quantum &amp; Drugs</title>
            <style>body { color: red; }</style>
          </head>
          <body>
            <script>var tracking = "junk";</script>
            <article>
              <h1>Quantum computing in drug discovery</h1>
              <p>First paragraph of real content.</p>
              <p>Second paragraph with &quot;quotes&quot;.</p>
            </article>
          </body>
        </html>
    "#;

    #[test]
    fn test_extract_readable_basic() {
        let extracted = extract_readable(SAMPLE_HTML).unwrap();

        assert_eq!(extracted.title, "Quantum & Drugs");
        assert!(extracted.text.contains("First paragraph of real content."));
        assert!(extracted.text.contains("Second paragraph with \"quotes\"."));
        assert!(!extracted.text.contains("tracking"));
        assert!(!extracted.text.contains("color: red"));
    }

    #[test]
    fn test_extract_prefers_article_region() {
        let extracted = extract_readable(SAMPLE_HTML).unwrap();
        // Content outside <article> (nothing here but the heading is
        // inside) must not leak scripts or styles.
        assert!(extracted.text.starts_with("Quantum computing in drug discovery"));
    }

    #[test]
    fn test_extract_empty_document_is_none() {
        assert!(extract_readable("").is_none());
        assert!(extract_readable("<html><body></body></html>").is_none());
        assert!(extract_readable("<script>only()</script>").is_none());
    }

    #[test]
    fn test_excerpt_is_bounded() {
        let long = format!("<p>{}</p>", "word ".repeat(500));
        let extracted = extract_readable(&long).unwrap();
        assert!(extracted.excerpt.chars().count() <= EXCERPT_CHARS);
    }

    #[test]
    fn test_strip_tag_blocks_case_insensitive() {
        let html = "before<SCRIPT>junk</SCRIPT>after";
        assert_eq!(strip_tag_blocks(html, "script"), "beforeafter");
    }

    #[test]
    fn test_strip_tags_block_boundaries() {
        let text = strip_tags("<p>one</p><p>two</p>");
        let collapsed = collapse_whitespace(&text);
        assert_eq!(collapsed, "one\ntwo");
    }

    #[test]
    fn test_strip_tags_keeps_literal_angle_brackets() {
        let text = strip_tags("<p>5 < 10 and price <$3</p>");
        assert_eq!(collapse_whitespace(&text), "5 < 10 and price <$3");

        // A literal `<` must not swallow the text up to the next tag.
        let text = strip_tags("<p>a < b</p><p>kept</p>");
        assert_eq!(collapse_whitespace(&text), "a < b\nkept");

        // A `<` with no `>` anywhere after it must not drop the rest.
        let text = strip_tags("one < two < three");
        assert_eq!(collapse_whitespace(&text), "one < two < three");
    }

    #[test]
    fn test_unescape_entities() {
        assert_eq!(unescape_entities("a &amp; b &lt;c&gt;"), "a & b <c>");
    }
}

/// Fetch behavior against a mocked HTTP server.
#[cfg(test)]
mod http_tests {
    use super::*;

    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_settings() -> FetchSettings {
        FetchSettings {
            timeout: Duration::from_millis(250),
            max_attempts: 3,
            retry_delay: Duration::from_millis(10),
        }
    }

    fn hit(url: String) -> SearchHit {
        SearchHit {
            url,
            title: "fallback title".to_string(),
            relevance_score: 0.5,
            published_date: None,
            author: None,
        }
    }

    fn html_page(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200)
            .insert_header("content-type", "text/html; charset=utf-8")
            .set_body_string(format!(
                "<html><head><title>Page</title></head><body><p>{}</p></body></html>",
                body
            ))
    }

    #[tokio::test]
    async fn test_successful_extraction() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok"))
            .respond_with(html_page("hello world"))
            .mount(&server)
            .await;

        let fetcher = PageFetcher::new(fast_settings());
        let pages = fetcher
            .extract_all(&[hit(format!("{}/ok", server.uri()))])
            .await;

        assert_eq!(pages.len(), 1);
        assert!(pages[0].is_usable());
        assert!(pages[0].text.contains("hello world"));
        assert_eq!(pages[0].title, "Page");
        assert!(pages[0].length.is_some());
    }

    #[tokio::test]
    async fn test_non_2xx_is_terminal_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = PageFetcher::new(fast_settings());
        let pages = fetcher
            .extract_all(&[hit(format!("{}/gone", server.uri()))])
            .await;

        assert_eq!(pages.len(), 1);
        assert!(!pages[0].is_usable());
        assert!(pages[0].error.as_ref().unwrap().contains("404"));
    }

    #[tokio::test]
    async fn test_content_type_mismatch_is_terminal_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pdf"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("%PDF-1.4", "application/pdf"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = PageFetcher::new(fast_settings());
        let pages = fetcher
            .extract_all(&[hit(format!("{}/pdf", server.uri()))])
            .await;

        assert!(!pages[0].is_usable());
        assert!(pages[0]
            .error
            .as_ref()
            .unwrap()
            .contains("unsupported content type"));
    }

    #[tokio::test]
    async fn test_timeout_is_retried_up_to_cap() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(html_page("late").set_delay(Duration::from_secs(5)))
            .expect(3)
            .mount(&server)
            .await;

        let fetcher = PageFetcher::new(fast_settings());
        let pages = fetcher
            .extract_all(&[hit(format!("{}/slow", server.uri()))])
            .await;

        assert!(!pages[0].is_usable());
        assert!(pages[0].error.as_ref().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_empty_extraction_is_terminal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/empty"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string("<html><body><script>x()</script></body></html>"),
            )
            .mount(&server)
            .await;

        let fetcher = PageFetcher::new(fast_settings());
        let pages = fetcher
            .extract_all(&[hit(format!("{}/empty", server.uri()))])
            .await;

        assert!(!pages[0].is_usable());
        assert!(pages[0].error.as_ref().unwrap().contains("no content"));
    }

    #[tokio::test]
    async fn test_batch_mixes_successes_and_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a"))
            .respond_with(html_page("page a"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/b"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/c"))
            .respond_with(html_page("page c"))
            .mount(&server)
            .await;

        let fetcher = PageFetcher::new(fast_settings());
        let hits = vec![
            hit(format!("{}/a", server.uri())),
            hit(format!("{}/b", server.uri())),
            hit(format!("{}/c", server.uri())),
        ];
        let pages = fetcher.extract_all(&hits).await;

        // One entry per input URL, order preserved.
        assert_eq!(pages.len(), 3);
        assert!(pages[0].is_usable());
        assert!(!pages[1].is_usable());
        assert!(pages[2].is_usable());
        assert_eq!(pages[1].url, hits[1].url);
    }
}
