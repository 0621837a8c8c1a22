//! Web fetch tool.

use async_trait::async_trait;
use devin_llm::{SharedClient, StreamRequest};
use reqwest::header::USER_AGENT;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::time::Duration;

use super::file::catalog_metadata;
use crate::error::Result;
use crate::tool::{
    ErrorKind, ParamExt, Tool, ToolCategory, ToolContext, ToolParams, ToolResult, ToolType,
};

const AGENT: &str = concat!("devin/", env!("CARGO_PKG_VERSION"));
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Content roots tried in order; the first with any text wins.
const CONTENT_SELECTORS: [&str; 4] = ["article", "main", "[role='main']", "body"];

/// Elements whose text is never shown to the model.
const SKIPPED_ELEMENTS: [&str; 5] = ["script", "style", "noscript", "template", "svg"];

/// Reduce an HTML document to readable text.
///
/// Text nodes of the main content area become one line each, with runs of
/// whitespace collapsed. Entities are decoded by the HTML parser.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let root = CONTENT_SELECTORS
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .find_map(|selector| document.select(&selector).find(has_text))
        .unwrap_or_else(|| document.root_element());

    let mut lines = Vec::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|e| SKIPPED_ELEMENTS.contains(&e.name()))
        });
        if hidden {
            continue;
        }
        let line = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if !line.is_empty() {
            lines.push(line);
        }
    }
    lines.join("\n")
}

fn has_text(element: &ElementRef<'_>) -> bool {
    element.text().any(|t| !t.trim().is_empty())
}

/// Fetches a URL and returns its text, optionally summarized by a model.
pub struct WebFetchTool {
    client: reqwest::Client,
    llm: Option<SharedClient>,
    timeout: Duration,
    max_chars: usize,
}

impl WebFetchTool {
    pub fn new(llm: Option<SharedClient>) -> Self {
        let client = match reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .user_agent(AGENT)
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to build web-fetch HTTP client, using defaults");
                reqwest::Client::new()
            }
        };
        Self {
            client,
            llm,
            timeout: DEFAULT_TIMEOUT,
            max_chars: 50_000,
        }
    }

    /// Override the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn summarize(&self, llm: &SharedClient, prompt: &str, page: &str) -> Result<String> {
        let request = StreamRequest::new(format!(
            "{}\n\nAnswer using only this page content:\n\n{}",
            prompt, page
        ));
        Ok(llm.stream(request).await?.collect_text().await?)
    }
}

#[async_trait]
impl Tool for WebFetchTool {
    catalog_metadata!(ToolType::WebFetch);

    async fn execute(&self, params: ToolParams, ctx: &ToolContext) -> Result<ToolResult> {
        let url = params.required_str("url", "an http or https URL")?;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Ok(ToolResult::error(
                ErrorKind::InvalidArguments,
                format!("Unsupported URL '{}': only http and https are allowed", url),
            ));
        }

        tracing::debug!(url = %url, "Fetching URL");
        let response = tokio::select! {
            r = self.client
                .get(url)
                .timeout(self.timeout)
                .header(USER_AGENT, AGENT)
                .send() => r,
            _ = ctx.cancellation.cancelled() => {
                return Ok(ToolResult::error(ErrorKind::ExecutionFailure, "Fetch cancelled"));
            }
        };
        let response = match response {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                return Ok(ToolResult::error(ErrorKind::Timeout, e.to_string()));
            }
            Err(e) => return Ok(ToolResult::error(ErrorKind::ExecutionFailure, e.to_string())),
        };

        let status = response.status();
        if !status.is_success() {
            return Ok(ToolResult::error(
                ErrorKind::ExecutionFailure,
                format!("GET {} returned HTTP {}", url, status.as_u16()),
            ));
        }

        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("html"));
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return Ok(ToolResult::error(ErrorKind::ExecutionFailure, e.to_string())),
        };

        let mut text = if is_html { html_to_text(&body) } else { body };
        let truncated = text.chars().count() > self.max_chars;
        if truncated {
            text = text.chars().take(self.max_chars).collect();
            text.push_str("\n[Output truncated]");
        }

        if let (Some(prompt), Some(llm)) = (params.optional_str("prompt"), &self.llm) {
            return Ok(match self.summarize(llm, prompt, &text).await {
                Ok(answer) => ToolResult::success(answer).with_metadata("url", url),
                Err(e) => ToolResult::error(
                    ErrorKind::ExecutionFailure,
                    format!("Fetched {} but summarizing failed: {}", url, e),
                ),
            });
        }

        Ok(ToolResult::success(text)
            .with_metadata("url", url)
            .with_metadata("truncated", truncated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devin_llm::MockClient;
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn params(value: Value) -> ToolParams {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_html_to_text() {
        let html = "<html><head><style>body{}</style><script>var x = 1;</script></head>\
                    <body><h1>Title</h1><p>Fish &amp; chips</p>\
                    <script>alert('x')</script></body></html>";
        assert_eq!(html_to_text(html), "Title\nFish & chips");
    }

    #[test]
    fn test_html_entities_are_decoded() {
        let html = "<p>it&#x27;s &mdash; &copy; 2024 &lt;tag&gt; &nbsp;done</p>";
        assert_eq!(html_to_text(html), "it's \u{2014} \u{a9} 2024 <tag> done");
    }

    #[test]
    fn test_html_prefers_main_content() {
        let html = "<body><nav>Home | About</nav>\
                    <main><h2>Install</h2><p>Run   the\n installer.</p></main>\
                    <footer>(c) someone</footer></body>";
        assert_eq!(html_to_text(html), "Install\nRun the installer.");
    }

    #[test]
    fn test_html_empty_main_falls_back_to_body() {
        let html = "<body><main> </main><p>Body text</p><noscript>Enable JS</noscript></body>";
        assert_eq!(html_to_text(html), "Body text");
    }

    #[tokio::test]
    async fn test_fetch_html_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/docs"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html; charset=utf-8")
                    .set_body_string("<p>Hello</p><p>World</p>"),
            )
            .mount(&server)
            .await;

        let tool = WebFetchTool::new(None);
        let result = tool
            .execute(
                params(json!({"url": format!("{}/docs", server.uri())})),
                &ToolContext::default(),
            )
            .await
            .unwrap();
        assert!(result.is_success());
        assert!(result.to_llm_content().contains("Hello"));
        assert!(result.to_llm_content().contains("World"));
    }

    #[tokio::test]
    async fn test_fetch_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let tool = WebFetchTool::new(None);
        let result = tool
            .execute(params(json!({"url": server.uri()})), &ToolContext::default())
            .await
            .unwrap();
        assert_eq!(result.error_kind(), Some(ErrorKind::ExecutionFailure));
        assert!(result.to_llm_content().contains("404"));
    }

    #[tokio::test]
    async fn test_rejects_non_http_scheme() {
        let tool = WebFetchTool::new(None);
        let result = tool
            .execute(params(json!({"url": "file:///etc/passwd"})), &ToolContext::default())
            .await
            .unwrap();
        assert_eq!(result.error_kind(), Some(ErrorKind::InvalidArguments));
    }

    #[tokio::test]
    async fn test_prompt_uses_llm_service() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Release 2.0 adds streaming."))
            .mount(&server)
            .await;

        let llm = Arc::new(MockClient::with_text("Streaming support."));
        let tool = WebFetchTool::new(Some(llm.clone()));
        let result = tool
            .execute(
                params(json!({"url": server.uri(), "prompt": "What is new?"})),
                &ToolContext::default(),
            )
            .await
            .unwrap();

        assert_eq!(result.to_llm_content(), "Streaming support.");
        let sent = &llm.requests()[0].user_text;
        assert!(sent.starts_with("What is new?"));
        assert!(sent.contains("Release 2.0 adds streaming."));
    }

    #[tokio::test]
    async fn test_request_sends_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("user-agent", AGENT))
            .respond_with(ResponseTemplate::new(200).set_body_string("plain"))
            .expect(1)
            .mount(&server)
            .await;

        let result = WebFetchTool::new(None)
            .execute(params(json!({"url": server.uri()})), &ToolContext::default())
            .await
            .unwrap();
        assert_eq!(result.to_llm_content(), "plain");
    }

    #[tokio::test]
    async fn test_slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let tool = WebFetchTool::new(None).with_timeout(Duration::from_millis(100));
        let result = tool
            .execute(params(json!({"url": server.uri()})), &ToolContext::default())
            .await
            .unwrap();
        assert_eq!(result.error_kind(), Some(ErrorKind::Timeout));
    }
}
