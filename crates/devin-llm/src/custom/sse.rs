//! Server-Sent-Events parsing for streaming custom agents.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use std::pin::Pin;
use std::sync::Arc;

use super::response_path::ResponsePath;
use crate::error::LlmError;
use crate::stream::TextStream;
use crate::types::{Message, Usage};

/// A client's local message buffer, shared with in-flight streams.
pub type LocalMessages = Arc<Mutex<Vec<Message>>>;

/// Where a stream records the token usage its backend reported.
pub type UsageSlot = Arc<Mutex<Option<Usage>>>;

/// Message emitted when no chunk in a stream matched the response format.
pub fn parse_failure_message(format: &str, failures: &[String]) -> String {
    format!(
        "**Failed** to parse response. Please check your response format: **{}**\n\
         Original responses:\n- {}",
        format,
        failures.join("\n- ")
    )
}

enum LineOutcome {
    Skip,
    Emit(String),
    Done,
}

struct SseState {
    byte_stream: Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>,
    buffer: Vec<u8>,
    eof: bool,
    finished: bool,
    path: ResponsePath,
    parsed_any: bool,
    failures: Vec<String>,
    output: String,
    history: Option<LocalMessages>,
    usage: Option<UsageSlot>,
}

impl SseState {
    fn handle_line(&mut self, line: &str) -> LineOutcome {
        let Some(data) = line
            .strip_prefix("data:")
            .map(|d| d.strip_prefix(' ').unwrap_or(d))
        else {
            // event:, id:, retry: and ":" comment lines carry no text.
            return LineOutcome::Skip;
        };

        if data == "[DONE]" {
            return LineOutcome::Done;
        }
        if data.is_empty() {
            return LineOutcome::Skip;
        }

        let value = serde_json::from_str::<serde_json::Value>(data).ok();
        let usage = value.as_ref().and_then(Usage::from_response);
        if let (Some(reported), Some(slot)) = (usage, &self.usage) {
            *slot.lock() = Some(reported);
        }
        let text = value.and_then(|value| self.path.extract_text(&value));

        match text {
            Some(text) => {
                self.parsed_any = true;
                if text.is_empty() {
                    return LineOutcome::Skip;
                }
                self.output.push_str(&text);
                LineOutcome::Emit(text)
            }
            // Trailing usage-only chunks carry no text.
            None if usage.is_some() => LineOutcome::Skip,
            None => {
                tracing::warn!(
                    response_format = %self.path,
                    data = %data,
                    "SSE chunk did not match response format"
                );
                self.failures.push(data.to_string());
                LineOutcome::Skip
            }
        }
    }

    /// Close the stream, returning the parse-failure notice if nothing matched.
    fn finish(&mut self) -> Option<String> {
        self.finished = true;

        if !self.output.is_empty()
            && let Some(history) = &self.history
        {
            history
                .lock()
                .push(Message::assistant(std::mem::take(&mut self.output)));
        }

        if self.parsed_any {
            None
        } else {
            Some(parse_failure_message(self.path.as_str(), &self.failures))
        }
    }
}

/// Turn an SSE byte stream into reply text.
///
/// Each `data:` line is parsed as JSON and run through `path`. `[DONE]` ends
/// the stream. If the stream ends without a single matching chunk, one final
/// item describing the failure is emitted instead of silently returning
/// nothing. The complete output is appended to `history` when given, and
/// any reported token usage is stored in `usage`.
///
/// Lines are split on raw bytes and decoded whole, so multi-byte characters
/// that straddle network chunks survive intact.
pub fn parse_sse_stream(
    byte_stream: impl Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
    path: ResponsePath,
    history: Option<LocalMessages>,
    usage: Option<UsageSlot>,
) -> TextStream {
    Box::pin(futures::stream::unfold(
        SseState {
            byte_stream: Box::pin(byte_stream),
            buffer: Vec::new(),
            eof: false,
            finished: false,
            path,
            parsed_any: false,
            failures: Vec::new(),
            output: String::new(),
            history,
            usage,
        },
        |mut state| async move {
            if state.finished {
                return None;
            }

            loop {
                while let Some(line_end) = state.buffer.iter().position(|b| *b == b'\n') {
                    let raw: Vec<u8> = state.buffer.drain(..=line_end).collect();
                    let line = String::from_utf8_lossy(&raw).trim().to_string();

                    match state.handle_line(&line) {
                        LineOutcome::Skip => continue,
                        LineOutcome::Emit(text) => return Some((Ok(text), state)),
                        LineOutcome::Done => {
                            let notice = state.finish();
                            return notice.map(|n| (Ok(n), state));
                        }
                    }
                }

                if state.eof {
                    let notice = state.finish();
                    return notice.map(|n| (Ok(n), state));
                }

                match state.byte_stream.next().await {
                    Some(Ok(bytes)) => {
                        state.buffer.extend_from_slice(&bytes);
                    }
                    Some(Err(e)) => {
                        state.finished = true;
                        return Some((Err(LlmError::from(e)), state));
                    }
                    None => {
                        state.eof = true;
                        if !state.buffer.is_empty() {
                            state.buffer.push(b'\n');
                        }
                    }
                }
            }
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::custom::response_path::DEFAULT_STREAM_PATH;

    fn byte_stream(
        parts: &[&str],
    ) -> impl Stream<Item = reqwest::Result<Bytes>> + Send + 'static {
        let owned: Vec<reqwest::Result<Bytes>> = parts
            .iter()
            .map(|p| Ok(Bytes::from(p.to_string())))
            .collect();
        futures::stream::iter(owned)
    }

    async fn collect(stream: TextStream) -> Vec<String> {
        stream.map(|item| item.unwrap()).collect().await
    }

    fn default_path() -> ResponsePath {
        ResponsePath::parse(DEFAULT_STREAM_PATH).unwrap()
    }

    #[tokio::test]
    async fn test_parses_openai_chunks() {
        let body = [
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\ndata: [DONE]\n\n",
        ];
        let chunks = collect(parse_sse_stream(byte_stream(&body), default_path(), None, None)).await;
        assert_eq!(chunks, vec!["Hel", "lo"]);
    }

    #[tokio::test]
    async fn test_lines_split_across_network_chunks() {
        let body = [
            "data: {\"choices\":[{\"delta\":",
            "{\"content\":\"split\"}}]}\n",
            "\ndata: [DONE]\n",
        ];
        let chunks = collect(parse_sse_stream(byte_stream(&body), default_path(), None, None)).await;
        assert_eq!(chunks, vec!["split"]);
    }

    #[tokio::test]
    async fn test_custom_format_and_no_space_after_colon() {
        let path = ResponsePath::parse("$.text").unwrap();
        let body = [
            ": keep-alive\n",
            "event: message\n",
            "data:{\"text\":\"a\"}\n",
            "data: {\"text\":\"b\"}",
        ];
        let chunks = collect(parse_sse_stream(byte_stream(&body), path, None, None)).await;
        assert_eq!(chunks, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_no_matching_chunk_emits_failure_notice() {
        let path = ResponsePath::parse("$.output").unwrap();
        let body = ["data: {\"other\":1}\n", "data: not json\n", "data: [DONE]\n"];
        let chunks = collect(parse_sse_stream(byte_stream(&body), path, None, None)).await;
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].contains("**$.output**"));
        assert!(chunks[0].contains("{\"other\":1}"));
        assert!(chunks[0].contains("not json"));
    }

    #[tokio::test]
    async fn test_some_failures_are_tolerated() {
        let body = [
            "data: {\"id\":\"x\",\"choices\":[{\"delta\":{}}]}\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n",
        ];
        let chunks = collect(parse_sse_stream(byte_stream(&body), default_path(), None, None)).await;
        assert_eq!(chunks, vec!["ok"]);
    }

    #[tokio::test]
    async fn test_output_recorded_in_history() {
        let history: LocalMessages = Arc::new(Mutex::new(Vec::new()));
        let body = [
            "data: {\"choices\":[{\"delta\":{\"content\":\"one \"}}]}\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"two\"}}]}\n",
            "data: [DONE]\n",
        ];
        let _ = collect(parse_sse_stream(
            byte_stream(&body),
            default_path(),
            Some(history.clone()),
            None,
        ))
        .await;

        let messages = history.lock();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0], Message::assistant("one two"));
    }

    #[tokio::test]
    async fn test_empty_stream_reports_failure() {
        let chunks = collect(parse_sse_stream(byte_stream(&[]), default_path(), None, None)).await;
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].starts_with("**Failed**"));
    }

    #[tokio::test]
    async fn test_multibyte_character_split_across_chunks() {
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"héllo 世界\"}}]}\n".as_bytes();
        let split = line
            .windows("世".len())
            .position(|w| w == "世".as_bytes())
            .unwrap()
            + 1;
        let parts: Vec<reqwest::Result<Bytes>> = vec![
            Ok(Bytes::copy_from_slice(&line[..split])),
            Ok(Bytes::copy_from_slice(&line[split..])),
            Ok(Bytes::from_static(b"data: [DONE]\n")),
        ];
        let stream = parse_sse_stream(futures::stream::iter(parts), default_path(), None, None);
        assert_eq!(collect(stream).await, vec!["héllo 世界"]);
    }

    #[tokio::test]
    async fn test_usage_chunk_is_recorded() {
        let usage: UsageSlot = Arc::new(Mutex::new(None));
        let body = [
            "data: {\"choices\":[{\"delta\":{\"content\":\"hi\"}}]}\n",
            "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":40,\"completion_tokens\":2}}\n",
            "data: [DONE]\n",
        ];
        let chunks = collect(parse_sse_stream(
            byte_stream(&body),
            default_path(),
            None,
            Some(usage.clone()),
        ))
        .await;

        assert_eq!(chunks, vec!["hi"]);
        assert_eq!(
            *usage.lock(),
            Some(Usage {
                input_tokens: 40,
                output_tokens: 2
            })
        );
    }
}
