//! Line decoder for the upstream `text/event-stream` body.

use futures_util::{Stream, StreamExt, stream};
use serde::Deserialize;
use std::collections::VecDeque;

use super::{AdvisorError, TokenStream};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseData {
    Payload(String),
    Done,
}

/// Splits a byte stream into `data:` lines.
///
/// Bytes are buffered until a full line is present, so frames and multi-byte
/// characters split across network chunks decode intact.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
}

impl SseDecoder {
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseData> {
        self.buf.extend_from_slice(chunk);
        let mut out = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            if let Some(data) = parse_line(&line) {
                out.push(data);
            }
        }
        out
    }

    /// Flushes a trailing line that was not newline-terminated.
    pub fn finish(&mut self) -> Option<SseData> {
        let rest = std::mem::take(&mut self.buf);
        parse_line(&rest)
    }
}

fn parse_line(line: &[u8]) -> Option<SseData> {
    let text = String::from_utf8_lossy(line);
    let text = text.trim_end_matches(|c| c == '\r' || c == '\n');
    let payload = text.strip_prefix("data:")?.trim_start();
    if payload.is_empty() {
        return None;
    }
    if payload == "[DONE]" {
        Some(SseData::Done)
    } else {
        Some(SseData::Payload(payload.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    error: Option<UpstreamError>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UpstreamError {
    pub(crate) message: String,
}

/// Extracts `choices[0].delta.content` from one chat-completions chunk.
pub fn parse_delta(payload: &str) -> Result<Option<String>, AdvisorError> {
    let chunk: StreamChunk =
        serde_json::from_str(payload).map_err(|e| AdvisorError::Decode(e.to_string()))?;
    if let Some(err) = chunk.error {
        return Err(AdvisorError::Upstream(err.message));
    }
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .filter(|content| !content.is_empty()))
}

struct DecodeState<S> {
    bytes: S,
    decoder: SseDecoder,
    pending: VecDeque<Result<String, AdvisorError>>,
    finished: bool,
}

impl<S> DecodeState<S> {
    /// Queues the tokens of decoded lines; returns true once the stream is over.
    fn absorb(&mut self, events: impl IntoIterator<Item = SseData>) -> bool {
        for event in events {
            match event {
                SseData::Done => return true,
                SseData::Payload(payload) => match parse_delta(&payload) {
                    Ok(Some(token)) => self.pending.push_back(Ok(token)),
                    Ok(None) => {}
                    Err(err) => {
                        self.pending.push_back(Err(err));
                        return true;
                    }
                },
            }
        }
        false
    }
}

/// Turns an upstream body into text deltas. The stream ends after `[DONE]`,
/// after the first error, or when the body ends.
pub fn decode_token_stream<S, B>(bytes: S) -> TokenStream
where
    S: Stream<Item = Result<B, AdvisorError>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    let state = DecodeState {
        bytes,
        decoder: SseDecoder::default(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    let events = state.decoder.feed(chunk.as_ref());
                    state.finished = state.absorb(events);
                }
                Some(Err(err)) => {
                    state.pending.push_back(Err(err));
                    state.finished = true;
                }
                None => {
                    let tail = state.decoder.finish();
                    state.absorb(tail);
                    state.finished = true;
                }
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(content: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({ "choices": [{ "delta": { "content": content } }] })
        )
    }

    #[test]
    fn decoder_joins_lines_split_across_chunks() {
        let mut decoder = SseDecoder::default();
        let frame = chunk("Semez");
        let (head, tail) = frame.split_at(10);
        assert!(decoder.feed(head.as_bytes()).is_empty());
        let events = decoder.feed(tail.as_bytes());
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], SseData::Payload(p) if p.contains("Semez")));
    }

    #[test]
    fn decoder_keeps_multibyte_characters_split_mid_codepoint() {
        let mut decoder = SseDecoder::default();
        let frame = chunk("récolte");
        let bytes = frame.as_bytes();
        let split = frame.find('é').unwrap() + 1;
        assert!(decoder.feed(&bytes[..split]).is_empty());
        let events = decoder.feed(&bytes[split..]);
        let SseData::Payload(payload) = &events[0] else {
            panic!("expected payload");
        };
        assert_eq!(parse_delta(payload).unwrap().as_deref(), Some("récolte"));
    }

    #[test]
    fn decoder_recognises_done_and_ignores_other_fields() {
        let mut decoder = SseDecoder::default();
        let events = decoder.feed(b": keep-alive\nevent: message\ndata: [DONE]\r\n");
        assert_eq!(events, vec![SseData::Done]);
    }

    #[test]
    fn finish_flushes_unterminated_line() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.feed(b"data: [DONE]").is_empty());
        assert_eq!(decoder.finish(), Some(SseData::Done));
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn parse_delta_skips_role_only_chunks() {
        let payload = r#"{"choices":[{"delta":{"role":"assistant"}}]}"#;
        assert_eq!(parse_delta(payload).unwrap(), None);
    }

    #[test]
    fn parse_delta_surfaces_upstream_errors() {
        let payload = r#"{"error":{"message":"rate limited"}}"#;
        assert!(matches!(
            parse_delta(payload),
            Err(AdvisorError::Upstream(msg)) if msg == "rate limited"
        ));
    }

    #[tokio::test]
    async fn token_stream_stops_at_done() {
        let body = format!("{}{}data: [DONE]\n\n{}", chunk("Le mil "), chunk("pousse"), chunk("ignored"));
        let bytes = body.into_bytes();
        let parts: Vec<Result<Vec<u8>, AdvisorError>> =
            bytes.chunks(7).map(|c| Ok(c.to_vec())).collect();

        let tokens: Vec<String> = decode_token_stream(stream::iter(parts))
            .map(|t| t.unwrap())
            .collect()
            .await;
        assert_eq!(tokens, vec!["Le mil ".to_string(), "pousse".to_string()]);
    }

    #[tokio::test]
    async fn token_stream_ends_after_first_error() {
        let parts: Vec<Result<Vec<u8>, AdvisorError>> = vec![
            Ok(chunk("Bonjour").into_bytes()),
            Ok(b"data: not-json\n".to_vec()),
            Ok(chunk("never").into_bytes()),
        ];
        let items: Vec<Result<String, AdvisorError>> =
            decode_token_stream(stream::iter(parts)).collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "Bonjour");
        assert!(matches!(items[1], Err(AdvisorError::Decode(_))));
    }
}
