//! Line-oriented decoding of streamed completion bodies.
//!
//! OpenAI-compatible servers answer `stream: true` with server-sent events
//! (`data: {json}` lines, terminated by `data: [DONE]`), Ollama answers with
//! newline-delimited JSON objects carrying a `done` flag. Both are decoded by
//! splitting the body into lines and handing every line to a provider decoder.

use std::{collections::VecDeque, time::Duration};

use futures::{StreamExt, stream, stream::BoxStream};
use serde_json::Value;

use crate::{
    chat::ChatStream,
    error_handler::{AiLlmError, Provider, ProviderError, ProviderErrorKind},
};

/// Outcome of decoding one line.
#[derive(Debug, PartialEq)]
pub(crate) enum LineEvent {
    Fragment(String),
    Skip,
    Done,
}

/// Accumulates raw bytes and yields complete UTF-8 lines.
#[derive(Default)]
pub(crate) struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line);
            let text = text.trim_end_matches(['\n', '\r']);
            if !text.is_empty() {
                lines.push(text.to_string());
            }
        }
        lines
    }

    pub(crate) fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buf);
        let text = String::from_utf8_lossy(&rest).trim().to_string();
        (!text.is_empty()).then_some(text)
    }
}

/// Decodes one SSE line of an OpenAI-compatible chat stream.
pub(crate) fn decode_openai_sse(line: &str) -> Result<LineEvent, AiLlmError> {
    let Some(data) = line.strip_prefix("data:") else {
        // comments (`: keep-alive`), `event:` and `id:` lines
        return Ok(LineEvent::Skip);
    };
    let data = data.trim();
    if data == "[DONE]" {
        return Ok(LineEvent::Done);
    }
    let json: Value = serde_json::from_str(data).map_err(|e| {
        ProviderError::new(
            Provider::OpenAI,
            ProviderErrorKind::Decode(format!("invalid SSE payload: {e}")),
        )
    })?;
    let content = json
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|arr| arr.first())
        .and_then(|choice| choice.get("delta"))
        .and_then(|delta| delta.get("content"))
        .and_then(|c| c.as_str())
        .unwrap_or_default();

    if content.is_empty() {
        Ok(LineEvent::Skip)
    } else {
        Ok(LineEvent::Fragment(content.to_string()))
    }
}

/// Decodes one NDJSON line of an Ollama `/api/chat` stream.
pub(crate) fn decode_ollama_ndjson(line: &str) -> Result<LineEvent, AiLlmError> {
    let json: Value = serde_json::from_str(line).map_err(|e| {
        ProviderError::new(
            Provider::Ollama,
            ProviderErrorKind::Decode(format!("invalid NDJSON line: {e}")),
        )
    })?;
    if let Some(err) = json.get("error").and_then(|e| e.as_str()) {
        return Err(
            ProviderError::new(Provider::Ollama, ProviderErrorKind::Decode(err.to_string())).into(),
        );
    }
    let content = json
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .unwrap_or_default();
    let done = json.get("done").and_then(|d| d.as_bool()).unwrap_or(false);

    match (content.is_empty(), done) {
        (false, _) => Ok(LineEvent::Fragment(content.to_string())),
        (true, true) => Ok(LineEvent::Done),
        (true, false) => Ok(LineEvent::Skip),
    }
}

struct DecodeState<F> {
    bytes: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    lines: LineBuffer,
    pending: VecDeque<String>,
    decode: F,
    timeout: Duration,
    done: bool,
}

/// Turns a streaming HTTP body into a [`ChatStream`] of text fragments.
///
/// A `Done` event ends the stream even if bytes remain; the first error is
/// yielded once and ends the stream as well.
pub(crate) fn fragment_stream<F>(resp: reqwest::Response, timeout: Duration, decode: F) -> ChatStream
where
    F: Fn(&str) -> Result<LineEvent, AiLlmError> + Send + 'static,
{
    let bytes = resp.bytes_stream().map(|r| r.map(|b| b.to_vec())).boxed();
    lines_to_fragments(bytes, timeout, decode)
}

pub(crate) fn lines_to_fragments<F>(
    bytes: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    timeout: Duration,
    decode: F,
) -> ChatStream
where
    F: Fn(&str) -> Result<LineEvent, AiLlmError> + Send + 'static,
{
    let state = DecodeState {
        bytes,
        lines: LineBuffer::default(),
        pending: VecDeque::new(),
        decode,
        timeout,
        done: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(line) = st.pending.pop_front() {
                match (st.decode)(&line) {
                    Ok(LineEvent::Fragment(s)) => return Some((Ok(s), st)),
                    Ok(LineEvent::Skip) => continue,
                    Ok(LineEvent::Done) => return None,
                    Err(e) => {
                        st.done = true;
                        st.pending.clear();
                        return Some((Err(e), st));
                    }
                }
            }
            if st.done {
                return None;
            }
            match st.bytes.next().await {
                Some(Ok(chunk)) => {
                    let lines = st.lines.push(&chunk);
                    st.pending.extend(lines);
                }
                Some(Err(e)) => {
                    st.done = true;
                    let err = AiLlmError::from_transport(e, st.timeout);
                    return Some((Err(err), st));
                }
                None => {
                    st.done = true;
                    if let Some(rest) = st.lines.finish() {
                        st.pending.push_back(rest);
                    }
                }
            }
        }
    })
    .boxed()
}
