// ABOUTME: Incremental SSE event splitter and the placeholder-hydrating response stream
// ABOUTME: Buffers until a blank line, rewrites each event, flushes the tail on EOF
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Bridge Point

//! # SSE Hydration
//!
//! Server-Sent Events terminate each event with a blank line (`\n\n`). The
//! splitter accumulates upstream bytes and emits one event at a time,
//! delimiter included, so chunk boundaries are never altered beyond the
//! event-level split. Placeholder substitution applies to the raw event
//! text, which keeps `event:`/`data:` framing and heartbeat comments
//! byte-identical apart from the substituted spans. Any trailing buffer is
//! flushed when the upstream closes.

use bytes::Bytes;
use futures_util::{Stream, StreamExt};

use crate::session_map::substitute;

/// Incremental `\n\n` event splitter
#[derive(Debug, Default)]
pub struct SseEventBuffer {
    buffer: Vec<u8>,
}

impl SseEventBuffer {
    /// Create an empty buffer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed upstream bytes, returning every complete event (delimiter
    /// included). Partial events stay buffered for the next feed.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        self.buffer.extend_from_slice(bytes);

        let mut events = Vec::new();
        loop {
            let Some((end, delim_len)) = find_event_end(&self.buffer) else {
                break;
            };
            let event: Vec<u8> = self.buffer.drain(..end + delim_len).collect();
            events.push(event);
        }
        events
    }

    /// Take whatever remains; called on upstream EOF
    #[must_use]
    pub fn flush(&mut self) -> Option<Vec<u8>> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buffer))
        }
    }
}

/// Locate the first event delimiter: `\n\n`, or `\r\n\r\n` from CRLF servers
fn find_event_end(buffer: &[u8]) -> Option<(usize, usize)> {
    let lf = buffer.windows(2).position(|w| w == b"\n\n");
    let crlf = buffer.windows(4).position(|w| w == b"\r\n\r\n");
    match (lf, crlf) {
        (Some(l), Some(c)) if c < l => Some((c, 4)),
        (Some(l), _) => Some((l, 2)),
        (None, Some(c)) => Some((c, 4)),
        (None, None) => None,
    }
}

/// Substitute placeholders within one raw event
fn hydrate_event(event: Vec<u8>, snapshot: &[(String, String)]) -> Vec<u8> {
    if snapshot.is_empty() {
        return event;
    }
    match std::str::from_utf8(&event) {
        Ok(text) => substitute(text, snapshot).into_bytes(),
        // SSE is text; pass any non-UTF-8 event through untouched
        Err(_) => event,
    }
}

/// Wrap an upstream byte stream with event-level placeholder hydration.
///
/// The snapshot is taken once, before the first byte is read; bindings added
/// to the session by concurrent requests do not affect this stream.
pub fn hydrate_sse_stream<S, E>(
    byte_stream: S,
    snapshot: Vec<(String, String)>,
) -> impl Stream<Item = Result<Bytes, E>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Send + 'static,
{
    async_stream::stream! {
        let mut splitter = SseEventBuffer::new();
        let mut byte_stream = Box::pin(byte_stream);

        while let Some(chunk) = byte_stream.next().await {
            match chunk {
                Ok(bytes) => {
                    for event in splitter.feed(&bytes) {
                        yield Ok(Bytes::from(hydrate_event(event, &snapshot)));
                    }
                }
                Err(e) => {
                    // Forward the transport error and stop; the tail buffer
                    // is dropped because the stream is already broken.
                    yield Err(e);
                    return;
                }
            }
        }

        if let Some(tail) = splitter.flush() {
            yield Ok(Bytes::from(hydrate_event(tail, &snapshot)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    #[test]
    fn splits_on_blank_line() {
        let mut splitter = SseEventBuffer::new();
        let events = splitter.feed(b"data: one\n\ndata: two\n\n");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], b"data: one\n\n");
        assert_eq!(events[1], b"data: two\n\n");
    }

    #[test]
    fn buffers_partial_events_across_feeds() {
        let mut splitter = SseEventBuffer::new();
        assert!(splitter.feed(b"data: par").is_empty());
        assert!(splitter.feed(b"tial").is_empty());
        let events = splitter.feed(b"\n\ndata: next");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0], b"data: partial\n\n");
        assert_eq!(splitter.flush().as_deref(), Some(b"data: next".as_slice()));
    }

    #[test]
    fn crlf_delimiters_are_recognized() {
        let mut splitter = SseEventBuffer::new();
        let events = splitter.feed(b"data: one\r\n\r\ndata: two\n\n");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], b"data: one\r\n\r\n");
    }

    #[test]
    fn flush_empty_is_none() {
        let mut splitter = SseEventBuffer::new();
        assert!(splitter.flush().is_none());
    }

    #[tokio::test]
    async fn stream_hydrates_each_event() {
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(
                "data: {\"delta\":\"call \u{E000}aa\u{E001}\"}\n\nda".as_bytes(),
            )),
            Ok(Bytes::from_static(
                "ta: {\"delta\":\" again \u{E000}aa\u{E001}\"}\n\n".as_bytes(),
            )),
        ];
        let snapshot = vec![("\u{E000}aa\u{E001}".to_owned(), "Sarah".to_owned())];
        let out: Vec<_> = hydrate_sse_stream(stream::iter(chunks), snapshot)
            .collect()
            .await;

        let text: String = out
            .into_iter()
            .map(|r| String::from_utf8(r.unwrap().to_vec()).unwrap())
            .collect();
        assert_eq!(
            text,
            "data: {\"delta\":\"call Sarah\"}\n\ndata: {\"delta\":\" again Sarah\"}\n\n"
        );
    }

    #[tokio::test]
    async fn stream_flushes_tail_on_eof() {
        let chunks: Vec<Result<Bytes, std::io::Error>> =
            vec![Ok(Bytes::from_static(b"data: unterminated"))];
        let out: Vec<_> = hydrate_sse_stream(stream::iter(chunks), Vec::new())
            .collect()
            .await;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].as_ref().unwrap().as_ref(), b"data: unterminated");
    }

    #[tokio::test]
    async fn heartbeat_comments_pass_through() {
        let chunks: Vec<Result<Bytes, std::io::Error>> =
            vec![Ok(Bytes::from_static(b": ping\n\ndata: x\n\n"))];
        let out: Vec<_> = hydrate_sse_stream(stream::iter(chunks), Vec::new())
            .collect()
            .await;
        assert_eq!(out[0].as_ref().unwrap().as_ref(), b": ping\n\n");
    }
}
