//! Reshapes an upstream event stream into plain text.
//!
//! The upstream body is a sequence of lines. Lines starting with `data: `
//! carry a JSON chunk whose `choices[0].delta.content` is forwarded; the line
//! `data: [DONE]` ends the relay. Everything else is ignored.
//!
//! ```text
//! upstream bytes ──> LineBuffer ──> classify_line ──> Token ──> output channel
//! ```

use std::fmt::Display;
use std::io;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, warn};

use crate::models::Chunk;

pub const DATA_PREFIX: &str = "data: ";
pub const DONE_LINE: &str = "data: [DONE]";

/// Classification of one complete upstream line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Non-empty text fragment to forward
    Token(String),
    /// Sentinel seen, stop relaying
    Done,
    /// Blank, unrecognized, or a chunk without content
    Skip,
    /// `data: ` line whose payload is not a valid chunk
    Malformed,
}

/// How a relay task finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    Done,
    EndOfData,
    ClientGone,
    TransportFault,
}

/// Holds the trailing partial line between chunks.
///
/// Bytes are kept undecoded until their line is complete, so a multi-byte
/// character split across chunks is decoded in one piece.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk and returns every line it completed, without the
    /// terminating newline. The remainder stays buffered.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let Some(last_newline) = self.pending.iter().rposition(|&b| b == b'\n') else {
            return Vec::new();
        };

        let rest = self.pending.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.pending, rest);

        complete[..last_newline]
            .split(|&b| b == b'\n')
            .map(|line| String::from_utf8_lossy(line).into_owned())
            .collect()
    }

    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    /// Drops the unterminated remainder, returning how many bytes were lost.
    pub fn discard(&mut self) -> usize {
        let len = self.pending.len();
        self.pending.clear();
        len
    }
}

pub fn classify_line(line: &str) -> StreamEvent {
    let line = line.trim();

    if line.is_empty() {
        return StreamEvent::Skip;
    }
    if line == DONE_LINE {
        return StreamEvent::Done;
    }

    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return StreamEvent::Skip;
    };

    match serde_json::from_str::<Chunk>(payload) {
        Ok(chunk) => chunk
            .into_content()
            .map(StreamEvent::Token)
            .unwrap_or(StreamEvent::Skip),
        Err(e) => {
            warn!("[RELAY] failed to parse event payload: {} - data: {}", e, payload);
            StreamEvent::Malformed
        }
    }
}

/// Spawns a task relaying `upstream` and returns the text stream it feeds.
///
/// At most `capacity` fragments are read ahead of the consumer. Dropping the
/// returned stream stops the task and releases `upstream`.
pub fn relay<S, E>(upstream: S, capacity: usize) -> ReceiverStream<Result<Bytes, io::Error>>
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));

    tokio::spawn(async move {
        let outcome = pump(upstream, &tx).await;
        match outcome {
            RelayOutcome::Done => info!("[RELAY] stream finished with sentinel"),
            RelayOutcome::EndOfData => info!("[RELAY] upstream ended without sentinel"),
            RelayOutcome::ClientGone => info!("[RELAY] client disconnected, upstream released"),
            RelayOutcome::TransportFault => {}
        }
    });

    ReceiverStream::new(rx)
}

/// Drives one upstream body into `tx` until a terminal condition.
pub async fn pump<S, E>(upstream: S, tx: &mpsc::Sender<Result<Bytes, io::Error>>) -> RelayOutcome
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Display,
{
    let mut upstream = std::pin::pin!(upstream);
    let mut lines = LineBuffer::new();

    loop {
        let next = tokio::select! {
            biased;
            _ = tx.closed() => return RelayOutcome::ClientGone,
            next = upstream.next() => next,
        };

        match next {
            None => {
                let dropped = lines.discard();
                if dropped > 0 {
                    debug!("[RELAY] discarding {} bytes of unterminated line", dropped);
                }
                return RelayOutcome::EndOfData;
            }
            Some(Err(e)) => {
                error!("[RELAY] upstream transport error: {}", e);
                let _ = tx
                    .send(Err(io::Error::new(io::ErrorKind::Other, e.to_string())))
                    .await;
                return RelayOutcome::TransportFault;
            }
            Some(Ok(chunk)) => {
                debug!("[RELAY] received {} bytes", chunk.len());
                for line in lines.push(&chunk) {
                    match classify_line(&line) {
                        StreamEvent::Token(text) => {
                            if tx.send(Ok(Bytes::from(text))).await.is_err() {
                                return RelayOutcome::ClientGone;
                            }
                        }
                        StreamEvent::Done => return RelayOutcome::Done,
                        StreamEvent::Skip | StreamEvent::Malformed => {}
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn event(content: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({"choices": [{"delta": {"content": content}}]})
        )
    }

    fn chunks_of(data: &[u8], size: usize) -> Vec<Result<Bytes, io::Error>> {
        data.chunks(size)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect()
    }

    async fn collect(chunks: Vec<Result<Bytes, io::Error>>) -> (String, Option<io::Error>) {
        let mut out = relay(stream::iter(chunks), 4);
        let mut text = Vec::new();
        while let Some(item) = out.next().await {
            match item {
                Ok(bytes) => text.extend_from_slice(&bytes),
                Err(e) => return (String::from_utf8(text).unwrap(), Some(e)),
            }
        }
        (String::from_utf8(text).unwrap(), None)
    }

    #[test]
    fn test_line_buffer_keeps_partial_line() {
        let mut buffer = LineBuffer::new();
        assert!(buffer.push(b"data: {\"a\"").is_empty());
        assert_eq!(buffer.pending(), b"data: {\"a\"");

        let lines = buffer.push(b":1}\n\nnext");
        assert_eq!(lines, vec!["data: {\"a\":1}".to_string(), String::new()]);
        assert_eq!(buffer.pending(), b"next");

        assert_eq!(buffer.discard(), 4);
        assert!(buffer.pending().is_empty());
    }

    #[test]
    fn test_line_buffer_split_utf8() {
        let text = "data: é漢\n".as_bytes();
        let mut buffer = LineBuffer::new();
        // split inside the three-byte character
        assert!(buffer.push(&text[..9]).is_empty());
        assert_eq!(buffer.push(&text[9..]), vec!["data: é漢".to_string()]);
    }

    #[test]
    fn test_classify_line() {
        assert_eq!(classify_line(""), StreamEvent::Skip);
        assert_eq!(classify_line("   \r"), StreamEvent::Skip);
        assert_eq!(classify_line("data: [DONE]"), StreamEvent::Done);
        assert_eq!(classify_line("  data: [DONE]\r"), StreamEvent::Done);
        assert_eq!(classify_line("event: message"), StreamEvent::Skip);
        assert_eq!(classify_line(": keep-alive"), StreamEvent::Skip);
        assert_eq!(classify_line("data: {not json"), StreamEvent::Malformed);
        assert_eq!(
            classify_line(r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#),
            StreamEvent::Skip
        );
        assert_eq!(
            classify_line(r#"data: {"choices":[{"delta":{"content":"Hi"}}]}"#),
            StreamEvent::Token("Hi".to_string())
        );
    }

    #[tokio::test]
    async fn test_relay_example_stream() {
        let body = format!("{}{}data: [DONE]\n\n", event("Hello"), event(" there"));
        let (text, err) = collect(chunks_of(body.as_bytes(), body.len())).await;
        assert_eq!(text, "Hello there");
        assert!(err.is_none());
    }

    #[tokio::test]
    async fn test_chunking_is_transparent() {
        let fragments = ["Héllo", ", ", "wörld", " 漢字", " 🎉", "!"];
        let mut body: String = fragments.iter().map(|f| event(f)).collect();
        body.push_str("data: [DONE]\n");
        let expected: String = fragments.concat();

        for size in [1, 2, 3, 5, 7, 16, 64, body.len()] {
            let (text, err) = collect(chunks_of(body.as_bytes(), size)).await;
            assert_eq!(text, expected, "chunk size {}", size);
            assert!(err.is_none());
        }
    }

    #[tokio::test]
    async fn test_malformed_event_is_skipped() {
        let body = format!(
            "{}data: {{\"choices\": [oops\n\n{}data: [DONE]\n",
            event("a"),
            event("b")
        );
        let (text, err) = collect(chunks_of(body.as_bytes(), 10)).await;
        assert_eq!(text, "ab");
        assert!(err.is_none());
    }

    #[tokio::test]
    async fn test_bytes_after_sentinel_are_ignored() {
        let body = format!("{}data: [DONE]\n{}", event("kept"), event("dropped"));
        let (text, _) = collect(chunks_of(body.as_bytes(), body.len())).await;
        assert_eq!(text, "kept");

        let (text, _) = collect(chunks_of(body.as_bytes(), 3)).await;
        assert_eq!(text, "kept");
    }

    #[tokio::test]
    async fn test_missing_sentinel_discards_partial_line() {
        let body = format!(
            "{}data: {{\"choices\":[{{\"delta\":{{\"content\":\"tail\"}}}}]}}",
            event("whole")
        );
        let (text, err) = collect(chunks_of(body.as_bytes(), 8)).await;
        assert_eq!(text, "whole");
        assert!(err.is_none());
    }

    #[tokio::test]
    async fn test_transport_fault_ends_with_error() {
        let chunks = vec![
            Ok(Bytes::from(event("partial"))),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
            Ok(Bytes::from(event("never"))),
        ];
        let (text, err) = collect(chunks).await;
        assert_eq!(text, "partial");
        let err = err.expect("transport fault must surface");
        assert!(err.to_string().contains("reset"));
    }

    #[tokio::test]
    async fn test_consumer_drop_releases_upstream() {
        struct DropFlag(Arc<AtomicBool>);
        impl Drop for DropFlag {
            fn drop(&mut self) {
                self.0.store(true, Ordering::SeqCst);
            }
        }

        let released = Arc::new(AtomicBool::new(false));
        let flag = DropFlag(released.clone());
        let first = stream::iter(vec![Ok::<_, io::Error>(Bytes::from(event("one")))]);
        // the upstream stalls forever after its first event
        let upstream = first.chain(stream::pending()).map(move |item| {
            let _held = &flag;
            item
        });

        let mut out = relay(upstream, 1);
        assert_eq!(out.next().await.unwrap().unwrap(), Bytes::from("one"));
        drop(out);

        for _ in 0..50 {
            if released.load(Ordering::SeqCst) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(released.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_stalled_consumer_bounds_read_ahead() {
        use std::sync::atomic::AtomicUsize;

        let pulled = Arc::new(AtomicUsize::new(0));
        let counter = pulled.clone();
        let events = (0..1000).map(|i| Ok::<_, io::Error>(Bytes::from(event(&i.to_string()))));
        let upstream = stream::iter(events).map(move |item| {
            counter.fetch_add(1, Ordering::SeqCst);
            item
        });

        let capacity = 2;
        let out = relay(upstream, capacity);
        tokio::time::sleep(Duration::from_millis(100)).await;

        // one chunk per slot, plus the one waiting on a full channel
        let n = pulled.load(Ordering::SeqCst);
        assert!((1..=capacity + 1).contains(&n), "pulled {} chunks", n);
        drop(out);
    }

    #[tokio::test]
    async fn test_pump_outcomes() {
        let (tx, mut rx) = mpsc::channel(8);
        let body = Bytes::from(format!("{}data: [DONE]\n", event("x")));
        let outcome = pump(stream::iter(vec![Ok::<_, io::Error>(body)]), &tx).await;
        assert_eq!(outcome, RelayOutcome::Done);
        assert_eq!(rx.recv().await.unwrap().unwrap(), Bytes::from("x"));

        let outcome = pump(stream::iter(Vec::<Result<Bytes, io::Error>>::new()), &tx).await;
        assert_eq!(outcome, RelayOutcome::EndOfData);
    }
}
