//! Frame re-delimiting for streamed upstream bodies.
//!
//! Upstream chunks carry blank-line separated frames (`\n\n`) with no
//! relation between chunk and frame boundaries. [`FrameBuffer`] reassembles
//! complete frames across chunks and [`reframe`] re-emits them one at a
//! time with a pacing delay, followed by a single terminating newline.
//! Frame contents are never inspected.

use std::time::Duration;

use bytes::Bytes;
use futures::{Stream, StreamExt};

/// Frame delimiter: a blank line.
pub const DELIMITER: &str = "\n\n";

/// Written after the last frame or residual.
const TERMINATOR: &[u8] = b"\n";

/// Incremental UTF-8 decoder.
///
/// Multi-byte characters split across chunks are held back until the rest
/// arrives. Invalid sequences decode to U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a chunk, appending the text to `out`.
    pub fn decode_into(&mut self, chunk: &[u8], out: &mut String) {
        let joined;
        let mut input: &[u8] = if self.pending.is_empty() {
            chunk
        } else {
            self.pending.extend_from_slice(chunk);
            joined = std::mem::take(&mut self.pending);
            &joined
        };

        loop {
            match std::str::from_utf8(input) {
                Ok(text) => {
                    out.push_str(text);
                    return;
                }
                Err(e) => {
                    let (valid, rest) = input.split_at(e.valid_up_to());
                    out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            input = &rest[len..];
                        }
                        None => {
                            // Truncated sequence at the end of the chunk
                            self.pending.extend_from_slice(rest);
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Flush held-back bytes at end of input.
    pub fn finish_into(&mut self, out: &mut String) {
        if !self.pending.is_empty() {
            self.pending.clear();
            out.push(char::REPLACEMENT_CHARACTER);
        }
    }

    #[cfg(test)]
    fn pending(&self) -> usize {
        self.pending.len()
    }
}

/// Reframe buffer for one relayed stream.
///
/// Holds the not-yet-delimited tail of the stream between chunks.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    decoder: Utf8Decoder,
    buffer: String,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every frame it completed, delimiter included.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Bytes> {
        // The retained tail holds no delimiter, so only its last byte can
        // start one.
        let mut from = self.buffer.len().saturating_sub(DELIMITER.len() - 1);
        self.decoder.decode_into(chunk, &mut self.buffer);

        let mut frames = Vec::new();
        let mut start = 0;
        while let Some(pos) = find_delimiter(&self.buffer.as_bytes()[from..]) {
            let end = from + pos + DELIMITER.len();
            frames.push(Bytes::copy_from_slice(&self.buffer.as_bytes()[start..end]));
            start = end;
            from = end;
        }
        self.buffer.drain(..start);
        frames
    }

    /// End of input: return the unterminated residual, if any.
    pub fn finish(mut self) -> Option<Bytes> {
        self.decoder.finish_into(&mut self.buffer);
        if self.buffer.is_empty() {
            None
        } else {
            Some(Bytes::from(self.buffer))
        }
    }
}

/// Byte offset of the first delimiter in `haystack`.
fn find_delimiter(haystack: &[u8]) -> Option<usize> {
    haystack
        .windows(DELIMITER.len())
        .position(|window| window == DELIMITER.as_bytes())
}

/// Re-delimit `source` into complete frames and pace their delivery.
///
/// Each complete frame is yielded with its delimiter and followed by a
/// `pacing` sleep. At end of input the residual (if any) is yielded as-is,
/// then a single `\n`. A read error ends the stream with that error and
/// drops the residual.
///
/// The returned stream is lazy and is consumed once. Dropping it drops
/// `source`.
pub fn reframe<S, E>(source: S, pacing: Duration) -> impl Stream<Item = std::io::Result<Bytes>>
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<Box<dyn std::error::Error + Send + Sync>> + Send + 'static,
{
    async_stream::try_stream! {
        futures::pin_mut!(source);
        let mut frames = FrameBuffer::new();
        let mut emitted = 0usize;

        while let Some(chunk) = source.next().await {
            let chunk = chunk.map_err(|e| {
                let err = std::io::Error::other(e);
                tracing::warn!(error = %err, frames = emitted, "Upstream stream failed");
                err
            })?;

            for frame in frames.push(&chunk) {
                yield frame;
                emitted += 1;
                tokio::time::sleep(pacing).await;
            }
        }

        let residual = frames.finish();
        tracing::debug!(
            frames = emitted,
            residual_bytes = residual.as_ref().map_or(0, Bytes::len),
            "Upstream stream complete"
        );
        if let Some(residual) = residual {
            yield residual;
        }
        yield Bytes::from_static(TERMINATOR);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use tokio::time::Instant;

    /// Split `data` into chunks ending at the given byte positions.
    fn split_at_positions(data: &[u8], positions: &[usize]) -> Vec<Vec<u8>> {
        let mut chunks = Vec::new();
        let mut prev = 0;
        for &pos in positions {
            if pos > prev && pos < data.len() {
                chunks.push(data[prev..pos].to_vec());
                prev = pos;
            }
        }
        chunks.push(data[prev..].to_vec());
        chunks
    }

    /// Run chunks through a FrameBuffer, collecting emitted frames and residual.
    fn run_buffer(chunks: &[Vec<u8>]) -> (Vec<String>, Option<String>) {
        let mut buffer = FrameBuffer::new();
        let mut frames = Vec::new();
        for chunk in chunks {
            for frame in buffer.push(chunk) {
                frames.push(String::from_utf8(frame.to_vec()).unwrap());
            }
        }
        let residual = buffer
            .finish()
            .map(|b| String::from_utf8(b.to_vec()).unwrap());
        (frames, residual)
    }

    fn byte_source(
        chunks: Vec<Vec<u8>>,
    ) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Send + 'static {
        stream::iter(chunks.into_iter().map(|c| Ok(Bytes::from(c))))
    }

    async fn collect_output(
        chunks: Vec<Vec<u8>>,
        pacing: Duration,
    ) -> Vec<std::io::Result<Bytes>> {
        reframe(byte_source(chunks), pacing).collect().await
    }

    #[test]
    fn test_single_chunk_two_frames() {
        let (frames, residual) = run_buffer(&[b"data: X\n\ndata: Y\n\n".to_vec()]);
        assert_eq!(frames, vec!["data: X\n\n", "data: Y\n\n"]);
        assert!(residual.is_none());
    }

    #[test]
    fn test_frame_split_mid_frame() {
        let chunks = vec![b"data: X\n\nda".to_vec(), b"ta: Y\n\n".to_vec()];
        let (frames, residual) = run_buffer(&chunks);
        assert_eq!(frames, vec!["data: X\n\n", "data: Y\n\n"]);
        assert!(residual.is_none());
    }

    #[test]
    fn test_delimiter_split_across_chunks() {
        let chunks = vec![b"data: X\n".to_vec(), b"\ndata: Y".to_vec()];
        let (frames, residual) = run_buffer(&chunks);
        assert_eq!(frames, vec!["data: X\n\n"]);
        assert_eq!(residual.as_deref(), Some("data: Y"));
    }

    #[test]
    fn test_long_tail_then_split_delimiter() {
        let mut chunks: Vec<Vec<u8>> = (0..500).map(|_| "é{\"k\":1}".as_bytes().to_vec()).collect();
        chunks.push(b"\n".to_vec());
        chunks.push(b"\nnext".to_vec());
        let (frames, residual) = run_buffer(&chunks);

        let expected = format!("{}\n\n", "é{\"k\":1}".repeat(500));
        assert_eq!(frames, vec![expected]);
        assert_eq!(residual.as_deref(), Some("next"));
    }

    #[test]
    fn test_lone_newlines_across_chunks_stay_buffered() {
        let mut buffer = FrameBuffer::new();
        assert!(buffer.push(b"a\n").is_empty());
        assert!(buffer.push(b"b\n").is_empty());
        assert!(buffer.push(b"c").is_empty());
        assert_eq!(buffer.push(b"\n\n"), vec![Bytes::from_static(b"a\nb\nc\n\n")]);
        assert_eq!(buffer.finish(), None);
    }

    #[test]
    fn test_residual_without_delimiter() {
        let (frames, residual) = run_buffer(&[b"a\n\nb".to_vec()]);
        assert_eq!(frames, vec!["a\n\n"]);
        assert_eq!(residual.as_deref(), Some("b"));
    }

    #[test]
    fn test_empty_input() {
        let (frames, residual) = run_buffer(&[]);
        assert!(frames.is_empty());
        assert!(residual.is_none());
    }

    #[test]
    fn test_consecutive_delimiters_give_empty_frames() {
        let (frames, residual) = run_buffer(&[b"\n\n\n\n".to_vec()]);
        assert_eq!(frames, vec!["\n\n", "\n\n"]);
        assert!(residual.is_none());
    }

    #[test]
    fn test_three_newlines_leave_one_in_residual() {
        let (frames, residual) = run_buffer(&[b"a\n\n\nb".to_vec()]);
        assert_eq!(frames, vec!["a\n\n"]);
        assert_eq!(residual.as_deref(), Some("\nb"));
    }

    #[test]
    fn test_non_event_payload_passes_through() {
        let raw = b"{\"not\": \"an event\"}\n\nrandom text\r\n\r\n";
        let (frames, residual) = run_buffer(&[raw.to_vec()]);
        assert_eq!(frames, vec!["{\"not\": \"an event\"}\n\n"]);
        assert_eq!(residual.as_deref(), Some("random text\r\n\r\n"));
    }

    #[test]
    fn test_frame_integrity_under_every_single_split() {
        let events = ["data: {\"a\":1}", "data: héllo wörld", "event: x\ndata: 😀", "data: [DONE]"];
        let full: String = events.iter().map(|e| format!("{}\n\n", e)).collect();
        let bytes = full.as_bytes();

        for split in 1..bytes.len() {
            let chunks = split_at_positions(bytes, &[split]);
            let (frames, residual) = run_buffer(&chunks);
            let expected: Vec<String> = events.iter().map(|e| format!("{}\n\n", e)).collect();
            assert_eq!(frames, expected, "split at byte {}", split);
            assert!(residual.is_none(), "split at byte {}", split);
        }
    }

    #[test]
    fn test_frame_integrity_byte_by_byte() {
        let full = "data: 你好\n\ndata: ¿qué?\n\ntail";
        let chunks: Vec<Vec<u8>> = full.as_bytes().iter().map(|b| vec![*b]).collect();
        let (frames, residual) = run_buffer(&chunks);
        assert_eq!(frames, vec!["data: 你好\n\n", "data: ¿qué?\n\n"]);
        assert_eq!(residual.as_deref(), Some("tail"));
    }

    #[test]
    fn test_decoder_holds_split_character() {
        let mut decoder = Utf8Decoder::new();
        let mut out = String::new();
        let euro = "€".as_bytes();

        decoder.decode_into(&euro[..1], &mut out);
        assert_eq!(out, "");
        assert_eq!(decoder.pending(), 1);

        decoder.decode_into(&euro[1..2], &mut out);
        assert_eq!(out, "");
        assert_eq!(decoder.pending(), 2);

        decoder.decode_into(&euro[2..], &mut out);
        assert_eq!(out, "€");
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_decoder_replaces_invalid_bytes() {
        let mut decoder = Utf8Decoder::new();
        let mut out = String::new();
        decoder.decode_into(b"ok\xffok", &mut out);
        assert_eq!(out, "ok\u{FFFD}ok");
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_decoder_flushes_truncated_tail() {
        let mut decoder = Utf8Decoder::new();
        let mut out = String::new();
        decoder.decode_into(&"é".as_bytes()[..1], &mut out);
        decoder.finish_into(&mut out);
        assert_eq!(out, "\u{FFFD}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_reframe_output_sequence() {
        let chunks = vec![b"data: X\n\nda".to_vec(), b"ta: Y\n\n".to_vec()];
        let output: Vec<Bytes> = collect_output(chunks, Duration::from_millis(30))
            .await
            .into_iter()
            .map(Result::unwrap)
            .collect();

        assert_eq!(
            output,
            vec![
                Bytes::from_static(b"data: X\n\n"),
                Bytes::from_static(b"data: Y\n\n"),
                Bytes::from_static(b"\n"),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_reframe_residual_then_terminator() {
        let output: Vec<Bytes> = collect_output(vec![b"a\n\nb".to_vec()], Duration::from_millis(30))
            .await
            .into_iter()
            .map(Result::unwrap)
            .collect();

        assert_eq!(
            output,
            vec![
                Bytes::from_static(b"a\n\n"),
                Bytes::from_static(b"b"),
                Bytes::from_static(b"\n"),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_reframe_empty_source_still_terminates() {
        let output: Vec<Bytes> = collect_output(vec![], Duration::from_millis(30))
            .await
            .into_iter()
            .map(Result::unwrap)
            .collect();
        assert_eq!(output, vec![Bytes::from_static(b"\n")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reframe_resplit_yields_original_frames() {
        let events = ["data: one", "data: two", "data: three"];
        let full: String = events.iter().map(|e| format!("{}\n\n", e)).collect();
        let chunks = split_at_positions(full.as_bytes(), &[3, 4, 12, 20, 21]);

        let output: Vec<u8> = collect_output(chunks, Duration::from_millis(1))
            .await
            .into_iter()
            .flat_map(|r| r.unwrap().to_vec())
            .collect();
        let text = String::from_utf8(output).unwrap();

        assert!(text.ends_with("\n\n\n"));
        let segments: Vec<&str> = text.split(DELIMITER).collect();
        assert_eq!(segments, vec!["data: one", "data: two", "data: three", "\n"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reframe_paces_frames() {
        let pacing = Duration::from_millis(30);
        let source = byte_source(vec![b"a\n\nb\n\nc\n\nrest".to_vec()]);
        let output = reframe(source, pacing);
        futures::pin_mut!(output);

        let mut arrivals = Vec::new();
        while let Some(item) = output.next().await {
            arrivals.push((item.unwrap(), Instant::now()));
        }

        let payloads: Vec<&[u8]> = arrivals.iter().map(|(b, _)| b.as_ref()).collect();
        assert_eq!(payloads, vec![&b"a\n\n"[..], b"b\n\n", b"c\n\n", b"rest", b"\n"]);

        // A full pacing interval separates each frame from the next write
        for pair in arrivals.windows(2).take(3) {
            assert!(pair[1].1 - pair[0].1 >= pacing);
        }
        // No delay after the residual
        assert_eq!(arrivals[4].1, arrivals[3].1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reframe_next_frame_waits_for_pacing() {
        let pacing = Duration::from_millis(30);
        let output = reframe(byte_source(vec![b"a\n\nb\n\n".to_vec()]), pacing);
        let mut output = Box::pin(output);

        let first = output.next().await.unwrap().unwrap();
        assert_eq!(first, Bytes::from_static(b"a\n\n"));
        let after_first = Instant::now();

        let early = tokio::time::timeout(pacing - Duration::from_millis(1), output.next()).await;
        assert!(early.is_err(), "second frame must not arrive inside the pacing window");

        let second = output.next().await.unwrap().unwrap();
        assert_eq!(second, Bytes::from_static(b"b\n\n"));
        assert!(Instant::now() - after_first >= pacing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reframe_read_error_stops_without_flush() {
        let source = stream::iter(vec![
            Ok(Bytes::from_static(b"data: X\n\npartial")),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
            Ok(Bytes::from_static(b" never\n\n")),
        ]);
        let output: Vec<std::io::Result<Bytes>> =
            reframe(source, Duration::from_millis(30)).collect().await;

        assert_eq!(output.len(), 2);
        assert_eq!(output[0].as_ref().unwrap(), &Bytes::from_static(b"data: X\n\n"));
        let err = output[1].as_ref().unwrap_err();
        assert!(err.to_string().contains("reset"));
    }
}
