//! SSE event stream for real-time luminaire state.
//!
//! The backend pushes state changes over a long-lived
//! `GET /luminaires/automation/events` response encoded as
//! `text/event-stream`. [`FrameDecoder`] reassembles frames from raw
//! byte chunks; [`ApiClient::automation_events`] opens the connection
//! and yields decoded frames as a `Stream`.
//!
//! # Example
//!
//! ```rust,ignore
//! use futures_util::StreamExt;
//!
//! let mut frames = std::pin::pin!(client.automation_events().await?);
//! while let Some(frame) = frames.next().await {
//!     println!("{:?}", frame?);
//! }
//! ```

use async_stream::try_stream;
use bytes::BytesMut;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use tracing::{debug, trace};

use crate::client::ApiClient;
use crate::error::Error;

// ── SseFrame ────────────────────────────────────────────────────────

/// One decoded frame of the event stream.
///
/// The backend does not reliably set `event:` on every frame, so
/// `event` is optional and consumers classify by payload shape instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// Value of the `event:` field, if the frame carried one.
    pub event: Option<String>,
    /// Accumulated `data:` payload, newline-joined across lines.
    pub data: String,
}

// ── FrameDecoder ────────────────────────────────────────────────────

/// Incremental decoder for the line-oriented SSE framing.
///
/// Chunks arrive at arbitrary boundaries: a chunk may split a line, a
/// frame, or a multi-byte UTF-8 character. The decoder keeps the
/// undelivered tail as raw bytes and only decodes complete lines, so a
/// split character simply waits for its continuation bytes. The frame
/// accumulator is reset on the terminating blank line and *only* there
/// -- never per chunk.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: BytesMut,
    event: Option<String>,
    data: Option<String>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one raw chunk, returning every frame it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buf.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(line) = self.take_line() {
            if let Some(frame) = self.process_line(&line) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Pop one complete line off the front of the buffer.
    ///
    /// UTF-8 continuation bytes can never equal `\n`, so scanning for
    /// the terminator at the byte level is encoding-safe; decoding
    /// happens per complete line.
    fn take_line(&mut self) -> Option<String> {
        let pos = self.buf.iter().position(|&b| b == b'\n')?;
        let mut line = self.buf.split_to(pos + 1);
        line.truncate(pos);
        if line.last() == Some(&b'\r') {
            line.truncate(line.len() - 1);
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    /// Apply one line to the frame accumulator. Returns a frame when
    /// the line is the blank terminator of a non-empty frame.
    fn process_line(&mut self, line: &str) -> Option<SseFrame> {
        let line = line.trim();

        if line.is_empty() {
            return self.dispatch();
        }

        if let Some(value) = line.strip_prefix("event:") {
            self.event = Some(value.trim().to_owned());
        } else if let Some(value) = line.strip_prefix("data:") {
            let value = value.trim();
            match &mut self.data {
                Some(data) => {
                    data.push('\n');
                    data.push_str(value);
                }
                None => self.data = Some(value.to_owned()),
            }
        } else {
            // Comments and unknown fields.
            trace!(line, "ignoring stream line");
        }
        None
    }

    /// Emit the accumulated frame. Blank lines with nothing accumulated
    /// (keep-alives) emit nothing.
    fn dispatch(&mut self) -> Option<SseFrame> {
        if self.event.is_none() && self.data.is_none() {
            return None;
        }
        Some(SseFrame {
            event: self.event.take(),
            data: self.data.take().unwrap_or_default(),
        })
    }
}

// ── Stream opener ───────────────────────────────────────────────────

impl ApiClient {
    /// Open the long-lived automation event stream.
    ///
    /// Sends the bearer token and `Accept: text/event-stream`, then
    /// yields decoded frames until the server closes the response or
    /// the transport fails. A 401 clears the session before returning,
    /// so callers never retry a revoked token.
    pub async fn automation_events(
        &self,
    ) -> Result<BoxStream<'static, Result<SseFrame, Error>>, Error> {
        let url = self.url("luminaires/automation/events")?;
        let bearer = self.bearer()?;
        debug!(%url, "opening automation event stream");

        let resp = self
            .stream_http
            .get(url)
            .header(reqwest::header::AUTHORIZATION, bearer)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .header(reqwest::header::CACHE_CONTROL, "no-cache")
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
            self.session.clear();
            return Err(Error::SessionExpired);
        }
        if !resp.status().is_success() {
            return Err(Error::StreamRejected {
                status: resp.status().as_u16(),
            });
        }

        debug!("automation event stream established");

        Ok(Box::pin(try_stream! {
            let mut decoder = FrameDecoder::new();
            let mut body = resp.bytes_stream();
            while let Some(chunk) = body.next().await {
                let chunk = chunk?;
                trace!(len = chunk.len(), "stream chunk");
                for frame in decoder.feed(&chunk) {
                    yield frame;
                }
            }
            debug!("automation event stream ended");
        }))
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn decode_all(decoder: &mut FrameDecoder, chunks: &[&[u8]]) -> Vec<SseFrame> {
        chunks.iter().flat_map(|c| decoder.feed(c)).collect()
    }

    #[test]
    fn single_frame_one_chunk() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.feed(b"event: state\ndata: {\"isOn\":true}\n\n");

        assert_eq!(
            frames,
            vec![SseFrame {
                event: Some("state".into()),
                data: "{\"isOn\":true}".into(),
            }]
        );
    }

    #[test]
    fn frame_without_event_field() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.feed(b"data: {\"luminariaId\":3,\"isOn\":false}\n\n");

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, None);
        assert_eq!(frames[0].data, "{\"luminariaId\":3,\"isOn\":false}");
    }

    #[test]
    fn data_lines_join_with_newline() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.feed(b"data: first\ndata: second\n\n");

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "first\nsecond");
    }

    #[test]
    fn crlf_line_endings() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.feed(b"event: state\r\ndata: on\r\n\r\n");

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event.as_deref(), Some("state"));
        assert_eq!(frames[0].data, "on");
    }

    #[test]
    fn comment_and_unknown_lines_ignored() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.feed(b": keep-alive\nid: 7\ndata: x\n\n");

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "x");
    }

    #[test]
    fn blank_lines_without_payload_emit_nothing() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.feed(b"\n\n\n").is_empty());
    }

    #[test]
    fn unterminated_frame_stays_buffered() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.feed(b"data: half").is_empty());
        // The terminator arrives later; nothing was lost.
        let frames = decoder.feed(b"\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "half");
    }

    #[test]
    fn frame_reassembly_at_every_split_offset() {
        // Multi-byte payload: "Luminária" forces UTF-8 continuation
        // bytes at several offsets.
        let encoded: &[u8] = "event: state\ndata: {\"name\":\"Lumin\u{e1}ria\",\"isOn\":true}\n\n"
            .as_bytes();
        let expected = SseFrame {
            event: Some("state".into()),
            data: "{\"name\":\"Lumin\u{e1}ria\",\"isOn\":true}".into(),
        };

        for split in 1..encoded.len() {
            let mut decoder = FrameDecoder::new();
            let frames = decode_all(&mut decoder, &[&encoded[..split], &encoded[split..]]);
            assert_eq!(frames, vec![expected.clone()], "split at byte {split}");
        }
    }

    #[test]
    fn frame_reassembly_byte_by_byte() {
        let encoded = "data: {\"luminariaId\":\"p\u{e1}tio\",\"isOn\":true}\n\ndata: next\n\n".as_bytes();
        let mut decoder = FrameDecoder::new();
        let mut frames = Vec::new();
        for byte in encoded {
            frames.extend(decoder.feed(std::slice::from_ref(byte)));
        }

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].data, "{\"luminariaId\":\"p\u{e1}tio\",\"isOn\":true}");
        assert_eq!(frames[1].data, "next");
    }

    #[test]
    fn accumulator_survives_chunk_boundary_inside_frame() {
        // The observed client reset its accumulator per chunk; a frame
        // whose data lines straddle a boundary must not be corrupted.
        let mut decoder = FrameDecoder::new();
        let mut frames = decoder.feed(b"event: state\ndata: fir");
        frames.extend(decoder.feed(b"st\ndata: second\n\n"));

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event.as_deref(), Some("state"));
        assert_eq!(frames[0].data, "first\nsecond");
    }

    #[test]
    fn multiple_frames_in_one_chunk() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.feed(b"data: a\n\ndata: b\n\nevent: x\ndata: c\n\n");

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].data, "a");
        assert_eq!(frames[1].data, "b");
        assert_eq!(frames[2].event.as_deref(), Some("x"));
    }
}
