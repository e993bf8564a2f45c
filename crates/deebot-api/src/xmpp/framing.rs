// Top-level stanza framing for an XMPP stream.
//
// The stream is one never-closed document, so a regular parser cannot
// be pointed at it. Instead the byte buffer is scanned for complete
// top-level elements, which are then handed out as standalone strings.

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::Error;

const READ_CHUNK: usize = 4096;

/// Largest amount of unframed data held before the stream is abandoned.
pub(crate) const MAX_FRAME_BYTES: usize = 1024 * 1024;

/// One unit cut from the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Frame {
    /// The server's `<stream:stream ...>` opening tag.
    StreamOpen,
    /// A complete top-level element.
    Stanza(String),
    /// `</stream:stream>`.
    StreamClose,
    /// Declarations, whitespace keepalives, stray text.
    Skip,
}

/// Cut the next frame from the front of `buf`.
///
/// Returns the frame and the number of bytes consumed, or `None` if the
/// buffer does not yet hold a complete frame.
pub(crate) fn next_frame(buf: &str) -> Option<(Frame, usize)> {
    let start = buf.len() - buf.trim_start().len();
    let rest = &buf[start..];
    if rest.is_empty() {
        return None;
    }

    if rest.starts_with("<?") {
        let end = rest.find("?>")? + 2;
        return Some((Frame::Skip, start + end));
    }
    if rest.starts_with("<stream:stream") {
        let end = tag_end(rest)?;
        return Some((Frame::StreamOpen, start + end));
    }
    if rest.starts_with("</stream:stream") {
        let end = rest.find('>')? + 1;
        return Some((Frame::StreamClose, start + end));
    }
    if !rest.starts_with('<') {
        let end = rest.find('<').unwrap_or(rest.len());
        return Some((Frame::Skip, start + end));
    }

    let mut depth = 0usize;
    let mut pos = 0usize;
    loop {
        let open = rest[pos..].find('<')? + pos;
        let close = tag_end(&rest[open..])? + open;
        let tag = &rest[open..close];

        if tag.starts_with("</") {
            depth = depth.saturating_sub(1);
        } else if !(tag.starts_with("<!--") || tag.starts_with("<?") || tag.ends_with("/>")) {
            depth += 1;
        }
        pos = close;

        if depth == 0 {
            return Some((Frame::Stanza(rest[..close].to_owned()), start + close));
        }
    }
}

/// Index just past the `>` closing the tag that starts at `s[0]`,
/// ignoring `>` inside quoted attribute values.
fn tag_end(s: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, c) in s.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '>') => return Some(i + 1),
            (None, _) => {}
        }
    }
    None
}

/// Qualified name of a stanza's root element (`iq`, `stream:features`).
pub(crate) fn root_name(stanza: &str) -> &str {
    let body = stanza.trim_start().trim_start_matches('<');
    let end = body
        .find(|c: char| c.is_whitespace() || c == '/' || c == '>')
        .unwrap_or(body.len());
    &body[..end]
}

// ── Reader ───────────────────────────────────────────────────────────

/// Buffered frame reader over any byte stream.
pub(crate) struct FrameReader<R> {
    inner: R,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub(crate) fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Vec::new(),
        }
    }

    /// Whether unread bytes are buffered (must be empty before a TLS upgrade).
    pub(crate) fn has_buffered(&self) -> bool {
        !self.buf.iter().all(u8::is_ascii_whitespace)
    }

    /// Resume reading over a new inner stream with already-buffered bytes.
    pub(crate) fn with_buffer(inner: R, buf: Vec<u8>) -> Self {
        Self { inner, buf }
    }

    pub(crate) fn into_parts(self) -> (R, Vec<u8>) {
        (self.inner, self.buf)
    }

    pub(crate) fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Read until a non-skip frame is available. Cancel-safe: bytes are
    /// only appended once a read completes.
    ///
    /// Fails with [`Error::FrameTooLarge`] once more than
    /// [`MAX_FRAME_BYTES`] are buffered without a complete frame.
    pub(crate) async fn next(&mut self) -> Result<Frame, Error> {
        loop {
            let text = match std::str::from_utf8(&self.buf) {
                Ok(s) => s,
                Err(e) => std::str::from_utf8(&self.buf[..e.valid_up_to()]).unwrap_or_default(),
            };
            if let Some((frame, consumed)) = next_frame(text) {
                self.buf.drain(..consumed);
                if frame == Frame::Skip {
                    continue;
                }
                return Ok(frame);
            }

            if self.buf.len() > MAX_FRAME_BYTES {
                return Err(Error::FrameTooLarge {
                    limit: MAX_FRAME_BYTES,
                });
            }

            let mut chunk = [0u8; READ_CHUNK];
            let n = self.inner.read(&mut chunk).await?;
            if n == 0 {
                return Err(Error::StreamClosed);
            }
            self.buf.extend_from_slice(&chunk[..n]);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn splits_stream_header_and_stanzas() {
        let buf = "<?xml version='1.0'?><stream:stream from='ecouser.net' xmlns='jabber:client'>\
                   <stream:features><mechanisms><mechanism>PLAIN</mechanism></mechanisms></stream:features>";

        let (frame, used) = next_frame(buf).unwrap();
        assert_eq!(frame, Frame::Skip);
        let buf = &buf[used..];

        let (frame, used) = next_frame(buf).unwrap();
        assert_eq!(frame, Frame::StreamOpen);
        let buf = &buf[used..];

        let (frame, used) = next_frame(buf).unwrap();
        let Frame::Stanza(text) = frame else { panic!("expected stanza") };
        assert_eq!(root_name(&text), "stream:features");
        assert_eq!(used, buf.len());
    }

    #[test]
    fn incomplete_stanza_waits_for_more() {
        assert_eq!(next_frame("<iq type='result'><query>"), None);
        assert_eq!(next_frame("<iq type='result' id="), None);
    }

    #[test]
    fn self_closing_and_quoted_angle_brackets() {
        let (frame, _) = next_frame("<presence/><iq/>").unwrap();
        assert_eq!(frame, Frame::Stanza("<presence/>".into()));

        let text = r#"<iq a="x>y"><ctl td="Pos" p="1,2"/></iq>"#;
        let (frame, used) = next_frame(text).unwrap();
        assert_eq!(frame, Frame::Stanza(text.into()));
        assert_eq!(used, text.len());
    }

    #[test]
    fn whitespace_keepalive_is_skipped() {
        assert_eq!(next_frame("   "), None);
        let (frame, used) = next_frame("  </stream:stream>").unwrap();
        assert_eq!(frame, Frame::StreamClose);
        assert_eq!(used, 18);
    }

    #[tokio::test]
    async fn reader_reassembles_split_reads() {
        let (client, mut server) = tokio::io::duplex(64);
        let mut reader = FrameReader::new(client);

        tokio::spawn(async move {
            use tokio::io::AsyncWriteExt;
            server.write_all(b"<iq type='set'><query xmlns='com:ctl'>").await.unwrap();
            server.write_all(b"<ctl td='BatteryInfo'><battery power='080'/></ctl></query></iq>").await.unwrap();
        });

        let Frame::Stanza(text) = reader.next().await.unwrap() else {
            panic!("expected stanza");
        };
        assert!(text.ends_with("</iq>"));
        assert!(!reader.has_buffered());
    }

    #[tokio::test]
    async fn unterminated_stanza_is_cut_off() {
        let (client, mut server) = tokio::io::duplex(READ_CHUNK);
        let mut reader = FrameReader::new(client);

        let writer = tokio::spawn(async move {
            use tokio::io::AsyncWriteExt;
            let filler = vec![b'a'; READ_CHUNK];
            server.write_all(b"<iq type='set'><query>").await.unwrap();
            // runs until the reader side is dropped
            while server.write_all(&filler).await.is_ok() {}
        });

        let err = reader.next().await.unwrap_err();
        assert!(matches!(err, Error::FrameTooLarge { limit: MAX_FRAME_BYTES }));
        drop(reader);
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn large_stanza_under_the_cap_is_delivered() {
        let body = "x".repeat(MAX_FRAME_BYTES / 2);
        let stanza = format!("<iq><query>{body}</query></iq>");
        let mut reader = FrameReader::with_buffer(tokio::io::empty(), stanza.clone().into_bytes());

        assert_eq!(reader.next().await.unwrap(), Frame::Stanza(stanza));
    }
}
