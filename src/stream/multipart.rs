//! `multipart/x-mixed-replace` encoding.
//!
//! The byte layout matches Go's `mime/multipart` writer so existing
//! clients see identical streams: the first part opens with `--frame`,
//! later parts with `\r\n--frame`, and part headers are written in sorted
//! order.

use std::io;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Boundary token separating parts.
pub const BOUNDARY: &str = "frame";

/// `Content-Type` of the stream response.
pub const STREAM_CONTENT_TYPE: &str = "multipart/x-mixed-replace;boundary=frame";

/// `Content-Type` of every part.
pub const PART_CONTENT_TYPE: &str = "image/jpeg";

/// Writes multipart parts to an async byte sink.
#[derive(Debug)]
pub struct MultipartWriter<W> {
    inner: W,
    parts: u64,
}

impl<W: AsyncWrite + Unpin> MultipartWriter<W> {
    /// Wraps `inner`; nothing is written until the first part.
    pub fn new(inner: W) -> Self {
        Self { inner, parts: 0 }
    }

    /// Writes one part and flushes it to the client.
    pub async fn write_part(&mut self, content_type: &str, body: &[u8]) -> io::Result<()> {
        let header = part_header(self.parts == 0, content_type, body.len());
        self.inner.write_all(header.as_bytes()).await?;
        self.inner.write_all(body).await?;
        self.inner.flush().await?;
        self.parts += 1;
        Ok(())
    }

    /// Writes the closing delimiter.
    pub async fn finish(&mut self) -> io::Result<()> {
        self.inner
            .write_all(format!("\r\n--{BOUNDARY}--\r\n").as_bytes())
            .await?;
        self.inner.flush().await
    }

    /// Number of parts fully written.
    pub fn parts_written(&self) -> u64 {
        self.parts
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Delimiter and headers preceding a part body.
pub fn part_header(first: bool, content_type: &str, len: usize) -> String {
    let lead = if first { "" } else { "\r\n" };
    format!(
        "{lead}--{BOUNDARY}\r\nContent-Length: {len}\r\nContent-Type: {content_type}\r\n\r\n"
    )
}
