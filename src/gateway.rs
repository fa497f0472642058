//! Byte-serving gateway behind the `/data/` route.
//!
//! Streams a data file, or one range of it, with bounded memory. A reader is
//! opened per request and released when the body stream is dropped, whether
//! the transfer finished or the client went away.

use crate::storage::{ByteRange, DataFile, DataReader, Storage};
use crate::{Error, Result};
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use std::io::{self, SeekFrom};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::debug;

/// Largest chunk read from disk per stream item.
const CHUNK_SIZE: usize = 64 * 1024;

/// A single-range `Range` request header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpRange {
    /// `bytes=first-last`, both inclusive
    Bounded { first: u64, last: u64 },
    /// `bytes=first-`
    From(u64),
    /// `bytes=-n`: the last `n` bytes
    Suffix(u64),
}

impl HttpRange {
    /// Parse a `Range` header value. Anything other than a single well-formed
    /// byte range yields `None`, and the caller serves the whole file.
    pub fn parse(value: &str) -> Option<Self> {
        let range_set = value.trim().strip_prefix("bytes=")?.trim();
        if range_set.contains(',') {
            return None;
        }

        let (first, last) = range_set.split_once('-')?;
        let (first, last) = (first.trim(), last.trim());
        match (first.is_empty(), last.is_empty()) {
            (false, false) => {
                let first = first.parse().ok()?;
                let last = last.parse().ok()?;
                (first <= last).then_some(HttpRange::Bounded { first, last })
            }
            (false, true) => first.parse().ok().map(HttpRange::From),
            (true, false) => last.parse().ok().map(HttpRange::Suffix),
            (true, true) => None,
        }
    }

    /// Resolve against the current file size.
    pub fn resolve(self, size: u64) -> Result<ByteRange> {
        let unsatisfiable = |start: u64, end: u64| Error::RangeUnsatisfiable { start, end, size };

        match self {
            HttpRange::Bounded { first, last } => {
                let end = last.saturating_add(1);
                if end > size {
                    return Err(unsatisfiable(first, end));
                }
                Ok(ByteRange::new(first, end))
            }
            HttpRange::From(first) => {
                if first >= size {
                    return Err(unsatisfiable(first, size));
                }
                Ok(ByteRange::new(first, size))
            }
            HttpRange::Suffix(len) => {
                if len == 0 || size == 0 {
                    return Err(unsatisfiable(size, size));
                }
                Ok(ByteRange::new(size - len.min(size), size))
            }
        }
    }
}

impl From<ByteRange> for HttpRange {
    fn from(range: ByteRange) -> Self {
        HttpRange::Bounded {
            first: range.start,
            last: range.end.saturating_sub(1),
        }
    }
}

/// An open, positioned transfer.
pub struct Transfer {
    /// File size when the transfer was opened.
    pub total: u64,
    pub range: ByteRange,
    /// True when a range was requested (206), false for the whole file (200).
    pub partial: bool,
    pub body: BoxStream<'static, io::Result<Bytes>>,
}

/// Open `file` and position it for `range`, or for the whole file.
pub async fn serve(
    storage: &dyn Storage,
    file: &DataFile,
    range: Option<HttpRange>,
) -> Result<Transfer> {
    let mut source = storage.open_data(file).await?;
    let total = source.size;

    let (range, partial) = match range {
        Some(range) => (range.resolve(total)?, true),
        None => (ByteRange::new(0, total), false),
    };

    source.reader.seek(SeekFrom::Start(range.start)).await?;
    debug!(id = %file.id, start = range.start, end = range.end, total, "serving bytes");

    Ok(Transfer {
        total,
        range,
        partial,
        body: exact_stream(source.reader, range.len()),
    })
}

/// Stream exactly `len` bytes. A file that shrinks underneath the reader
/// ends the stream with an error instead of a silently short body.
fn exact_stream(reader: Box<dyn DataReader>, len: u64) -> BoxStream<'static, io::Result<Bytes>> {
    stream::try_unfold((reader, len), |(mut reader, remaining)| async move {
        if remaining == 0 {
            return Ok(None);
        }

        let want = remaining.min(CHUNK_SIZE as u64) as usize;
        let mut buf = vec![0u8; want];
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("file ended with {} bytes still to send", remaining),
            ));
        }
        buf.truncate(n);

        Ok(Some((Bytes::from(buf), (reader, remaining - n as u64))))
    })
    .boxed()
}
