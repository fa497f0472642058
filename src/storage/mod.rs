//! Storage backend abstraction for genomic data files.
//!
//! The ticket engine never touches the filesystem directly. It asks a
//! [`Storage`] to locate a data file and its companion index, to read the
//! index bytes, and to open the data file as a seekable byte source. Swapping
//! the local directory for object storage means implementing this trait.
//!
//! # Implementations
//!
//! - [`LocalStorage`] - Local filesystem storage
//!
//! # Example
//!
//! ```no_run
//! use htsget_slice::storage::{Storage, LocalStorage};
//! use htsget_slice::types::Format;
//! use std::path::PathBuf;
//!
//! # async fn run() -> htsget_slice::Result<()> {
//! let storage = LocalStorage::new(PathBuf::from("./data"));
//! let file = storage.locate("sample", Format::Bam).await?;
//! println!("{} bytes, index: {:?}", file.size, file.index);
//! # Ok(())
//! # }
//! ```

mod local;

pub use local::LocalStorage;

use crate::types::{Format, IndexKind};
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::PathBuf;
use std::time::SystemTime;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};

/// Byte range within a file, end exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// A located data file and, if present, its companion index.
#[derive(Debug, Clone)]
pub struct DataFile {
    pub id: String,
    pub format: Format,
    pub path: PathBuf,
    pub size: u64,
    pub modified: Option<SystemTime>,
    pub index: Option<IndexFile>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexFile {
    pub path: PathBuf,
    pub kind: IndexKind,
    pub modified: Option<SystemTime>,
}

/// Seekable async byte source.
pub trait DataReader: AsyncRead + AsyncSeek + Send + Unpin {}

impl<T> DataReader for T where T: AsyncRead + AsyncSeek + Send + Unpin {}

/// An opened data file. `size` is the length at open time, which may differ
/// from the size recorded when the file was located.
pub struct DataSource {
    pub size: u64,
    pub reader: Box<dyn DataReader>,
}

/// Storage backend trait for accessing genomic data files
#[async_trait]
pub trait Storage: Send + Sync {
    /// Locate a data file and its index. Missing data files are `NotFound`.
    async fn locate(&self, id: &str, format: Format) -> Result<DataFile>;

    /// Read the whole index file.
    async fn read_index(&self, index: &IndexFile) -> Result<Bytes>;

    /// Open the data file for seeking and reading.
    async fn open_data(&self, file: &DataFile) -> Result<DataSource>;

    /// Read a bounded byte range of the data file into memory.
    async fn read_range(&self, file: &DataFile, range: ByteRange) -> Result<Bytes> {
        let mut source = self.open_data(file).await?;
        if range.end > source.size || range.start > range.end {
            return Err(Error::RangeUnsatisfiable {
                start: range.start,
                end: range.end,
                size: source.size,
            });
        }

        source
            .reader
            .seek(std::io::SeekFrom::Start(range.start))
            .await?;
        let mut buf = vec![0u8; range.len() as usize];
        source.reader.read_exact(&mut buf).await?;
        Ok(Bytes::from(buf))
    }
}
