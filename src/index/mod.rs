//! Parsed genomic indexes and the shared index cache.
//!
//! An [`Index`] answers "which byte ranges of the data file may hold records
//! overlapping this region" and knows where the header and footer live.
//! [`IndexProvider`] hands out shared, cached indexes built by the format
//! registry in [`crate::formats`].

pub mod binning;
mod cache;

pub use cache::{CacheKey, IndexCache};

use crate::formats;
use crate::storage::{ByteRange, DataFile, Storage};
use crate::types::Format;
use crate::Error;
use binning::{Binning, MinOffsets};
use noodles::bgzf::VirtualPosition;
use noodles::core::Position;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexErrorKind {
    Missing,
    Corrupt,
}

/// Failure to obtain an index. Cloneable so a cached failure can be handed
/// to every request that hits it.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct IndexError {
    pub kind: IndexErrorKind,
    pub message: String,
}

impl IndexError {
    pub fn missing(message: impl Into<String>) -> Self {
        Self {
            kind: IndexErrorKind::Missing,
            message: message.into(),
        }
    }

    pub fn corrupt(message: impl Into<String>) -> Self {
        Self {
            kind: IndexErrorKind::Corrupt,
            message: message.into(),
        }
    }
}

impl From<Error> for IndexError {
    fn from(err: Error) -> Self {
        match err {
            Error::NotFound(message) => IndexError::missing(message),
            other => IndexError::corrupt(other.to_string()),
        }
    }
}

impl From<IndexError> for Error {
    fn from(err: IndexError) -> Self {
        match err.kind {
            IndexErrorKind::Missing => Error::NotFound(format!("index: {}", err.message)),
            IndexErrorKind::Corrupt => Error::IndexCorrupt(err.message),
        }
    }
}

/// One indexed chunk: a byte range of the data file that may hold records
/// overlapping `[ref_start, ref_end)` on `reference_name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub reference_name: Arc<str>,
    pub ref_start: u64,
    pub ref_end: u64,
    pub file_offset_start: u64,
    pub file_offset_end: u64,
    /// Virtual end of the chunk, compared against the minimum offsets.
    virtual_end: VirtualPosition,
}

impl IndexEntry {
    pub fn new(
        reference_name: impl Into<Arc<str>>,
        ref_start: u64,
        ref_end: u64,
        file_offset_start: u64,
        file_offset_end: u64,
    ) -> Self {
        Self {
            reference_name: reference_name.into(),
            ref_start,
            ref_end,
            file_offset_start,
            file_offset_end,
            virtual_end: VirtualPosition::new(file_offset_end, 0).unwrap_or(VirtualPosition::MAX),
        }
    }

    pub fn byte_range(&self) -> ByteRange {
        ByteRange::new(self.file_offset_start, self.file_offset_end)
    }

    fn overlaps(&self, start: u64, end: u64) -> bool {
        start < end && self.ref_start < end && start < self.ref_end
    }
}

/// Entries for one reference sequence, ordered by
/// `(ref_start, file_offset_start)`.
#[derive(Debug, Clone)]
pub struct ReferenceIndex {
    name: Arc<str>,
    entries: Vec<IndexEntry>,
    min_offsets: Option<MinOffsets>,
    min_shift: u8,
    depth: u8,
}

impl ReferenceIndex {
    pub fn new(name: impl Into<Arc<str>>, mut entries: Vec<IndexEntry>) -> Self {
        entries.sort_by_key(|e| (e.ref_start, e.file_offset_start));
        Self {
            name: name.into(),
            entries,
            min_offsets: None,
            min_shift: 14,
            depth: 5,
        }
    }

    /// Skip chunks that end before the lowest offset a record overlapping
    /// the query start can have.
    pub fn with_min_offsets(mut self, min_offsets: MinOffsets, min_shift: u8, depth: u8) -> Self {
        self.min_offsets = Some(min_offsets);
        self.min_shift = min_shift;
        self.depth = depth;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    fn lookup(&self, start: u64, end: u64) -> Vec<&IndexEntry> {
        if start >= end {
            return Vec::new();
        }
        let min_offset = self.min_offset(start);
        self.entries
            .iter()
            .filter(|e| e.overlaps(start, end))
            .filter(|e| min_offset.is_none_or(|min| e.virtual_end > min))
            .collect()
    }

    /// Lowest virtual offset any record overlapping 0-based `start` can
    /// have. `None` past the addressable range of the binning scheme.
    fn min_offset(&self, start: u64) -> Option<VirtualPosition> {
        let min_offsets = self.min_offsets.as_ref()?;
        let max_position = 1u64 << (u32::from(self.min_shift) + 3 * u32::from(self.depth));
        if start >= max_position - 1 {
            return None;
        }
        let position = usize::try_from(start + 1)
            .ok()
            .and_then(|p| Position::try_from(p).ok())?;
        Some(min_offsets.min_offset(self.min_shift, self.depth, position))
    }
}

/// Parsed index of one data file.
#[derive(Debug, Clone)]
pub struct Index {
    format: Format,
    header: ByteRange,
    footer: Option<ByteRange>,
    data_end: u64,
    references: HashMap<String, ReferenceIndex>,
    unplaced: Option<ByteRange>,
}

impl Index {
    /// `data_end` is where record data stops: the footer start, or the file
    /// size when there is no footer.
    pub fn new(
        format: Format,
        header: ByteRange,
        data_end: u64,
        footer: Option<ByteRange>,
        references: Vec<ReferenceIndex>,
    ) -> Self {
        let references = references
            .into_iter()
            .map(|r| (r.name.to_string(), r))
            .collect();
        Self {
            format,
            header,
            footer,
            data_end,
            references,
            unplaced: None,
        }
    }

    pub fn with_unplaced(mut self, unplaced: Option<ByteRange>) -> Self {
        self.unplaced = unplaced.filter(|r| !r.is_empty());
        self
    }

    /// Build from a parsed binning index. `names[i]` names the index's i-th
    /// reference; names past the index's reference count get no entries.
    pub fn from_binning(
        format: Format,
        binning: &Binning,
        names: &[String],
        header: ByteRange,
        data_end: u64,
        footer: Option<ByteRange>,
    ) -> Result<Self, IndexError> {
        if binning.reference_count() > names.len() {
            return Err(IndexError::corrupt(format!(
                "index has {} references but only {} are named",
                binning.reference_count(),
                names.len()
            )));
        }

        let boundaries = binning.block_boundaries(data_end);
        let mut references = Vec::with_capacity(names.len());

        for (i, name) in names.iter().enumerate() {
            let name: Arc<str> = Arc::from(name.as_str());
            let Some(min_offsets) = binning.min_offsets(i) else {
                references.push(ReferenceIndex::new(name, Vec::new()));
                continue;
            };

            let mut entries = Vec::new();
            for (id, bin) in binning.bins(i) {
                let Some((ref_start, ref_end)) = binning.bin_span(id) else {
                    continue;
                };
                for chunk in bin.chunks() {
                    entries.push(IndexEntry {
                        reference_name: name.clone(),
                        ref_start,
                        ref_end,
                        file_offset_start: chunk.start().compressed(),
                        file_offset_end: boundaries.end_of(chunk.end()),
                        virtual_end: chunk.end(),
                    });
                }
            }

            references.push(ReferenceIndex::new(name, entries).with_min_offsets(
                min_offsets,
                binning.min_shift(),
                binning.depth(),
            ));
        }

        // Unplaced records follow the last mapped one, possibly in the same
        // block, so the range starts at that block rather than past it.
        let unplaced = match binning.unplaced_unmapped() {
            Some(n) if n > 0 => {
                let start = binning
                    .last_record_end()
                    .map_or(header.end, |v| v.compressed())
                    .clamp(header.end.min(data_end), data_end);
                Some(ByteRange::new(start, data_end))
            }
            _ => None,
        };

        Ok(Self::new(format, header, data_end, footer, references).with_unplaced(unplaced))
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn header(&self) -> ByteRange {
        self.header
    }

    pub fn footer(&self) -> Option<ByteRange> {
        self.footer
    }

    pub fn data_end(&self) -> u64 {
        self.data_end
    }

    /// Everything between the header and the footer.
    pub fn body(&self) -> ByteRange {
        ByteRange::new(self.header.end.min(self.data_end), self.data_end)
    }

    /// Records with no reference (`*`), if the index says there are any.
    pub fn unplaced(&self) -> Option<ByteRange> {
        self.unplaced
    }

    pub fn contains_reference(&self, name: &str) -> bool {
        self.references.contains_key(name)
    }

    pub fn reference(&self, name: &str) -> Option<&ReferenceIndex> {
        self.references.get(name)
    }

    pub fn reference_names(&self) -> impl Iterator<Item = &str> {
        self.references.keys().map(String::as_str)
    }

    /// Entries overlapping `[start, end)` on `reference_name`, in
    /// `(ref_start, file_offset_start)` order. An absent `end` means the end
    /// of the reference. Unknown or empty names yield nothing.
    pub fn lookup(&self, reference_name: &str, start: u64, end: Option<u64>) -> Vec<&IndexEntry> {
        if reference_name.is_empty() {
            return Vec::new();
        }
        match self.references.get(reference_name) {
            Some(reference) => reference.lookup(start, end.unwrap_or(u64::MAX)),
            None => Vec::new(),
        }
    }
}

/// Hands out shared indexes, building each at most once per file version.
pub struct IndexProvider {
    storage: Arc<dyn Storage>,
    cache: IndexCache,
}

impl IndexProvider {
    pub fn new(storage: Arc<dyn Storage>, cache: IndexCache) -> Self {
        Self { storage, cache }
    }

    pub fn cache(&self) -> &IndexCache {
        &self.cache
    }

    pub async fn get_index(&self, file: &DataFile) -> Result<Arc<Index>, IndexError> {
        let Some(index_file) = &file.index else {
            return Err(IndexError::missing(format!("no index found for {}", file.id)));
        };

        let key = CacheKey::new(file, index_file);
        self.cache
            .get_or_build(key, || {
                formats::load_index(self.storage.as_ref(), file, index_file)
            })
            .await
    }
}
