//! Range planning: from a validated query and an index to the ordered byte
//! segments a client must fetch and concatenate.
//!
//! The plan is always `[header] [body ranges...] [footer]`, increasing and
//! non-overlapping, so concatenating the segments yields a well-formed file.
//! Body ranges longer than the block size are cut into contiguous pieces.

use crate::index::Index;
use crate::query::{Query, Region};
use crate::storage::ByteRange;
use crate::types::DataClass;
use crate::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Header,
    Body,
    Footer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub range: ByteRange,
    pub kind: SegmentKind,
}

impl Segment {
    fn new(range: ByteRange, kind: SegmentKind) -> Self {
        Self { range, kind }
    }

    /// Class hint for the ticket. The footer travels as body data.
    pub fn class(&self) -> DataClass {
        match self.kind {
            SegmentKind::Header => DataClass::Header,
            SegmentKind::Body | SegmentKind::Footer => DataClass::Body,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("reference sequence not found: {0}")]
    UnknownReference(String),
}

impl From<PlanError> for Error {
    fn from(err: PlanError) -> Self {
        match err {
            PlanError::UnknownReference(name) => Error::UnknownReference(name),
        }
    }
}

/// Largest byte range one ticket URL covers unless configured otherwise.
pub const DEFAULT_BLOCK_SIZE: u64 = 1 << 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanOptions {
    /// Body ranges separated by at most this many bytes are fetched as one.
    pub merge_gap: u64,
    /// Body ranges longer than this are split.
    pub block_size: u64,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            merge_gap: 0,
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

/// Plan the segments for `query`.
pub fn plan(query: &Query, index: &Index, options: PlanOptions) -> Result<Vec<Segment>, PlanError> {
    let mut segments = Vec::new();

    let header = index.header();
    if !header.is_empty() {
        segments.push(Segment::new(header, SegmentKind::Header));
    }
    if query.class == DataClass::Header {
        return Ok(segments);
    }

    let body = index.body();
    let mut ranges = Vec::new();
    if query.regions.is_empty() {
        ranges.push(body);
    } else {
        for region in &query.regions {
            ranges.extend(region_ranges(region, index)?);
        }
    }

    let ranges = ranges
        .into_iter()
        .filter_map(|r| clip(r, body))
        .collect();
    segments.extend(
        merge_ranges(ranges, options.merge_gap)
            .into_iter()
            .flat_map(|r| split_range(r, options.block_size))
            .map(|r| Segment::new(r, SegmentKind::Body)),
    );

    if let Some(footer) = index.footer() {
        segments.push(Segment::new(footer, SegmentKind::Footer));
    }

    debug!(
        format = %index.format(),
        regions = query.regions.len(),
        segments = segments.len(),
        "planned ranges"
    );
    Ok(segments)
}

fn region_ranges(region: &Region, index: &Index) -> Result<Vec<ByteRange>, PlanError> {
    if region.is_unplaced() {
        return Ok(index.unplaced().into_iter().collect());
    }
    if !index.contains_reference(&region.reference_name) {
        return Err(PlanError::UnknownReference(region.reference_name.clone()));
    }

    Ok(index
        .lookup(&region.reference_name, region.start.unwrap_or(0), region.end)
        .into_iter()
        .map(|e| e.byte_range())
        .collect())
}

fn clip(range: ByteRange, bounds: ByteRange) -> Option<ByteRange> {
    let start = range.start.max(bounds.start);
    let end = range.end.min(bounds.end);
    (start < end).then(|| ByteRange::new(start, end))
}

/// Sort and coalesce ranges that overlap or lie within `gap` bytes.
pub fn merge_ranges(mut ranges: Vec<ByteRange>, gap: u64) -> Vec<ByteRange> {
    ranges.sort_by_key(|r| r.start);

    let mut merged: Vec<ByteRange> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            Some(current) if range.start <= current.end.saturating_add(gap) => {
                current.end = current.end.max(range.end);
            }
            _ => merged.push(range),
        }
    }
    merged
}

/// Cut `range` into contiguous pieces of at most `block_size` bytes.
pub fn split_range(range: ByteRange, block_size: u64) -> Vec<ByteRange> {
    let block_size = block_size.max(1);
    let mut pieces = Vec::new();
    let mut start = range.start;
    while start < range.end {
        let end = start.saturating_add(block_size).min(range.end);
        pieces.push(ByteRange::new(start, end));
        start = end;
    }
    pieces
}
