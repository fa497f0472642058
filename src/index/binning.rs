//! Binning indexes (BAI, TBI, CSI) read through noodles.
//!
//! All three formats share the UCSC binning scheme: each reference sequence
//! owns a set of bins, each bin a list of chunks, and each chunk a pair of
//! BGZF virtual positions. BAI and TBI fix `min_shift = 14` and `depth = 5`
//! and carry a 16 kbp linear index; CSI stores both parameters in its header
//! and replaces the linear index with a per-bin `loffset`.
//!
//! Reference names travel in the tabix header (TBI, and the CSI aux block
//! for tabix-style CSI); BAI and BAM CSI files leave them to the data file
//! header.

use super::IndexError;
use crate::types::IndexKind;
use noodles::bam::bai;
use noodles::bgzf::{self, VirtualPosition};
use noodles::core::Position;
use noodles::csi::binning_index::index::reference_sequence::Index as _;
use noodles::csi::binning_index::index::reference_sequence::index::{BinnedIndex, LinearIndex};
use noodles::csi::binning_index::index::reference_sequence::Bin;
use noodles::csi::binning_index::index::reference_sequence::bin::Chunk;
use noodles::csi::binning_index::BinningIndex as _;
use noodles::csi::{self, binning_index};
use noodles::tabix;
use std::collections::BTreeSet;
use std::io;
use tokio::io::AsyncReadExt;

const CSI_MAGIC: &[u8; 4] = b"CSI\x01";

/// Deepest CSI tree noodles can represent.
const MAX_DEPTH: i32 = 10;

/// Upper bound on `min_shift + 3 * depth` so bin spans fit in a u64.
const MAX_SPAN_BITS: i32 = 62;

/// Per-reference offsets used to skip chunks that end before any record
/// overlapping a query start: the 16 kbp linear index of BAI/TBI, or the
/// per-bin `loffset` of CSI.
#[derive(Debug, Clone)]
pub enum MinOffsets {
    Linear(LinearIndex),
    Binned(BinnedIndex),
}

impl MinOffsets {
    /// Lowest virtual position a record overlapping 1-based `start` can have.
    pub fn min_offset(&self, min_shift: u8, depth: u8, start: Position) -> VirtualPosition {
        match self {
            MinOffsets::Linear(index) => index.min_offset(min_shift, depth, start),
            MinOffsets::Binned(index) => index.min_offset(min_shift, depth, start),
        }
    }

    fn positions(&self) -> Box<dyn Iterator<Item = VirtualPosition> + '_> {
        match self {
            MinOffsets::Linear(index) => Box::new(index.iter().copied()),
            MinOffsets::Binned(index) => Box::new(index.values().copied()),
        }
    }
}

impl From<LinearIndex> for MinOffsets {
    fn from(index: LinearIndex) -> Self {
        MinOffsets::Linear(index)
    }
}

impl From<BinnedIndex> for MinOffsets {
    fn from(index: BinnedIndex) -> Self {
        MinOffsets::Binned(index)
    }
}

/// A parsed binning index of either flavour.
#[derive(Debug, Clone)]
pub enum Binning {
    /// BAI or TBI.
    Linear(binning_index::Index<LinearIndex>),
    /// CSI.
    Binned(csi::Index),
}

impl From<binning_index::Index<LinearIndex>> for Binning {
    fn from(index: binning_index::Index<LinearIndex>) -> Self {
        Binning::Linear(index)
    }
}

impl From<csi::Index> for Binning {
    fn from(index: csi::Index) -> Self {
        Binning::Binned(index)
    }
}

impl Binning {
    fn as_dyn(&self) -> &dyn csi::BinningIndex {
        match self {
            Binning::Linear(index) => index,
            Binning::Binned(index) => index,
        }
    }

    pub fn min_shift(&self) -> u8 {
        self.as_dyn().min_shift()
    }

    pub fn depth(&self) -> u8 {
        self.as_dyn().depth()
    }

    pub fn reference_count(&self) -> usize {
        match self {
            Binning::Linear(index) => index.reference_sequences().len(),
            Binning::Binned(index) => index.reference_sequences().len(),
        }
    }

    /// Names from the tabix header, when the index carries one.
    pub fn reference_names(&self) -> Option<Vec<String>> {
        self.as_dyn()
            .header()
            .map(|header| header.reference_sequence_names().iter().cloned().collect())
    }

    pub fn unplaced_unmapped(&self) -> Option<u64> {
        self.as_dyn().unplaced_unmapped_record_count()
    }

    /// Real bins of the i-th reference with their ids.
    pub fn bins(&self, reference: usize) -> Vec<(usize, &Bin)> {
        let total_bins = self.total_bins();
        let bins = match self {
            Binning::Linear(index) => index.reference_sequences().get(reference).map(|r| r.bins()),
            Binning::Binned(index) => index.reference_sequences().get(reference).map(|r| r.bins()),
        };
        bins.into_iter()
            .flatten()
            .filter(|(id, _)| **id < total_bins)
            .map(|(id, bin)| (*id, bin))
            .collect()
    }

    pub fn min_offsets(&self, reference: usize) -> Option<MinOffsets> {
        match self {
            Binning::Linear(index) => index
                .reference_sequences()
                .get(reference)
                .map(|r| MinOffsets::from(r.index().clone())),
            Binning::Binned(index) => index
                .reference_sequences()
                .get(reference)
                .map(|r| MinOffsets::from(r.index().clone())),
        }
    }

    /// Number of real bins; ids at or above this are pseudo-bins.
    pub fn total_bins(&self) -> usize {
        total_bins(self.depth())
    }

    /// Genomic span `[start, end)` covered by a bin, `None` for pseudo-bins.
    pub fn bin_span(&self, bin: usize) -> Option<(u64, u64)> {
        bin_span(self.min_shift(), self.depth(), bin)
    }

    /// Chunks of real bins across all references.
    pub fn chunks(&self) -> Vec<Chunk> {
        (0..self.reference_count())
            .flat_map(|i| self.bins(i))
            .flat_map(|(_, bin)| bin.chunks().iter().copied())
            .collect()
    }

    /// Virtual position of the first indexed record.
    pub fn first_record(&self) -> Option<VirtualPosition> {
        self.chunks().iter().map(|c| c.start()).min()
    }

    /// Virtual position just past the last mapped record.
    pub fn last_record_end(&self) -> Option<VirtualPosition> {
        self.chunks().iter().map(|c| c.end()).max()
    }

    /// Every block start the index knows about, plus `data_end`.
    pub fn block_boundaries(&self, data_end: u64) -> BlockBoundaries {
        let mut starts: BTreeSet<u64> = BTreeSet::new();
        for chunk in self.chunks() {
            starts.insert(chunk.start().compressed());
            starts.insert(chunk.end().compressed());
        }
        for offsets in (0..self.reference_count()).filter_map(|i| self.min_offsets(i)) {
            starts.extend(offsets.positions().map(|v| v.compressed()));
        }
        starts.retain(|&s| s < data_end);
        starts.insert(data_end);
        BlockBoundaries { starts, data_end }
    }
}

fn total_bins(depth: u8) -> usize {
    ((1usize << (3 * (usize::from(depth) + 1))) - 1) / 7
}

fn bin_span(min_shift: u8, depth: u8, bin: usize) -> Option<(u64, u64)> {
    if bin >= total_bins(depth) {
        return None;
    }
    let bin = bin as u64;
    let (min_shift, depth) = (u64::from(min_shift), u64::from(depth));

    for level in (0..=depth).rev() {
        let offset = ((1u64 << (3 * level)) - 1) / 7;
        if bin >= offset {
            let size = 1u64 << (min_shift + 3 * (depth - level));
            let position = bin - offset;
            return Some((position * size, (position + 1) * size));
        }
    }
    None
}

/// Sorted set of known BGZF block starts.
#[derive(Debug, Clone)]
pub struct BlockBoundaries {
    starts: BTreeSet<u64>,
    data_end: u64,
}

impl BlockBoundaries {
    /// Exclusive byte offset that covers every byte up to `position`.
    ///
    /// A position at the start of a block needs nothing from that block.
    /// Otherwise the whole block is needed, and the next known boundary is
    /// at or past its end.
    pub fn end_of(&self, position: VirtualPosition) -> u64 {
        let compressed = position.compressed();
        if position.uncompressed() == 0 {
            return compressed.min(self.data_end);
        }
        self.starts
            .range(compressed.saturating_add(1)..)
            .next()
            .copied()
            .unwrap_or(self.data_end)
    }
}

/// Parse an index file as stored: raw BAI, or BGZF-compressed TBI and CSI.
pub async fn read(kind: IndexKind, bytes: &[u8]) -> Result<Binning, IndexError> {
    let result = match kind {
        IndexKind::Bai => bai::r#async::io::Reader::new(bytes)
            .read_index()
            .await
            .map(Binning::from),
        IndexKind::Tbi => tabix::r#async::io::Reader::new(bytes)
            .read_index()
            .await
            .map(Binning::from),
        IndexKind::Csi => match check_csi_geometry(bytes).await {
            Ok(()) => csi::r#async::io::Reader::new(bytes)
                .read_index()
                .await
                .map(Binning::from),
            Err(e) => Err(e),
        },
        IndexKind::Crai => {
            return Err(IndexError::corrupt("CRAI is not a binning index"));
        }
    };

    result.map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => IndexError::corrupt(format!("truncated {:?} index", kind)),
        _ => IndexError::corrupt(format!("invalid {:?} index: {}", kind, e)),
    })
}

/// Reject CSI trees too deep or too wide for the binning arithmetic before
/// handing the bytes to the reader.
async fn check_csi_geometry(bytes: &[u8]) -> io::Result<()> {
    let mut reader = bgzf::r#async::Reader::new(bytes);

    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic).await?;
    if &magic != CSI_MAGIC {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "invalid CSI header"));
    }

    let min_shift = reader.read_i32_le().await?;
    let depth = reader.read_i32_le().await?;
    if min_shift < 1 || !(0..=MAX_DEPTH).contains(&depth) || min_shift + 3 * depth > MAX_SPAN_BITS {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unsupported binning parameters min_shift={min_shift} depth={depth}"),
        ));
    }
    Ok(())
}
