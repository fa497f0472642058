//! BGZF layout shared by BAM, bgzipped VCF and BCF.

use crate::index::binning::{self, Binning};
use crate::index::IndexError;
use crate::storage::{ByteRange, DataFile, IndexFile, Storage};
use tracing::debug;

/// The empty block every BGZF file should end with.
pub const EOF_MARKER: [u8; 28] = [
    0x1f, 0x8b, 0x08, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff, 0x06, 0x00, 0x42, 0x43, 0x02, 0x00,
    0x1b, 0x00, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// Read and parse the index file.
pub async fn parse_index(
    storage: &dyn Storage,
    index_file: &IndexFile,
) -> Result<Binning, IndexError> {
    let raw = storage.read_index(index_file).await?;
    binning::read(index_file.kind, &raw).await.map_err(|e| {
        IndexError::corrupt(format!("{}: {}", index_file.path.display(), e.message))
    })
}

/// Header bytes: everything before the first indexed record. A file with no
/// indexed records is all header.
pub fn header_bounds(index: &Binning, data_end: u64) -> ByteRange {
    let end = match index.first_record() {
        Some(first) => index.block_boundaries(data_end).end_of(first),
        None => data_end,
    };
    ByteRange::new(0, end.min(data_end))
}

/// The trailing EOF marker block, if the file has one.
pub async fn footer_bounds(
    storage: &dyn Storage,
    file: &DataFile,
) -> Result<Option<ByteRange>, IndexError> {
    let marker_len = EOF_MARKER.len() as u64;
    if file.size < marker_len {
        return Ok(None);
    }

    let range = ByteRange::new(file.size - marker_len, file.size);
    let tail = storage.read_range(file, range).await?;
    if tail[..] == EOF_MARKER {
        Ok(Some(range))
    } else {
        debug!(id = %file.id, "no BGZF EOF marker");
        Ok(None)
    }
}

/// Layout pieces every BGZF reader computes before naming references.
pub struct Layout {
    pub binning: Binning,
    pub header: ByteRange,
    pub footer: Option<ByteRange>,
    pub data_end: u64,
}

impl Layout {
    pub async fn read(
        storage: &dyn Storage,
        file: &DataFile,
        index_file: &IndexFile,
    ) -> Result<Self, IndexError> {
        let binning = parse_index(storage, index_file).await?;
        let footer = footer_bounds(storage, file).await?;
        let data_end = footer.map_or(file.size, |f| f.start);
        let header = header_bounds(&binning, data_end);

        Ok(Self {
            binning,
            header,
            footer,
            data_end,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use noodles::bgzf::VirtualPosition;
    use noodles::csi::binning_index;
    use noodles::csi::binning_index::index::reference_sequence::bin::Chunk;
    use noodles::csi::binning_index::index::reference_sequence::index::LinearIndex;
    use noodles::csi::binning_index::index::reference_sequence::Bin;
    use noodles::csi::binning_index::index::ReferenceSequence;

    fn vp(compressed: u64, uncompressed: u16) -> VirtualPosition {
        VirtualPosition::try_from((compressed, uncompressed)).unwrap()
    }

    fn index_with_first(first: VirtualPosition) -> Binning {
        let bins = [(4681, Bin::new(vec![Chunk::new(first, vp(900, 0))]))]
            .into_iter()
            .collect();
        binning_index::Index::<LinearIndex>::builder()
            .set_reference_sequences(vec![ReferenceSequence::new(bins, Vec::new(), None)])
            .build()
            .into()
    }

    #[test]
    fn test_header_ends_at_first_block() {
        let index = index_with_first(vp(500, 0));
        assert_eq!(header_bounds(&index, 1000), ByteRange::new(0, 500));
    }

    #[test]
    fn test_header_sharing_block_extends_to_next() {
        let index = index_with_first(vp(500, 64));
        assert_eq!(header_bounds(&index, 1000), ByteRange::new(0, 900));
    }

    #[test]
    fn test_header_without_records_is_whole_data() {
        let index = Binning::from(binning_index::Index::<LinearIndex>::default());
        assert_eq!(header_bounds(&index, 1000), ByteRange::new(0, 1000));
    }

    #[test]
    fn test_eof_marker_matches_bgzf_writer() {
        let written = noodles::bgzf::Writer::new(Vec::new()).finish().unwrap();
        assert_eq!(written, EOF_MARKER);
    }
}
