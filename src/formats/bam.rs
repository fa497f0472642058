use super::bgzf::Layout;
use crate::index::{Index, IndexError};
use crate::storage::{DataFile, IndexFile, Storage};
use crate::types::Format;
use noodles::bam;
use tracing::debug;

pub struct BamIndexReader;

impl BamIndexReader {
    /// Build the index of a BAM file from its BAI or CSI.
    pub async fn load(
        storage: &dyn Storage,
        file: &DataFile,
        index_file: &IndexFile,
    ) -> Result<Index, IndexError> {
        let layout = Layout::read(storage, file, index_file).await?;

        let header_bytes = storage.read_range(file, layout.header).await?;
        let names = Self::reference_names(&header_bytes).await?;
        debug!(id = %file.id, references = names.len(), "read BAM header");

        Index::from_binning(
            Format::Bam,
            &layout.binning,
            &names,
            layout.header,
            layout.data_end,
            layout.footer,
        )
    }

    /// Reference sequence names from the compressed BAM header blocks.
    pub async fn reference_names(header_bytes: &[u8]) -> Result<Vec<String>, IndexError> {
        // bam::Reader::new wraps the input in a BGZF reader internally
        let mut reader = bam::r#async::io::Reader::new(header_bytes);
        let header = reader
            .read_header()
            .await
            .map_err(|e| IndexError::corrupt(format!("failed to read BAM header: {}", e)))?;

        Ok(header
            .reference_sequences()
            .keys()
            .map(|name| name.to_string())
            .collect())
    }
}
