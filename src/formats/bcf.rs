use super::bgzf::Layout;
use crate::index::{Index, IndexError};
use crate::storage::{DataFile, IndexFile, Storage};
use crate::types::Format;
use noodles::bcf;

pub struct BcfIndexReader;

impl BcfIndexReader {
    /// Build the index of a BCF file from its CSI.
    pub async fn load(
        storage: &dyn Storage,
        file: &DataFile,
        index_file: &IndexFile,
    ) -> Result<Index, IndexError> {
        let layout = Layout::read(storage, file, index_file).await?;

        // CSI for BCF carries no names; contig order in the header defines
        // the reference ids
        let names = match layout.binning.reference_names() {
            Some(names) => names,
            None => {
                let header_bytes = storage.read_range(file, layout.header).await?;
                Self::reference_names(&header_bytes).await?
            }
        };

        Index::from_binning(
            Format::Bcf,
            &layout.binning,
            &names,
            layout.header,
            layout.data_end,
            layout.footer,
        )
    }

    /// Contig names from the compressed BCF header blocks.
    pub async fn reference_names(header_bytes: &[u8]) -> Result<Vec<String>, IndexError> {
        // bcf::Reader::new wraps the input in a BGZF reader internally
        let mut reader = bcf::r#async::io::Reader::new(header_bytes);
        let header = reader
            .read_header()
            .await
            .map_err(|e| IndexError::corrupt(format!("failed to read BCF header: {}", e)))?;

        Ok(header.contigs().keys().cloned().collect())
    }
}
