use super::bgzf::Layout;
use crate::index::{Index, IndexError};
use crate::storage::{DataFile, IndexFile, Storage};
use crate::types::Format;
use noodles::{bgzf, vcf};

pub struct VcfIndexReader;

impl VcfIndexReader {
    /// Build the index of a bgzipped VCF from its TBI or CSI.
    pub async fn load(
        storage: &dyn Storage,
        file: &DataFile,
        index_file: &IndexFile,
    ) -> Result<Index, IndexError> {
        let layout = Layout::read(storage, file, index_file).await?;

        let names = match layout.binning.reference_names() {
            Some(names) => names,
            None => {
                let header_bytes = storage.read_range(file, layout.header).await?;
                Self::reference_names(&header_bytes).await?
            }
        };

        Index::from_binning(
            Format::Vcf,
            &layout.binning,
            &names,
            layout.header,
            layout.data_end,
            layout.footer,
        )
    }

    /// Contig names from the `##contig` lines of a compressed VCF header.
    pub async fn reference_names(header_bytes: &[u8]) -> Result<Vec<String>, IndexError> {
        let mut reader = vcf::r#async::io::Reader::new(bgzf::r#async::Reader::new(header_bytes));
        let header = reader
            .read_header()
            .await
            .map_err(|e| IndexError::corrupt(format!("failed to read VCF header: {}", e)))?;

        Ok(header.contigs().keys().cloned().collect())
    }
}
