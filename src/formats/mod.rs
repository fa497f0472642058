//! Format registry: turns a data file and its index into an [`Index`].
//!
//! Every supported format is BGZF-compressed and indexed with a binning
//! index, so the work splits in two. [`bgzf`] parses the index and finds the
//! header and footer byte ranges; the per-format readers supply the
//! reference names, which BAI and BCF-CSI leave to the data file header.
//!
//! # Supported Formats
//!
//! - [`BamIndexReader`] - BAM with `.bai` or `.csi`
//! - [`VcfIndexReader`] - bgzipped VCF with `.tbi` or `.csi`
//! - [`BcfIndexReader`] - BCF with `.csi`
//!
//! CRAM is recognised by the query layer but has no reader here.

mod bam;
mod bcf;
pub mod bgzf;
mod vcf;

pub use bam::BamIndexReader;
pub use bcf::BcfIndexReader;
pub use vcf::VcfIndexReader;

use crate::index::{Index, IndexError};
use crate::storage::{DataFile, IndexFile, Storage};
use crate::types::{Endpoint, Format};

/// Formats with a registered index reader.
pub const SUPPORTED: &[Format] = &[Format::Bam, Format::Vcf, Format::Bcf];

pub fn is_supported(format: Format) -> bool {
    SUPPORTED.contains(&format)
}

/// Supported formats an endpoint serves.
pub fn supported_for(endpoint: Endpoint) -> Vec<Format> {
    SUPPORTED
        .iter()
        .copied()
        .filter(|f| endpoint.accepts(*f))
        .collect()
}

/// Parse the index of `file` with the reader registered for its format.
pub async fn load_index(
    storage: &dyn Storage,
    file: &DataFile,
    index_file: &IndexFile,
) -> Result<Index, IndexError> {
    match file.format {
        Format::Bam => BamIndexReader::load(storage, file, index_file).await,
        Format::Vcf => VcfIndexReader::load(storage, file, index_file).await,
        Format::Bcf => BcfIndexReader::load(storage, file, index_file).await,
        Format::Cram => Err(IndexError::missing(format!(
            "no index reader for {}",
            file.format
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry() {
        assert!(is_supported(Format::Bam));
        assert!(is_supported(Format::Bcf));
        assert!(!is_supported(Format::Cram));
        assert_eq!(supported_for(Endpoint::Reads), vec![Format::Bam]);
        assert_eq!(supported_for(Endpoint::Variants), vec![Format::Vcf, Format::Bcf]);
    }
}
