use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// htsget 1.3 ticket response
#[derive(Debug, Serialize)]
pub struct HtsgetResponse {
    pub htsget: HtsgetResponseBody,
}

#[derive(Debug, Serialize)]
pub struct HtsgetResponseBody {
    pub format: Format,
    pub urls: Vec<UrlEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub md5: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UrlEntry {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<DataClass>,
}

/// Data formats known to htsget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Format {
    #[default]
    Bam,
    Cram,
    Vcf,
    Bcf,
}

impl Format {
    pub fn content_type(&self) -> &'static str {
        match self {
            Format::Bam => "application/vnd.ga4gh.bam",
            Format::Cram => "application/vnd.ga4gh.cram",
            Format::Vcf => "application/vnd.ga4gh.vcf",
            Format::Bcf => "application/vnd.ga4gh.bcf",
        }
    }

    pub fn is_reads(&self) -> bool {
        matches!(self, Format::Bam | Format::Cram)
    }

    pub fn is_variants(&self) -> bool {
        matches!(self, Format::Vcf | Format::Bcf)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Bam => "BAM",
            Format::Cram => "CRAM",
            Format::Vcf => "VCF",
            Format::Bcf => "BCF",
        }
    }

    /// File extension of the data file.
    pub fn extension(&self) -> &'static str {
        match self {
            Format::Bam => "bam",
            Format::Cram => "cram",
            Format::Vcf => "vcf.gz",
            Format::Bcf => "bcf",
        }
    }

    /// Companion index kinds, in lookup order.
    pub fn index_kinds(&self) -> &'static [IndexKind] {
        match self {
            Format::Bam => &[IndexKind::Bai, IndexKind::Csi],
            Format::Cram => &[IndexKind::Crai],
            Format::Vcf => &[IndexKind::Tbi, IndexKind::Csi],
            Format::Bcf => &[IndexKind::Csi],
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string names no known format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownFormat(pub String);

impl FromStr for Format {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BAM" => Ok(Format::Bam),
            "CRAM" => Ok(Format::Cram),
            "VCF" => Ok(Format::Vcf),
            "BCF" => Ok(Format::Bcf),
            _ => Err(UnknownFormat(s.to_string())),
        }
    }
}

/// On-disk index flavours
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexKind {
    Bai,
    Tbi,
    Csi,
    Crai,
}

impl IndexKind {
    pub fn extension(&self) -> &'static str {
        match self {
            IndexKind::Bai => "bai",
            IndexKind::Tbi => "tbi",
            IndexKind::Csi => "csi",
            IndexKind::Crai => "crai",
        }
    }
}

/// Data class - header only or full data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DataClass {
    #[default]
    Body,
    Header,
}

/// The two htsget ticket endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Reads,
    Variants,
}

impl Endpoint {
    pub fn default_format(&self) -> Format {
        match self {
            Endpoint::Reads => Format::Bam,
            Endpoint::Variants => Format::Vcf,
        }
    }

    pub fn accepts(&self, format: Format) -> bool {
        match self {
            Endpoint::Reads => format.is_reads(),
            Endpoint::Variants => format.is_variants(),
        }
    }

    pub fn datatype(&self) -> &'static str {
        match self {
            Endpoint::Reads => "reads",
            Endpoint::Variants => "variants",
        }
    }
}

/// Raw query parameters for GET ticket requests.
///
/// Everything stays a string until the validator has looked at it, so a
/// malformed integer is reported through the htsget error envelope.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct TicketParams {
    pub format: Option<String>,
    pub class: Option<String>,
    #[serde(rename = "referenceName")]
    pub reference_name: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub fields: Option<String>,
    pub tags: Option<String>,
    pub notags: Option<String>,
}

/// POST request body for multiple regions
#[derive(Debug, Deserialize, Default)]
pub struct TicketPostBody {
    pub format: Option<String>,
    pub class: Option<String>,
    pub regions: Option<Vec<RegionBody>>,
    pub fields: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub notags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct RegionBody {
    #[serde(rename = "referenceName")]
    pub reference_name: Option<String>,
    pub start: Option<u64>,
    pub end: Option<u64>,
}

/// GA4GH service-info response
#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub id: String,
    pub name: String,
    pub r#type: ServiceType,
    pub description: Option<String>,
    pub organization: Organization,
    pub version: String,
    pub htsget: HtsgetCapabilities,
}

#[derive(Debug, Serialize)]
pub struct ServiceType {
    pub group: String,
    pub artifact: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct Organization {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct HtsgetCapabilities {
    pub datatype: String,
    pub formats: Vec<Format>,
    #[serde(rename = "fieldsParameterEffective")]
    pub fields_parameter_effective: bool,
    #[serde(rename = "tagsParametersEffective")]
    pub tags_parameters_effective: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parse_is_case_insensitive() {
        assert_eq!("bam".parse::<Format>(), Ok(Format::Bam));
        assert_eq!("Vcf".parse::<Format>(), Ok(Format::Vcf));
        assert_eq!("BCF".parse::<Format>(), Ok(Format::Bcf));
        assert!("bogus".parse::<Format>().is_err());
    }

    #[test]
    fn test_endpoint_accepts() {
        assert!(Endpoint::Reads.accepts(Format::Cram));
        assert!(!Endpoint::Reads.accepts(Format::Vcf));
        assert!(Endpoint::Variants.accepts(Format::Bcf));
        assert_eq!(Endpoint::Variants.default_format(), Format::Vcf);
    }

    #[test]
    fn test_format_serializes_uppercase() {
        let json = serde_json::to_string(&Format::Bcf).unwrap();
        assert_eq!(json, "\"BCF\"");
    }
}
