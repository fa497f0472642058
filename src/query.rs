//! Ticket request validation.
//!
//! Turns raw GET parameters or a POST body into a [`Query`] the planner can
//! trust. Validation is pure: nothing here touches storage, so a malformed
//! request is rejected before any file is opened.

use crate::formats;
use crate::types::{DataClass, Endpoint, Format, TicketParams, TicketPostBody};
use crate::Error;
use std::collections::BTreeSet;

/// Reference name selecting records with no reference.
pub const UNPLACED: &str = "*";

/// Field names the reads endpoint understands.
pub const READ_FIELDS: &[&str] = &[
    "QNAME", "FLAG", "RNAME", "POS", "MAPQ", "CIGAR", "RNEXT", "PNEXT", "TLEN", "SEQ", "QUAL",
];

/// A genomic window, 0-based half-open. Absent bounds mean the start or end
/// of the reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub reference_name: String,
    pub start: Option<u64>,
    pub end: Option<u64>,
}

impl Region {
    pub fn is_unplaced(&self) -> bool {
        self.reference_name == UNPLACED
    }
}

/// A validated ticket request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub endpoint: Endpoint,
    pub format: Format,
    pub class: DataClass,
    /// Empty means the whole file.
    pub regions: Vec<Region>,
    pub fields: Option<BTreeSet<String>>,
    pub tags: Option<BTreeSet<String>>,
    pub notags: Option<BTreeSet<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("unknown format: {0}")]
    UnknownFormat(String),

    #[error("{format} is not a {datatype} format")]
    WrongEndpoint {
        format: Format,
        datatype: &'static str,
    },

    #[error("{0} is not supported by this server")]
    NoReader(Format),

    #[error("invalid class: {0}")]
    InvalidClass(String),

    #[error("invalid {name}: {value:?} is not a non-negative integer")]
    MalformedInteger { name: &'static str, value: String },

    #[error("start {start} is greater than end {end}")]
    StartAfterEnd { start: u64, end: u64 },

    #[error("start and end require referenceName")]
    MissingReference,

    #[error("referenceName must not be empty")]
    EmptyReference,

    #[error("start and end cannot be used with referenceName=*")]
    RangeOnUnplaced,

    #[error("class=header cannot be combined with a region")]
    HeaderWithRegion,

    #[error("empty item in {0}")]
    EmptyListItem(&'static str),

    #[error("unknown field: {0}")]
    UnknownField(String),

    #[error("tag {0} is in both tags and notags")]
    TagConflict(String),
}

impl ValidationError {
    /// htsget error code this failure is reported as.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::WrongEndpoint { .. } | ValidationError::NoReader(_) => {
                "UnsupportedFormat"
            }
            _ => "InvalidInput",
        }
    }
}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::WrongEndpoint { .. } | ValidationError::NoReader(_) => {
                Error::UnsupportedFormat(err.to_string())
            }
            _ => Error::InvalidInput(err.to_string()),
        }
    }
}

/// Validate GET query parameters.
pub fn validate(endpoint: Endpoint, params: &TicketParams) -> Result<Query, ValidationError> {
    let format = parse_format(endpoint, params.format.as_deref())?;
    let class = parse_class(params.class.as_deref())?;
    let start = parse_position("start", params.start.as_deref())?;
    let end = parse_position("end", params.end.as_deref())?;

    let regions = match params.reference_name.as_deref() {
        Some(name) => vec![region(name, start, end)?],
        None if start.is_some() || end.is_some() => {
            return Err(ValidationError::MissingReference);
        }
        None => Vec::new(),
    };

    Query {
        endpoint,
        format,
        class,
        regions,
        fields: split_list("fields", params.fields.as_deref())?,
        tags: split_list("tags", params.tags.as_deref())?,
        notags: split_list("notags", params.notags.as_deref())?,
    }
    .checked()
}

/// Validate a POST body.
pub fn validate_post(endpoint: Endpoint, body: &TicketPostBody) -> Result<Query, ValidationError> {
    let format = parse_format(endpoint, body.format.as_deref())?;
    let class = parse_class(body.class.as_deref())?;

    let mut regions = Vec::new();
    for r in body.regions.iter().flatten() {
        let name = r
            .reference_name
            .as_deref()
            .ok_or(ValidationError::MissingReference)?;
        regions.push(region(name, r.start, r.end)?);
    }

    Query {
        endpoint,
        format,
        class,
        regions,
        fields: collect_list("fields", body.fields.as_deref())?,
        tags: collect_list("tags", body.tags.as_deref())?,
        notags: collect_list("notags", body.notags.as_deref())?,
    }
    .checked()
}

impl Query {
    /// Checks that span several parameters.
    fn checked(self) -> Result<Self, ValidationError> {
        if self.class == DataClass::Header && !self.regions.is_empty() {
            return Err(ValidationError::HeaderWithRegion);
        }

        if self.endpoint == Endpoint::Reads {
            if let Some(field) = self
                .fields
                .iter()
                .flatten()
                .find(|f| !READ_FIELDS.contains(&f.as_str()))
            {
                return Err(ValidationError::UnknownField(field.clone()));
            }
        }

        if let (Some(tags), Some(notags)) = (&self.tags, &self.notags) {
            if let Some(tag) = tags.intersection(notags).next() {
                return Err(ValidationError::TagConflict(tag.clone()));
            }
        }

        Ok(self)
    }
}

fn parse_format(endpoint: Endpoint, value: Option<&str>) -> Result<Format, ValidationError> {
    let format = match value {
        Some(s) => s
            .parse::<Format>()
            .map_err(|e| ValidationError::UnknownFormat(e.0))?,
        None => endpoint.default_format(),
    };

    if !endpoint.accepts(format) {
        return Err(ValidationError::WrongEndpoint {
            format,
            datatype: endpoint.datatype(),
        });
    }
    if !formats::is_supported(format) {
        return Err(ValidationError::NoReader(format));
    }
    Ok(format)
}

fn parse_class(value: Option<&str>) -> Result<DataClass, ValidationError> {
    match value {
        None => Ok(DataClass::Body),
        Some(s) if s.eq_ignore_ascii_case("header") => Ok(DataClass::Header),
        Some(s) if s.eq_ignore_ascii_case("body") => Ok(DataClass::Body),
        Some(s) => Err(ValidationError::InvalidClass(s.to_string())),
    }
}

fn parse_position(name: &'static str, value: Option<&str>) -> Result<Option<u64>, ValidationError> {
    value
        .map(|s| {
            s.trim()
                .parse::<u64>()
                .map_err(|_| ValidationError::MalformedInteger {
                    name,
                    value: s.to_string(),
                })
        })
        .transpose()
}

fn region(name: &str, start: Option<u64>, end: Option<u64>) -> Result<Region, ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::EmptyReference);
    }
    if name == UNPLACED && (start.is_some() || end.is_some()) {
        return Err(ValidationError::RangeOnUnplaced);
    }
    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            return Err(ValidationError::StartAfterEnd { start, end });
        }
    }

    Ok(Region {
        reference_name: name.to_string(),
        start,
        end,
    })
}

fn split_list(
    name: &'static str,
    value: Option<&str>,
) -> Result<Option<BTreeSet<String>>, ValidationError> {
    value
        .map(|s| collect_items(name, s.split(',')))
        .transpose()
}

fn collect_list(
    name: &'static str,
    value: Option<&[String]>,
) -> Result<Option<BTreeSet<String>>, ValidationError> {
    value
        .map(|items| collect_items(name, items.iter().map(String::as_str)))
        .transpose()
}

fn collect_items<'a>(
    name: &'static str,
    items: impl Iterator<Item = &'a str>,
) -> Result<BTreeSet<String>, ValidationError> {
    items
        .map(|item| {
            let item = item.trim();
            if item.is_empty() {
                Err(ValidationError::EmptyListItem(name))
            } else {
                Ok(item.to_string())
            }
        })
        .collect()
}
