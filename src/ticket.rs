//! Ticket assembly: planned segments become the htsget JSON response.

use crate::auth::UrlSigner;
use crate::planner::Segment;
use crate::storage::{ByteRange, DataFile};
use crate::types::{HtsgetResponse, HtsgetResponseBody, UrlEntry};
use std::collections::BTreeMap;

/// Maps a data file to the URL clients fetch its bytes from.
pub trait UrlResolver: Send + Sync {
    fn resolve(&self, file: &DataFile) -> String;
}

/// Points tickets at this server's `/data/{FORMAT}/{id}` route, optionally
/// signing the path.
pub struct DataUrlResolver {
    base_url: String,
    signer: Option<UrlSigner>,
}

impl DataUrlResolver {
    pub fn new(base_url: impl Into<String>, signer: Option<UrlSigner>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, signer }
    }

    /// Request path of the data route for `file`, id percent-encoded.
    pub fn data_path(file: &DataFile) -> String {
        let id: String = url::form_urlencoded::byte_serialize(file.id.as_bytes()).collect();
        format!("/data/{}/{}", file.format.as_str(), id.replace('+', "%20"))
    }
}

impl UrlResolver for DataUrlResolver {
    fn resolve(&self, file: &DataFile) -> String {
        let path = Self::data_path(file);
        let path = match &self.signer {
            Some(signer) => signer.sign_path(&path),
            None => path,
        };
        format!("{}{}", self.base_url, path)
    }
}

/// Build the ticket for `file` from its planned segments.
pub fn build(file: &DataFile, segments: &[Segment], resolver: &dyn UrlResolver) -> HtsgetResponse {
    let urls = segments
        .iter()
        .map(|segment| UrlEntry {
            url: resolver.resolve(file),
            headers: Some(range_headers(segment.range)),
            class: Some(segment.class()),
        })
        .collect();

    HtsgetResponse {
        htsget: HtsgetResponseBody {
            format: file.format,
            urls,
            md5: None,
        },
    }
}

/// `Range` header for a non-empty half-open range.
fn range_headers(range: ByteRange) -> BTreeMap<String, String> {
    let last = range.end.saturating_sub(1).max(range.start);
    BTreeMap::from([(
        "Range".to_string(),
        format!("bytes={}-{}", range.start, last),
    )])
}
