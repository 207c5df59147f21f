//! Published-product store collaborator: prefix-bounded key listing.

use crate::types::{PairError, PairResult};
use quick_xml::de::from_str;
use serde::Deserialize;

/// Abstract object-store contract consumed by the deduplicator.
pub trait ObjectStore {
    /// All keys under `prefix`, pagination drained.
    fn list_keys(&self, prefix: &str) -> PairResult<Vec<String>>;
}

/// ListBucketResult payload from the S3 REST interface
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListBucketResult {
    #[serde(default)]
    contents: Vec<Contents>,
    is_truncated: bool,
    next_continuation_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Contents {
    key: String,
}

/// Key listing against a public bucket over its REST interface.
pub struct HttpObjectStore {
    bucket_url: String,
    http: reqwest::blocking::Client,
}

impl HttpObjectStore {
    pub fn new(bucket_url: impl Into<String>) -> Self {
        Self {
            bucket_url: bucket_url.into(),
            http: reqwest::blocking::Client::new(),
        }
    }
}

impl ObjectStore for HttpObjectStore {
    fn list_keys(&self, prefix: &str) -> PairResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut request = self
                .http
                .get(&self.bucket_url)
                .query(&[("list-type", "2"), ("prefix", prefix)]);
            if let Some(token) = &continuation {
                request = request.query(&[("continuation-token", token.as_str())]);
            }

            let text = request
                .send()
                .map_err(|e| PairError::StoreUnavailable(format!("object store listing failed: {}", e)))?
                .error_for_status()
                .map_err(|e| PairError::StoreUnavailable(format!("object store listing failed: {}", e)))?
                .text()?;

            let page: ListBucketResult = from_str(&text).map_err(|e| {
                PairError::StoreUnavailable(format!("malformed object store listing: {}", e))
            })?;

            keys.extend(page.contents.into_iter().map(|c| c.key));

            if !page.is_truncated {
                break;
            }
            continuation = page.next_continuation_token;
            if continuation.is_none() {
                break;
            }
        }

        Ok(keys)
    }
}
