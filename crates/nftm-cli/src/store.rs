//! Content-addressed metadata store.
//!
//! Local stand-in for an off-chain pinning service: a composed document is
//! written as `<sha256>.json` under the store directory and addressed as
//! `store://<sha256>`, so equal documents share one entry and a URI never
//! goes stale.

use std::io;
use std::path::Path;

use sha2::{Digest, Sha256};

use nftm_core::TokenMetadata;

pub const URI_SCHEME: &str = "store://";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to encode metadata document: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("{uri} is not a store uri")]
    ForeignUri { uri: String },
    #[error("no document stored for {uri}")]
    Missing { uri: String },
    #[error("document for {uri} is not valid metadata JSON: {source}")]
    Malformed {
        uri: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Pin a document, returning its `store://` URI.
pub fn put(dir: &Path, document: &TokenMetadata) -> Result<String, StoreError> {
    let encoded = serde_json::to_vec_pretty(document).map_err(StoreError::Encode)?;
    let content_id = hex::encode(Sha256::digest(&encoded));
    std::fs::create_dir_all(dir).map_err(|source| StoreError::Write {
        path: dir.display().to_string(),
        source,
    })?;
    let path = dir.join(format!("{content_id}.json"));
    std::fs::write(&path, &encoded).map_err(|source| StoreError::Write {
        path: path.display().to_string(),
        source,
    })?;
    Ok(format!("{URI_SCHEME}{content_id}"))
}

/// Resolve a `store://` URI back to its document.
pub fn get(dir: &Path, uri: &str) -> Result<TokenMetadata, StoreError> {
    let content_id = uri
        .strip_prefix(URI_SCHEME)
        .ok_or_else(|| StoreError::ForeignUri {
            uri: uri.to_string(),
        })?;
    let path = dir.join(format!("{content_id}.json"));
    let raw = std::fs::read(&path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            StoreError::Missing {
                uri: uri.to_string(),
            }
        } else {
            StoreError::Read {
                path: path.display().to_string(),
                source,
            }
        }
    })?;
    serde_json::from_slice(&raw).map_err(|source| StoreError::Malformed {
        uri: uri.to_string(),
        source,
    })
}
