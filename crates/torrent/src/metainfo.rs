//! Metainfo documents and magnet URIs.

use crate::bencode::Value;
use crate::error::{ErrorKind, Result};
use sha1::{Digest, Sha1};

/// A torrent metainfo document, either freshly built or read back from an
/// existing artifact.
///
/// The info hash depends only on the content layout (the bencoded `info`
/// dictionary), so the tracker list can change between runs without
/// invalidating existing artifacts.
#[derive(Debug, Clone)]
pub struct Metainfo {
    /// Display name: the content file name, or the directory name for
    /// batch releases.
    pub name: String,
    /// Piece size in bytes.
    pub piece_length: u32,
    /// Sum of all constituent file sizes.
    pub total_length: u64,
    /// SHA-1 of the bencoded `info` dictionary.
    pub info_hash: [u8; 20],
    /// Announce URLs, in tier order.
    pub trackers: Vec<String>,
    /// The full bencoded document as written to disk.
    pub(crate) raw: Vec<u8>,
}

impl Metainfo {
    /// Parse an existing metainfo document.
    ///
    /// Bencoding is canonical, so re-encoding the decoded `info` dictionary
    /// reproduces the exact bytes the info hash is defined over.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let document = Value::decode(data)?;
        let info = document
            .get("info")
            .ok_or_else(|| exn::Exn::from(ErrorKind::Malformed("missing info dictionary")))?;
        let name = info
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| exn::Exn::from(ErrorKind::Malformed("missing name")))?
            .to_string();
        let piece_length = info
            .get("piece length")
            .and_then(Value::as_integer)
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| exn::Exn::from(ErrorKind::Malformed("missing piece length")))?;

        let total_length = match info.get("length").and_then(Value::as_integer) {
            Some(length) => u64::try_from(length)
                .map_err(|_| ErrorKind::Malformed("negative length"))?,
            None => {
                let files = info
                    .get("files")
                    .and_then(Value::as_list)
                    .ok_or_else(|| exn::Exn::from(ErrorKind::Malformed("missing length and files")))?;
                let mut total = 0u64;
                for file in files {
                    let length = file
                        .get("length")
                        .and_then(Value::as_integer)
                        .and_then(|n| u64::try_from(n).ok())
                        .ok_or_else(|| exn::Exn::from(ErrorKind::Malformed("file without length")))?;
                    total += length;
                }
                total
            }
        };

        // announce-list is tiered; flatten in order. Fall back to announce.
        let mut trackers = Vec::new();
        if let Some(tiers) = document.get("announce-list").and_then(Value::as_list) {
            for tier in tiers {
                for url in tier.as_list().unwrap_or_default() {
                    if let Some(url) = url.as_str() {
                        trackers.push(url.to_string());
                    }
                }
            }
        } else if let Some(url) = document.get("announce").and_then(Value::as_str) {
            trackers.push(url.to_string());
        }

        Ok(Self {
            name,
            piece_length,
            total_length,
            info_hash: Sha1::digest(info.encode()).into(),
            trackers,
            raw: data.to_vec(),
        })
    }

    /// The full bencoded document, suitable for writing to disk.
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Lowercase hex rendering of the info hash.
    pub fn info_hash_hex(&self) -> String {
        hex::encode(self.info_hash)
    }

    /// Magnet URI encoding the info hash, display name, total length, and
    /// the full tracker list.
    pub fn magnet(&self) -> String {
        let mut uri = format!(
            "magnet:?xt=urn:btih:{}&dn={}&xl={}",
            self.info_hash_hex(),
            quote_plus(&self.name),
            self.total_length,
        );
        for tracker in &self.trackers {
            uri.push_str("&tr=");
            uri.push_str(&quote_plus(tracker));
        }
        uri
    }
}

/// URL-quote a query parameter, encoding spaces as `+` (the form-encoding
/// convention magnet links conventionally use for display names).
fn quote_plus(value: &str) -> String {
    urlencoding::encode(value).replace("%20", "+")
}
