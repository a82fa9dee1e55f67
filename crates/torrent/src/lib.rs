//! BitTorrent metainfo building and reading for release publication.
//!
//! This crate produces the metainfo artifact and magnet URI for one
//! release's content. It deliberately knows nothing about staging paths or
//! publishers; the pipeline crate decides when building can be skipped in
//! favour of an existing artifact.

pub mod bencode;
mod builder;
pub mod error;
mod metainfo;

pub use crate::builder::{MIN_PIECE_SIZE, build, piece_size_for};
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::metainfo::Metainfo;
