//! Torrent construction: file walking, piece-size selection, piece hashing.
//!
//! Hashing is the dominant cost of a publication pass (release batches can
//! be gigabytes of video), so the builder reports incremental progress and
//! callers are expected to avoid invoking it when an artifact already
//! exists.

use crate::bencode::Value;
use crate::error::{ErrorKind, Result};
use crate::metainfo::Metainfo;
use sha1::{Digest, Sha1};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Smallest piece size ever selected.
pub const MIN_PIECE_SIZE: u32 = 16 * 1024;
// Grow the piece size until roughly this many pieces remain (or the cap is
// hit). Keeps metainfo documents small without needing exact tuning.
const PIECE_TARGET: u64 = 1500;

/// Piece size for a given content size: the smallest power of two that
/// brings the piece count down to the target, clamped to
/// [[`MIN_PIECE_SIZE`], `cap`]. The cap always wins, trading coarser
/// verification granularity for bounded per-piece overhead on very large
/// batched releases.
pub fn piece_size_for(total: u64, cap: u32) -> u32 {
    let cap = u64::from(cap.max(MIN_PIECE_SIZE));
    let mut size = u64::from(MIN_PIECE_SIZE);
    while size < cap && total.div_ceil(size) > PIECE_TARGET {
        size *= 2;
    }
    size.min(cap) as u32
}

/// Build a metainfo document for the file or directory at `content_path`.
///
/// Directories are hashed as multi-file torrents with entries sorted by
/// relative path. `progress` is called after every completed piece with the
/// file currently being hashed, pieces done, and pieces total; it has no
/// correctness impact.
///
/// # Errors
/// Any I/O failure, or content with zero hashable bytes, is an error: there
/// is nothing to publish without a torrent.
pub fn build(
    content_path: &Path,
    trackers: &[String],
    max_piece_size: u32,
    mut progress: impl FnMut(&Path, u64, u64),
) -> Result<Metainfo> {
    let name = content_path
        .file_name()
        .ok_or_else(|| exn::Exn::from(ErrorKind::EmptyContent(content_path.to_path_buf())))?
        .to_string_lossy()
        .into_owned();

    let metadata = std::fs::metadata(content_path).map_err(ErrorKind::Io)?;
    let (files, single_file) = if metadata.is_file() {
        (vec![(PathBuf::new(), metadata.len())], true)
    } else {
        (collect_files(content_path)?, false)
    };
    let total_length: u64 = files.iter().map(|(_, size)| size).sum();
    if total_length == 0 {
        exn::bail!(ErrorKind::EmptyContent(content_path.to_path_buf()));
    }

    let piece_length = piece_size_for(total_length, max_piece_size);
    let pieces_total = total_length.div_ceil(u64::from(piece_length));
    tracing::debug!(
        content = %content_path.display(),
        total_length,
        piece_length,
        pieces_total,
        "hashing release content"
    );

    // Pieces run across file boundaries: the buffer carries the partial
    // piece from one file into the next.
    let mut pieces = Vec::with_capacity(pieces_total as usize * 20);
    let mut buffer = vec![0u8; piece_length as usize];
    let mut filled = 0usize;
    let mut pieces_done = 0u64;
    let mut current = content_path.to_path_buf();
    for (relative, _) in &files {
        // single-file torrents carry one empty relative path
        current = if relative.as_os_str().is_empty() {
            content_path.to_path_buf()
        } else {
            content_path.join(relative)
        };
        let mut file = File::open(&current).map_err(ErrorKind::Io)?;
        loop {
            let read = file.read(&mut buffer[filled..]).map_err(ErrorKind::Io)?;
            if read == 0 {
                break;
            }
            filled += read;
            if filled == buffer.len() {
                pieces.extend_from_slice(&Sha1::digest(&buffer));
                filled = 0;
                pieces_done += 1;
                progress(&current, pieces_done, pieces_total);
            }
        }
    }
    if filled > 0 {
        pieces.extend_from_slice(&Sha1::digest(&buffer[..filled]));
        pieces_done += 1;
        progress(&current, pieces_done, pieces_total);
    }

    let mut info = Value::dict()
        .insert("name", Value::string(&name))
        .insert("piece length", Value::integer(i64::from(piece_length)))
        .insert("pieces", Value::Bytes(pieces));
    if single_file {
        info = info.insert("length", Value::integer(total_length as i64));
    } else {
        let mut list = Value::list();
        for (relative, size) in &files {
            let mut path = Value::list();
            for component in relative.components() {
                path = path.push(Value::string(&component.as_os_str().to_string_lossy()));
            }
            list = list.push(
                Value::dict()
                    .insert("length", Value::integer(*size as i64))
                    .insert("path", path),
            );
        }
        info = info.insert("files", list);
    }

    let info_hash: [u8; 20] = Sha1::digest(info.encode()).into();

    let mut document = Value::dict()
        .insert("created by", Value::string(concat!("koukai ", env!("CARGO_PKG_VERSION"))))
        .insert("creation date", Value::integer(unix_now()))
        .insert("info", info);
    if let Some(first) = trackers.first() {
        document = document.insert("announce", Value::string(first));
        let mut tiers = Value::list();
        for tracker in trackers {
            tiers = tiers.push(Value::list().push(Value::string(tracker)));
        }
        document = document.insert("announce-list", tiers);
    }

    Ok(Metainfo {
        name,
        piece_length,
        total_length,
        info_hash,
        trackers: trackers.to_vec(),
        raw: document.encode(),
    })
}

/// Walk a directory, returning (relative path, size) pairs sorted by path.
fn collect_files(base: &Path) -> Result<Vec<(PathBuf, u64)>> {
    let mut files = Vec::new();
    let mut stack = vec![base.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir).map_err(ErrorKind::Io)? {
            let entry = entry.map_err(ErrorKind::Io)?;
            let path = entry.path();
            let metadata = std::fs::metadata(&path).map_err(ErrorKind::Io)?;
            if metadata.is_dir() {
                stack.push(path);
            } else if metadata.is_file() {
                let relative = path
                    .strip_prefix(base)
                    .map_err(|_| ErrorKind::Malformed("walked outside content root"))?
                    .to_path_buf();
                files.push((relative, metadata.len()));
            }
        }
    }
    files.sort();
    Ok(files)
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or_default()
}
