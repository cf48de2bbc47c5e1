// src/retrieve.rs

//! Retrieval side: resolve a community's byte span from the offset index
//! and stream its decompressed lines out of the multi-member gzip.
//!
//! The offset index is tiny, so span lookup is a linear scan over its rows.
//! Streaming seeks the gzip file to the member's offset, bounds the inflater
//! to exactly `gz_size` input bytes, and hands each decoded line to a caller
//! closure; the closure returns `false` to stop early, which tears the
//! inflater down without error.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use flate2::read::MultiGzDecoder;

/// Byte span of one community's gzip member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommunitySpan {
    pub gz_offset: u64,
    pub gz_size: u64,
}

/// Find `community_id`'s row in the offset index.
///
/// # Errors
///
/// Fails when the index file is missing or unreadable, a row is malformed,
/// or the community id has no row.
pub fn lookup_community_span<P: AsRef<Path>>(
    index_path: P,
    community_id: u32,
) -> io::Result<CommunitySpan> {
    let reader = BufReader::new(File::open(&index_path)?);

    for line in reader.lines() {
        let line = line?;
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut fields = line.split('\t');
        let (Some(cid), Some(offset), Some(size)) =
            (fields.next(), fields.next(), fields.next())
        else {
            return Err(bad_index_row(&line));
        };

        let cid = cid.parse::<u32>().map_err(|_| bad_index_row(&line))?;
        if cid != community_id {
            continue;
        }

        return Ok(CommunitySpan {
            gz_offset: offset.parse::<u64>().map_err(|_| bad_index_row(&line))?,
            gz_size: size.parse::<u64>().map_err(|_| bad_index_row(&line))?,
        });
    }

    Err(io::Error::new(
        io::ErrorKind::NotFound,
        format!("community id {} not found in the offset index", community_id),
    ))
}

fn bad_index_row(line: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("malformed offset index row: {:?}", line),
    )
}

/// Inflate exactly `gz_size` bytes starting at `gz_offset` and deliver each
/// decoded line (without trailing newline) to `on_line`. A `false` return
/// from the callback stops the stream cleanly.
///
/// # Errors
///
/// Fails on seek/read errors and on inflate errors (a truncated or corrupt
/// member).
pub fn stream_community_lines_from_range<P, F>(
    gz_path: P,
    gz_offset: u64,
    gz_size: u64,
    mut on_line: F,
) -> io::Result<()>
where
    P: AsRef<Path>,
    F: FnMut(&[u8]) -> bool,
{
    if gz_size == 0 {
        // Empty community: a present index row but no member bytes.
        return Ok(());
    }

    let mut file = File::open(&gz_path)?;
    file.seek(SeekFrom::Start(gz_offset))?;
    let member = file.take(gz_size);
    let mut lines = BufReader::new(MultiGzDecoder::new(member));

    let mut buf = Vec::with_capacity(4096);
    loop {
        buf.clear();
        let n = lines.read_until(b'\n', &mut buf)?;
        if n == 0 {
            return Ok(());
        }
        if buf.last() == Some(&b'\n') {
            buf.pop();
        }
        if !on_line(&buf) {
            return Ok(());
        }
    }
}

/// Resolve `community_id` through the offset index and stream its lines.
pub fn stream_community_lines<P, F>(
    index_path: P,
    gz_path: P,
    community_id: u32,
    on_line: F,
) -> io::Result<()>
where
    P: AsRef<Path>,
    F: FnMut(&[u8]) -> bool,
{
    let span = lookup_community_span(&index_path, community_id)?;
    stream_community_lines_from_range(&gz_path, span.gz_offset, span.gz_size, on_line)
}
