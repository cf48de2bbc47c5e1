// src/compress.rs

//! Multi-member gzip packaging of the per-community slices.
//!
//! Every community's temp file is streamed through its own deflater, so the
//! output is a concatenation of self-contained gzip members: standard
//! decoders read it as one logical stream, while the recorded offset/size
//! pairs let retrieval seek straight to a single member. Empty or missing
//! slices are recorded with size zero.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Seek, Write};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;

use crate::progress;

/// One row of the offset index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub community_id: u32,
    pub gz_offset: u64,
    pub gz_size: u64,
}

/// Append one gzip member holding the whole of `in_path` to `out`.
fn append_gzip_member(out: &mut File, in_path: &Path, level: u32) -> io::Result<()> {
    let mut input = BufReader::new(File::open(in_path)?);
    let mut encoder = GzEncoder::new(&mut *out, Compression::new(level));
    io::copy(&mut input, &mut encoder)?;
    encoder.finish()?;
    Ok(())
}

/// Compress every part file into `out_gz`, one gzip member per community in
/// community-id order, and return the offset index rows.
///
/// # Errors
///
/// Fails on I/O or deflate errors; the output file is left partial in that
/// case (the caller's temp directory keeps the sources for diagnosis).
pub fn compress_parts<P: AsRef<Path>>(
    out_gz: P,
    part_paths: &[PathBuf],
    gzip_level: u32,
) -> io::Result<Vec<IndexEntry>> {
    let mut out = File::create(&out_gz)?;
    let mut entries = Vec::with_capacity(part_paths.len());

    println!("📦 Compressing {} community slices", part_paths.len());
    let pb = progress::item_bar("compress", "communities", part_paths.len() as u64);
    for (c, part) in part_paths.iter().enumerate() {
        let gz_offset = out.stream_position()?;
        let has_content = part.metadata().map(|m| m.len() > 0).unwrap_or(false);

        let gz_size = if has_content {
            append_gzip_member(&mut out, part, gzip_level)?;
            out.stream_position()? - gz_offset
        } else {
            0
        };

        entries.push(IndexEntry {
            community_id: c as u32,
            gz_offset,
            gz_size,
        });
        pb.inc(1);
    }
    pb.finish_and_clear();

    out.flush()?;
    Ok(entries)
}

/// Write the offset index TSV: a `#`-prefixed header line, then one
/// `community_id\tgz_offset\tgz_size` row per community, ascending.
pub fn write_offset_index<P: AsRef<Path>>(entries: &[IndexEntry], idx_path: P) -> io::Result<()> {
    let mut out = BufWriter::new(File::create(idx_path)?);
    writeln!(out, "#community_id\tgz_offset\tgz_size")?;
    for e in entries {
        writeln!(out, "{}\t{}\t{}", e.community_id, e.gz_offset, e.gz_size)?;
    }
    out.flush()
}
