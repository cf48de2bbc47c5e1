// src/split.rs

//! Routing of GFA records into per-community temp files through a bounded
//! pool of open file handles.
//!
//! Splitting a graph with K communities naively needs K simultaneously open
//! files, which blows the descriptor quota for large K. `HandleCache` keeps
//! at most `max_open` append-mode handles alive, evicting the least recently
//! used one on a miss. Part files are opened in append mode, so an evicted
//! handle can be re-opened later without losing earlier writes.

use std::collections::{HashMap, VecDeque};
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::gfa::{self, RecordType};
use crate::progress;
use crate::reader::{LineReader, ReaderOptions};

/// Conservative default for the open-handle bound.
pub const DEFAULT_MAX_OPEN: usize = 150;

struct OpenHandle {
    file: BufWriter<File>,
    stamp: u64,
}

/// LRU cache of append-mode file handles keyed by community id.
///
/// Recency is a stamped queue: every touch pushes a `(cid, stamp)` pair and
/// records the stamp on the handle; eviction pops from the front, skipping
/// entries whose stamp no longer matches. Stale entries are compacted when
/// the queue grows well past the bound.
pub struct HandleCache {
    paths: Vec<PathBuf>,
    max_open: usize,
    open: HashMap<u32, OpenHandle>,
    recency: VecDeque<(u32, u64)>,
    tick: u64,
}

impl HandleCache {
    pub fn new(paths: Vec<PathBuf>, max_open: usize) -> Self {
        HandleCache {
            paths,
            max_open: max_open.max(1),
            open: HashMap::new(),
            recency: VecDeque::new(),
            tick: 0,
        }
    }

    /// Append `line` plus a newline to community `cid`'s part file.
    pub fn write_line(&mut self, cid: u32, line_no_newline: &[u8]) -> io::Result<()> {
        let handle = self.handle_for(cid)?;
        handle.write_all(line_no_newline)?;
        handle.write_all(b"\n")?;
        Ok(())
    }

    /// Flush and close every open handle.
    pub fn close_all(&mut self) -> io::Result<()> {
        for (_, mut handle) in self.open.drain() {
            handle.file.flush()?;
        }
        self.recency.clear();
        Ok(())
    }

    /// Number of handles currently open (bounded by `max_open`).
    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    fn handle_for(&mut self, cid: u32) -> io::Result<&mut BufWriter<File>> {
        let stamp = self.tick;
        self.tick += 1;

        if let Some(handle) = self.open.get_mut(&cid) {
            handle.stamp = stamp;
            self.recency.push_back((cid, stamp));
            self.compact_if_bloated();
            return self.cached_handle(cid);
        }

        if self.open.len() >= self.max_open {
            self.evict_lru()?;
        }

        let path = self.paths.get(cid as usize).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("no part path for community {}", cid),
            )
        })?;
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        self.open.insert(
            cid,
            OpenHandle {
                file: BufWriter::new(file),
                stamp,
            },
        );
        self.recency.push_back((cid, stamp));
        self.compact_if_bloated();
        self.cached_handle(cid)
    }

    /// Re-borrow an entry known to be in the cache; a miss here means the
    /// cache bookkeeping is broken.
    fn cached_handle(&mut self, cid: u32) -> io::Result<&mut BufWriter<File>> {
        self.open
            .get_mut(&cid)
            .map(|handle| &mut handle.file)
            .ok_or_else(|| {
                io::Error::other(format!("handle cache lost its entry for community {}", cid))
            })
    }

    fn evict_lru(&mut self) -> io::Result<()> {
        while let Some((cid, stamp)) = self.recency.pop_front() {
            let live = self
                .open
                .get(&cid)
                .map(|handle| handle.stamp == stamp)
                .unwrap_or(false);
            if live {
                if let Some(mut handle) = self.open.remove(&cid) {
                    handle.file.flush()?;
                }
                return Ok(());
            }
        }
        Ok(())
    }

    fn compact_if_bloated(&mut self) {
        if self.recency.len() > self.max_open.saturating_mul(8).max(64) {
            let open = &self.open;
            self.recency
                .retain(|(cid, stamp)| open.get(cid).map(|h| h.stamp == *stamp).unwrap_or(false));
        }
    }
}

/// Pre-compute one part path per community (plus the cross-community sink as
/// the last entry) and remove any stale file already at those paths.
pub fn build_part_paths(tmp_dir: &Path, n_parts: u32) -> io::Result<Vec<PathBuf>> {
    let mut paths = Vec::with_capacity(n_parts as usize);
    for c in 0..n_parts {
        let path = tmp_dir.join(format!("comm_{}.gfa", c));
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        paths.push(path);
    }
    Ok(paths)
}

fn node_comm(
    node_id: &[u8],
    node_ids: &HashMap<Vec<u8>, u32>,
    id_to_comm: &[u32],
    line: &[u8],
) -> io::Result<u32> {
    if node_id.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "empty node identifier. Offending line: {}",
                String::from_utf8_lossy(line)
            ),
        ));
    }
    let int_id = node_ids.get(node_id).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "node {} is missing from the interning map",
                String::from_utf8_lossy(node_id)
            ),
        )
    })?;
    Ok(id_to_comm[*int_id as usize])
}

/// Route every line of the GFA into its community's part file.
///
/// Headers and unrecognised record types go to community 0; Segments follow
/// their node; Links follow their endpoints' shared community or, when the
/// endpoints disagree, the cross-community sink (the last part path).
///
/// # Errors
///
/// Fails on I/O errors and on the consistency error of meeting a node id
/// that the interning pass never saw.
pub fn split_gfa_to_parts<P: AsRef<Path>>(
    input_gfa: P,
    node_ids: &HashMap<Vec<u8>, u32>,
    id_to_comm: &[u32],
    part_paths: Vec<PathBuf>,
    max_open: usize,
    reader_opts: &ReaderOptions,
    progress_every: u64,
) -> io::Result<()> {
    let sink = (part_paths.len() - 1) as u32;
    let mut cache = HandleCache::new(part_paths, max_open);

    let mut reader = LineReader::open(&input_gfa, reader_opts.clone())?;
    println!("✂️  Splitting the GFA into per-community slices");
    let pb = progress::line_spinner("split");

    while let Some(line) = reader.read_line()? {
        match gfa::record_type(line) {
            RecordType::Header => cache.write_line(0, line)?,
            RecordType::Segment => {
                let node_id = gfa::extract_s_node_id(line)?;
                let comm = node_comm(node_id, node_ids, id_to_comm, line)?;
                cache.write_line(comm, line)?;
            }
            RecordType::Link => {
                let (src, dst) = gfa::extract_l_nodes(line)?;
                let src_comm = node_comm(src, node_ids, id_to_comm, line)?;
                let dst_comm = node_comm(dst, node_ids, id_to_comm, line)?;
                if src_comm == dst_comm {
                    cache.write_line(src_comm, line)?;
                } else {
                    cache.write_line(sink, line)?;
                }
            }
            // Paths and anything unrecognised travel with the header slice.
            RecordType::Path | RecordType::Other => cache.write_line(0, line)?,
        }
        progress::tick_lines(&pb, reader.line_number(), progress_every);
    }
    pb.finish_and_clear();

    cache.close_all()
}
