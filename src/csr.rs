// src/csr.rs

//! Compressed-sparse-row binary graph format.
//!
//! Layout: a 4-byte little-endian node count `N`, then `N` 8-byte cumulative
//! degrees `D[0..N)`, then `D[N-1]` 4-byte neighbour ids. Node `i` owns the
//! half-open neighbour range `[D[i-1], D[i])` with `D[-1] == 0`. Each
//! non-self-loop edge appears in both endpoints' ranges; a self-loop appears
//! once.
//!
//! The writer makes two passes over the sorted edge list: degree counting
//! with an in-place prefix sum, then a cursor-driven fill of a read-write
//! memory map sized up front.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use memmap2::{Mmap, MmapMut};

use crate::edges::parse_edge_line;

const NODE_COUNT_BYTES: u64 = 4;
const DEGREE_BYTES: u64 = 8;
const LINK_BYTES: u64 = 4;

/// An in-memory copy of a CSR binary graph.
#[derive(Debug, Clone)]
pub struct CsrGraph {
    pub n_nodes: u32,
    /// Cumulative degrees; `degrees[i]` counts all adjacency entries for
    /// nodes `0..=i`.
    pub degrees: Vec<u64>,
    /// Flat neighbour array.
    pub links: Vec<u32>,
}

impl CsrGraph {
    /// Neighbour slice of node `i`.
    pub fn neighbors(&self, i: u32) -> &[u32] {
        let start = if i == 0 { 0 } else { self.degrees[i as usize - 1] } as usize;
        let end = self.degrees[i as usize] as usize;
        &self.links[start..end]
    }

    /// Degree of node `i` (self-loops counted once).
    pub fn degree(&self, i: u32) -> u64 {
        let prev = if i == 0 { 0 } else { self.degrees[i as usize - 1] };
        self.degrees[i as usize] - prev
    }

    pub fn total_links(&self) -> u64 {
        self.degrees.last().copied().unwrap_or(0)
    }
}

fn out_of_range(src: u32, dst: u32, n: u32) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("edge ({}, {}) has an endpoint outside [0, {})", src, dst, n),
    )
}

/// Write the CSR binary for `num_nodes` nodes from a sorted, deduplicated
/// edge list.
///
/// # Errors
///
/// Fails on I/O errors and when an edge endpoint is out of `[0, num_nodes)`
/// (a caller contract violation).
pub fn write_csr_from_edgelist<P: AsRef<Path>>(
    edge_list_path: P,
    out_binary_path: P,
    num_nodes: u32,
) -> io::Result<()> {
    // Pass 1: degree counting, then an in-place prefix sum.
    let mut degrees = vec![0u64; num_nodes as usize];
    {
        let reader = BufReader::new(File::open(&edge_list_path)?);
        for line in reader.lines() {
            let line = line?;
            let Some((src, dst)) = parse_edge_line(&line)? else {
                continue;
            };
            if src >= num_nodes || dst >= num_nodes {
                return Err(out_of_range(src, dst, num_nodes));
            }
            degrees[src as usize] += 1;
            if src != dst {
                degrees[dst as usize] += 1;
            }
        }
    }

    let mut total_links = 0u64;
    for d in degrees.iter_mut() {
        total_links += *d;
        *d = total_links;
    }

    let header_bytes = NODE_COUNT_BYTES + DEGREE_BYTES * num_nodes as u64;
    let total_bytes = header_bytes + LINK_BYTES * total_links;

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(&out_binary_path)?;
    file.set_len(total_bytes)?;
    let mut mmap = unsafe { MmapMut::map_mut(&file)? };

    mmap[0..4].copy_from_slice(&num_nodes.to_le_bytes());
    for (i, d) in degrees.iter().enumerate() {
        let at = 4 + i * 8;
        mmap[at..at + 8].copy_from_slice(&d.to_le_bytes());
    }

    // Pass 2: re-read the edges and fill each node's range through a
    // per-node write cursor starting at D[i-1].
    let mut cursor = vec![0u64; num_nodes as usize];
    let mut prev = 0u64;
    for (i, d) in degrees.iter().enumerate() {
        cursor[i] = prev;
        prev = *d;
    }

    let links_base = header_bytes as usize;
    {
        let reader = BufReader::new(File::open(&edge_list_path)?);
        for line in reader.lines() {
            let line = line?;
            let Some((src, dst)) = parse_edge_line(&line)? else {
                continue;
            };
            let at = links_base + cursor[src as usize] as usize * 4;
            mmap[at..at + 4].copy_from_slice(&dst.to_le_bytes());
            cursor[src as usize] += 1;
            if src != dst {
                let at = links_base + cursor[dst as usize] as usize * 4;
                mmap[at..at + 4].copy_from_slice(&src.to_le_bytes());
                cursor[dst as usize] += 1;
            }
        }
    }

    mmap.flush()?;
    Ok(())
}

/// Load a CSR binary graph into memory.
///
/// # Errors
///
/// Fails on I/O errors and when the file size does not match the header's
/// node and link counts.
pub fn load_csr<P: AsRef<Path>>(path: P) -> io::Result<CsrGraph> {
    let file = File::open(&path)?;
    let mmap = unsafe { Mmap::map(&file)? };

    let invalid = |msg: &str| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{}: {}", msg, path.as_ref().display()),
        )
    };

    if mmap.len() < 4 {
        return Err(invalid("CSR file too short for a node count"));
    }
    let n_nodes = u32::from_le_bytes([mmap[0], mmap[1], mmap[2], mmap[3]]);

    let header_bytes = (NODE_COUNT_BYTES + DEGREE_BYTES * n_nodes as u64) as usize;
    if mmap.len() < header_bytes {
        return Err(invalid("CSR file too short for its degree table"));
    }

    let mut degrees = Vec::with_capacity(n_nodes as usize);
    for i in 0..n_nodes as usize {
        let at = 4 + i * 8;
        degrees.push(u64::from_le_bytes([
            mmap[at],
            mmap[at + 1],
            mmap[at + 2],
            mmap[at + 3],
            mmap[at + 4],
            mmap[at + 5],
            mmap[at + 6],
            mmap[at + 7],
        ]));
    }

    let total_links = degrees.last().copied().unwrap_or(0);
    let expected = header_bytes as u64 + LINK_BYTES * total_links;
    if mmap.len() as u64 != expected {
        return Err(invalid("CSR file size does not match its degree table"));
    }

    let mut links = Vec::with_capacity(total_links as usize);
    for i in 0..total_links as usize {
        let at = header_bytes + i * 4;
        links.push(u32::from_le_bytes([
            mmap[at],
            mmap[at + 1],
            mmap[at + 2],
            mmap[at + 3],
        ]));
    }

    Ok(CsrGraph {
        n_nodes,
        degrees,
        links,
    })
}
